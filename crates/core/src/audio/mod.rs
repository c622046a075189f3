use std::collections::HashMap;

use serde::Serialize;

use crate::{scheduler::ManualClock, Result, ScenarioId, SeaLevelError};

/// Audio playback engine abstraction. Positions are read from the engine
/// itself rather than reconstructed from poll counts.
pub trait Transport {
    /// Opens the asset. Failures leave the transport unloaded.
    fn load(&mut self, audio: &str) -> Result<()>;
    fn unload(&mut self);
    fn start(&mut self, from_seconds: f64);
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64);
    /// Current position in seconds.
    fn position(&self) -> f64;
    /// Asset length, once the asset has reported it.
    fn duration(&self) -> Option<f64>;
    fn set_volume_db(&mut self, db: f32);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn load(&mut self, audio: &str) -> Result<()> {
        (**self).load(audio)
    }

    fn unload(&mut self) {
        (**self).unload()
    }

    fn start(&mut self, from_seconds: f64) {
        (**self).start(from_seconds)
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn seek(&mut self, seconds: f64) {
        (**self).seek(seconds)
    }

    fn position(&self) -> f64 {
        (**self).position()
    }

    fn duration(&self) -> Option<f64> {
        (**self).duration()
    }

    fn set_volume_db(&mut self, db: f32) {
        (**self).set_volume_db(db)
    }
}

/// Play state change forwarded from the playback clock. Pause and stop are
/// kept apart because only stop rewinds the narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayEdge {
    Play,
    Pause,
    Stop,
}

/// Transport-side view of playback.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AudioTransportState {
    pub loaded_scenario: Option<ScenarioId>,
    pub transport_playing: bool,
    pub elapsed_seconds: f64,
    pub total_seconds: f64,
}

/// One progress reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub elapsed_seconds: f64,
    pub total_seconds: f64,
    /// The narration reached its end during this reading.
    pub finished: bool,
}

impl Progress {
    pub fn fraction(&self) -> Option<f64> {
        fraction_of(self.elapsed_seconds, self.total_seconds)
    }
}

fn fraction_of(elapsed: f64, total: f64) -> Option<f64> {
    (total > 0.0).then(|| (elapsed / total).clamp(0.0, 1.0))
}

/// Maps a 0..=100 volume slider onto -40..=0 dB.
pub fn volume_to_db(percent: f32) -> f32 {
    (percent.clamp(0.0, 100.0) / 100.0) * 40.0 - 40.0
}

/// Keeps a transport in step with the playback clock's play state while
/// leaving the two clocks independent. The clock only sends play edges in;
/// progress only comes out as readings.
#[derive(Debug)]
pub struct AudioSync<T> {
    transport: T,
    state: AudioTransportState,
    bound: Option<String>,
    generation: u64,
    volume_db: f32,
}

impl<T: Transport> AudioSync<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: AudioTransportState::default(),
            bound: None,
            generation: 0,
            volume_db: volume_to_db(70.0),
        }
    }

    pub fn state(&self) -> &AudioTransportState {
        &self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Token of the current binding. Progress polls carry it so readings
    /// armed under an earlier scenario can be told apart.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drops the current binding and binds `audio` for the new scenario.
    /// A scenario without narration plays muted. A failed load reports
    /// `Audio { reason: "load failed" }` and leaves the sync unbound.
    pub fn on_scenario_changed(&mut self, id: &str, audio: Option<&str>) -> Result<()> {
        self.generation += 1;
        if let Some(previous) = self.bound.take() {
            self.transport.pause();
            self.transport.unload();
            tracing::debug!(audio = %previous, "released narration");
        }
        self.state = AudioTransportState::default();

        let Some(audio) = audio else {
            tracing::debug!(scenario = id, "no narration for scenario; playing muted");
            return Ok(());
        };

        if let Err(err) = self.transport.load(audio) {
            tracing::warn!(scenario = id, audio, error = %err, "narration failed to load");
            return Err(SeaLevelError::audio("load failed"));
        }

        self.transport.set_volume_db(self.volume_db);
        self.bound = Some(audio.to_string());
        self.state.loaded_scenario = Some(id.to_string());
        self.state.total_seconds = self.transport.duration().unwrap_or(0.0).max(0.0);
        tracing::debug!(scenario = id, audio, "narration bound");
        Ok(())
    }

    /// Applies a play state edge. Without a bound transport this only
    /// records the edge; visual playback is never blocked by audio.
    pub fn on_play_state_changed(&mut self, edge: PlayEdge) {
        match edge {
            PlayEdge::Play => {
                if self.bound.is_none() {
                    return;
                }
                self.refresh_total();
                if self.state.total_seconds > 0.0
                    && self.state.elapsed_seconds >= self.state.total_seconds
                {
                    self.state.elapsed_seconds = 0.0;
                }
                self.transport.start(self.state.elapsed_seconds);
                self.state.transport_playing = true;
            }
            PlayEdge::Pause => {
                if self.bound.is_some() {
                    self.transport.pause();
                    self.state.elapsed_seconds = self.transport.position().max(0.0);
                }
                self.state.transport_playing = false;
            }
            PlayEdge::Stop => {
                if self.bound.is_some() {
                    self.transport.pause();
                    self.transport.seek(0.0);
                }
                self.state.elapsed_seconds = 0.0;
                self.state.transport_playing = false;
            }
        }
        tracing::debug!(?edge, elapsed = self.state.elapsed_seconds, "transport play state");
    }

    /// Reads the transport position. Returns `None` for a poll armed under
    /// an older binding.
    pub fn report_progress(&mut self, generation: u64) -> Option<Progress> {
        if generation != self.generation {
            return None;
        }

        let mut finished = false;
        if self.bound.is_some() {
            self.refresh_total();
            let total = self.state.total_seconds;
            let mut elapsed = self.transport.position().max(0.0);
            if total > 0.0 {
                elapsed = elapsed.min(total);
            }
            self.state.elapsed_seconds = elapsed;

            if self.state.transport_playing && total > 0.0 && elapsed >= total {
                self.transport.pause();
                self.state.transport_playing = false;
                finished = true;
                tracing::debug!(total, "narration finished");
            }
        }

        Some(Progress {
            elapsed_seconds: self.state.elapsed_seconds,
            total_seconds: self.state.total_seconds,
            finished,
        })
    }

    /// Moves the narration to `seconds`, clamped to its length.
    pub fn seek(&mut self, seconds: f64) {
        let mut seconds = if seconds.is_nan() { 0.0 } else { seconds.max(0.0) };
        if self.state.total_seconds > 0.0 {
            seconds = seconds.min(self.state.total_seconds);
        }
        if self.bound.is_some() {
            self.transport.seek(seconds);
        }
        self.state.elapsed_seconds = seconds;
    }

    pub fn set_volume(&mut self, percent: f32) {
        self.volume_db = volume_to_db(percent);
        if self.bound.is_some() {
            self.transport.set_volume_db(self.volume_db);
        }
    }

    pub fn volume_db(&self) -> f32 {
        self.volume_db
    }

    /// `elapsed / total` once the asset has reported its length.
    pub fn progress_fraction(&self) -> Option<f64> {
        fraction_of(self.state.elapsed_seconds, self.state.total_seconds)
    }

    fn refresh_total(&mut self) {
        if let Some(total) = self.transport.duration() {
            self.state.total_seconds = total.max(0.0);
        }
    }
}

/// Transport whose position follows the event loop's clock. Stands in for
/// a device-backed engine; assets are known by path and length only.
#[derive(Debug, Clone)]
pub struct ClockTransport {
    clock: ManualClock,
    assets: HashMap<String, f64>,
    loaded: Option<f64>,
    started: Option<(u64, f64)>,
    paused_at: f64,
    volume_db: f32,
}

impl ClockTransport {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            assets: HashMap::new(),
            loaded: None,
            started: None,
            paused_at: 0.0,
            volume_db: 0.0,
        }
    }

    pub fn with_asset(mut self, path: impl Into<String>, seconds: f64) -> Self {
        self.register(path, seconds);
        self
    }

    pub fn register(&mut self, path: impl Into<String>, seconds: f64) {
        self.assets.insert(path.into(), seconds.max(0.0));
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    pub fn volume(&self) -> f32 {
        self.volume_db
    }

    fn clamp(&self, seconds: f64) -> f64 {
        let total = self.loaded.unwrap_or(0.0);
        seconds.clamp(0.0, total)
    }
}

impl Transport for ClockTransport {
    fn load(&mut self, audio: &str) -> Result<()> {
        let seconds = self
            .assets
            .get(audio)
            .copied()
            .ok_or_else(|| SeaLevelError::audio(format!("no such asset `{audio}`")))?;
        self.loaded = Some(seconds);
        self.started = None;
        self.paused_at = 0.0;
        Ok(())
    }

    fn unload(&mut self) {
        self.loaded = None;
        self.started = None;
        self.paused_at = 0.0;
    }

    fn start(&mut self, from_seconds: f64) {
        if self.loaded.is_some() {
            self.started = Some((self.clock.now_ms(), self.clamp(from_seconds)));
        }
    }

    fn pause(&mut self) {
        self.paused_at = self.position();
        self.started = None;
    }

    fn seek(&mut self, seconds: f64) {
        let seconds = self.clamp(seconds);
        match self.started {
            Some(_) => self.started = Some((self.clock.now_ms(), seconds)),
            None => self.paused_at = seconds,
        }
    }

    fn position(&self) -> f64 {
        match self.started {
            Some((since_ms, from)) => {
                let elapsed = self.clock.now_ms().saturating_sub(since_ms) as f64 / 1000.0;
                self.clamp(from + elapsed)
            }
            None => self.paused_at,
        }
    }

    fn duration(&self) -> Option<f64> {
        self.loaded
    }

    fn set_volume_db(&mut self, db: f32) {
        self.volume_db = db;
    }
}
