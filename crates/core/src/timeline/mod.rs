use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Result, ScenarioId, SeaLevelError, SeriesDataset};

/// Whether autoplay is advancing the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    Stopped,
    Playing,
}

impl std::fmt::Display for PlayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayState::Stopped => write!(f, "stopped"),
            PlayState::Playing => write!(f, "playing"),
        }
    }
}

/// Result of a single autoplay step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The index moved forward by one.
    Advanced(usize),
    /// The index was already terminal; playback stopped in place.
    Finished(usize),
    /// Not playing, nothing happened.
    Idle,
}

/// Snapshot of the shared playback state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackState {
    pub selected_scenario: ScenarioId,
    pub index: usize,
    pub playing: bool,
    pub tick_period_ms: u64,
}

/// Discrete time index into the dataset's timeline plus the play/pause
/// state machine around it. Every operation is idempotent when repeated.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    dataset: Arc<SeriesDataset>,
    scenario: ScenarioId,
    index: usize,
    state: PlayState,
    tick_period_ms: u64,
}

impl PlaybackClock {
    /// Starts stopped at index zero on `scenario`.
    pub fn new(dataset: Arc<SeriesDataset>, scenario: &str, tick_period_ms: u64) -> Result<Self> {
        if !dataset.has_scenario(scenario) {
            return Err(SeaLevelError::UnknownScenario(scenario.to_string()));
        }
        Ok(Self {
            dataset,
            scenario: scenario.to_string(),
            index: 0,
            state: PlayState::Stopped,
            tick_period_ms: tick_period_ms.max(1),
        })
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn tick_period_ms(&self) -> u64 {
        self.tick_period_ms
    }

    pub fn last_index(&self) -> usize {
        self.dataset.last_index()
    }

    pub fn is_at_end(&self) -> bool {
        self.index >= self.last_index()
    }

    pub fn snapshot(&self) -> PlaybackState {
        PlaybackState {
            selected_scenario: self.scenario.clone(),
            index: self.index,
            playing: self.is_playing(),
            tick_period_ms: self.tick_period_ms,
        }
    }

    /// Switches scenario. Series are not aligned across scenarios, so the
    /// index always returns to zero and playback stops. An unknown id leaves
    /// the state untouched.
    pub fn set_scenario(&mut self, id: &str) -> Result<()> {
        if !self.dataset.has_scenario(id) {
            return Err(SeaLevelError::UnknownScenario(id.to_string()));
        }
        self.scenario = id.to_string();
        self.index = 0;
        self.state = PlayState::Stopped;
        tracing::debug!(scenario = id, "scenario selected");
        Ok(())
    }

    /// Starts autoplay, rewinding first when parked on the last index.
    pub fn play(&mut self) {
        if self.is_playing() && !self.is_at_end() {
            return;
        }
        if self.is_at_end() {
            self.index = 0;
        }
        self.state = PlayState::Playing;
        tracing::debug!(index = self.index, "playback started");
    }

    pub fn pause(&mut self) {
        if self.is_playing() {
            tracing::debug!(index = self.index, "playback paused");
        }
        self.state = PlayState::Stopped;
    }

    pub fn stop(&mut self) {
        tracing::debug!(index = self.index, "playback stopped");
        self.state = PlayState::Stopped;
        self.index = 0;
    }

    /// Selects `floor(fraction * last_index)`. Out-of-range and NaN
    /// fractions are clamped; the play state is left alone.
    pub fn seek(&mut self, fraction: f64) {
        self.index = index_for_fraction(fraction, self.dataset.len());
    }

    /// Selects `index`, clamped to the timeline.
    pub fn seek_to_index(&mut self, index: i64) {
        let last = self.last_index() as i64;
        self.index = index.clamp(0, last) as usize;
    }

    /// One autoplay step. At the last index playback stops in place; the
    /// index never wraps and never leaves the timeline.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_playing() {
            return TickOutcome::Idle;
        }
        if self.is_at_end() {
            self.index = self.last_index();
            self.state = PlayState::Stopped;
            tracing::debug!(index = self.index, "reached end of series");
            return TickOutcome::Finished(self.index);
        }
        self.index += 1;
        TickOutcome::Advanced(self.index)
    }

    pub fn set_tick_period(&mut self, tick_period_ms: u64) {
        self.tick_period_ms = tick_period_ms.max(1);
    }

    /// Position along the timeline in `[0, 1]`; zero for a single year.
    pub fn progress_fraction(&self) -> f64 {
        let last = self.last_index();
        if last == 0 {
            0.0
        } else {
            self.index as f64 / last as f64
        }
    }

    pub fn current_value(&self) -> f64 {
        self.dataset
            .value_at(&self.scenario, self.index)
            .unwrap_or_default()
    }

    pub fn current_year(&self) -> Option<i32> {
        self.dataset.year_at(self.index)
    }
}

/// Maps a fraction of the timeline onto an index for a series of `len`
/// points.
pub fn index_for_fraction(fraction: f64, len: usize) -> usize {
    let last = len.saturating_sub(1);
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    ((fraction * last as f64).floor() as usize).min(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::fixtures;

    fn clock() -> PlaybackClock {
        PlaybackClock::new(Arc::new(fixtures::dataset()), "1.5", 1000).unwrap()
    }

    fn single_year() -> PlaybackClock {
        let body = r#"{ "country": "Fiji", "years": [2020], "scenarios": { "1.5": [0.1] },
                        "audio": {}, "thresholds": [] }"#;
        let dataset = SeriesDataset::from_json_slice(body.as_bytes()).unwrap();
        PlaybackClock::new(Arc::new(dataset), "1.5", 1000).unwrap()
    }

    #[test]
    fn starts_stopped_at_zero() {
        let clock = clock();
        assert_eq!(clock.index(), 0);
        assert_eq!(clock.state(), PlayState::Stopped);
        assert_eq!(clock.snapshot().selected_scenario, "1.5");
    }

    #[test]
    fn rejects_unknown_default_scenario() {
        let err = PlaybackClock::new(Arc::new(fixtures::dataset()), "9", 1000).unwrap_err();
        assert!(matches!(err, SeaLevelError::UnknownScenario(id) if id == "9"));
    }

    #[test]
    fn seek_maps_fraction_to_index() {
        let mut clock = clock();

        clock.seek(0.0);
        assert_eq!(clock.index(), 0);
        clock.seek(1.0);
        assert_eq!(clock.index(), 2);
        clock.seek(0.5);
        assert_eq!(clock.index(), 1);
        assert_eq!(clock.current_value(), 0.2);

        clock.seek(7.0);
        assert_eq!(clock.index(), 2);
        clock.seek(-3.0);
        assert_eq!(clock.index(), 0);
        clock.seek(f64::NAN);
        assert_eq!(clock.index(), 0);
    }

    #[test]
    fn seek_is_monotonic() {
        let mut previous = 0;
        for step in 0..=1000 {
            let index = index_for_fraction(step as f64 / 1000.0, 41);
            assert!(index >= previous);
            assert!(index <= 40);
            previous = index;
        }
        assert_eq!(previous, 40);
    }

    #[test]
    fn seek_keeps_play_state() {
        let mut clock = clock();
        clock.play();
        clock.seek(0.5);
        assert!(clock.is_playing());
        clock.seek_to_index(-4);
        assert_eq!(clock.index(), 0);
        clock.seek_to_index(99);
        assert_eq!(clock.index(), 2);
        assert!(clock.is_playing());
    }

    #[test]
    fn ticks_advance_by_one_then_stop_at_end() {
        let mut clock = clock();
        assert_eq!(clock.tick(), TickOutcome::Idle);

        clock.play();
        assert_eq!(clock.tick(), TickOutcome::Advanced(1));
        assert_eq!(clock.tick(), TickOutcome::Advanced(2));
        assert_eq!(clock.tick(), TickOutcome::Finished(2));
        assert_eq!(clock.state(), PlayState::Stopped);
        assert_eq!(clock.tick(), TickOutcome::Idle);
        assert_eq!(clock.index(), 2);
    }

    #[test]
    fn play_at_end_rewinds_first() {
        let mut clock = clock();
        clock.seek(1.0);

        clock.play();
        assert_eq!(clock.index(), 0);
        assert!(clock.is_playing());
    }

    #[test]
    fn play_is_idempotent_mid_series() {
        let mut clock = clock();
        clock.seek_to_index(1);
        clock.play();
        clock.play();
        assert_eq!(clock.index(), 1);
        assert!(clock.is_playing());
    }

    #[test]
    fn pause_keeps_index_and_stop_rewinds() {
        let mut clock = clock();
        clock.play();
        clock.tick();

        clock.pause();
        assert_eq!(clock.index(), 1);
        assert!(!clock.is_playing());

        clock.play();
        clock.stop();
        assert_eq!(clock.index(), 0);
        assert!(!clock.is_playing());
    }

    #[test]
    fn set_scenario_always_resets() {
        let mut clock = clock();
        clock.play();
        clock.tick();

        clock.set_scenario("5").unwrap();
        assert_eq!(clock.index(), 0);
        assert!(!clock.is_playing());
        assert_eq!(clock.scenario(), "5");

        clock.seek(1.0);
        clock.set_scenario("5").unwrap();
        assert_eq!(clock.index(), 0);
    }

    #[test]
    fn unknown_scenario_leaves_state_alone() {
        let mut clock = clock();
        clock.play();
        clock.tick();

        assert!(clock.set_scenario("7").is_err());
        assert_eq!(clock.scenario(), "1.5");
        assert_eq!(clock.index(), 1);
        assert!(clock.is_playing());
    }

    #[test]
    fn progress_fraction_handles_single_year() {
        let mut clock = clock();
        clock.seek_to_index(1);
        assert_eq!(clock.progress_fraction(), 0.5);

        let mut single = single_year();
        assert_eq!(single.progress_fraction(), 0.0);
        single.seek(1.0);
        assert_eq!(single.index(), 0);

        single.play();
        assert_eq!(single.tick(), TickOutcome::Finished(0));
    }
}
