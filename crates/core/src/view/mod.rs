//! The controlling view: sole owner of the playback state.
//!
//! Autoplay, audio transport and the wave animation are three independent
//! clocks. The controller joins them through play edges going into
//! [`AudioSync`] and progress readings coming out of it. Neither side
//! writes the other's counters. Every intent and every timer callback ends
//! in a reconcile pass, which arms exactly the timers the
//! current state calls for.

use std::sync::Arc;

use crate::{
    audio::{AudioSync, AudioTransportState, PlayEdge, Progress, Transport},
    config::AppConfig,
    render::{PhaseClock, WaveFrame, WaveRenderer, WaveScene},
    scheduler::{Scheduler, TimerEvent, TimerId, TimerKind},
    timeline::{PlaybackClock, PlaybackState, TickOutcome},
    widgets::{
        AudioControlProps, ChartProps, CountdownProps, Intent, ScenarioSelectorProps,
        TimelineProps,
    },
    Result, SeaLevelError, SeriesDataset,
};

#[derive(Debug)]
pub struct ViewController<T> {
    dataset: Arc<SeriesDataset>,
    config: AppConfig,
    clock: PlaybackClock,
    audio: AudioSync<T>,
    scheduler: Scheduler,
    renderer: WaveRenderer,
    phase: PhaseClock,
    /// Bumped on every scenario switch; timers armed earlier are stale.
    epoch: u64,
    tick_timer: Option<TimerId>,
    poll_timer: Option<TimerId>,
    frame_timer: Option<TimerId>,
    audio_notice: Option<String>,
    last_progress: Option<Progress>,
}

impl<T: Transport> ViewController<T> {
    /// Mounts the view on `dataset`, stopped at the first year of the
    /// configured default scenario.
    pub fn new(
        dataset: Arc<SeriesDataset>,
        config: AppConfig,
        transport: T,
        scheduler: Scheduler,
    ) -> Result<Self> {
        let clock = PlaybackClock::new(
            Arc::clone(&dataset),
            &config.playback.default_scenario,
            config.playback.tick_period_ms,
        )?;
        let mut audio = AudioSync::new(transport);
        audio.set_volume(config.audio.volume_percent);

        let mut view = Self {
            renderer: WaveRenderer::new(config.render.clone()),
            dataset,
            config,
            clock,
            audio,
            scheduler,
            phase: PhaseClock::new(),
            epoch: 0,
            tick_timer: None,
            poll_timer: None,
            frame_timer: None,
            audio_notice: None,
            last_progress: None,
        };
        view.bind_audio();
        Ok(view)
    }

    pub fn dispatch(&mut self, intent: Intent) -> Result<()> {
        match intent {
            Intent::ScenarioChange(id) => return self.select_scenario(&id),
            Intent::TimelineChange(index) => self.seek_index(index),
            Intent::Play => self.play(),
            Intent::Pause => self.pause(),
            Intent::TogglePlay => self.toggle_play(),
            Intent::Stop => self.stop(),
            Intent::Reset => self.reset(),
            Intent::SeekAudio(seconds) => self.seek_audio(seconds),
            Intent::SetVolume(percent) => self.set_volume(percent),
        }
        Ok(())
    }

    /// Cancels everything tied to the current scenario before binding the
    /// new one, then lands stopped at index zero.
    pub fn select_scenario(&mut self, id: &str) -> Result<()> {
        if !self.dataset.has_scenario(id) {
            return Err(SeaLevelError::UnknownScenario(id.to_string()));
        }

        self.cancel_timers();
        self.epoch += 1;
        self.clock.set_scenario(id)?;
        self.last_progress = None;
        self.bind_audio();
        self.reconcile(false, PlayEdge::Stop);
        Ok(())
    }

    pub fn play(&mut self) {
        let was_playing = self.clock.is_playing();
        self.clock.play();
        self.reconcile(was_playing, PlayEdge::Pause);
    }

    pub fn pause(&mut self) {
        let was_playing = self.clock.is_playing();
        self.clock.pause();
        self.reconcile(was_playing, PlayEdge::Pause);
    }

    pub fn toggle_play(&mut self) {
        if self.clock.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Stops and rewinds both the index and the narration.
    pub fn stop(&mut self) {
        let was_playing = self.clock.is_playing();
        self.clock.stop();
        if !was_playing {
            self.audio.on_play_state_changed(PlayEdge::Stop);
        }
        self.reconcile(was_playing, PlayEdge::Stop);
    }

    pub fn reset(&mut self) {
        self.stop();
    }

    /// Scrubs to a fraction of the timeline and, when its length is known,
    /// the same fraction of the narration.
    pub fn seek_fraction(&mut self, fraction: f64) {
        self.clock.seek(fraction);
        let total = self.audio.state().total_seconds;
        if total > 0.0 {
            let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
            self.audio.seek(fraction * total);
        }
    }

    pub fn seek_index(&mut self, index: i64) {
        self.clock.seek_to_index(index);
    }

    /// Audio control scrub. Ignored until the narration length is known.
    pub fn seek_audio(&mut self, seconds: f64) {
        let total = self.audio.state().total_seconds;
        if total > 0.0 {
            self.seek_fraction(seconds / total);
        }
    }

    /// Changes the autoplay cadence, re-arming a running tick timer.
    pub fn set_tick_period(&mut self, tick_period_ms: u64) {
        self.clock.set_tick_period(tick_period_ms);
        if let Some(id) = self.tick_timer.take() {
            self.scheduler.cancel(id);
        }
        self.sync_timers();
    }

    pub fn set_volume(&mut self, percent: f32) {
        self.audio.set_volume(percent);
    }

    /// Runs the event loop forward by `ms`, firing due timers one at a time
    /// in deadline order. Returns the number of events delivered.
    pub fn advance(&mut self, ms: u64) -> usize {
        let target = self.scheduler.now_ms().saturating_add(ms);
        let mut delivered = 0;
        while let Some(due) = self.scheduler.next_deadline().filter(|due| *due <= target) {
            self.scheduler.set_time(due);
            while let Some(event) = self.scheduler.poll_due() {
                self.handle_event(event);
                delivered += 1;
            }
        }
        self.scheduler.set_time(target);
        delivered
    }

    /// Delivers one timer event. Events from timers that are no longer
    /// armed, or that were armed under an older epoch, are dropped.
    /// Returns whether the event was applied.
    pub fn handle_event(&mut self, event: TimerEvent) -> bool {
        match event.kind {
            TimerKind::Tick => {
                if event.epoch != self.epoch || self.tick_timer != Some(event.id) {
                    tracing::debug!(epoch = event.epoch, "discarding stale tick");
                    return false;
                }
                let was_playing = self.clock.is_playing();
                if let TickOutcome::Finished(index) = self.clock.tick() {
                    tracing::debug!(index, "autoplay reached the last year");
                }
                self.reconcile(was_playing, PlayEdge::Pause);
                true
            }
            TimerKind::AudioPoll => {
                if self.poll_timer != Some(event.id) {
                    tracing::debug!("discarding stale audio poll");
                    return false;
                }
                let Some(progress) = self.audio.report_progress(event.epoch) else {
                    tracing::debug!(generation = event.epoch, "discarding stale audio poll");
                    return false;
                };
                self.last_progress = Some(progress);
                if progress.finished {
                    let was_playing = self.clock.is_playing();
                    self.clock.pause();
                    self.reconcile(was_playing, PlayEdge::Pause);
                }
                true
            }
            TimerKind::Frame => {
                if event.epoch != self.epoch || self.frame_timer != Some(event.id) {
                    return false;
                }
                self.phase.on_frame(event.at_ms);
                true
            }
        }
    }

    /// Tears down every timer and pauses the narration.
    pub fn unmount(&mut self) {
        let was_playing = self.clock.is_playing();
        self.clock.pause();
        if was_playing {
            self.audio.on_play_state_changed(PlayEdge::Pause);
        }
        self.cancel_timers();
    }

    fn bind_audio(&mut self) {
        let scenario = self.clock.scenario().to_string();
        let audio = self.dataset.audio_for(&scenario);
        self.audio_notice = match self.audio.on_scenario_changed(&scenario, audio) {
            Ok(()) => None,
            Err(err) => Some(err.to_string()),
        };
    }

    /// Forwards a play edge to the transport, then brings the timer set in
    /// line with the new state. `off_edge` says whether leaving playback
    /// was a pause or a stop.
    fn reconcile(&mut self, was_playing: bool, off_edge: PlayEdge) {
        match (was_playing, self.clock.is_playing()) {
            (false, true) => self.audio.on_play_state_changed(PlayEdge::Play),
            (true, false) => self.audio.on_play_state_changed(off_edge),
            _ => {}
        }
        self.sync_timers();
    }

    fn sync_timers(&mut self) {
        let playing = self.clock.is_playing();

        match (playing, self.tick_timer) {
            (true, None) => {
                let period = self.clock.tick_period_ms();
                let id = self.scheduler.schedule_repeating(TimerKind::Tick, period, self.epoch);
                tracing::debug!(period, epoch = self.epoch, "armed autoplay timer");
                self.tick_timer = Some(id);
            }
            (false, Some(id)) => {
                self.scheduler.cancel(id);
                self.tick_timer = None;
                tracing::debug!("cancelled autoplay timer");
            }
            _ => {}
        }

        match (self.audio.state().transport_playing, self.poll_timer) {
            (true, None) => {
                let id = self.scheduler.schedule_repeating(
                    TimerKind::AudioPoll,
                    self.config.audio.poll_interval_ms,
                    self.audio.generation(),
                );
                self.poll_timer = Some(id);
            }
            (false, Some(id)) => {
                self.scheduler.cancel(id);
                self.poll_timer = None;
            }
            _ => {}
        }

        match (playing, self.frame_timer) {
            (true, None) => {
                self.phase.start(self.scheduler.now_ms());
                let id = self.scheduler.schedule_repeating(
                    TimerKind::Frame,
                    self.config.render.frame_interval_ms,
                    self.epoch,
                );
                self.frame_timer = Some(id);
            }
            (false, Some(id)) => {
                self.scheduler.cancel(id);
                self.frame_timer = None;
                self.phase.stop();
            }
            _ => {}
        }
    }

    fn cancel_timers(&mut self) {
        for id in [
            self.tick_timer.take(),
            self.poll_timer.take(),
            self.frame_timer.take(),
        ]
        .into_iter()
        .flatten()
        {
            self.scheduler.cancel(id);
        }
        self.phase.stop();
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.clock.snapshot()
    }

    pub fn transport_state(&self) -> &AudioTransportState {
        self.audio.state()
    }

    pub fn last_progress(&self) -> Option<Progress> {
        self.last_progress
    }

    pub fn scenario(&self) -> &str {
        self.clock.scenario()
    }

    pub fn index(&self) -> usize {
        self.clock.index()
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn current_value(&self) -> f64 {
        self.clock.current_value()
    }

    pub fn current_year(&self) -> Option<i32> {
        self.clock.current_year()
    }

    pub fn audio_notice(&self) -> Option<&str> {
        self.audio_notice.as_deref()
    }

    /// Scrub bar position: narration progress while it is audibly playing,
    /// the index's progress otherwise.
    pub fn scrub_fraction(&self) -> f64 {
        match self.audio.progress_fraction() {
            Some(fraction) if self.audio.state().transport_playing => fraction,
            _ => self.clock.progress_fraction(),
        }
    }

    pub fn status_line(&self) -> String {
        let year = self
            .current_year()
            .map(|year| year.to_string())
            .unwrap_or_default();
        format!("{year} — {:.2}m rise", self.current_value())
    }

    pub fn frame(&self) -> WaveFrame {
        let scenario = self.clock.scenario();
        self.renderer.render(&WaveScene {
            value: self.current_value(),
            series_peak: self.dataset.peak(scenario),
            thresholds: &self.dataset.thresholds,
            year: self.current_year(),
            playing: self.clock.is_playing(),
            phase_ms: self.phase.phase_ms(),
        })
    }

    pub fn scenario_selector(&self) -> ScenarioSelectorProps {
        ScenarioSelectorProps {
            scenarios: self.dataset.scenario_ids(),
            selected_scenario: self.clock.scenario().to_string(),
            disabled: self.clock.is_playing(),
        }
    }

    pub fn timeline(&self) -> TimelineProps {
        TimelineProps {
            years: self.dataset.timeline.clone(),
            current_index: self.clock.index(),
            disabled: self.clock.is_playing(),
        }
    }

    pub fn audio_control(&self) -> AudioControlProps {
        let state = self.audio.state();
        AudioControlProps {
            is_playing: self.clock.is_playing(),
            duration: state.total_seconds,
            current_time: state.elapsed_seconds,
            notice: self.audio_notice.clone(),
        }
    }

    pub fn chart(&self) -> ChartProps {
        let scenario = self.clock.scenario();
        ChartProps {
            data: self.dataset.series(scenario).unwrap_or_default().to_vec(),
            years: self.dataset.timeline.clone(),
            current_index: self.clock.index(),
            thresholds: self.dataset.thresholds.clone(),
            scenario: scenario.to_string(),
            is_playing: self.clock.is_playing(),
        }
    }

    pub fn countdown(&self) -> CountdownProps {
        CountdownProps {
            temperature: self.clock.scenario().trim().parse().unwrap_or(0.0),
            sea_level: self.current_value(),
            year: self.current_year().unwrap_or_default(),
            visible: self.clock.is_playing(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::ClockTransport, series::fixtures, timeline::PlayState};

    const TICK: u64 = 1000;

    fn view_with(config: AppConfig, narration: &[(&str, f64)]) -> ViewController<ClockTransport> {
        let scheduler = Scheduler::new();
        let mut transport = ClockTransport::new(scheduler.clock());
        for (path, seconds) in narration {
            transport.register(*path, *seconds);
        }
        ViewController::new(Arc::new(fixtures::dataset()), config, transport, scheduler).unwrap()
    }

    fn view() -> ViewController<ClockTransport> {
        view_with(
            AppConfig::default(),
            &[("/sounds/1.5.mp3", 30.0), ("/sounds/5.mp3", 2.5)],
        )
    }

    fn armed(view: &ViewController<ClockTransport>) -> usize {
        view.scheduler().armed()
    }

    #[test]
    fn mounts_stopped_on_default_scenario() {
        let view = view();

        assert_eq!(view.playback_state().selected_scenario, "1.5");
        assert_eq!(view.index(), 0);
        assert!(!view.is_playing());
        assert_eq!(view.transport_state().total_seconds, 30.0);
        assert_eq!(armed(&view), 0);
        assert_eq!(view.status_line(), "2020 — 0.10m rise");
    }

    #[test]
    fn autoplay_advances_once_per_period_and_stops_at_end() {
        let mut view = view();
        view.play();
        assert_eq!(armed(&view), 3);

        view.advance(TICK - 1);
        assert_eq!(view.index(), 0);
        view.advance(1);
        assert_eq!(view.index(), 1);
        view.advance(TICK);
        assert_eq!(view.index(), 2);
        assert!(view.is_playing());

        view.advance(TICK);
        assert_eq!(view.index(), 2);
        assert!(!view.playback_state().playing);
        assert_eq!(armed(&view), 0);
        assert!(!view.transport_state().transport_playing);

        view.advance(10 * TICK);
        assert_eq!(view.index(), 2);
    }

    #[test]
    fn stale_tick_cannot_touch_new_scenario() {
        let mut view = view();
        view.play();

        view.scheduler_mut().set_time(TICK);
        let stale = std::iter::from_fn(|| view.scheduler_mut().poll_due())
            .find(|event| event.kind == TimerKind::Tick)
            .unwrap();

        view.select_scenario("5").unwrap();
        assert!(!view.handle_event(stale));
        assert_eq!(view.index(), 0);

        view.play();
        assert!(!view.handle_event(stale));
        assert_eq!(view.index(), 0);
    }

    #[test]
    fn scenario_switch_resets_and_rebinds() {
        let mut view = view();
        view.play();
        view.advance(TICK);
        assert_eq!(view.index(), 1);

        view.select_scenario("5").unwrap();
        assert_eq!(view.index(), 0);
        assert!(!view.is_playing());
        assert_eq!(armed(&view), 0);
        assert_eq!(view.transport_state().loaded_scenario.as_deref(), Some("5"));
        assert_eq!(view.transport_state().elapsed_seconds, 0.0);
        assert_eq!(view.epoch(), 1);

        assert!(view.select_scenario("9").is_err());
        assert_eq!(view.scenario(), "5");
    }

    #[test]
    fn pause_keeps_narration_position_and_stop_rewinds() {
        let mut view = view();
        view.play();
        view.advance(1500);

        view.pause();
        assert_eq!(view.index(), 1);
        assert_eq!(view.transport_state().elapsed_seconds, 1.5);
        assert_eq!(armed(&view), 0);

        view.advance(5000);
        assert_eq!(view.transport_state().elapsed_seconds, 1.5);

        view.stop();
        assert_eq!(view.index(), 0);
        assert_eq!(view.transport_state().elapsed_seconds, 0.0);
    }

    #[test]
    fn narration_end_pauses_in_place() {
        let mut config = AppConfig::default();
        config.playback.default_scenario = "5".into();
        config.playback.tick_period_ms = 2000;
        let mut view = view_with(config, &[("/sounds/5.mp3", 2.5)]);

        view.play();
        view.advance(2600);

        assert!(!view.is_playing());
        assert_eq!(view.index(), 1);
        assert!(view.last_progress().unwrap().finished);
        assert_eq!(view.audio_control().current_time, 2.5);
        assert_eq!(armed(&view), 0);
    }

    #[test]
    fn scrub_follows_narration_while_playing() {
        let mut view = view();
        view.play();
        view.advance(2400);

        assert!((view.scrub_fraction() - 0.08).abs() < 1e-9);
        assert_eq!(view.index(), 2);

        view.pause();
        assert_eq!(view.scrub_fraction(), 1.0);
    }

    #[test]
    fn missing_narration_does_not_block_playback() {
        let mut view = view();
        view.select_scenario("2.5").unwrap();
        assert!(view.audio_notice().is_none());

        view.play();
        assert!(!view.transport_state().transport_playing);
        assert_eq!(armed(&view), 2);

        view.advance(TICK);
        assert_eq!(view.index(), 1);
        assert_eq!(view.current_value(), 0.3);
    }

    #[test]
    fn unloadable_narration_surfaces_notice() {
        let mut view = view_with(AppConfig::default(), &[("/sounds/1.5.mp3", 30.0)]);
        view.select_scenario("5").unwrap();

        assert_eq!(view.audio_notice(), Some("audio unavailable: load failed"));
        assert!(view.audio_control().notice.is_some());

        view.play();
        view.advance(TICK);
        assert_eq!(view.index(), 1);

        view.select_scenario("1.5").unwrap();
        assert!(view.audio_notice().is_none());
    }

    #[test]
    fn seek_moves_index_and_narration() {
        let mut view = view();

        view.seek_fraction(0.5);
        assert_eq!(view.index(), 1);
        assert_eq!(view.current_value(), 0.2);
        assert_eq!(view.transport_state().elapsed_seconds, 15.0);
        assert!(!view.is_playing());

        view.seek_audio(30.0);
        assert_eq!(view.index(), 2);

        view.seek_index(-1);
        assert_eq!(view.index(), 0);
    }

    #[test]
    fn audio_scrub_ignored_without_narration_length() {
        let mut view = view();
        view.select_scenario("2.5").unwrap();
        view.seek_index(1);

        view.seek_audio(10.0);
        assert_eq!(view.index(), 1);
        assert_eq!(view.transport_state().elapsed_seconds, 0.0);

        let mut view = view_with(AppConfig::default(), &[("/sounds/1.5.mp3", 30.0)]);
        view.select_scenario("5").unwrap();
        assert!(view.audio_notice().is_some());
        view.seek_index(1);

        view.dispatch(Intent::SeekAudio(10.0)).unwrap();
        assert_eq!(view.index(), 1);
        assert!(!view.audio_control().scrub_enabled());
    }

    #[test]
    fn play_from_end_rewinds() {
        let mut view = view();
        view.seek_index(2);

        view.play();
        assert_eq!(view.index(), 0);
        assert!(view.playback_state().playing);
    }

    #[test]
    fn repeated_intents_are_idempotent() {
        let mut view = view();
        view.play();
        view.play();
        assert_eq!(armed(&view), 3);

        view.pause();
        view.pause();
        assert_eq!(armed(&view), 0);

        view.stop();
        view.stop();
        assert_eq!(view.index(), 0);
    }

    #[test]
    fn tick_period_change_rearms_timer() {
        let mut view = view();
        view.play();
        view.advance(400);

        view.set_tick_period(250);
        view.advance(250);
        assert_eq!(view.index(), 1);
        assert_eq!(view.playback_state().tick_period_ms, 250);
    }

    #[test]
    fn wave_animates_only_while_playing() {
        let mut view = view();
        let still = view.frame();

        view.play();
        view.advance(48);
        let moving = view.frame();
        assert_ne!(still.wave, moving.wave);

        view.pause();
        assert_eq!(view.frame(), still);
    }

    #[test]
    fn dispatches_widget_intents() {
        let mut view = view();

        view.dispatch(Intent::TimelineChange(1)).unwrap();
        assert_eq!(view.timeline().caption(), "Year 2030 • 2 of 3");

        view.dispatch(Intent::TogglePlay).unwrap();
        assert!(view.scenario_selector().disabled);
        assert!(view.countdown().visible);
        assert_eq!(view.countdown().temperature, 1.5);

        view.dispatch(Intent::Reset).unwrap();
        assert_eq!(view.index(), 0);
        assert!(!view.is_playing());

        view.dispatch(Intent::ScenarioChange("2.5".into())).unwrap();
        assert_eq!(view.chart().data, vec![0.15, 0.3, 0.5]);
        assert_eq!(view.scenario_selector().scenarios, vec!["1.5", "2.5", "5"]);

        assert!(view.dispatch(Intent::ScenarioChange("nope".into())).is_err());
    }

    #[test]
    fn unmount_cancels_everything() {
        let mut view = view();
        view.play();
        view.unmount();

        assert_eq!(armed(&view), 0);
        assert!(!view.playback_state().playing);
        assert_eq!(view.clock.state(), PlayState::Stopped);
        assert_eq!(view.advance(10 * TICK), 0);
    }
}
