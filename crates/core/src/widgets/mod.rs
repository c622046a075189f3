//! Props handed to the presentational widgets and the intents they emit.
//! The widgets hold no state of their own.

use serde::Serialize;

use crate::{ScenarioId, Threshold};

/// User action emitted by one of the widgets.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    ScenarioChange(ScenarioId),
    /// Timeline strip click, by index.
    TimelineChange(i64),
    Play,
    Pause,
    TogglePlay,
    Stop,
    Reset,
    /// Audio control scrub, in narration seconds.
    SeekAudio(f64),
    SetVolume(f32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioSelectorProps {
    pub scenarios: Vec<ScenarioId>,
    pub selected_scenario: ScenarioId,
    /// Switching is locked while playing.
    pub disabled: bool,
}

impl ScenarioSelectorProps {
    pub fn button_label(scenario: &str) -> String {
        format!("+{scenario}°C")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineProps {
    pub years: Vec<i32>,
    pub current_index: usize,
    pub disabled: bool,
}

impl TimelineProps {
    pub fn caption(&self) -> String {
        match self.years.get(self.current_index) {
            Some(year) => format!(
                "Year {year} • {} of {}",
                self.current_index + 1,
                self.years.len()
            ),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioControlProps {
    pub is_playing: bool,
    /// Narration length in seconds; zero until known or when muted.
    pub duration: f64,
    pub current_time: f64,
    /// Inline notice shown when the narration could not be loaded.
    pub notice: Option<String>,
}

impl AudioControlProps {
    pub fn stop_enabled(&self) -> bool {
        self.is_playing || self.current_time > 0.0
    }

    pub fn scrub_enabled(&self) -> bool {
        self.duration > 0.0
    }

    pub fn time_label(&self) -> String {
        format!(
            "{} / {}",
            format_clock(self.current_time),
            format_clock(self.duration)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartProps {
    pub data: Vec<f64>,
    pub years: Vec<i32>,
    pub current_index: usize,
    pub thresholds: Vec<Threshold>,
    pub scenario: ScenarioId,
    pub is_playing: bool,
}

/// Floating read-out of warming, level and year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountdownProps {
    pub temperature: f64,
    pub sea_level: f64,
    pub year: i32,
    pub visible: bool,
}

impl CountdownProps {
    pub fn temperature_label(&self) -> String {
        format!("+{:.1}°C", self.temperature)
    }

    pub fn sea_level_label(&self) -> String {
        format!("{:.2}m", self.sea_level)
    }
}

/// `m:ss`, truncating fractional seconds.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() {
        seconds.max(0.0).floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_clock_time() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(59.9), "0:59");
        assert_eq!(format_clock(61.0), "1:01");
        assert_eq!(format_clock(-3.0), "0:00");
        assert_eq!(format_clock(f64::NAN), "0:00");
    }

    #[test]
    fn timeline_caption_counts_from_one() {
        let props = TimelineProps {
            years: vec![2020, 2030, 2040],
            current_index: 1,
            disabled: false,
        };
        assert_eq!(props.caption(), "Year 2030 • 2 of 3");
    }

    #[test]
    fn audio_control_affordances() {
        let idle = AudioControlProps {
            is_playing: false,
            duration: 0.0,
            current_time: 0.0,
            notice: None,
        };
        assert!(!idle.stop_enabled());
        assert!(!idle.scrub_enabled());

        let paused = AudioControlProps {
            current_time: 75.0,
            duration: 120.0,
            ..idle
        };
        assert!(paused.stop_enabled());
        assert_eq!(paused.time_label(), "1:15 / 2:00");
    }

    #[test]
    fn labels() {
        assert_eq!(ScenarioSelectorProps::button_label("2.5"), "+2.5°C");
        let countdown = CountdownProps {
            temperature: 1.5,
            sea_level: 0.234,
            year: 2050,
            visible: true,
        };
        assert_eq!(countdown.temperature_label(), "+1.5°C");
        assert_eq!(countdown.sea_level_label(), "0.23m");
    }
}
