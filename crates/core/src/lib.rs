//! Core library for the sea level wave animation.
//!
//! A validated dataset of yearly sea level rise per warming scenario is
//! played back as an animated wave. The crate keeps a discrete time index,
//! an audio narration and a cosmetic wave ripple in step on a single
//! threaded event loop. Each module owns one piece of that: loading
//! ([`series`]), the index state machine ([`timeline`]), timers
//! ([`scheduler`]), narration ([`audio`]), chart geometry ([`render`]) and
//! the controller that wires them together ([`view`]).

pub mod audio;
pub mod config;
pub mod error;
pub mod render;
pub mod scheduler;
pub mod series;
pub mod timeline;
pub mod view;
pub mod widgets;

pub use audio::{AudioSync, AudioTransportState, ClockTransport, PlayEdge, Progress, Transport};
pub use config::{AppConfig, AudioConfig, PlaybackConfig, RenderConfig};
pub use error::{Result, SeaLevelError};
pub use render::{PhaseClock, WaveFrame, WaveRenderer, WaveScene};
pub use scheduler::{ManualClock, Scheduler, TimerEvent, TimerKind};
pub use series::{
    interpolate, list_scenarios, DataSource, FileSource, ScenarioId, SeriesDataset, SeriesStore,
    Threshold,
};
pub use timeline::{PlayState, PlaybackClock, PlaybackState, TickOutcome};
pub use view::ViewController;
pub use widgets::Intent;
