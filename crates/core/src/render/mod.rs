//! Stateless chart geometry for the sea level wave.
//!
//! [`WaveRenderer::render`] maps the current value, thresholds and animation
//! phase onto drawable primitives. The only state in this module is the
//! cosmetic [`PhaseClock`], which never feeds back into playback.

use std::fmt::Write as _;

use serde::Serialize;

use crate::{config::RenderConfig, Threshold};

/// Inputs for one chart frame.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveScene<'a> {
    pub value: f64,
    /// Highest value of the displayed series; keeps the scale steady while
    /// the index moves.
    pub series_peak: f64,
    pub thresholds: &'a [Threshold],
    pub year: Option<i32>,
    pub playing: bool,
    /// Milliseconds of free-running animation time. Ignored when paused.
    pub phase_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceLine {
    pub y: f64,
    pub value: f64,
    pub label: String,
    /// Text drawn at the end of the line, e.g. `"0.5m"`.
    pub caption: String,
}

/// SVG-style path command in chart coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum PathCommand {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    CubicTo(f64, f64, f64, f64, f64, f64),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WavePath {
    pub commands: Vec<PathCommand>,
}

impl WavePath {
    /// Path data in SVG `d` attribute syntax.
    pub fn to_svg_d(&self) -> String {
        let mut d = String::new();
        for command in &self.commands {
            let _ = match *command {
                PathCommand::MoveTo(x, y) => write!(d, "M{},{}", num(x), num(y)),
                PathCommand::LineTo(x, y) => write!(d, "L{},{}", num(x), num(y)),
                PathCommand::CubicTo(x1, y1, x2, y2, x, y) => write!(
                    d,
                    "C{},{},{},{},{},{}",
                    num(x1),
                    num(y1),
                    num(x2),
                    num(y2),
                    num(x),
                    num(y)
                ),
            };
        }
        d
    }
}

/// Everything needed to draw one frame, in outer (margin-inclusive) pixels
/// for `width`/`height` and inner chart coordinates for the rest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveFrame {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
    pub plot: Rect,
    /// Y of the water surface in chart coordinates.
    pub surface_y: f64,
    pub ocean: Option<Rect>,
    pub wave: Option<WavePath>,
    pub reference_lines: Vec<ReferenceLine>,
    pub value_label: String,
    pub year_label: Option<String>,
}

impl WaveFrame {
    /// Serialises the frame as a standalone SVG document.
    pub fn to_svg(&self) -> String {
        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = num(self.width),
            h = num(self.height)
        );
        let _ = writeln!(
            svg,
            r#"  <g transform="translate({m},{m})">"#,
            m = num(self.margin)
        );
        let _ = writeln!(
            svg,
            r##"    <rect x="0" y="0" width="{}" height="{}" rx="12" fill="#f8fafc" stroke="#e2e8f0"/>"##,
            num(self.plot.width),
            num(self.plot.height)
        );
        for line in &self.reference_lines {
            let _ = writeln!(
                svg,
                r##"    <line x1="0" x2="{x}" y1="{y}" y2="{y}" stroke="#94a3b8" stroke-width="0.5" stroke-dasharray="2,4" opacity="0.4"/>"##,
                x = num(self.plot.width),
                y = num(line.y)
            );
            let _ = writeln!(
                svg,
                r##"    <text x="{}" y="{}" text-anchor="end" font-size="10px" fill="#64748b">{}</text>"##,
                num(self.plot.width - 8.0),
                num(line.y - 4.0),
                escape(&line.caption)
            );
        }
        if let Some(ocean) = &self.ocean {
            let _ = writeln!(
                svg,
                r##"    <rect x="{}" y="{}" width="{}" height="{}" fill="#1e40af" opacity="0.9"/>"##,
                num(ocean.x),
                num(ocean.y),
                num(ocean.width),
                num(ocean.height)
            );
        }
        if let Some(wave) = &self.wave {
            let _ = writeln!(
                svg,
                r##"    <path d="{}" fill="none" stroke="#60a5fa" stroke-width="2" opacity="0.8"/>"##,
                wave.to_svg_d()
            );
        }
        let _ = writeln!(
            svg,
            r##"    <text x="12" y="20" font-size="14px" font-weight="500" fill="#334155">{}</text>"##,
            escape(&self.value_label)
        );
        if let Some(year) = &self.year_label {
            let _ = writeln!(
                svg,
                r##"    <text x="12" y="36" font-size="12px" fill="#64748b">{}</text>"##,
                escape(year)
            );
        }
        svg.push_str("  </g>\n</svg>\n");
        svg
    }
}

/// Maps chart state onto geometry using fixed dimensions.
#[derive(Debug, Clone, Default)]
pub struct WaveRenderer {
    config: RenderConfig,
}

impl WaveRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn render(&self, scene: &WaveScene<'_>) -> WaveFrame {
        let config = &self.config;
        let inner_width = (config.width - 2.0 * config.margin).max(0.0);
        let inner_height = (config.height - 2.0 * config.margin).max(0.0);

        let max_level = scene
            .thresholds
            .iter()
            .map(|threshold| threshold.value)
            .fold(scene.series_peak.max(scene.value), f64::max);
        let scale = LinearScale::new(max_level * config.headroom, inner_height);

        let reference_lines = scene
            .thresholds
            .iter()
            .filter_map(|threshold| {
                let y = scale.y(threshold.value);
                (0.0..=inner_height).contains(&y).then(|| ReferenceLine {
                    y,
                    value: threshold.value,
                    label: threshold.label.clone(),
                    caption: format!("{}m", threshold.value),
                })
            })
            .collect();

        let surface_y = scale.y(scene.value.max(0.0));
        let ocean_height = inner_height - surface_y;
        let (ocean, wave) = if ocean_height > 0.0 {
            let phase = if scene.playing { scene.phase_ms } else { 0.0 };
            (
                Some(Rect {
                    x: 0.0,
                    y: surface_y,
                    width: inner_width,
                    height: ocean_height,
                }),
                Some(self.wave_path(inner_width, surface_y, phase)),
            )
        } else {
            (None, None)
        };

        WaveFrame {
            width: config.width,
            height: config.height,
            margin: config.margin,
            plot: Rect {
                x: 0.0,
                y: 0.0,
                width: inner_width,
                height: inner_height,
            },
            surface_y,
            ocean,
            wave,
            reference_lines,
            value_label: format!("{:.2}m", scene.value),
            year_label: scene.year.map(|year| year.to_string()),
        }
    }

    /// Two stacked sines sampled across the width, smoothed into a basis
    /// spline.
    fn wave_path(&self, width: f64, base_y: f64, phase_ms: f64) -> WavePath {
        let config = &self.config;
        let count = config.wave_points.max(1);
        let points: Vec<(f64, f64)> = (0..=count)
            .map(|i| {
                let x = i as f64 / count as f64 * width;
                let primary = (x * config.frequency + phase_ms * 0.002).sin() * config.amplitude;
                let secondary = (x * config.frequency * 1.8 + phase_ms * 0.0015).sin()
                    * config.amplitude
                    * 0.3;
                (x, base_y + primary + secondary)
            })
            .collect();
        basis_curve(&points)
    }
}

#[derive(Debug, Clone, Copy)]
struct LinearScale {
    domain_max: f64,
    range_max: f64,
}

impl LinearScale {
    fn new(domain_max: f64, range_max: f64) -> Self {
        Self {
            domain_max,
            range_max,
        }
    }

    /// Zero sits at the bottom of the chart.
    fn y(&self, value: f64) -> f64 {
        if self.domain_max <= 0.0 {
            return self.range_max;
        }
        self.range_max - value / self.domain_max * self.range_max
    }
}

/// Uniform cubic B-spline through the control points, emitted as cubic
/// Bézier segments. The curve starts and ends on the first and last point.
pub fn basis_curve(points: &[(f64, f64)]) -> WavePath {
    let mut commands = Vec::with_capacity(points.len() + 2);
    let Some(&(first_x, first_y)) = points.first() else {
        return WavePath { commands };
    };
    commands.push(PathCommand::MoveTo(first_x, first_y));

    match points.len() {
        1 => {}
        2 => {
            let (x, y) = points[1];
            commands.push(PathCommand::LineTo(x, y));
        }
        _ => {
            let (x0, y0) = points[0];
            let (x1, y1) = points[1];
            commands.push(PathCommand::LineTo((5.0 * x0 + x1) / 6.0, (5.0 * y0 + y1) / 6.0));

            let mut prev = points[0];
            let mut current = points[1];
            for &next in &points[2..] {
                commands.push(bezier(prev, current, next));
                prev = current;
                current = next;
            }
            commands.push(bezier(prev, current, current));
            commands.push(PathCommand::LineTo(current.0, current.1));
        }
    }

    WavePath { commands }
}

fn bezier((x0, y0): (f64, f64), (x1, y1): (f64, f64), (x, y): (f64, f64)) -> PathCommand {
    PathCommand::CubicTo(
        (2.0 * x0 + x1) / 3.0,
        (2.0 * y0 + y1) / 3.0,
        (x0 + 2.0 * x1) / 3.0,
        (y0 + 2.0 * y1) / 3.0,
        (x0 + 4.0 * x1 + x) / 6.0,
        (y0 + 4.0 * y1 + y) / 6.0,
    )
}

/// Free-running animation time for the wave ripple. Runs only while
/// playback does and restarts from zero each time it is started.
#[derive(Debug, Clone, Default)]
pub struct PhaseClock {
    started_at_ms: Option<u64>,
    phase_ms: f64,
}

impl PhaseClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, now_ms: u64) {
        if self.started_at_ms.is_none() {
            self.started_at_ms = Some(now_ms);
            self.phase_ms = 0.0;
        }
    }

    /// Called once per display frame.
    pub fn on_frame(&mut self, now_ms: u64) -> f64 {
        if let Some(started) = self.started_at_ms {
            self.phase_ms = now_ms.saturating_sub(started) as f64;
        }
        self.phase_ms
    }

    pub fn stop(&mut self) {
        self.started_at_ms = None;
        self.phase_ms = 0.0;
    }

    pub fn is_running(&self) -> bool {
        self.started_at_ms.is_some()
    }

    pub fn phase_ms(&self) -> f64 {
        self.phase_ms
    }
}

fn num(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        rounded.to_string()
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
