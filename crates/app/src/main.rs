use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use clap::{Args, Parser, Subcommand};
use sea_level_wave_core::{
    interpolate, AppConfig, ClockTransport, FileSource, Intent, Scheduler, SeriesDataset,
    SeriesStore, ViewController,
};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("error: {err}");
            if err.is_retryable() {
                eprintln!("the dataset could not be loaded; fix the source and run again");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> sea_level_wave_core::Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::from_json_file(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Scenarios { data } => run_scenarios(&data),
        Commands::Inspect {
            data,
            scenario,
            steps,
        } => run_inspect(&data, scenario.as_deref(), steps, &config),
        Commands::Render {
            data,
            scenario,
            position,
            output,
        } => run_render(&data, scenario.as_deref(), &position, output.as_ref(), config),
        Commands::Play {
            data,
            scenario,
            tick_ms,
            narration_secs,
            realtime,
        } => {
            let mut config = config;
            if let Some(tick_ms) = tick_ms {
                config.playback.tick_period_ms = tick_ms;
            }
            let config = config.validate()?;
            run_play(&data, scenario.as_deref(), narration_secs, realtime, config)
        }
    }
}

fn load_dataset(data: &DataArgs) -> sea_level_wave_core::Result<Arc<SeriesDataset>> {
    let mut store = SeriesStore::new(FileSource::new());
    store.load(&data.data.to_string_lossy())
}

fn run_scenarios(data: &DataArgs) -> sea_level_wave_core::Result<()> {
    let dataset = load_dataset(data)?;
    println!("{}", dataset.region);
    for id in dataset.scenario_ids() {
        let audio = dataset.audio_for(&id).unwrap_or("(no narration)");
        println!("  +{id}°C\t{audio}");
    }
    Ok(())
}

fn run_inspect(
    data: &DataArgs,
    scenario: Option<&str>,
    steps: usize,
    config: &AppConfig,
) -> sea_level_wave_core::Result<()> {
    let dataset = load_dataset(data)?;
    let scenario = scenario.unwrap_or(&config.playback.default_scenario);
    let values = dataset
        .series(scenario)
        .ok_or_else(|| sea_level_wave_core::SeaLevelError::UnknownScenario(scenario.to_string()))?;

    let years: Vec<f64> = dataset.timeline.iter().map(|year| f64::from(*year)).collect();
    let years = interpolate(&years, steps);
    let values = interpolate(values, steps);

    println!("{} +{scenario}°C", dataset.region);
    for (year, value) in years.iter().zip(&values) {
        println!("{year:>8.1}\t{value:.3}m");
    }
    Ok(())
}

fn run_render(
    data: &DataArgs,
    scenario: Option<&str>,
    position: &PositionArgs,
    output: Option<&PathBuf>,
    config: AppConfig,
) -> sea_level_wave_core::Result<()> {
    let dataset = load_dataset(data)?;
    let scheduler = Scheduler::new();
    let transport = ClockTransport::new(scheduler.clock());
    let mut view = ViewController::new(dataset, config, transport, scheduler)?;

    if let Some(scenario) = scenario {
        view.select_scenario(scenario)?;
    }
    match (position.index, position.fraction) {
        (Some(index), _) => view.seek_index(index),
        (None, Some(fraction)) => view.seek_fraction(fraction),
        (None, None) => {}
    }

    let svg = view.frame().to_svg();
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
            tracing::info!(?path, status = %view.status_line(), "wrote chart frame");
        }
        None => print!("{svg}"),
    }
    Ok(())
}

fn run_play(
    data: &DataArgs,
    scenario: Option<&str>,
    narration_secs: Option<f64>,
    realtime: bool,
    config: AppConfig,
) -> sea_level_wave_core::Result<()> {
    let dataset = load_dataset(data)?;
    let scheduler = Scheduler::new();
    let mut transport = ClockTransport::new(scheduler.clock());
    if let Some(seconds) = narration_secs {
        for path in dataset.audio_by_scenario.values() {
            transport.register(path.clone(), seconds);
        }
    }

    let mut view = ViewController::new(dataset, config, transport, scheduler)?;
    if let Some(scenario) = scenario {
        view.dispatch(Intent::ScenarioChange(scenario.to_string()))?;
    }
    if let Some(notice) = view.audio_notice() {
        tracing::warn!(notice, "continuing without narration");
    }

    tracing::info!(scenario = view.scenario(), realtime, "starting playback");
    view.dispatch(Intent::Play)?;
    println!("{}", view.status_line());

    let mut shown = view.index();
    while view.is_playing() {
        let now = view.scheduler().now_ms();
        let Some(deadline) = view.scheduler().next_deadline() else {
            break;
        };
        let wait = deadline.saturating_sub(now);
        if realtime && wait > 0 {
            std::thread::sleep(Duration::from_millis(wait));
        }
        view.advance(wait);

        if view.index() != shown {
            shown = view.index();
            tracing::debug!(
                index = shown,
                scrub = view.scrub_fraction(),
                elapsed = view.transport_state().elapsed_seconds,
                "advanced"
            );
            println!("{}", view.status_line());
        }
    }

    let audio = view.audio_control();
    tracing::info!(
        index = view.index(),
        narration = %audio.time_label(),
        "playback stopped"
    );
    view.unmount();
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Animated sea level rise per warming scenario", long_about = None)]
struct Cli {
    /// Optional JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct DataArgs {
    /// Path to the sea level dataset.
    #[arg(short, long)]
    data: PathBuf,
}

#[derive(Args, Debug)]
#[group(multiple = false)]
struct PositionArgs {
    /// Timeline index to draw.
    #[arg(long)]
    index: Option<i64>,
    /// Position along the timeline in [0, 1].
    #[arg(long)]
    fraction: Option<f64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the dataset's scenarios in numeric order.
    Scenarios {
        #[command(flatten)]
        data: DataArgs,
    },
    /// Print a scenario's yearly values.
    Inspect {
        #[command(flatten)]
        data: DataArgs,
        /// Scenario label, e.g. 2.5.
        #[arg(short, long)]
        scenario: Option<String>,
        /// Interpolation steps between neighbouring years.
        #[arg(long, default_value_t = 1)]
        steps: usize,
    },
    /// Draw one chart frame as SVG.
    Render {
        #[command(flatten)]
        data: DataArgs,
        #[arg(short, long)]
        scenario: Option<String>,
        #[command(flatten)]
        position: PositionArgs,
        /// Output file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Autoplay a scenario and print each year as it is reached.
    Play {
        #[command(flatten)]
        data: DataArgs,
        #[arg(short, long)]
        scenario: Option<String>,
        /// Autoplay cadence in milliseconds.
        #[arg(long)]
        tick_ms: Option<u64>,
        /// Length given to every narration asset; muted when omitted.
        #[arg(long)]
        narration_secs: Option<f64>,
        /// Pace the event loop against the wall clock.
        #[arg(long)]
        realtime: bool,
    },
}
