use std::fs::File;
use std::path::PathBuf;

use clap::Parser;

use cadence::app::{self, AppConfig, EngineKind};
use cadence::config::EngineSettings;
use cadence::error::CadenceResult;
use cadence::host::DEFAULT_REFRESH_HZ;

/// Log file used while the dashboard owns the terminal.
const DASHBOARD_LOG: &str = "cadence.log";

/// Cadence: frame-paced animation loop with adaptive quality
///
/// Runs a synthetic point-cloud workload through one of four engines and
/// reports how well each holds its target frame rate. Headless by default;
/// `--dashboard` shows live FPS and quality, `--simulate` runs a
/// deterministic virtual-clock pass and prints a JSON report.
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (JSON). Missing files fall back to defaults
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Engine variant to run
    #[arg(short, long, value_enum, default_value_t = EngineKind::Adaptive)]
    engine: EngineKind,

    /// Target frame rate, overrides the settings file
    #[arg(long, value_name = "FPS")]
    frame_rate: Option<f64>,

    /// Refresh rate of the simulated display
    #[arg(long, value_name = "HZ", default_value_t = DEFAULT_REFRESH_HZ)]
    refresh_hz: f64,

    /// Number of points in the demo scene
    #[arg(long, value_name = "N")]
    points: Option<usize>,

    /// Seed for the demo's random load spikes
    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    /// Multiplier on the demo's render cost
    #[arg(long, value_name = "FACTOR")]
    load: Option<f64>,

    /// Reload the animation section when the settings file changes
    #[arg(long)]
    watch: bool,

    /// Show the live terminal dashboard
    #[arg(long, conflicts_with = "simulate")]
    dashboard: bool,

    /// Run FRAMES host ticks on a virtual clock and print a JSON report
    #[arg(long, value_name = "FRAMES")]
    simulate: Option<u64>,

    /// Print the default settings file and exit
    #[arg(long)]
    write_default_config: bool,
}

impl Cli {
    fn settings(&self) -> CadenceResult<EngineSettings> {
        let mut settings = match &self.config {
            Some(path) => EngineSettings::load_or_default(path)?,
            None => EngineSettings::default(),
        };

        if let Some(frame_rate) = self.frame_rate {
            settings.animation.frame_rate = frame_rate;
        }
        if let Some(points) = self.points {
            settings.demo.points = points;
        }
        if let Some(seed) = self.seed {
            settings.demo.seed = Some(seed);
        }
        if let Some(load) = self.load {
            settings.demo.load_factor = load;
        }

        settings.validate()?;
        Ok(settings)
    }
}

fn init_logging(dashboard: bool) {
    let env = env_logger::Env::default().default_filter_or("info");
    let mut builder = env_logger::Builder::from_env(env);
    if dashboard {
        match File::create(DASHBOARD_LOG) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(_) => {
                builder.filter_level(log::LevelFilter::Off);
            }
        }
    }
    builder.init();
}

async fn run(cli: Cli) -> CadenceResult<()> {
    if cli.write_default_config {
        println!("{}", EngineSettings::default().to_json()?);
        return Ok(());
    }

    let settings = cli.settings()?;
    let config = AppConfig {
        settings,
        engine: cli.engine,
        refresh_hz: cli.refresh_hz,
        watch: cli.watch,
        config_path: cli.config,
    };

    if let Some(frames) = cli.simulate {
        let report = app::simulate(&config, frames);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if cli.dashboard {
        let report = app::run_dashboard(&config).await?;
        println!(
            "{}: {} frames, {:.1} fps average",
            report.engine.label(),
            report.stats.frame_count,
            report.stats.average_fps
        );
    } else {
        app::run_headless(&config).await?;
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.dashboard);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
