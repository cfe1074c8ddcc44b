//! chromatrack - color-target tracking pipeline
//!
//! Entry point for the demo binary: runs the full pipeline over a
//! synthetic frame source against a null output backend. Real capture
//! and device backends are wired in by embedding integrations.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chromatrack::backend::NullBackend;
use chromatrack::capture::{SyntheticScene, SyntheticSource};
use chromatrack::config::{Config, ConfigHandle, LoggingConfig};
use chromatrack::detect::{hsv_to_rgb, write_mask_png};
use chromatrack::input::ButtonStates;
use chromatrack::Pipeline;

/// Command-line arguments for chromatrack
#[derive(Parser, Debug)]
#[command(name = "chromatrack")]
#[command(version, about = "Color-target tracking pipeline", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, env = "CHROMATRACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// How long to run the demo pipeline, in seconds
    #[arg(short, long, default_value = "10")]
    pub duration: u64,

    /// Render one synthetic frame, write its classification mask as a
    /// PNG, and exit
    #[arg(long)]
    pub dump_mask: Option<PathBuf>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (config, config_load_error) = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        },
        None => (Config::default(), None),
    };

    let _log_guard = init_logging(&args, &config.logging)?;

    info!("chromatrack v{}", env!("CARGO_PKG_VERSION"));
    if let Some(e) = config_load_error {
        warn!("failed to load config: {e}, using defaults");
    }

    // Paint the demo scene with a target the configured detector can
    // actually see, parked off-center so corrections keep flowing.
    let mut scene = SyntheticScene::new(640, 360);
    let target_color = hsv_to_rgb(config.detection.target_color.center());
    scene.add_centered_rect(320 + 60, 180 + 15, 12, 28, target_color);

    if let Some(path) = &args.dump_mask {
        let frame = SyntheticSource::render(&scene, 0);
        write_mask_png(&frame, &config.detection.target_color, path)
            .context("failed to write mask image")?;
        info!(path = %path.display(), "classification mask written");
        return Ok(());
    }

    let handle = Arc::new(ConfigHandle::new(config).context("invalid configuration")?);
    let source = SyntheticSource::new(scene);
    let buttons = Arc::new(ButtonStates::new());

    info!(duration = args.duration, "starting demo pipeline");
    let pipeline = Pipeline::spawn(
        handle,
        Box::new(source),
        Box::new(NullBackend::new()),
        buttons,
    )?;

    std::thread::sleep(Duration::from_secs(args.duration));

    let queue_stats = pipeline.queue_stats();
    let dispatcher_stats = pipeline.dispatcher_stats();
    let tick_stats = pipeline.shutdown();

    info!(
        ticks = tick_stats.ticks,
        overruns = tick_stats.overruns,
        targets = tick_stats.targets_seen,
        moves = tick_stats.moves_emitted,
        enqueued = queue_stats.enqueued,
        dropped = queue_stats.dropped_oldest,
        forwarded = dispatcher_stats.forwarded,
        device_faults = dispatcher_stats.device_faults,
        "pipeline shut down"
    );

    Ok(())
}

fn init_logging(
    args: &Args,
    logging: &LoggingConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    // CLI verbosity wins; otherwise the config section decides.
    let log_level = match args.verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("chromatrack={log_level},warn")));

    if let Some(log_dir) = &logging.log_dir {
        let appender = tracing_appender::rolling::daily(log_dir, "chromatrack.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);

        match args.log_format.as_str() {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stdout))
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(writer)
                            .with_ansi(false),
                    )
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stdout))
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(writer)
                            .with_ansi(false),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(writer)
                            .with_ansi(false),
                    )
                    .init();
            }
        }
        Ok(Some(guard))
    } else {
        match args.log_format.as_str() {
            "json" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().json())
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer().compact())
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(tracing_subscriber::fmt::layer())
                    .init();
            }
        }
        Ok(None)
    }
}
