//! marker-telemetry CLI: replay recorded frames through the pipeline and
//! stream marker poses to a paired NXT brick.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use marker_telemetry::bluetooth::{
    AddressSelector, BluetoothLink, BluetoothSession, ConsoleSelector, DeviceInfo,
    DeviceSelector, LoopbackLink, RfcommLink, Selection,
};
use marker_telemetry::core::PatternCatalog;
use marker_telemetry::{
    init_logging, JsonLinesSink, MarkerPipeline, PipelineConfig, RecordedFrame, ReplayDetector,
    StaticWorldTransforms,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

type Session = BluetoothSession<Box<dyn BluetoothLink + Send>>;

const DRY_RUN_ADDRESS: &str = "00:00:00:00:00:00";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

#[derive(Parser)]
#[command(name = "marker-telemetry")]
#[command(about = "Track square markers in depth-camera frames and stream their world poses over Bluetooth")]
#[command(version)]
struct Cli {
    /// Node configuration (JSON). Built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Recorded frames with their detections, one JSON object per line.
    #[arg(long)]
    frames: PathBuf,

    /// Sensor mounts in the world frame (JSON map of frame -> translation/rpy).
    #[arg(long)]
    world: Option<PathBuf>,

    /// Directory scanned for rfcomm device nodes.
    #[arg(long, default_value = "/dev")]
    device_dir: PathBuf,

    /// Pair with an in-memory loopback device instead of a radio link.
    #[arg(long)]
    dry_run: bool,

    /// Keep processing without telemetry when pairing fails.
    #[arg(long)]
    allow_offline: bool,

    /// Write visualization outputs (marker lists, transforms, debug cubes) as JSON lines.
    #[arg(long)]
    emit: Option<PathBuf>,

    /// Log level; without it `MARKER_TELEMETRY_LOG` applies, else info.
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.map(Into::into));

    let config = match &cli.config {
        Some(path) => PipelineConfig::load_json(path)?,
        None => PipelineConfig::default(),
    };
    config.log_summary();

    let catalog = PatternCatalog::load(&config.pattern_catalog_path, &config.pattern_data_dir)?;
    info!("{} pattern(s) loaded", catalog.len());

    let world = match &cli.world {
        Some(path) => StaticWorldTransforms::load_json(path)?,
        None => StaticWorldTransforms::new(),
    };

    let detector = ReplayDetector::new();
    let feed = detector.feed();
    let mut pipeline = MarkerPipeline::new(config.clone(), catalog, detector).with_world(world);

    if config.publish_to_telemetry_link {
        match pair(&cli, &config) {
            Ok(session) => pipeline = pipeline.with_telemetry(session),
            Err(err) if cli.allow_offline => {
                warn!("continuing without telemetry: {err}");
            }
            Err(err) => {
                error!("pairing failed: {err}");
                return Err(err);
            }
        }
    }

    if let Some(path) = &cli.emit {
        let sink = JsonLinesSink::new(BufWriter::new(File::create(path)?));
        pipeline = pipeline.with_visualization(sink);
    }

    let reader = BufReader::new(File::open(&cli.frames)?);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut processed = 0usize;
    let mut dropped = 0usize;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let recorded: RecordedFrame = match serde_json::from_str(&line) {
            Ok(recorded) => recorded,
            Err(err) => {
                error!("{}:{}: {err}", cli.frames.display(), lineno + 1);
                dropped += 1;
                continue;
            }
        };
        feed.push(recorded.detections);
        match pipeline.process(&recorded.frame) {
            Ok(report) => {
                processed += 1;
                for message in &report.telemetry {
                    writeln!(out, "{message}")?;
                }
            }
            Err(_) => {
                // Already logged. The frame never reached the detector.
                feed.clear();
                dropped += 1;
            }
        }
    }
    out.flush()?;
    info!("{processed} frame(s) processed, {dropped} dropped");
    Ok(())
}

/// Discover, select and connect the telemetry link.
fn pair(cli: &Cli, config: &PipelineConfig) -> CliResult<Session> {
    let link: Box<dyn BluetoothLink + Send> = if cli.dry_run {
        let address = config
            .preferred_device
            .clone()
            .unwrap_or_else(|| DRY_RUN_ADDRESS.to_string());
        Box::new(LoopbackLink::new(vec![DeviceInfo::new(address, "loopback")]))
    } else {
        Box::new(RfcommLink::new(cli.device_dir.clone()))
    };

    let mut selector: Box<dyn DeviceSelector> = match (&config.preferred_device, cli.dry_run) {
        (Some(address), _) => Box::new(AddressSelector::new(address.clone(), config.max_scans)),
        (None, true) => Box::new(|candidates: &[DeviceInfo]| {
            if candidates.is_empty() {
                Selection::Cancel
            } else {
                Selection::Device(0)
            }
        }),
        (None, false) => Box::new(ConsoleSelector::stdio()),
    };

    let mut session: Session = BluetoothSession::new(link);
    session.pair(selector.as_mut())?;
    Ok(session)
}
