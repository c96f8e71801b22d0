//! Stderr logger for the telemetry node.
//!
//! Records print as `[elapsed LEVEL target] message`, where `target` is the
//! last path segment of the emitting module. The level comes from the
//! caller, unless [`LOG_ENV`] names one.

use std::fmt::Arguments;
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the node's log level or filter.
pub const LOG_ENV: &str = "MARKER_TELEMETRY_LOG";

/// Level named by [`LOG_ENV`], or `default` when unset or unparsable.
pub fn level_from_env(default: LevelFilter) -> LevelFilter {
    parse_level(std::env::var(LOG_ENV).ok().as_deref()).unwrap_or(default)
}

fn parse_level(value: Option<&str>) -> Option<LevelFilter> {
    value?.trim().parse().ok()
}

fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

fn write_record(
    out: &mut impl Write,
    elapsed: f64,
    level: Level,
    target: &str,
    args: &Arguments<'_>,
) -> io::Result<()> {
    writeln!(
        out,
        "[{:8.3}s {:>5} {}] {}",
        elapsed,
        level,
        short_target(target),
        args
    )
}

struct NodeLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for NodeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        let _ = write_record(
            &mut io::stderr().lock(),
            elapsed,
            record.level(),
            record.target(),
            record.args(),
        );
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

static LOGGER: OnceLock<NodeLogger> = OnceLock::new();

/// Install the stderr logger. Later calls keep the first level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| NodeLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install a `tracing-subscriber` at `level`, or filtered by [`LOG_ENV`]
/// (default `info`) when no level is given.
#[cfg(feature = "tracing")]
pub fn init_tracing(level: Option<LevelFilter>, json: bool) {
    let filter = match level {
        Some(level) => EnvFilter::new(level.to_string().to_lowercase()),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
    };
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .with_writer(io::stderr)
            .finish()
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_shows_elapsed_level_and_module() {
        let mut out = Vec::new();
        write_record(
            &mut out,
            1.25,
            Level::Warn,
            "marker_telemetry::pipeline",
            &format_args!("no transform for {}", "camera"),
        )
        .expect("write");
        let line = String::from_utf8(out).expect("utf8");
        assert_eq!(line, "[   1.250s  WARN pipeline] no transform for camera\n");
    }

    #[test]
    fn crate_root_target_is_kept_whole() {
        assert_eq!(short_target("marker_telemetry"), "marker_telemetry");
        assert_eq!(short_target("a::b::c"), "c");
    }

    #[test]
    fn level_names_parse_case_insensitively() {
        assert_eq!(parse_level(Some("debug")), Some(LevelFilter::Debug));
        assert_eq!(parse_level(Some(" WARN ")), Some(LevelFilter::Warn));
        assert_eq!(parse_level(Some("off")), Some(LevelFilter::Off));
        assert_eq!(parse_level(Some("chatty")), None);
        assert_eq!(parse_level(None), None);
    }
}
