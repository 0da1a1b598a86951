//! Logging setup for the `sheetscan` binaries and tests.
//!
//! Library crates only use the `log` macros. [`init_with_level`] installs a
//! stderr logger whose lines look like
//! `[  1.234s  WARN sheetscan_reader] sheet 09-01 S1Q2 cell 3: ...`.
//! The level applies to the `sheetscan*` crates; records from third-party
//! crates (QR decoding, image codecs) are shown from `warn` up only.
//! Behind the `tracing` feature, [`init_tracing`] installs a
//! `tracing-subscriber` with the same per-crate defaults, overridable through
//! `RUST_LOG`.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Crate prefix shared by every workspace target.
const WORKSPACE_TARGET: &str = "sheetscan";

/// Filter applied when `RUST_LOG` is unset.
#[cfg(feature = "tracing")]
const DEFAULT_DIRECTIVES: &str = "warn,sheetscan=info,sheetscan_core=info,\
sheetscan_recovery=info,sheetscan_reader=info,sheetscan_grading=info";

/// Effective level for records of `target` when the workspace runs at `level`.
fn level_for_target(target: &str, level: LevelFilter) -> LevelFilter {
    if target.starts_with(WORKSPACE_TARGET) {
        level
    } else {
        level.min(LevelFilter::Warn)
    }
}

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= level_for_target(metadata.target(), self.level)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let crate_name = record.target().split("::").next().unwrap_or_default();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:7.3}s {:>5} {}] {}",
            self.started.elapsed().as_secs_f64(),
            record.level(),
            crate_name,
            record.args()
        );
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger; `level` applies to the `sheetscan*` crates.
///
/// Only the first call installs a logger; later calls return `Ok(())`.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install a `tracing` subscriber; `RUST_LOG` overrides the per-crate defaults.
///
/// With `json`, events are flattened JSON lines (one per event, spans closed
/// with their timings), suitable for batch runs over many scans.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
