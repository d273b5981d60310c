use std::io;
use std::io::stderr;
use std::io::IsTerminal;

use tracing::metadata::LevelFilter;
use tracing::Subscriber;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_TRACE_LEVEL: LevelFilter = LevelFilter::WARN;

/// Returns a tracing subscriber that logs to `stderr`.
fn stderr_subscriber(level: Option<LevelFilter>) -> impl Subscriber {
    let level = level.unwrap_or(DEFAULT_TRACE_LEVEL);

    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(stderr().is_terminal())
        .finish()
}

/// Initializes tracing to `stderr`. Repeated `-v` raises the level from the
/// default `WARN`.
pub fn init_stderr_tracing(verbosity: u8) -> anyhow::Result<()> {
    let level = match verbosity {
        0 => None,
        1 => Some(LevelFilter::INFO),
        2 => Some(LevelFilter::DEBUG),
        _ => Some(LevelFilter::TRACE),
    };
    stderr_subscriber(level).try_init()?;
    Ok(())
}
