use anyhow::{Context, Result};
use flexi_logger::{Logger, LoggerHandle};

/// Log level string for a `-v` count. `RUST_LOG` overrides whatever this returns.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Start stderr logging. The returned handle must stay alive for the run.
pub fn init(verbosity: u8) -> Result<LoggerHandle> {
    let level = level_for(verbosity);
    Logger::try_with_env_or_str(level)
        .with_context(|| format!("Invalid log level `{level}`"))?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()
        .context("Failed to start logger")
}
