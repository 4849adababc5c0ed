//! Process-wide `tracing` setup.

use std::error::Error;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Where diagnostic logs go for a given command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Append to a file; used by the TUI, which owns the terminal.
    File(PathBuf),
    Disabled,
}

pub const SERVER_DEFAULT_FILTER: &str = "thinkchat=info,tower_http=info";
pub const CLIENT_DEFAULT_FILTER: &str = "thinkchat=warn";

fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Install the global subscriber. `RUST_LOG` overrides `default_directives`.
pub fn init(target: LogTarget, default_directives: &str) -> Result<(), Box<dyn Error>> {
    match target {
        LogTarget::Disabled => Ok(()),
        LogTarget::Stderr => tracing_subscriber::fmt()
            .with_env_filter(env_filter(default_directives))
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| e as Box<dyn Error>),
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter(default_directives))
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| e as Box<dyn Error>)
        }
    }
}

/// File logging when a path was given, otherwise `fallback`.
pub fn target_for(log_file: Option<PathBuf>, fallback: LogTarget) -> LogTarget {
    log_file.map(LogTarget::File).unwrap_or(fallback)
}
