//! Logging setup for the command-line tool.
//!
//! With `--log <file>` everything down to debug level goes to that file,
//! which is how scheduling decisions are inspected after a run. Without it
//! only errors reach stderr. `RUST_LOG` overrides the default filter in
//! either mode.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber.
pub fn init(log_file: Option<&Path>) -> io::Result<()> {
    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            fmt()
                .with_env_filter(default_filter("debug"))
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            fmt()
                .with_env_filter(default_filter("error"))
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
