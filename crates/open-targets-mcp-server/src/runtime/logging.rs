//! Logging initialization.
//!
//! Log output goes to stderr: stdout carries the MCP stdio transport.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use super::Logging;

pub fn init(logging: &Logging) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(logging.level).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
