//! Process-wide infrastructure: command line / environment configuration and
//! console logging.

pub mod config;
pub mod logging;
