//! Infrastructure layer
//!
//! Runner configuration and logging setup.

mod config;
mod logging;

pub use config::RunnerConfig;
pub use logging::init_logging;
