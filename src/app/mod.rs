//! Application module
//!
//! Process-level concerns shared by every subcommand:
//! - Verbosity and log level
//! - Logging setup
//! - Fatal error reporting and exit codes

pub mod config;
pub mod error_handling;
pub mod logging;

pub use config::AppConfig;
pub use error_handling::handle_fatal_error;
pub use logging::init_logging;
