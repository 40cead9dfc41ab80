//! Logging utilities.
//!
//! The library itself only speaks the `log` facade; binaries and tests call
//! [`init_logging`] to install `env_logger`.

mod init;

pub use init::{init_logging, LoggingConfig};
