//! Runtime errors raised while preparing a scheduler host: configuration
//! validation and logging setup. Scheduling itself reports
//! `core_scheduler::SchedError`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The global subscriber could not be installed.
    #[error("Logging error: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
