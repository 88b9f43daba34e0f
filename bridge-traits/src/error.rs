//! Errors reported by host bridge implementations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host log sink cannot accept entries right now.
    #[error("Log sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("Log sink write failed: {0}")]
    SinkWrite(String),

    /// The host tick source could not be read.
    #[error("Tick source error: {0}")]
    TickSource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
