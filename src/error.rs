//! Error types for the bell scheduler.

/// Top-level error type for the relay scheduling system.
#[derive(Debug, thiserror::Error)]
pub enum BellError {
    /// Settings file could not be read, parsed, or written.
    #[error("config error: {0}")]
    Config(String),

    /// Trigger specification could not be interpreted.
    #[error("trigger error: {0}")]
    Trigger(String),

    /// Physical relay output could not be driven.
    #[error("relay error: {0}")]
    Relay(String),

    /// Scheduling engine error (arming, reloading).
    #[error("engine error: {0}")]
    Engine(String),

    /// HTTP control surface error.
    #[error("server error: {0}")]
    Server(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BellError>;
