use thiserror::Error;

/// Ошибки инициализации логирования.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("invalid log filter directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("failed to prepare log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("global tracing subscriber is already set: {0}")]
    AlreadyInitialized(String),
}
