use thiserror::Error;

/// Ошибки жизненного цикла consumer-воркера.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    /// Некорректный аргумент конструктора (например, не передан брокер).
    /// Воркер не создаётся.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Операция недопустима в текущем состоянии воркера.
    #[error("invalid worker state: {0}")]
    InvalidState(String),

    /// Функция обработки завершилась паникой в фоновом потоке.
    #[error("worker '{name}' processor panicked: {reason}")]
    ProcessorPanicked { name: String, reason: String },

    /// Не удалось запустить фоновый поток.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

impl From<std::io::Error> for WorkerError {
    fn from(err: std::io::Error) -> Self {
        WorkerError::Spawn(err.to_string())
    }
}
