pub mod logging;
pub mod worker;

// Публичный экспорт всех типов ошибок из вложенных модулей, чтобы
// упростить доступ к ним из внешнего кода.
pub use logging::LoggingError;
pub use worker::WorkerError;

/// Ошибка загрузки настроек (`config` crate).
pub use ::config::ConfigError;
