//! Логирование на базе `tracing`.
//!
//! - `config`: настройки уровня, формата и приёмников.
//! - `filters`: сборка `EnvFilter` (с приоритетом `RUST_LOG`).
//! - `formatter`: консольный fmt-слой.
//! - `sinks`: приёмники (консоль, файл с ротацией).
//! - `handle`: handle с `WorkerGuard` файлового writer'а.

#[cfg(test)]
pub(crate) mod capture;
pub mod config;
mod filters;
mod formatter;
pub mod handle;
pub mod sinks;

pub use self::config::{ConsoleConfig, FileConfig, FileRotation, LogFormat, LoggingConfig};
pub use handle::LoggingHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::LoggingError;

/// Инициализирует глобальный подписчик `tracing` по конфигурации.
///
/// # Возвращает
/// - `LoggingHandle`, который нужно держать до завершения процесса
/// - `LoggingError::AlreadyInitialized`, если глобальный подписчик уже
///   установлен
pub fn init_logging(config: LoggingConfig) -> Result<LoggingHandle, LoggingError> {
    config.validate()?;

    let env_filter = filters::build_filter_from_config(&config)?;
    let mut layers = Vec::new();

    if config.console.enabled {
        layers.push(sinks::console::layer_with_config(&config));
    }

    let file_guard = if config.file.enabled {
        let (file_layer, guard) = sinks::file::layer_with_config(&config)?;
        layers.push(file_layer);
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        format = ?config.format,
        console_enabled = config.console.enabled,
        file_enabled = config.file.enabled,
        "Logging system initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}
