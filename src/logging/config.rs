use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::LoggingError;

/// Допустимые уровни логирования.
const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Формат вывода событий.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Период ротации файла логов.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    Never,
    Hourly,
    #[default]
    Daily,
}

/// Настройки вывода в консоль.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_names: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

/// Настройки вывода в файл.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub filename: String,
    pub rotation: FileRotation,
    pub format: LogFormat,
}

/// Настройки логирования.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Базовый уровень (`trace`..`error`, `off`).
    pub level: String,
    /// Формат консольного вывода.
    pub format: LogFormat,
    /// Дополнительные директивы фильтра, например `fabric::pubsub=trace`.
    pub directives: Vec<String>,
    pub console: ConsoleConfig,
    pub file: FileConfig,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            with_ansi: true,
            with_target: true,
            with_thread_names: false,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("logs"),
            filename: "fabric.log".into(),
            rotation: FileRotation::Daily,
            format: LogFormat::Json,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Compact,
            directives: Vec::new(),
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
        }
    }
}

impl LoggingConfig {
    /// Проверяет корректность уровня и имени файла.
    pub fn validate(&self) -> Result<(), LoggingError> {
        let level = self.level.to_ascii_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(LoggingError::InvalidLevel(self.level.clone()));
        }
        if self.file.enabled && self.file.filename.trim().is_empty() {
            return Err(LoggingError::InvalidDirective {
                directive: "file.filename".into(),
                reason: "file name must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Собирает директиву `EnvFilter` из уровня и дополнительных директив.
    pub fn build_filter_directive(&self) -> String {
        std::iter::once(self.level.to_ascii_lowercase())
            .chain(self.directives.iter().cloned())
            .collect::<Vec<_>>()
            .join(",")
    }
}
