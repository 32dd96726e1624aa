use std::path::Path;

use ::config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;

/// Префикс переменных окружения (`FABRIC_BROKER__WARN_ON_UNHANDLED=true`).
pub const ENV_PREFIX: &str = "FABRIC";

/// Файл настроек по умолчанию (необязательный).
pub const DEFAULT_CONFIG_FILE: &str = "fabric.toml";

/// Настройки брокера.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Логировать на уровне `warn` публикации без обработчиков вида.
    pub warn_on_unhandled: bool,
}

/// Настройки демонстрационных сценариев.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Количество раундов (пингов, сообщений) в сценарии.
    pub rounds: u32,
    /// Имена участников диалога.
    pub participants: Vec<String>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            rounds: 100,
            participants: vec!["s1".into(), "s2".into()],
        }
    }
}

/// Полные настройки приложения.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub broker: BrokerConfig,
    pub logging: LoggingConfig,
    pub demo: DemoConfig,
}

impl Settings {
    /// Загружает настройки из `fabric.toml` (если есть) и окружения.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Загружает настройки из указанного файла (если есть) и окружения.
    ///
    /// Порядок приоритета: значения по умолчанию < файл < `FABRIC_*`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("demo.participants")
                    .try_parsing(true),
            )
            .build()?;

        cfg.try_deserialize()
    }
}
