use std::fs;

use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, layer::Layer as LayerTrait, registry::LookupSpan};

use crate::{
    error::LoggingError,
    logging::config::{FileRotation, LogFormat, LoggingConfig},
};

impl From<FileRotation> for Rotation {
    fn from(rotation: FileRotation) -> Self {
        match rotation {
            FileRotation::Never => Rotation::NEVER,
            FileRotation::Hourly => Rotation::HOURLY,
            FileRotation::Daily => Rotation::DAILY,
        }
    }
}

/// Файловый слой с неблокирующей записью.
///
/// `WorkerGuard` нужно держать живым, пока пишутся логи: при его drop
/// буфер сбрасывается на диск.
pub fn layer_with_config<S>(
    config: &LoggingConfig
) -> Result<(Box<dyn LayerTrait<S> + Send + Sync>, WorkerGuard), LoggingError>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let file = &config.file;
    fs::create_dir_all(&file.dir)?;

    let appender = RollingFileAppender::new(file.rotation.into(), &file.dir, &file.filename);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_target(true)
        .with_thread_names(true);

    let layer: Box<dyn LayerTrait<S> + Send + Sync> = match file.format {
        LogFormat::Json => Box::new(layer.json()),
        LogFormat::Pretty => Box::new(layer.pretty()),
        LogFormat::Compact => Box::new(layer.compact()),
    };

    Ok((layer, guard))
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;

    /// Тест проверяет, что событие попадает в файл после сброса guard.
    #[test]
    fn test_file_layer_writes_events() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = LoggingConfig::default();
        cfg.file.enabled = true;
        cfg.file.dir = dir.path().join("nested");
        cfg.file.rotation = FileRotation::Never;
        cfg.file.format = LogFormat::Compact;

        let (layer, guard) = layer_with_config::<Registry>(&cfg).unwrap();
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("written to file sink");
        });
        drop(guard);

        let content = fs::read_to_string(cfg.file.dir.join(&cfg.file.filename)).unwrap();
        assert!(content.contains("written to file sink"));
    }
}
