use std::io;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::Layer as LayerTrait,
    registry::LookupSpan,
};

use crate::logging::config::{ConsoleConfig, LogFormat};

/// Собирает консольный fmt-слой по конфигурации.
///
/// Возвращаем boxed trait-объект, чтобы стереть конкретный тип формата
/// (json/pretty/compact).
pub fn build_formatter_from_config<S>(
    console: &ConsoleConfig,
    format: LogFormat,
) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    build_formatter(console, format, io::stdout)
}

fn build_formatter<S, W>(
    console: &ConsoleConfig,
    format: LogFormat,
    writer: W,
) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(console.with_ansi)
        .with_target(console.with_target)
        .with_thread_names(console.with_thread_names)
        .with_thread_ids(console.with_thread_ids)
        .with_line_number(console.with_line_numbers);

    match format {
        LogFormat::Json => Box::new(layer.json().with_current_span(true)),
        LogFormat::Pretty => Box::new(layer.pretty().with_span_events(FmtSpan::CLOSE)),
        LogFormat::Compact => Box::new(layer.compact()),
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use tracing_subscriber::{layer::SubscriberExt, Registry};

    use super::*;
    use crate::logging::capture::VecMakeWriter;

    /// Пишет одно событие из именованного потока и возвращает вывод.
    fn emit_from_named_thread(console: ConsoleConfig) -> String {
        let writer = VecMakeWriter::default();
        let sink = writer.clone();

        thread::Builder::new()
            .name("fabric-log-test".into())
            .spawn(move || {
                let layer = build_formatter::<Registry, _>(&console, LogFormat::Compact, sink);
                let subscriber = Registry::default().with(layer);
                tracing::subscriber::with_default(subscriber, || {
                    tracing::info!("formatter check");
                });
            })
            .unwrap()
            .join()
            .unwrap();

        writer.contents()
    }

    /// Тест проверяет, что имя потока выводится по собственному флагу и не
    /// зависит от вывода идентификаторов потоков.
    #[test]
    fn test_thread_names_follow_own_flag() {
        let named = emit_from_named_thread(ConsoleConfig {
            with_ansi: false,
            with_thread_names: true,
            with_thread_ids: false,
            ..Default::default()
        });
        assert!(named.contains("formatter check"));
        assert!(named.contains("fabric-log-test"), "unexpected output: {named}");
        assert!(!named.contains("ThreadId("));

        let ids_only = emit_from_named_thread(ConsoleConfig {
            with_ansi: false,
            with_thread_names: false,
            with_thread_ids: true,
            ..Default::default()
        });
        assert!(ids_only.contains("ThreadId("), "unexpected output: {ids_only}");
        assert!(!ids_only.contains("fabric-log-test"));
    }
}
