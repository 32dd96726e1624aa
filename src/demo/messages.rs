//! Каталоги сообщений демонстрационных сценариев.

use crate::catalog;

/// Сигнал без полезной нагрузки.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ping;

/// Пинг с ограниченным временем жизни.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingTtl {
    pub ttl: u32,
    pub source: u32,
    pub destination: u32,
}

/// Просьба остановиться, адресованная воркерам.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PleaseStop;

/// Объявляет текстовое сообщение с отправителем и содержимым.
macro_rules! text_message {
    ($( $(#[$meta:meta])* $name:ident ),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Default, PartialEq, Eq)]
            pub struct $name {
                pub source: String,
                pub content: String,
            }

            impl $name {
                pub fn new(
                    source: impl Into<String>,
                    content: impl Into<String>,
                ) -> Self {
                    Self {
                        source: source.into(),
                        content: content.into(),
                    }
                }
            }
        )+
    };
}

text_message! {
    /// Произвольная строка от отправителя.
    Text,
    /// Вопрос участнику диалога.
    Question,
    /// Ответ на вопрос.
    Answer,
    /// Благодарность за ответ.
    Thanks,
}

impl PingTtl {
    pub fn new(ttl: u32) -> Self {
        Self {
            ttl,
            source: 0,
            destination: 0,
        }
    }

    /// Следующий прыжок: обратный маршрут и уменьшенный TTL.
    ///
    /// # Возвращает
    /// - `None`, если TTL исчерпан
    pub fn bounce(&self) -> Option<Self> {
        (self.ttl > 0).then(|| Self {
            ttl: self.ttl - 1,
            source: self.destination,
            destination: self.source,
        })
    }
}

catalog! {
    /// Сообщения диалога, пинг-понга и пакетной обработки.
    pub enum DemoMessage => DemoKind {
        Ping(Ping),
        PingTtl(PingTtl),
        Text(Text),
        Question(Question),
        Answer(Answer),
        Thanks(Thanks),
        PleaseStop(PleaseStop),
    }
}

/// Исходные данные конвейера.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source(pub String);

/// Сообщение, которое только журналируется.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOnly(pub String);

/// Результат обработки исходных данных.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed(pub String);

/// Сигнал завершения конвейера.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopSignal;

catalog! {
    /// Сообщения конвейера «источник → обработка → интерфейс».
    pub enum PipelineMessage => PipelineKind {
        Source(Source),
        LogOnly(LogOnly),
        Processed(Processed),
        StopSignal(StopSignal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::{Catalog, Member};

    #[test]
    fn test_demo_catalog_kinds() {
        assert_eq!(DemoMessage::KINDS.len(), 7);
        assert_eq!(DemoMessage::from(Thanks::new("s1", "ok")).kind(), DemoKind::Thanks);
        assert_eq!(<Question as Member<DemoMessage>>::KIND.name(), "Question");
    }

    /// Тест проверяет, что TTL убывает до нуля и маршрут разворачивается.
    #[test]
    fn test_ping_ttl_bounce() {
        let ping = PingTtl {
            ttl: 1,
            source: 1,
            destination: 2,
        };
        let next = ping.bounce().unwrap();
        assert_eq!((next.ttl, next.source, next.destination), (0, 2, 1));
        assert!(next.bounce().is_none());
    }

    #[test]
    fn test_pipeline_catalog_kinds() {
        assert_eq!(PipelineMessage::KINDS.len(), 4);
        assert_eq!(PipelineMessage::from(StopSignal).kind(), PipelineKind::StopSignal);
    }
}
