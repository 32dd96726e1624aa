use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::messages::{DemoMessage, PleaseStop, Text};
use crate::{
    error::WorkerError,
    pubsub::Broker,
    worker::{ConsumerWorker, WorkerState},
};

/// Пакетный обработчик строк на consumer-воркере.
///
/// Собирает содержимое всех `Text` сообщений в порядке поступления и
/// останавливается по `PleaseStop`.
pub struct BulkProcessor {
    worker: ConsumerWorker<DemoMessage, String>,
    collected: Arc<Mutex<Vec<String>>>,
}

impl BulkProcessor {
    pub fn start(
        broker: Arc<Broker<DemoMessage>>,
        name: impl Into<String>,
    ) -> Result<Self, WorkerError> {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);

        let worker = ConsumerWorker::builder(name)
            .broker(broker)
            .feed(|msg: &Text| Some(msg.content.clone()))
            .stop_on::<PleaseStop>()
            .spawn(move |content: String| {
                debug!(%content, "bulk item processed");
                sink.lock().push(content);
            })?;

        Ok(Self { worker, collected })
    }

    pub fn state(&self) -> WorkerState {
        self.worker.state()
    }

    /// Запрашивает остановку в обход `PleaseStop`.
    pub fn request_stop(&self) -> bool {
        self.worker.request_stop()
    }

    /// Дожидается воркера и возвращает собранные строки.
    pub fn finalize(mut self) -> Result<Vec<String>, WorkerError> {
        self.worker.finalize()?;
        Ok(std::mem::take(&mut *self.collected.lock()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что все строки до `PleaseStop` собраны по порядку,
    /// а строки после него отброшены.
    #[test]
    fn test_bulk_collects_until_stop() {
        let broker = Broker::shared();
        let bulk = BulkProcessor::start(broker.clone(), "bulk").unwrap();

        for i in 1..=3 {
            broker.publish(Text::new("main", format!("hello {i}")));
        }
        broker.publish(PleaseStop);
        broker.publish(Text::new("main", "too late"));

        let collected = bulk.finalize().unwrap();
        assert_eq!(collected, vec!["hello 1", "hello 2", "hello 3"]);
        assert_eq!(broker.total_subscribers(), 0);
    }

    #[test]
    fn test_finalize_before_stop_is_error() {
        let broker = Broker::shared();
        let bulk = BulkProcessor::start(broker, "bulk").unwrap();
        assert!(bulk.state().is_accepting());

        assert!(matches!(bulk.finalize(), Err(WorkerError::InvalidState(_))));
    }
}
