use std::{
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        mpsc::{self, Receiver},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::messages::{DemoMessage, Ping, PingTtl, PleaseStop, Text};
use crate::{
    error::WorkerError,
    pubsub::{Broker, Subscription},
    worker::{ConsumerWorker, WorkerReport},
};

/// Отвечает на пинги повторной публикацией прямо из обработчика.
///
/// Каждый полученный `Ping` уменьшает лимит ответов; пока лимит не
/// исчерпан, обработчик публикует следующий `Ping` в том же брокере. Так
/// проверяется повторный вход в `publish` из обработчика.
pub struct PingPongResponder {
    name: String,
    broker: Arc<Broker<DemoMessage>>,
    remaining: AtomicU32,
    received: AtomicU64,
    hops: AtomicU64,
    subscriptions: Mutex<Vec<Subscription<DemoMessage>>>,
}

impl PingPongResponder {
    pub fn new(
        broker: Arc<Broker<DemoMessage>>,
        name: impl Into<String>,
        response_limit: u32,
    ) -> Arc<Self> {
        let responder = Arc::new(Self {
            name: name.into(),
            broker,
            remaining: AtomicU32::new(response_limit),
            received: AtomicU64::new(0),
            hops: AtomicU64::new(0),
            subscriptions: Mutex::new(Vec::new()),
        });

        let broker = &responder.broker;
        *responder.subscriptions.lock() = vec![
            broker.subscribe_method(&responder, Self::on_ping),
            broker.subscribe_method(&responder, Self::on_ping_ttl),
            broker.subscribe_method(&responder, Self::on_text),
        ];
        responder
    }

    /// Запускает цепочку повторных публикаций одним пингом.
    pub fn serve(&self) {
        self.broker.publish(Ping);
    }

    /// Публикует `rounds` пингов подряд из вызывающего потока.
    pub fn play(
        &self,
        rounds: u32,
    ) {
        for _ in 0..rounds {
            self.broker.publish(Ping);
        }
    }

    /// Сколько пингов получено.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Сколько прыжков `PingTtl` обработано.
    pub fn hops(&self) -> u64 {
        self.hops.load(Ordering::Relaxed)
    }

    fn on_ping(
        &self,
        _: &Ping,
    ) {
        self.received.fetch_add(1, Ordering::Relaxed);
        let left = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|prev| prev - 1);
        if let Ok(left) = left {
            if left > 0 {
                self.broker.publish(Ping);
            }
        }
    }

    fn on_ping_ttl(
        &self,
        msg: &PingTtl,
    ) {
        self.hops.fetch_add(1, Ordering::Relaxed);
        if let Some(next) = msg.bounce() {
            self.broker.publish(next);
        }
    }

    fn on_text(
        &self,
        msg: &Text,
    ) {
        info!(responder = %self.name, from = %msg.source, content = %msg.content, "received text");
    }
}

impl Drop for PingPongResponder {
    fn drop(&mut self) {
        for subscription in std::mem::take(&mut *self.subscriptions.lock()) {
            self.broker.unsubscribe(subscription);
        }
    }
}

/// Пинг-понг через consumer-воркер.
///
/// Обработчик брокера только кладёт отметку в ящик воркера, а ответный
/// `Ping` публикуется уже из потока воркера. После `max_pings` ответов
/// воркер публикует `PleaseStop` и сам себя останавливает.
pub struct ThreadedPingPong {
    broker: Arc<Broker<DemoMessage>>,
    worker: ConsumerWorker<DemoMessage, ()>,
    done: Receiver<u32>,
}

impl ThreadedPingPong {
    pub fn start(
        broker: Arc<Broker<DemoMessage>>,
        name: impl Into<String>,
        max_pings: u32,
    ) -> Result<Self, WorkerError> {
        if max_pings == 0 {
            return Err(WorkerError::InvalidArgument(
                "max_pings must be positive".into(),
            ));
        }

        let (done_tx, done) = mpsc::channel();
        let publisher = Arc::clone(&broker);
        let mut count = 0u32;

        let worker = ConsumerWorker::builder(name)
            .broker(Arc::clone(&broker))
            .feed(|_: &Ping| Some(()))
            .stop_on::<PleaseStop>()
            .spawn(move |()| {
                if count >= max_pings {
                    return;
                }
                count += 1;
                if count < max_pings {
                    publisher.publish(Ping);
                } else {
                    debug!(count, "ping-pong finished");
                    publisher.publish(PleaseStop);
                    let _ = done_tx.send(count);
                }
            })?;

        Ok(Self {
            broker,
            worker,
            done,
        })
    }

    /// Первый пинг из вызывающего потока.
    pub fn kick(&self) {
        self.broker.publish(Ping);
    }

    /// Ждёт окончания обмена и завершает воркер.
    ///
    /// Если обмен не закончился за `timeout`, воркер останавливается
    /// принудительно; в отчёте будет меньше `max_pings` обработанных.
    pub fn wait(
        mut self,
        timeout: Duration,
    ) -> Result<WorkerReport, WorkerError> {
        match self.done.recv_timeout(timeout) {
            Ok(count) => debug!(worker = self.worker.name(), count, "ping-pong completed"),
            Err(_) => {
                warn!(
                    worker = self.worker.name(),
                    timeout_ms = timeout.as_millis() as u64,
                    "ping-pong timed out, stopping worker"
                );
                self.worker.request_stop();
            }
        }
        self.worker.finalize()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
