use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

use parking_lot::Mutex;
use tracing::info;

use super::messages::{LogOnly, PipelineMessage, Processed, Source, StopSignal};
use crate::pubsub::{Broker, Subscription};

type PipelineBroker = Broker<PipelineMessage>;

/// Снимает подписки компонента при уничтожении.
struct Subscriptions {
    broker: Arc<PipelineBroker>,
    handles: Vec<Subscription<PipelineMessage>>,
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            self.broker.unsubscribe(handle);
        }
    }
}

/// Журнал: наблюдатель всех видов конвейера.
pub struct Logger {
    traced: Arc<AtomicU64>,
    _subscriptions: Subscriptions,
}

impl Logger {
    pub fn attach(broker: &Arc<PipelineBroker>) -> Self {
        let traced = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&traced);
        let tap = broker.subscribe_any(move |msg: &PipelineMessage| {
            counter.fetch_add(1, Ordering::Relaxed);
            match msg {
                PipelineMessage::Source(Source(content)) => {
                    info!(%content, "Logger: tracing Source")
                }
                PipelineMessage::LogOnly(LogOnly(content)) => {
                    info!(%content, "Logger: tracing LogOnly")
                }
                PipelineMessage::Processed(Processed(content)) => {
                    info!(%content, "Logger: tracing Processed")
                }
                PipelineMessage::StopSignal(_) => info!("Logger: received stop signal"),
            }
        });

        Self {
            traced,
            _subscriptions: Subscriptions {
                broker: Arc::clone(broker),
                handles: vec![tap],
            },
        }
    }

    /// Сколько сообщений прошло через журнал.
    pub fn traced(&self) -> u64 {
        self.traced.load(Ordering::Relaxed)
    }
}

/// Обработчик данных: превращает `Source` в `Processed`.
pub struct DataProcessor {
    broker: Arc<PipelineBroker>,
    processed: Arc<AtomicU64>,
    _subscriptions: Subscriptions,
}

impl DataProcessor {
    pub fn attach(broker: &Arc<PipelineBroker>) -> Self {
        let processed = Arc::new(AtomicU64::new(0));

        // Weak: обработчик живёт в реестре брокера и не должен его удерживать.
        let publisher: Weak<PipelineBroker> = Arc::downgrade(broker);
        let counter = Arc::clone(&processed);
        let on_source = broker.subscribe(move |Source(content): &Source| {
            if let Some(broker) = publisher.upgrade() {
                counter.fetch_add(1, Ordering::Relaxed);
                process_and_publish(&broker, content);
            }
        });
        let on_stop = broker.subscribe(|_: &StopSignal| {
            info!("DataProcessor: received stop signal");
        });

        Self {
            broker: Arc::clone(broker),
            processed,
            _subscriptions: Subscriptions {
                broker: Arc::clone(broker),
                handles: vec![on_source, on_stop],
            },
        }
    }

    /// Пакетная обработка в обход `Source`.
    pub fn process_and_publish(
        &self,
        data: &str,
    ) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        process_and_publish(&self.broker, data);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

fn process_and_publish(
    broker: &PipelineBroker,
    data: &str,
) {
    info!(data, "DataProcessor: processing data");
    let processed = format!("Processed: {data}");
    broker.publish(Processed(processed));
}

/// Интерфейс пользователя: показывает исходные и обработанные данные.
pub struct UserInterface {
    broker: Arc<PipelineBroker>,
    shown: Arc<Mutex<Vec<String>>>,
    stopped: Arc<AtomicU64>,
    _subscriptions: Subscriptions,
}

impl UserInterface {
    pub fn attach(broker: &Arc<PipelineBroker>) -> Self {
        let shown = Arc::new(Mutex::new(Vec::new()));
        let stopped = Arc::new(AtomicU64::new(0));

        let on_stop = {
            let stopped = Arc::clone(&stopped);
            broker.subscribe(move |_: &StopSignal| {
                stopped.fetch_add(1, Ordering::Relaxed);
                info!("UserInterface: received stop signal");
            })
        };
        let on_source = {
            let shown = Arc::clone(&shown);
            broker.subscribe(move |Source(content): &Source| {
                info!(%content, "UI: displaying message");
                shown.lock().push(content.clone());
            })
        };
        let on_processed = {
            let shown = Arc::clone(&shown);
            broker.subscribe(move |Processed(content): &Processed| {
                info!(%content, "UI: received processed message");
                shown.lock().push(content.clone());
            })
        };

        Self {
            broker: Arc::clone(broker),
            shown,
            stopped,
            _subscriptions: Subscriptions {
                broker: Arc::clone(broker),
                handles: vec![on_stop, on_source, on_processed],
            },
        }
    }

    /// Имитирует ввод пользователя.
    pub fn user_input(
        &self,
        input: &str,
    ) {
        info!(input, "simulating user input");
        self.broker.publish(Source(input.to_owned()));
    }

    /// Всё показанное пользователю в порядке показа.
    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().clone()
    }

    pub fn stop_signals(&self) -> u64 {
        self.stopped.load(Ordering::Relaxed)
    }
}

/// Итог прогона конвейера.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub shown: Vec<String>,
    pub processed: u64,
    pub traced: u64,
    pub stop_signals: u64,
}

/// Прогоняет конвейер: ввод пользователя, пакетные данные, заметки журнала
/// и сигнал остановки.
pub fn run_pipeline(
    broker: &Arc<PipelineBroker>,
    rounds: u32,
) -> PipelineReport {
    let logger = Logger::attach(broker);
    let processor = DataProcessor::attach(broker);
    let ui = UserInterface::attach(broker);

    info!("Main: starting user-interactive flow");
    for round in 0..rounds {
        ui.user_input(&format!("Simulated user input {round}"));
    }
    info!("Main: starting batch flow");
    processor.process_and_publish("Batch data");
    broker.publish(LogOnly("pipeline drained".into()));

    info!("Main: stopping the application");
    broker.publish(StopSignal);

    PipelineReport {
        shown: ui.shown(),
        processed: processor.processed(),
        traced: logger.traced(),
        stop_signals: ui.stop_signals(),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
