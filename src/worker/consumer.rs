use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use tracing::{debug, error, info, trace, warn};

use super::{Mailbox, StateCell, WorkerState};
use crate::{
    error::WorkerError,
    pubsub::{broker::panic_reason, Broker, Catalog, Member, Subscription},
};

/// Состояние, разделяемое воркером, его фоновым потоком и обработчиками
/// брокера.
struct Shared<T> {
    name: String,
    mailbox: Mailbox<T>,
    state: StateCell,
    processed: AtomicU64,
    rejected: AtomicU64,
}

/// Отложенная подписка: выполняется, когда известен брокер.
type Wiring<C, T> = Box<dyn FnOnce(&Broker<C>, &Arc<Shared<T>>) -> Subscription<C>>;

/// Итог работы воркера, возвращаемый `finalize`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Сколько элементов обработано.
    pub processed: u64,
    /// Сколько элементов отклонено после запроса остановки.
    pub rejected: u64,
}

/// Построитель consumer-воркера.
///
/// Воркер подписывается на один или несколько видов сообщений, складывает
/// полученное в свой почтовый ящик и разбирает его в отдельном потоке.
pub struct WorkerBuilder<C: Catalog, T> {
    name: String,
    broker: Option<Arc<Broker<C>>>,
    wiring: Vec<Wiring<C, T>>,
}

/// Consumer-воркер с почтовым ящиком.
///
/// Обработчик брокера выполняется в потоке публикующего и только кладёт
/// копию данных в ящик; сама обработка идёт в фоновом потоке воркера, так
/// что `publish` не ждёт медленную работу.
pub struct ConsumerWorker<C: Catalog, T> {
    shared: Arc<Shared<T>>,
    broker: Arc<Broker<C>>,
    subscriptions: Vec<Subscription<C>>,
    thread: Option<JoinHandle<()>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<T> Shared<T> {
    fn new(name: String) -> Self {
        Self {
            name,
            mailbox: Mailbox::new(),
            state: StateCell::new(),
            processed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Сторона производителя: O(1), без ожидания обработки.
    fn offer(
        &self,
        item: T,
    ) {
        if !self.mailbox.push(item) {
            let rejected = self.rejected.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(worker = %self.name, rejected, "mailbox closed, item rejected");
        }
    }

    fn stop(&self) -> bool {
        let first = self.state.begin_drain();
        self.mailbox.close();
        if first {
            info!(
                worker = %self.name,
                pending = self.mailbox.len(),
                "stop requested, draining mailbox"
            );
        }
        first
    }

    fn report(&self) -> WorkerReport {
        WorkerReport {
            processed: self.processed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

impl<C, T> WorkerBuilder<C, T>
where
    C: Catalog,
    T: Send + 'static,
{
    fn new(name: String) -> Self {
        Self {
            name,
            broker: None,
            wiring: Vec::new(),
        }
    }

    /// Брокер, на который подписывается воркер. Обязателен.
    pub fn broker(
        mut self,
        broker: Arc<Broker<C>>,
    ) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Подписывает воркер на вид `K`.
    ///
    /// `map` выполняется в потоке публикующего и превращает сообщение в
    /// элемент ящика (`None`: сообщение пропускается). Возвращаемое значение
    /// владеет своими данными, ссылки на сообщение в ящик не попадают.
    pub fn feed<K, F>(
        mut self,
        map: F,
    ) -> Self
    where
        K: Member<C>,
        F: Fn(&K) -> Option<T> + Send + Sync + 'static,
    {
        self.wiring.push(Box::new(move |broker: &Broker<C>, shared: &Arc<Shared<T>>| {
            let shared = Arc::clone(shared);
            broker.subscribe(move |msg: &K| {
                if let Some(item) = map(msg) {
                    shared.offer(item);
                }
            })
        }));
        self
    }

    /// Вид сообщений, получение которого переводит воркер в `Draining`.
    pub fn stop_on<S>(mut self) -> Self
    where
        S: Member<C>,
    {
        self.wiring.push(Box::new(|broker: &Broker<C>, shared: &Arc<Shared<T>>| {
            let shared = Arc::clone(shared);
            broker.subscribe(move |_: &S| {
                shared.stop();
            })
        }));
        self
    }

    /// Создаёт воркер, оформляет подписки и запускает фоновый поток.
    ///
    /// # Ошибки
    /// - `WorkerError::InvalidArgument`: не задан брокер или пустое имя
    /// - `WorkerError::Spawn`: поток не запустился; все уже оформленные
    ///   подписки снимаются
    pub fn spawn<P>(
        self,
        processor: P,
    ) -> Result<ConsumerWorker<C, T>, WorkerError>
    where
        P: FnMut(T) + Send + 'static,
    {
        let Self {
            name,
            broker,
            wiring,
        } = self;

        if name.trim().is_empty() {
            return Err(WorkerError::InvalidArgument(
                "worker name must not be empty".into(),
            ));
        }
        let Some(broker) = broker else {
            return Err(WorkerError::InvalidArgument(format!(
                "worker '{name}' requires a broker"
            )));
        };

        let shared = Arc::new(Shared::new(name.clone()));
        let subscriptions: Vec<Subscription<C>> = wiring
            .into_iter()
            .map(|wire| wire(&broker, &shared))
            .collect();

        let spawned = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(format!("fabric-{name}"))
                .spawn(move || run(shared, processor))
        };

        let thread = match spawned {
            Ok(thread) => thread,
            Err(err) => {
                error!(worker = %name, error = %err, "failed to spawn worker thread");
                for subscription in subscriptions {
                    broker.unsubscribe(subscription);
                }
                return Err(err.into());
            }
        };

        info!(worker = %name, feeds = subscriptions.len(), "worker started");

        Ok(ConsumerWorker {
            shared,
            broker,
            subscriptions,
            thread: Some(thread),
        })
    }
}

impl<C, T> ConsumerWorker<C, T>
where
    C: Catalog,
    T: Send + 'static,
{
    /// Начинает построение воркера с заданным именем.
    pub fn builder(name: impl Into<String>) -> WorkerBuilder<C, T> {
        WorkerBuilder::new(name.into())
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Текущее состояние воркера.
    pub fn state(&self) -> WorkerState {
        self.shared.state.get()
    }

    /// Фоновый поток завершён.
    pub fn is_stopped(&self) -> bool {
        self.state() == WorkerState::Stopped
    }

    /// Количество элементов, ожидающих обработки.
    pub fn pending(&self) -> usize {
        self.shared.mailbox.len()
    }

    /// Количество уже обработанных элементов.
    pub fn processed(&self) -> u64 {
        self.shared.processed.load(Ordering::Relaxed)
    }

    /// Запрашивает остановку: новые элементы больше не принимаются, уже
    /// накопленные будут обработаны. Повторный вызов ничего не делает.
    ///
    /// # Возвращает
    /// - `true`, если остановку запросил именно этот вызов
    pub fn request_stop(&self) -> bool {
        self.shared.stop()
    }

    /// Дожидается завершения фонового потока и снимает подписки воркера.
    ///
    /// # Ошибки
    /// - `WorkerError::InvalidState`: остановка ещё не запрошена, или
    ///   `finalize` уже вызывался
    /// - `WorkerError::ProcessorPanicked`: функция обработки завершилась
    ///   паникой
    pub fn finalize(&mut self) -> Result<WorkerReport, WorkerError> {
        let state = self.state();
        if self.thread.is_some() && state.is_accepting() {
            return Err(WorkerError::InvalidState(format!(
                "worker '{}' is {state}; request_stop() must precede finalize()",
                self.name()
            )));
        }
        let Some(thread) = self.thread.take() else {
            return Err(WorkerError::InvalidState(format!(
                "worker '{}' is already finalized",
                self.name()
            )));
        };

        let joined = thread.join();
        self.detach();

        match joined {
            Ok(()) => {
                let report = self.shared.report();
                info!(
                    worker = %self.shared.name,
                    processed = report.processed,
                    rejected = report.rejected,
                    "worker finalized"
                );
                Ok(report)
            }
            Err(payload) => Err(WorkerError::ProcessorPanicked {
                name: self.shared.name.clone(),
                reason: panic_reason(&*payload).to_string(),
            }),
        }
    }

    fn detach(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            self.broker.unsubscribe(subscription);
        }
    }
}

/// Цикл потребителя: ждёт батч, обрабатывает его без блокировки ящика.
fn run<T, P>(
    shared: Arc<Shared<T>>,
    mut processor: P,
) where
    P: FnMut(T),
{
    let _exit = ExitGuard(&shared);
    if shared.state.mark_running() {
        debug!(worker = %shared.name, "worker running");
    }

    while let Some(batch) = shared.mailbox.wait_batch() {
        trace!(worker = %shared.name, batch = batch.len(), "processing batch");
        for item in batch {
            processor(item);
            shared.processed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Переводит воркер в `Stopped` при любом выходе из цикла, в том числе при
/// панике обработки.
struct ExitGuard<'a, T>(&'a Shared<T>);

impl<T> Drop for ExitGuard<'_, T> {
    fn drop(&mut self) {
        self.0.mailbox.close();
        self.0.state.mark_stopped();
        if thread::panicking() {
            error!(worker = %self.0.name, "worker processor panicked");
        } else {
            debug!(worker = %self.0.name, "worker stopped");
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<C: Catalog, T> Drop for ConsumerWorker<C, T> {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.shared.stop();
            if thread.join().is_err() {
                warn!(worker = %self.shared.name, "worker dropped after processor panic");
            }
        }
        for subscription in self.subscriptions.drain(..) {
            self.broker.unsubscribe(subscription);
        }
    }
}

impl<C: Catalog, T> fmt::Debug for ConsumerWorker<C, T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ConsumerWorker")
            .field("name", &self.shared.name)
            .field("state", &self.shared.state.get())
            .field("pending", &self.shared.mailbox.len())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use super::*;

    #[derive(Debug, Clone)]
    struct Job(u32);

    #[derive(Debug, Clone)]
    struct Halt;

    crate::catalog! {
        enum Jobs => JobsKind {
            Job(Job),
            Halt(Halt),
        }
    }

    /// Тест проверяет, что без брокера воркер не создаётся.
    #[test]
    fn test_missing_broker_is_invalid_argument() {
        let result = ConsumerWorker::<Jobs, u32>::builder("orphan")
            .feed(|job: &Job| Some(job.0))
            .spawn(|_| {});

        assert!(matches!(result, Err(WorkerError::InvalidArgument(_))));
    }

    /// Тест проверяет, что пустое имя отклоняется и подписки не остаются.
    #[test]
    fn test_empty_name_is_invalid_argument() {
        let broker = Broker::<Jobs>::shared();
        let result = ConsumerWorker::<Jobs, u32>::builder("  ")
            .broker(broker.clone())
            .feed(|job: &Job| Some(job.0))
            .spawn(|_| {});

        assert!(matches!(result, Err(WorkerError::InvalidArgument(_))));
        assert_eq!(broker.total_subscribers(), 0);
    }

    /// Тест проверяет, что `finalize` без запроса остановки возвращает ошибку
    /// состояния, а повторный `finalize` тоже отклоняется.
    #[test]
    fn test_finalize_state_discipline() {
        let broker = Broker::<Jobs>::shared();
        let mut worker = ConsumerWorker::<Jobs, u32>::builder("strict")
            .broker(broker.clone())
            .feed(|job: &Job| Some(job.0))
            .spawn(|_| {})
            .unwrap();

        assert!(matches!(
            worker.finalize(),
            Err(WorkerError::InvalidState(_))
        ));

        assert!(worker.request_stop());
        assert!(!worker.request_stop());
        assert!(worker.finalize().is_ok());
        assert!(matches!(
            worker.finalize(),
            Err(WorkerError::InvalidState(_))
        ));
        assert_eq!(broker.total_subscribers(), 0);
    }

    /// Тест проверяет, что сообщение вида остановки дренирует ящик.
    #[test]
    fn test_stop_signal_drains_mailbox() {
        let broker = Broker::<Jobs>::shared();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut worker = ConsumerWorker::<Jobs, u32>::builder("drain")
            .broker(broker.clone())
            .feed(|job: &Job| Some(job.0))
            .stop_on::<Halt>()
            .spawn(move |n| {
                thread::sleep(Duration::from_millis(2));
                sink.lock().unwrap().push(n);
            })
            .unwrap();

        for n in 1..=5 {
            broker.publish(Job(n));
        }
        broker.publish(Halt);
        let late = broker.publish(Job(99));

        let report = worker.finalize().unwrap();
        assert!(worker.is_stopped());
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(report.processed, 5);
        assert_eq!(report.rejected, 1);
        assert_eq!(late.handled, 1);
    }

    /// Тест проверяет, что `map`, вернувший `None`, пропускает сообщение.
    #[test]
    fn test_feed_filter() {
        let broker = Broker::<Jobs>::shared();
        let mut worker = ConsumerWorker::<Jobs, u32>::builder("even")
            .broker(broker.clone())
            .feed(|job: &Job| (job.0 % 2 == 0).then_some(job.0))
            .spawn(|_| {})
            .unwrap();

        for n in 0..10 {
            broker.publish(Job(n));
        }
        worker.request_stop();
        assert_eq!(worker.finalize().unwrap().processed, 5);
    }

    /// Тест проверяет, что паника обработки возвращается из `finalize`.
    #[test]
    fn test_processor_panic_is_reported() {
        let broker = Broker::<Jobs>::shared();
        let mut worker = ConsumerWorker::<Jobs, u32>::builder("fragile")
            .broker(broker.clone())
            .feed(|job: &Job| Some(job.0))
            .spawn(|n| {
                if n == 3 {
                    panic!("cannot process 3");
                }
            })
            .unwrap();

        broker.publish(Job(3));
        while !worker.is_stopped() {
            thread::sleep(Duration::from_millis(1));
        }

        let err = worker.finalize().unwrap_err();
        assert_eq!(
            err,
            WorkerError::ProcessorPanicked {
                name: "fragile".into(),
                reason: "cannot process 3".into(),
            }
        );
    }

    /// Тест проверяет, что drop без `finalize` дренирует ящик и снимает
    /// подписки.
    #[test]
    fn test_drop_drains_and_detaches() {
        let broker = Broker::<Jobs>::shared();
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();

        {
            let _worker = ConsumerWorker::<Jobs, u32>::builder("scoped")
                .broker(broker.clone())
                .feed(|job: &Job| Some(job.0))
                .spawn(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();

            for n in 0..20 {
                broker.publish(Job(n));
            }
        }

        assert_eq!(count.load(Ordering::SeqCst), 20);
        assert_eq!(broker.total_subscribers(), 0);
    }
}
