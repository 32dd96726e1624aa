use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use tracing::{debug, error, trace, warn};

use super::{
    registry::{Handler, Invocation, Registry},
    subscription::Slot,
    Catalog, Member, Subscription,
};
use crate::config::BrokerConfig;

/// Источник идентификаторов брокеров внутри процесса.
static NEXT_BROKER_ID: AtomicU64 = AtomicU64::new(1);

/// Типизированный брокер Pub/Sub сообщений.
///
/// Поддерживает:
/// - Подписку на конкретный вид сообщений каталога `C`
/// - Подписку связанного метода компонента (через `Weak`)
/// - Наблюдателей всех видов каталога
/// - Синхронную рассылку в порядке подписки
/// - Статистику публикаций и сбоев обработчиков
///
/// Брокер разделяется между компонентами через `Arc<Broker<C>>` и живёт,
/// пока жив последний владелец.
pub struct Broker<C: Catalog> {
    /// Идентификатор брокера (привязывает к нему выданные дескрипторы)
    id: u64,
    /// Реестр подписок
    registry: Registry<C>,
    /// Настройки брокера
    config: BrokerConfig,
    /// Общее количество вызовов `publish`
    published: AtomicU64,
    /// Количество успешных вызовов обработчиков видов
    delivered: AtomicU64,
    /// Количество публикаций без обработчиков своего вида
    unhandled: AtomicU64,
    /// Количество обработчиков, завершившихся паникой
    handler_failures: AtomicU64,
}

/// Итог одной публикации.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery<K> {
    /// Вид опубликованного сообщения.
    pub kind: K,
    /// Сколько обработчиков вида отработало.
    pub handled: usize,
    /// Сколько наблюдателей всех видов отработало.
    pub observed: usize,
    /// Сколько обработчиков завершилось паникой.
    pub failed: usize,
}

/// Снимок счётчиков брокера.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub published: u64,
    pub delivered: u64,
    pub unhandled: u64,
    pub handler_failures: u64,
}

impl<K> Delivery<K> {
    fn new(kind: K) -> Self {
        Self {
            kind,
            handled: 0,
            observed: 0,
            failed: 0,
        }
    }

    /// Сообщение не дошло ни до одного обработчика своего вида.
    ///
    /// Это штатная ситуация, а не ошибка: вид просто никто не слушает.
    pub fn is_unhandled(&self) -> bool {
        self.handled == 0 && self.failed == 0
    }
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<C: Catalog> Broker<C> {
    /// Создаёт брокер с настройками по умолчанию.
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    /// Создаёт брокер с заданными настройками.
    pub fn with_config(config: BrokerConfig) -> Self {
        let id = NEXT_BROKER_ID.fetch_add(1, Ordering::Relaxed);
        debug!(broker = id, kinds = C::KINDS.len(), "broker created");
        Self {
            id,
            registry: Registry::new(),
            config,
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            unhandled: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
        }
    }

    /// Создаёт брокер, сразу обёрнутый в `Arc` для совместного владения.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Подписывает обработчик на сообщения вида `K`.
    ///
    /// Каждый обработчик получает ссылку на собственную копию значения:
    /// изменения через внутреннюю изменяемость не видны другим
    /// обработчикам и публикующему. Вызов идёт в потоке публикующего,
    /// поэтому обработчик должен быть быстрым.
    pub fn subscribe<K, F>(
        &self,
        handler: F,
    ) -> Subscription<C>
    where
        K: Member<C>,
        F: Fn(&K) + Send + Sync + 'static,
    {
        self.register(
            Slot::Kind(K::KIND),
            Arc::new(move |msg: &C| match K::peek(msg) {
                Some(payload) => {
                    handler(&payload.clone());
                    Invocation::Handled
                }
                None => Invocation::Skipped,
            }),
        )
    }

    /// Подписывает обработчик, получающий собственную копию сообщения.
    ///
    /// Каждый обработчик получает свежий клон, поэтому может изменять или
    /// удерживать значение, не влияя на остальных.
    pub fn subscribe_owned<K, F>(
        &self,
        handler: F,
    ) -> Subscription<C>
    where
        K: Member<C>,
        F: Fn(K) + Send + Sync + 'static,
    {
        self.register(
            Slot::Kind(K::KIND),
            Arc::new(move |msg: &C| match K::peek(msg) {
                Some(payload) => {
                    handler(payload.clone());
                    Invocation::Handled
                }
                None => Invocation::Skipped,
            }),
        )
    }

    /// Подписывает метод компонента на сообщения вида `K`.
    ///
    /// Брокер удерживает только `Weak` ссылку на компонент: цикла владения
    /// между компонентом и брокером не возникает. После уничтожения
    /// компонента запись пропускается и удаляется при ближайшей публикации.
    /// Метод, как и в [`Broker::subscribe`], получает собственную копию.
    pub fn subscribe_method<K, T, M>(
        &self,
        instance: &Arc<T>,
        method: M,
    ) -> Subscription<C>
    where
        K: Member<C>,
        T: Send + Sync + 'static,
        M: Fn(&T, &K) + Send + Sync + 'static,
    {
        let instance: Weak<T> = Arc::downgrade(instance);
        self.register(
            Slot::Kind(K::KIND),
            Arc::new(move |msg: &C| {
                let Some(target) = instance.upgrade() else {
                    return Invocation::Detached;
                };
                match K::peek(msg) {
                    Some(payload) => {
                        method(&target, &payload.clone());
                        Invocation::Handled
                    }
                    None => Invocation::Skipped,
                }
            }),
        )
    }

    /// Подписывает наблюдателя, получающего сообщения всех видов.
    ///
    /// Наблюдатели вызываются после обработчиков вида, получают свою копию
    /// сообщения и не влияют на [`Delivery::is_unhandled`].
    pub fn subscribe_any<F>(
        &self,
        observer: F,
    ) -> Subscription<C>
    where
        F: Fn(&C) + Send + Sync + 'static,
    {
        self.register(
            Slot::Any,
            Arc::new(move |msg: &C| {
                observer(&msg.clone());
                Invocation::Handled
            }),
        )
    }

    /// Отписывает обработчик, идентифицированный дескриптором.
    ///
    /// # Возвращает
    /// - `true`, если регистрация была удалена
    /// - `false`, если её уже нет или дескриптор выдан другим брокером
    pub fn unsubscribe(
        &self,
        subscription: Subscription<C>,
    ) -> bool {
        if subscription.broker != self.id {
            warn!(
                broker = self.id,
                owner = subscription.broker,
                "subscription handle belongs to another broker"
            );
            return false;
        }

        let removed = self.registry.remove(subscription.slot, subscription.id);
        debug!(
            broker = self.id,
            slot = ?subscription.slot,
            id = subscription.id,
            removed,
            "handler unsubscribed"
        );
        removed
    }

    /// Публикует сообщение.
    ///
    /// Работает в три этапа:
    /// 1. Под блокировкой чтения снимает снимок обработчиков вида
    /// 2. Без блокировки вызывает обработчики вида в порядке подписки
    /// 3. Вызывает наблюдателей всех видов
    ///
    /// Все вызовы синхронны и выполняются в потоке вызывающего до возврата.
    /// Обработчик может повторно публиковать и менять подписки того же
    /// брокера: рассылка идёт по неизменяемому снимку. Паника обработчика
    /// изолируется, логируется и учитывается в `Delivery::failed`,
    /// остальные обработчики всё равно вызываются.
    pub fn publish<M>(
        &self,
        msg: M,
    ) -> Delivery<C::Kind>
    where
        M: Into<C>,
    {
        let msg: C = msg.into();
        let kind = msg.kind();
        self.published.fetch_add(1, Ordering::Relaxed);

        let snapshot = self.registry.snapshot(kind);
        let mut delivery = Delivery::new(kind);
        let mut detached = Vec::new();

        if let Some(handlers) = snapshot.handlers.as_deref() {
            for (&id, handler) in handlers {
                match self.invoke(kind, id, handler, &msg) {
                    Some(Invocation::Handled) => delivery.handled += 1,
                    Some(Invocation::Skipped) => {}
                    Some(Invocation::Detached) => detached.push(id),
                    None => delivery.failed += 1,
                }
            }
        }

        // Обработчики удалённых компонентов тоже не считаются получателями.
        if delivery.is_unhandled() {
            self.unhandled.fetch_add(1, Ordering::Relaxed);
            if self.config.warn_on_unhandled {
                warn!(broker = self.id, %kind, "no handlers for message kind");
            } else {
                trace!(broker = self.id, %kind, "no handlers for message kind");
            }
        }

        for (&id, observer) in snapshot.taps.iter() {
            match self.invoke(kind, id, observer, &msg) {
                Some(_) => delivery.observed += 1,
                None => delivery.failed += 1,
            }
        }

        for id in detached {
            if self.registry.remove(Slot::Kind(kind), id) {
                debug!(broker = self.id, %kind, id, "pruned handler of dropped component");
            }
        }

        self.delivered
            .fetch_add(delivery.handled as u64, Ordering::Relaxed);
        if delivery.failed > 0 {
            self.handler_failures
                .fetch_add(delivery.failed as u64, Ordering::Relaxed);
        }

        trace!(
            broker = self.id,
            %kind,
            handled = delivery.handled,
            observed = delivery.observed,
            failed = delivery.failed,
            "message dispatched"
        );

        delivery
    }

    /// Возвращает количество обработчиков вида.
    pub fn subscriber_count(
        &self,
        kind: C::Kind,
    ) -> usize {
        self.registry.count(kind)
    }

    /// Возвращает количество наблюдателей всех видов.
    pub fn observer_count(&self) -> usize {
        self.registry.tap_count()
    }

    /// Возвращает общее количество регистраций.
    pub fn total_subscribers(&self) -> usize {
        self.registry.total()
    }

    /// Возвращает снимок счётчиков.
    pub fn stats(&self) -> BrokerStats {
        BrokerStats {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            unhandled: self.unhandled.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }

    /// Возвращает настройки брокера.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    fn register(
        &self,
        slot: Slot<C::Kind>,
        handler: Handler<C>,
    ) -> Subscription<C> {
        let id = self.registry.insert(slot, handler);
        debug!(broker = self.id, ?slot, id, "handler subscribed");
        Subscription::new(self.id, slot, id)
    }

    fn invoke(
        &self,
        kind: C::Kind,
        id: u64,
        handler: &Handler<C>,
        msg: &C,
    ) -> Option<Invocation> {
        match panic::catch_unwind(AssertUnwindSafe(|| handler(msg))) {
            Ok(outcome) => Some(outcome),
            Err(payload) => {
                error!(
                    broker = self.id,
                    %kind,
                    id,
                    reason = panic_reason(&*payload),
                    "handler panicked, continuing fan-out"
                );
                None
            }
        }
    }
}

pub(crate) fn panic_reason(payload: &(dyn Any + Send)) -> &str {
    if let Some(reason) = payload.downcast_ref::<&'static str>() {
        reason
    } else if let Some(reason) = payload.downcast_ref::<String>() {
        reason.as_str()
    } else {
        "unknown panic payload"
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<C: Catalog> Default for Broker<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Catalog> fmt::Debug for Broker<C> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Broker")
            .field("id", &self.id)
            .field("subscribers", &self.registry.total())
            .field("stats", &self.stats())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
