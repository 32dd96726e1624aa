use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use fabric::{catalog, Broker, Catalog};
use parking_lot::Mutex;
use proptest::prelude::*;
use rstest::rstest;

#[derive(Debug, Clone, PartialEq)]
struct Ping;

#[derive(Debug, Clone, PartialEq)]
struct Text(String);

#[derive(Debug, Clone, PartialEq)]
struct Numbers(Vec<i64>);

/// Журнал, изменяемый через разделяемую ссылку.
#[derive(Debug)]
struct Journal(Mutex<Vec<u32>>);

impl Clone for Journal {
    fn clone(&self) -> Self {
        Self(Mutex::new(self.0.lock().clone()))
    }
}

catalog! {
    enum Msg => MsgKind {
        Ping(Ping),
        Text(Text),
        Numbers(Numbers),
        Journal(Journal),
    }
}

/// Тест проверяет, что каждый подписчик получает сообщение ровно один раз
/// и в порядке подписки.
#[rstest]
#[case(1)]
#[case(2)]
#[case(10)]
#[case(100)]
fn test_fan_out_in_subscription_order(#[case] subscribers: usize) {
    let broker: Broker<Msg> = Broker::new();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let _subs: Vec<_> = (0..subscribers)
        .map(|i| {
            let calls = calls.clone();
            broker.subscribe(move |_: &Ping| calls.lock().push(i))
        })
        .collect();

    let delivery = broker.publish(Ping);

    assert_eq!(delivery.handled, subscribers);
    assert_eq!(*calls.lock(), (0..subscribers).collect::<Vec<_>>());
}

/// Тест проверяет, что подписчик одного вида не видит сообщения других
/// видов.
#[test]
fn test_kinds_are_isolated() {
    let broker: Broker<Msg> = Broker::new();
    let pings = Arc::new(AtomicUsize::new(0));
    let texts = Arc::new(AtomicUsize::new(0));

    let _p = {
        let pings = pings.clone();
        broker.subscribe(move |_: &Ping| {
            pings.fetch_add(1, Ordering::SeqCst);
        })
    };
    let _t = {
        let texts = texts.clone();
        broker.subscribe(move |_: &Text| {
            texts.fetch_add(1, Ordering::SeqCst);
        })
    };

    broker.publish(Text("hello".into()));
    broker.publish(Text("world".into()));
    broker.publish(Ping);

    assert_eq!(pings.load(Ordering::SeqCst), 1);
    assert_eq!(texts.load(Ordering::SeqCst), 2);
    assert_eq!(broker.subscriber_count(MsgKind::Numbers), 0);
}

/// Тест проверяет, что после отписки обработчик больше не вызывается, а
/// остальные продолжают получать сообщения.
#[test]
fn test_unsubscribe_stops_delivery() {
    let broker: Broker<Msg> = Broker::new();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let sub_first = {
        let first = first.clone();
        broker.subscribe(move |_: &Ping| {
            first.fetch_add(1, Ordering::SeqCst);
        })
    };
    let _sub_second = {
        let second = second.clone();
        broker.subscribe(move |_: &Ping| {
            second.fetch_add(1, Ordering::SeqCst);
        })
    };

    broker.publish(Ping);
    assert!(broker.unsubscribe(sub_first));
    broker.publish(Ping);

    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 2);
    assert_eq!(broker.subscriber_count(MsgKind::Ping), 1);
}

/// Тест проверяет, что подписчик с собственной копией может менять её, не
/// влияя на остальных подписчиков.
#[test]
fn test_owned_copies_are_independent() {
    let broker: Broker<Msg> = Broker::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let _mutator = broker.subscribe_owned(|mut numbers: Numbers| {
        numbers.0.clear();
        assert!(numbers.0.is_empty());
    });
    let _reader = {
        let seen = seen.clone();
        broker.subscribe(move |numbers: &Numbers| seen.lock().push(numbers.0.clone()))
    };

    broker.publish(Numbers(vec![1, 2, 3]));

    assert_eq!(*seen.lock(), vec![vec![1, 2, 3]]);
}

/// Тест проверяет, что изменение значения с внутренней изменяемостью в
/// одном обработчике не видно следующему обработчику и публикующему.
#[test]
fn test_interior_mutation_is_not_shared() {
    let broker: Broker<Msg> = Broker::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let _writer = broker.subscribe(|journal: &Journal| journal.0.lock().push(99));
    let _reader = {
        let seen = seen.clone();
        broker.subscribe(move |journal: &Journal| seen.lock().push(journal.0.lock().clone()))
    };

    let original = Journal(Mutex::new(vec![1]));
    let delivery = broker.publish(original.clone());

    assert_eq!(delivery.handled, 2);
    assert_eq!(*seen.lock(), vec![vec![1]]);
    assert_eq!(*original.0.lock(), vec![1]);
}

/// Тест проверяет, что публикация вида без подписчиков не является
/// ошибкой и учитывается в статистике.
#[test]
fn test_publish_without_subscribers() {
    let broker: Broker<Msg> = Broker::new();

    let delivery = broker.publish(Text("nobody listens".into()));

    assert!(delivery.is_unhandled());
    assert_eq!(delivery.kind, MsgKind::Text);
    assert_eq!(broker.stats().unhandled, 1);
}

/// Тест проверяет, что наблюдатель всех видов видит каждое сообщение, но не
/// делает его обработанным.
#[test]
fn test_observer_sees_every_kind() {
    let broker: Broker<Msg> = Broker::new();
    let kinds = Arc::new(Mutex::new(Vec::new()));

    let _tap = {
        let kinds = kinds.clone();
        broker.subscribe_any(move |msg: &Msg| kinds.lock().push(msg.kind()))
    };

    let delivery = broker.publish(Ping);
    broker.publish(Numbers(vec![]));

    assert!(delivery.is_unhandled());
    assert_eq!(delivery.observed, 1);
    assert_eq!(*kinds.lock(), vec![MsgKind::Ping, MsgKind::Numbers]);
}

/// Тест проверяет, что паника одного обработчика не мешает остальным.
#[test]
fn test_panicking_handler_is_isolated() {
    let broker: Broker<Msg> = Broker::new();
    let after = Arc::new(AtomicUsize::new(0));

    let _bad = broker.subscribe(|_: &Ping| panic!("handler failure"));
    let _good = {
        let after = after.clone();
        broker.subscribe(move |_: &Ping| {
            after.fetch_add(1, Ordering::SeqCst);
        })
    };

    let delivery = broker.publish(Ping);

    assert_eq!(delivery.failed, 1);
    assert_eq!(delivery.handled, 1);
    assert_eq!(after.load(Ordering::SeqCst), 1);
    assert_eq!(broker.stats().handler_failures, 1);
}

proptest! {
    /// Тест проверяет, что при произвольной последовательности подписок и
    /// отписок оставшиеся обработчики вызываются в порядке подписки.
    #[test]
    fn prop_remaining_handlers_keep_order(ops in prop::collection::vec(any::<bool>(), 1..64)) {
        let broker: Broker<Msg> = Broker::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut live = Vec::new();
        let mut kept = Vec::new();

        for (i, keep) in ops.iter().enumerate() {
            let calls = calls.clone();
            let sub = broker.subscribe(move |_: &Ping| calls.lock().push(i));
            if *keep {
                live.push(i);
                kept.push(sub);
            } else {
                prop_assert!(broker.unsubscribe(sub));
            }
        }

        broker.publish(Ping);

        prop_assert_eq!(calls.lock().clone(), live);
        prop_assert_eq!(broker.subscriber_count(MsgKind::Ping), kept.len());
    }
}
