use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::messages::{Answer, DemoMessage, Question, Thanks};
use crate::pubsub::{Broker, Subscription};

/// Вопрос, который задаёт инициатор диалога.
pub const QUESTION: &str = "what is the answer to life, the universe, and everything?";

/// Ответ остальных участников.
pub const ANSWER: &str = "42";

/// Роль участника диалога.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Задаёт вопрос и благодарит за ответы.
    Asker,
    /// Отвечает на чужие вопросы.
    Responder,
}

/// Счётчики полученных участником сообщений.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticipantStats {
    pub questions: u64,
    pub answers: u64,
    pub thanks: u64,
}

/// Участник диалога «вопрос → ответ → благодарность».
///
/// Подписывает свои методы через `subscribe_method`, так что брокер не
/// продлевает жизнь участнику. При уничтожении участник снимает подписки.
pub struct Participant {
    name: String,
    role: Role,
    broker: Arc<Broker<DemoMessage>>,
    subscriptions: Mutex<Vec<Subscription<DemoMessage>>>,
    questions: AtomicU64,
    answers: AtomicU64,
    thanks: AtomicU64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Participant {
    /// Создаёт участника и подписывает его на вопросы, ответы и благодарности.
    pub fn join(
        broker: Arc<Broker<DemoMessage>>,
        name: impl Into<String>,
        role: Role,
    ) -> Arc<Self> {
        let participant = Arc::new(Self {
            name: name.into(),
            role,
            broker,
            subscriptions: Mutex::new(Vec::new()),
            questions: AtomicU64::new(0),
            answers: AtomicU64::new(0),
            thanks: AtomicU64::new(0),
        });

        let broker = &participant.broker;
        let subscriptions = vec![
            broker.subscribe_method(&participant, Self::on_question),
            broker.subscribe_method(&participant, Self::on_answer),
            broker.subscribe_method(&participant, Self::on_thanks),
        ];
        *participant.subscriptions.lock() = subscriptions;

        debug!(participant = %participant.name, ?role, "participant joined");
        participant
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Начинает диалог. Участник без роли `Asker` ничего не делает.
    pub fn work(&self) {
        if self.role != Role::Asker {
            return;
        }
        info!(participant = %self.name, "sending the question out");
        self.broker.publish(Question::new(&self.name, QUESTION));
    }

    pub fn stats(&self) -> ParticipantStats {
        ParticipantStats {
            questions: self.questions.load(Ordering::Relaxed),
            answers: self.answers.load(Ordering::Relaxed),
            thanks: self.thanks.load(Ordering::Relaxed),
        }
    }

    /// Снимает все подписки участника.
    ///
    /// # Возвращает
    /// - количество действительно снятых подписок
    pub fn leave(&self) -> usize {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        subscriptions
            .into_iter()
            .map(|subscription| self.broker.unsubscribe(subscription))
            .filter(|removed| *removed)
            .count()
    }

    fn on_question(
        &self,
        msg: &Question,
    ) {
        if self.role == Role::Asker || msg.source == self.name {
            return;
        }
        self.questions.fetch_add(1, Ordering::Relaxed);
        info!(participant = %self.name, from = %msg.source, content = %msg.content, "received question");
        self.broker.publish(Answer::new(&self.name, ANSWER));
    }

    fn on_answer(
        &self,
        msg: &Answer,
    ) {
        if self.role != Role::Asker {
            return;
        }
        self.answers.fetch_add(1, Ordering::Relaxed);
        info!(participant = %self.name, from = %msg.source, content = %msg.content, "received answer");
        self.broker
            .publish(Thanks::new(&self.name, "Understood, thanks!"));
    }

    fn on_thanks(
        &self,
        msg: &Thanks,
    ) {
        if msg.source == self.name {
            return;
        }
        self.thanks.fetch_add(1, Ordering::Relaxed);
        info!(participant = %self.name, from = %msg.source, content = %msg.content, "received thanks");
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Drop for Participant {
    fn drop(&mut self) {
        let removed = self.leave();
        debug!(participant = %self.name, removed, "participant left");
    }
}

/// Итог одного диалога.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationReport {
    /// Статистика по участникам в порядке их объявления.
    pub participants: Vec<(String, ParticipantStats)>,
}

impl ConversationReport {
    /// Суммарное количество полученных сообщений.
    pub fn total_received(&self) -> u64 {
        self.participants
            .iter()
            .map(|(_, s)| s.questions + s.answers + s.thanks)
            .sum()
    }
}

/// Проводит диалог: первый участник спрашивает, остальные отвечают.
pub fn run_conversation(
    broker: &Arc<Broker<DemoMessage>>,
    names: &[String],
) -> ConversationReport {
    let participants: Vec<Arc<Participant>> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let role = if i == 0 { Role::Asker } else { Role::Responder };
            Participant::join(Arc::clone(broker), name.clone(), role)
        })
        .collect();

    for participant in &participants {
        participant.work();
    }

    ConversationReport {
        participants: participants
            .iter()
            .map(|p| (p.name().to_owned(), p.stats()))
            .collect(),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
