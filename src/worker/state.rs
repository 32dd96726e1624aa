use std::{
    fmt,
    sync::atomic::{AtomicU8, Ordering},
};

/// Состояние consumer-воркера.
///
/// Переходы только вперёд: `Starting → Running → Draining → Stopped`.
/// `Starting → Draining` допустим, если остановку запросили раньше, чем
/// фоновый поток успел стартовать.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum WorkerState {
    /// Поток создан, но ещё не ждёт почтовый ящик.
    Starting = 0,
    /// Поток ждёт и обрабатывает сообщения.
    Running = 1,
    /// Остановка запрошена, дообрабатывается уже накопленное.
    Draining = 2,
    /// Поток завершён.
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => WorkerState::Starting,
            1 => WorkerState::Running,
            2 => WorkerState::Draining,
            _ => WorkerState::Stopped,
        }
    }

    /// Воркер ещё принимает новые сообщения.
    pub fn is_accepting(self) -> bool {
        matches!(self, WorkerState::Starting | WorkerState::Running)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            WorkerState::Starting => "starting",
            WorkerState::Running => "running",
            WorkerState::Draining => "draining",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Атомарная ячейка состояния, разделяемая потоком воркера и его хэндлом.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(WorkerState::Starting as u8))
    }

    pub fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// `Starting → Running`. Не трогает более позднее состояние.
    pub fn mark_running(&self) -> bool {
        self.0
            .compare_exchange(
                WorkerState::Starting as u8,
                WorkerState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// `Starting | Running → Draining`.
    ///
    /// # Возвращает
    /// - `true`, если переход выполнил именно этот вызов
    pub fn begin_drain(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                WorkerState::from_u8(raw)
                    .is_accepting()
                    .then_some(WorkerState::Draining as u8)
            })
            .is_ok()
    }

    pub fn mark_stopped(&self) {
        self.0.store(WorkerState::Stopped as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет полный прямой путь состояний.
    #[test]
    fn test_forward_transitions() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), WorkerState::Starting);

        assert!(cell.mark_running());
        assert_eq!(cell.get(), WorkerState::Running);

        assert!(cell.begin_drain());
        assert_eq!(cell.get(), WorkerState::Draining);

        cell.mark_stopped();
        assert_eq!(cell.get(), WorkerState::Stopped);
    }

    /// Тест проверяет, что ранний запрос остановки не перетирается стартом
    /// потока.
    #[test]
    fn test_drain_before_running() {
        let cell = StateCell::new();
        assert!(cell.begin_drain());
        assert!(!cell.mark_running());
        assert_eq!(cell.get(), WorkerState::Draining);
    }

    /// Тест проверяет идемпотентность запроса остановки.
    #[test]
    fn test_drain_is_idempotent() {
        let cell = StateCell::new();
        cell.mark_running();
        assert!(cell.begin_drain());
        assert!(!cell.begin_drain());

        cell.mark_stopped();
        assert!(!cell.begin_drain());
        assert_eq!(cell.get(), WorkerState::Stopped);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(WorkerState::Draining.to_string(), "draining");
        assert!(WorkerState::Running.is_accepting());
        assert!(!WorkerState::Stopped.is_accepting());
    }
}
