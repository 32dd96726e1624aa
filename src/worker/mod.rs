//! Consumer-воркеры поверх брокера.
//!
//! - `mailbox`: неограниченная очередь с флагом закрытия и батчевым
//!   извлечением.
//! - `state`: жизненный цикл `Starting → Running → Draining → Stopped`.
//! - `consumer`: воркер и его построитель.

pub mod consumer;
pub mod mailbox;
pub mod state;

pub use consumer::{ConsumerWorker, WorkerBuilder, WorkerReport};
pub use mailbox::Mailbox;
pub(crate) use state::StateCell;
pub use state::WorkerState;
