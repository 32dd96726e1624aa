//! Подсистема Publish–Subscribe (pub/sub).
//!
//! Этот модуль реализует типизированный внутрипроцессный брокер сообщений:
//!
//! - `catalog`: закрытый каталог видов сообщений и макрос `catalog!`.
//! - `registry` (приватный): реестр обработчиков по видам со снимками
//!   copy-on-write.
//! - `subscription`: непрозрачный дескриптор подписки.
//! - `broker`: подписка, отписка и синхронная рассылка.
//!
//! Публичный API переэкспортирует:
//! - `broker::*`
//! - `catalog::*`
//! - `subscription::Subscription`

pub mod broker;
pub mod catalog;
mod registry;
pub mod subscription;

pub use broker::*;
pub use catalog::*;
pub use subscription::Subscription;
