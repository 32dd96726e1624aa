use std::fmt;

use super::Catalog;

/// Слот реестра, к которому относится подписка.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Slot<K> {
    /// Обработчик конкретного вида сообщений.
    Kind(K),
    /// Наблюдатель всех видов каталога.
    Any,
}

/// Непрозрачный идентификатор подписки.
///
/// Единственный способ удалить конкретную регистрацию обработчика. Дескриптор
/// не клонируется и поглощается [`Broker::unsubscribe`](super::Broker::unsubscribe),
/// поэтому повторная отписка тем же дескриптором невозможна.
///
/// Если дескриптор просто выбросить, обработчик останется подписанным до
/// уничтожения брокера.
pub struct Subscription<C: Catalog> {
    /// Идентификатор брокера, выдавшего дескриптор.
    pub(crate) broker: u64,
    /// Слот реестра.
    pub(crate) slot: Slot<C::Kind>,
    /// Порядковый номер регистрации внутри брокера.
    pub(crate) id: u64,
}

impl<C: Catalog> Subscription<C> {
    pub(crate) fn new(
        broker: u64,
        slot: Slot<C::Kind>,
        id: u64,
    ) -> Self {
        Self { broker, slot, id }
    }

    /// Вид сообщений, на который оформлена подписка.
    ///
    /// # Возвращает
    /// - `Some(kind)` для подписки на конкретный вид
    /// - `None` для наблюдателя всех видов
    pub fn kind(&self) -> Option<C::Kind> {
        match self.slot {
            Slot::Kind(kind) => Some(kind),
            Slot::Any => None,
        }
    }
}

impl<C: Catalog> fmt::Debug for Subscription<C> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("slot", &self.slot)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
