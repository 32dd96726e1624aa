use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use parking_lot::RwLock;

use super::{subscription::Slot, Catalog};

/// Результат одного вызова обработчика.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Invocation {
    /// Обработчик отработал.
    Handled,
    /// Сообщение не подошло обработчику (чужой вид).
    Skipped,
    /// Владелец обработчика уничтожен, запись можно удалить.
    Detached,
}

/// Стёртый по типу обработчик, принимающий сообщение каталога.
pub(crate) type Handler<C> = Arc<dyn Fn(&C) -> Invocation + Send + Sync>;

/// Список обработчиков одного слота.
///
/// Ключ: порядковый номер регистрации, поэтому обход `BTreeMap` идёт в
/// порядке вызовов `subscribe`. Список разделяется через `Arc`: публикация
/// забирает снимок, а изменение идёт через `Arc::make_mut` (copy-on-write),
/// так что снимок, по которому идёт рассылка, никогда не меняется под ней.
pub(crate) type HandlerList<C> = Arc<BTreeMap<u64, Handler<C>>>;

/// Снимок обработчиков, снятый под блокировкой для одной публикации.
pub(crate) struct Snapshot<C> {
    /// Обработчики вида (если вид кто-то слушает).
    pub handlers: Option<HandlerList<C>>,
    /// Наблюдатели всех видов.
    pub taps: HandlerList<C>,
}

struct Tables<C: Catalog> {
    by_kind: HashMap<C::Kind, HandlerList<C>>,
    taps: HandlerList<C>,
    /// Последний выданный номер регистрации.
    last_id: u64,
}

/// Реестр подписок брокера.
///
/// Все изменения (`insert`/`remove`) сериализуются блокировкой записи.
/// Публикация берёт блокировку чтения ровно на время клонирования `Arc`
/// снимка и вызывает обработчики уже без блокировки.
pub(crate) struct Registry<C: Catalog> {
    tables: RwLock<Tables<C>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<C: Catalog> Registry<C> {
    /// Создаёт пустой реестр.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                by_kind: HashMap::new(),
                taps: Arc::new(BTreeMap::new()),
                last_id: 0,
            }),
        }
    }

    /// Добавляет обработчик в конец списка слота.
    ///
    /// # Возвращает
    /// - Порядковый номер регистрации (уникален в пределах реестра).
    pub fn insert(
        &self,
        slot: Slot<C::Kind>,
        handler: Handler<C>,
    ) -> u64 {
        let mut tables = self.tables.write();
        tables.last_id += 1;
        let id = tables.last_id;

        let list = match slot {
            Slot::Kind(kind) => tables.by_kind.entry(kind).or_default(),
            Slot::Any => &mut tables.taps,
        };
        Arc::make_mut(list).insert(id, handler);

        id
    }

    /// Удаляет регистрацию по номеру.
    ///
    /// # Возвращает
    /// - `true`, если запись была удалена
    /// - `false`, если слот или запись отсутствуют
    pub fn remove(
        &self,
        slot: Slot<C::Kind>,
        id: u64,
    ) -> bool {
        let mut tables = self.tables.write();

        match slot {
            Slot::Kind(kind) => {
                let Some(list) = tables.by_kind.get_mut(&kind) else {
                    return false;
                };
                if !list.contains_key(&id) {
                    return false;
                }
                Arc::make_mut(list).remove(&id);
                if list.is_empty() {
                    tables.by_kind.remove(&kind);
                }
                true
            }
            Slot::Any => {
                if !tables.taps.contains_key(&id) {
                    return false;
                }
                Arc::make_mut(&mut tables.taps).remove(&id);
                true
            }
        }
    }

    /// Снимает снимок обработчиков для рассылки сообщения вида `kind`.
    pub fn snapshot(
        &self,
        kind: C::Kind,
    ) -> Snapshot<C> {
        let tables = self.tables.read();
        Snapshot {
            handlers: tables.by_kind.get(&kind).cloned(),
            taps: tables.taps.clone(),
        }
    }

    /// Возвращает количество обработчиков вида.
    pub fn count(
        &self,
        kind: C::Kind,
    ) -> usize {
        self.tables
            .read()
            .by_kind
            .get(&kind)
            .map_or(0, |list| list.len())
    }

    /// Возвращает количество наблюдателей всех видов.
    pub fn tap_count(&self) -> usize {
        self.tables.read().taps.len()
    }

    /// Возвращает общее количество регистраций.
    pub fn total(&self) -> usize {
        let tables = self.tables.read();
        tables.by_kind.values().map(|list| list.len()).sum::<usize>() + tables.taps.len()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
