use std::{collections::VecDeque, mem};

use parking_lot::{Condvar, Mutex};

/// Почтовый ящик воркера: неограниченная FIFO-очередь с флагом закрытия.
///
/// Производитель (обработчик брокера в потоке публикующего) только кладёт
/// элемент и будит потребителя. Потребитель забирает всё накопленное одним
/// батчем и обрабатывает его уже без блокировки.
#[derive(Debug)]
pub struct Mailbox<T> {
    inner: Mutex<Inner<T>>,
    ready: Condvar,
}

#[derive(Debug)]
struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> Mailbox<T> {
    /// Создаёт пустой открытый ящик.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Кладёт элемент в ящик и будит потребителя. Не блокируется дольше,
    /// чем на захват внутренней блокировки.
    ///
    /// # Возвращает
    /// - `true`, если элемент принят
    /// - `false`, если ящик уже закрыт
    pub fn push(
        &self,
        item: T,
    ) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        inner.items.push_back(item);
        drop(inner);

        self.ready.notify_one();
        true
    }

    /// Закрывает ящик для новых элементов. Уже накопленное остаётся.
    ///
    /// # Возвращает
    /// - `true`, если ящик закрыл именно этот вызов
    pub fn close(&self) -> bool {
        let mut inner = self.inner.lock();
        let first = !inner.closed;
        inner.closed = true;
        drop(inner);

        self.ready.notify_all();
        first
    }

    /// Блокируется, пока в ящике нет элементов и он не закрыт, и забирает
    /// всё накопленное целиком.
    ///
    /// # Возвращает
    /// - `Some(batch)`: непустой батч в порядке поступления
    /// - `None`: ящик закрыт и пуст, потребителю пора завершаться
    pub fn wait_batch(&self) -> Option<VecDeque<T>> {
        let mut inner = self.inner.lock();
        while inner.items.is_empty() && !inner.closed {
            self.ready.wait(&mut inner);
        }

        if inner.items.is_empty() {
            None
        } else {
            Some(mem::take(&mut inner.items))
        }
    }

    /// Количество накопленных, но ещё не забранных элементов.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
