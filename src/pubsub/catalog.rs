//! Каталог сообщений: закрытое множество видов, с которым работает брокер.
//!
//! Каталог объявляется один раз макросом [`catalog!`](crate::catalog) и
//! превращается в enum-сумму всех видов, отдельный enum-тег `Kind` и набор
//! реализаций [`Member`]. Брокер параметризуется каталогом, поэтому попытка
//! подписаться или опубликовать тип, которого нет в каталоге, отсекается на
//! этапе компиляции.

use std::{fmt, hash::Hash};

/// Закрытое множество видов сообщений одного брокера.
///
/// Реализуется макросом [`catalog!`](crate::catalog), вручную реализовывать
/// не требуется.
pub trait Catalog: Clone + fmt::Debug + Send + Sync + 'static {
    /// Тег вида: дешёвый ключ реестра подписок.
    type Kind: Copy + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Все виды каталога в порядке объявления.
    const KINDS: &'static [Self::Kind];

    /// Возвращает вид конкретного сообщения.
    fn kind(&self) -> Self::Kind;
}

/// Тип, входящий в каталог `C` как один из его видов.
///
/// Ограничение `K: Member<C>` на `subscribe`/`publish` и есть статическая
/// проверка принадлежности каталогу.
pub trait Member<C: Catalog>: Clone + fmt::Debug + Send + Sync + 'static {
    /// Тег вида, под которым тип зарегистрирован в каталоге.
    const KIND: C::Kind;

    /// Оборачивает значение в сообщение каталога.
    fn wrap(self) -> C;

    /// Возвращает ссылку на полезную нагрузку, если сообщение этого вида.
    fn peek(msg: &C) -> Option<&Self>;
}

/// Объявляет каталог сообщений.
///
/// Генерирует:
/// - enum-сумму `$name` с вариантом на каждый вид;
/// - enum-тег `$kind` (`Copy + Eq + Hash + Display`);
/// - реализацию [`Catalog`] для `$name`;
/// - реализации [`Member<$name>`](Member) и `From<$ty> for $name` для каждого
///   вида.
///
/// Повтор одного и того же типа в каталоге приводит к конфликту реализаций
/// `Member` и не компилируется.
///
/// ```ignore
/// #[derive(Debug, Clone)]
/// pub struct Ping;
///
/// #[derive(Debug, Clone)]
/// pub struct Text(pub String);
///
/// fabric::catalog! {
///     pub enum Message => MessageKind {
///         Ping(Ping),
///         Text(Text),
///     }
/// }
/// ```
#[macro_export]
macro_rules! catalog {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident => $kind:ident {
            $( $(#[$vmeta:meta])* $variant:ident ( $ty:ty ) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant($ty), )+
        }

        #[doc = concat!("Тег вида сообщения каталога [`", stringify!($name), "`].")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $kind {
            $( $variant, )+
        }

        impl $kind {
            /// Имя вида, как оно объявлено в каталоге.
            pub const fn name(self) -> &'static str {
                match self {
                    $( $kind::$variant => stringify!($variant), )+
                }
            }
        }

        impl ::std::fmt::Display for $kind {
            fn fmt(
                &self,
                f: &mut ::std::fmt::Formatter<'_>,
            ) -> ::std::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl $crate::pubsub::Catalog for $name {
            type Kind = $kind;

            const KINDS: &'static [$kind] = &[ $( $kind::$variant, )+ ];

            fn kind(&self) -> $kind {
                match self {
                    $( $name::$variant(_) => $kind::$variant, )+
                }
            }
        }

        $(
            impl $crate::pubsub::Member<$name> for $ty {
                const KIND: $kind = $kind::$variant;

                fn wrap(self) -> $name {
                    $name::$variant(self)
                }

                fn peek(msg: &$name) -> ::std::option::Option<&Self> {
                    match msg {
                        $name::$variant(inner) => ::std::option::Option::Some(inner),
                        #[allow(unreachable_patterns)]
                        _ => ::std::option::Option::None,
                    }
                }
            }

            impl ::std::convert::From<$ty> for $name {
                fn from(value: $ty) -> Self {
                    $name::$variant(value)
                }
            }
        )+
    };
}
