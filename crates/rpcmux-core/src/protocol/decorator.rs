//! Forwarding wrappers for composing protocol behavior.
//!
//! A decorator implements [`Decorate`] to expose the protocol it wraps, then
//! uses [`forward_protocol!`](crate::forward_protocol) inside its `Protocol`
//! impl to forward everything except the message-header pair, writing only the
//! operations whose behavior changes by hand:
//!
//! ```rust,ignore
//! struct Tracing<P> { inner: P }
//!
//! impl<P: Protocol> Decorate for Tracing<P> {
//!     type Inner = P;
//!     fn inner(&mut self) -> &mut P { &mut self.inner }
//! }
//!
//! impl<P: Protocol> Protocol for Tracing<P> {
//!     fn write_message_begin(&mut self, name: &str, ty: MessageType, seq_id: i32) -> Result<()> {
//!         tracing::debug!("-> {}", name);
//!         self.inner.write_message_begin(name, ty, seq_id)
//!     }
//!
//!     fn read_message_begin(&mut self) -> Result<MessageHeader> {
//!         self.inner.read_message_begin()
//!     }
//!
//!     rpcmux_core::forward_protocol!();
//! }
//! ```

use super::Protocol;

/// Access to the protocol a decorator wraps.
pub trait Decorate {
    type Inner: Protocol + ?Sized;

    fn inner(&mut self) -> &mut Self::Inner;
}

/// Generate `Protocol` methods that forward to [`Decorate::inner`].
///
/// `forward_protocol!()` forwards every operation except
/// `write_message_begin` and `read_message_begin`; `forward_protocol!(all)`
/// forwards those two as well.
#[macro_export]
macro_rules! forward_protocol {
    (all) => {
        fn write_message_begin(
            &mut self,
            name: &str,
            message_type: $crate::protocol::MessageType,
            seq_id: i32,
        ) -> $crate::Result<()> {
            $crate::protocol::Protocol::write_message_begin(
                $crate::protocol::Decorate::inner(self),
                name,
                message_type,
                seq_id,
            )
        }

        fn read_message_begin(&mut self) -> $crate::Result<$crate::protocol::MessageHeader> {
            $crate::protocol::Protocol::read_message_begin($crate::protocol::Decorate::inner(self))
        }

        $crate::forward_protocol!();
    };
    () => {
        $crate::forward_protocol!(@forward
            fn write_message_end() -> ();
            fn write_struct_begin(name: &str) -> ();
            fn write_struct_end() -> ();
            fn write_field_begin(name: &str, field_type: $crate::protocol::FieldType, id: i16) -> ();
            fn write_field_end() -> ();
            fn write_field_stop() -> ();
            fn write_map_begin(
                key_type: $crate::protocol::FieldType,
                value_type: $crate::protocol::FieldType,
                size: usize
            ) -> ();
            fn write_map_end() -> ();
            fn write_list_begin(element_type: $crate::protocol::FieldType, size: usize) -> ();
            fn write_list_end() -> ();
            fn write_set_begin(element_type: $crate::protocol::FieldType, size: usize) -> ();
            fn write_set_end() -> ();
            fn write_bool(value: bool) -> ();
            fn write_byte(value: i8) -> ();
            fn write_i16(value: i16) -> ();
            fn write_i32(value: i32) -> ();
            fn write_i64(value: i64) -> ();
            fn write_double(value: f64) -> ();
            fn write_string(value: &str) -> ();
            fn write_binary(value: &[u8]) -> ();
            fn read_message_end() -> ();
            fn read_struct_begin() -> String;
            fn read_struct_end() -> ();
            fn read_field_begin() -> $crate::protocol::FieldHeader;
            fn read_field_end() -> ();
            fn read_map_begin() -> $crate::protocol::MapHeader;
            fn read_map_end() -> ();
            fn read_list_begin() -> $crate::protocol::CollectionHeader;
            fn read_list_end() -> ();
            fn read_set_begin() -> $crate::protocol::CollectionHeader;
            fn read_set_end() -> ();
            fn read_bool() -> bool;
            fn read_byte() -> i8;
            fn read_i16() -> i16;
            fn read_i32() -> i32;
            fn read_i64() -> i64;
            fn read_double() -> f64;
            fn read_string() -> String;
            fn read_binary() -> Vec<u8>;
            fn skip(field_type: $crate::protocol::FieldType) -> ();
            fn flush() -> ();
        );

        fn transport(&mut self) -> &mut dyn $crate::transport::Transport {
            $crate::protocol::Protocol::transport($crate::protocol::Decorate::inner(self))
        }
    };
    (@forward $(fn $name:ident($($arg:ident: $ty:ty),*) -> $ret:ty;)*) => {
        $(
            fn $name(&mut self $(, $arg: $ty)*) -> $crate::Result<$ret> {
                $crate::protocol::Protocol::$name($crate::protocol::Decorate::inner(self) $(, $arg)*)
            }
        )*
    };
}

/// Pass-through decorator: forwards every operation unchanged.
///
/// Useful as a starting point and as the identity element when composing
/// decorators generically.
#[derive(Debug)]
pub struct ProtocolDecorator<P> {
    inner: P,
}

impl<P: Protocol> ProtocolDecorator<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: Protocol> Decorate for ProtocolDecorator<P> {
    type Inner = P;

    fn inner(&mut self) -> &mut P {
        &mut self.inner
    }
}

impl<P: Protocol> Protocol for ProtocolDecorator<P> {
    crate::forward_protocol!(all);
}

// A borrowed or boxed protocol is a transparent decorator over its target.

impl<P: Protocol + ?Sized> Decorate for &mut P {
    type Inner = P;

    fn inner(&mut self) -> &mut P {
        &mut **self
    }
}

impl<P: Protocol + ?Sized> Protocol for &mut P {
    crate::forward_protocol!(all);
}

impl<P: Protocol + ?Sized> Decorate for Box<P> {
    type Inner = P;

    fn inner(&mut self) -> &mut P {
        &mut **self
    }
}

impl<P: Protocol + ?Sized> Protocol for Box<P> {
    crate::forward_protocol!(all);
}
