//! Client-side service tagging.

use super::tag_name;
use crate::protocol::{Decorate, MessageHeader, MessageType, Protocol, ProtocolFactory};
use crate::transport::Transport;
use crate::Result;

/// Decorator that prefixes outbound call names with a service name.
///
/// Only CALL and ONEWAY messages are tagged; replies and exceptions pass
/// through unchanged, as does every other operation. Several multiplexed
/// protocols can share one underlying protocol, one per service:
///
/// ```rust,ignore
/// let mut protocol = BinaryProtocol::new(transport);
/// let mut calculator = MultiplexedProtocol::new(&mut protocol, "Calculator");
/// calculator.write_message_begin("add", MessageType::Call, 1)?; // "Calculator:add"
/// ```
///
/// The service name must be non-empty and must not contain the separator.
#[derive(Debug)]
pub struct MultiplexedProtocol<P> {
    inner: P,
    service_name: String,
}

impl<P: Protocol> MultiplexedProtocol<P> {
    pub fn new(inner: P, service_name: impl Into<String>) -> Self {
        Self {
            inner,
            service_name: service_name.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: Protocol> Decorate for MultiplexedProtocol<P> {
    type Inner = P;

    fn inner(&mut self) -> &mut P {
        &mut self.inner
    }
}

impl<P: Protocol> Protocol for MultiplexedProtocol<P> {
    fn write_message_begin(
        &mut self,
        name: &str,
        message_type: MessageType,
        seq_id: i32,
    ) -> Result<()> {
        if message_type.is_request() {
            let tagged = tag_name(&self.service_name, name);
            self.inner.write_message_begin(&tagged, message_type, seq_id)
        } else {
            self.inner.write_message_begin(name, message_type, seq_id)
        }
    }

    fn read_message_begin(&mut self) -> Result<MessageHeader> {
        self.inner.read_message_begin()
    }

    crate::forward_protocol!();
}

/// Wraps every protocol from an inner factory in a [`MultiplexedProtocol`].
#[derive(Debug, Clone)]
pub struct MultiplexedProtocolFactory<F> {
    inner: F,
    service_name: String,
}

impl<F: ProtocolFactory> MultiplexedProtocolFactory<F> {
    pub fn new(inner: F, service_name: impl Into<String>) -> Self {
        Self {
            inner,
            service_name: service_name.into(),
        }
    }
}

impl<F: ProtocolFactory> ProtocolFactory for MultiplexedProtocolFactory<F> {
    fn get_protocol(&self, transport: Box<dyn Transport>) -> Box<dyn Protocol> {
        Box::new(MultiplexedProtocol::new(
            self.inner.get_protocol(transport),
            self.service_name.clone(),
        ))
    }
}
