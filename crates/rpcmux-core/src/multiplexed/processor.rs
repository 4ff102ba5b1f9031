//! Server-side demultiplexing.

use super::split_name;
use crate::config::MultiplexConfig;
use crate::processor::Processor;
use crate::protocol::{Decorate, MessageHeader, MessageType, Protocol};
use crate::{MuxError, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Decorator that answers `read_message_begin` from a header read earlier.
///
/// Everything after the header streams from the wrapped protocol, so the
/// processor it is handed to decodes the rest of the message straight off the
/// wire. The stored header is handed out once; a second `read_message_begin`
/// fails with [`MuxError::HeaderConsumed`].
pub struct StoredMessageProtocol<'a> {
    inner: &'a mut dyn Protocol,
    header: Option<MessageHeader>,
}

impl<'a> StoredMessageProtocol<'a> {
    pub fn new(inner: &'a mut dyn Protocol, header: MessageHeader) -> Self {
        Self {
            inner,
            header: Some(header),
        }
    }
}

impl<'a> Decorate for StoredMessageProtocol<'a> {
    type Inner = dyn Protocol + 'a;

    fn inner(&mut self) -> &mut (dyn Protocol + 'a) {
        &mut *self.inner
    }
}

impl<'a> Protocol for StoredMessageProtocol<'a> {
    fn read_message_begin(&mut self) -> Result<MessageHeader> {
        self.header.take().ok_or(MuxError::HeaderConsumed)
    }

    fn write_message_begin(
        &mut self,
        name: &str,
        message_type: MessageType,
        seq_id: i32,
    ) -> Result<()> {
        self.inner.write_message_begin(name, message_type, seq_id)
    }

    crate::forward_protocol!();
}

/// Processor that serves several services over one connection or endpoint.
///
/// Register one processor per service, then hand this to a server:
///
/// ```rust,ignore
/// let processor = MultiplexedProcessor::new();
/// processor.register_processor("Calculator", CalculatorProcessor::new(handler))?;
/// processor.register_processor("WeatherReport", WeatherProcessor::new(weather))?;
/// ```
///
/// Each request must carry a name tagged by a [`MultiplexedProtocol`](super::MultiplexedProtocol).
/// The registry sits behind a lock, so services may also be registered while
/// requests are being served.
#[derive(Default)]
pub struct MultiplexedProcessor {
    processors: RwLock<HashMap<String, Arc<dyn Processor>>>,
}

impl MultiplexedProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor under `service_name`, replacing any earlier one.
    ///
    /// The name must match what clients pass to their `MultiplexedProtocol`.
    pub fn register_processor<P>(&self, service_name: impl Into<String>, processor: P) -> Result<()>
    where
        P: Processor + 'static,
    {
        self.register_shared(service_name, Arc::new(processor))
    }

    /// Register a processor that is shared with other owners.
    pub fn register_shared(
        &self,
        service_name: impl Into<String>,
        processor: Arc<dyn Processor>,
    ) -> Result<()> {
        let service_name = service_name.into();
        if service_name.is_empty() || service_name.contains(MultiplexConfig::SEPARATOR) {
            return Err(MuxError::InvalidServiceName { name: service_name });
        }

        let mut processors = self
            .processors
            .write()
            .map_err(|_| MuxError::Other("service registry lock poisoned".to_string()))?;
        if processors.insert(service_name.clone(), processor).is_some() {
            info!("Replaced processor for service {}", service_name);
        } else {
            info!("Registered processor for service {}", service_name);
        }
        Ok(())
    }

    pub fn is_registered(&self, service_name: &str) -> bool {
        self.processors
            .read()
            .map(|processors| processors.contains_key(service_name))
            .unwrap_or(false)
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.processors
            .read()
            .map(|processors| processors.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, service_name: &str) -> Result<Arc<dyn Processor>> {
        let processors = self
            .processors
            .read()
            .map_err(|_| MuxError::Other("service registry lock poisoned".to_string()))?;
        processors
            .get(service_name)
            .cloned()
            .ok_or_else(|| MuxError::UnknownService {
                name: service_name.to_string(),
            })
    }
}

impl Processor for MultiplexedProcessor {
    /// Route one request to the processor registered for its service.
    ///
    /// 1. Read the header off the wire.
    /// 2. Reject anything that is not CALL or ONEWAY.
    /// 3. Split `service:function` at the first separator.
    /// 4. Look up the service.
    /// 5. Hand the processor a [`StoredMessageProtocol`] that replays the
    ///    header with the service prefix stripped.
    fn process(&self, input: &mut dyn Protocol, output: &mut dyn Protocol) -> Result<bool> {
        let header = input.read_message_begin()?;

        if !header.message_type.is_request() {
            warn!(
                "Rejected {} message {:?}: not a request",
                header.message_type, header.name
            );
            return Err(MuxError::UnexpectedMessageType {
                got: header.message_type,
            });
        }

        let Some((service_name, function_name)) = split_name(&header.name) else {
            warn!("Rejected message {:?}: no service prefix", header.name);
            return Err(MuxError::MalformedHeader { name: header.name });
        };

        let processor = match self.lookup(service_name) {
            Ok(processor) => processor,
            Err(e) => {
                warn!("Rejected message {:?}: {}", header.name, e);
                return Err(e);
            }
        };

        debug!(
            "Dispatching {} to service {} (seq {})",
            function_name, service_name, header.seq_id
        );

        let stored = MessageHeader::new(function_name, header.message_type, header.seq_id);
        let mut input = StoredMessageProtocol::new(input, stored);
        processor.process(&mut input, output)
    }
}
