//! rpcmux Core - Service multiplexing over pluggable transports and encodings.
//!
//! Several independent services share one connection or endpoint. Clients tag
//! each outbound call with its service name; the server reads the tag once,
//! routes to the processor registered for that service, and replays the
//! stripped header so the processor never sees the tag.
//!
//! The crate is layered like the wire:
//!
//! - [`transport`]: byte channels ([`Transport`])
//! - [`protocol`]: encodings over a transport ([`Protocol`]) and the decorator base
//! - [`multiplexed`]: client-side tagging and server-side routing
//! - [`processor`]: the handler abstraction routed to
//!
//! # Example
//!
//! ```rust,ignore
//! use rpcmux_core::{BinaryProtocol, MemoryBuffer, MultiplexedProcessor, MultiplexedProtocol};
//!
//! let server = MultiplexedProcessor::new();
//! server.register_processor("Calculator", calculator_processor)?;
//!
//! let mut client = MultiplexedProtocol::new(BinaryProtocol::new(transport), "Calculator");
//! client.write_message_begin("add", MessageType::Call, 1)?; // sent as "Calculator:add"
//! ```

pub mod application;
pub mod config;
pub mod error;
pub mod multiplexed;
pub mod processor;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use application::{ApplicationErrorKind, ApplicationException};
pub use config::{HttpConfig, MultiplexConfig, ProtocolConfig};
pub use error::{MuxError, ProtocolErrorKind, Result, TransportErrorKind};
pub use multiplexed::{
    MultiplexedProcessor, MultiplexedProtocol, MultiplexedProtocolFactory, StoredMessageProtocol,
};
pub use processor::Processor;
pub use protocol::{
    BinaryProtocol, BinaryProtocolFactory, CollectionHeader, Decorate, FieldHeader, FieldType,
    MapHeader, MessageHeader, MessageType, Protocol, ProtocolDecorator, ProtocolFactory,
};
pub use transport::{
    MemoryBuffer, PassthroughTransportFactory, StreamTransport, Transport, TransportFactory,
};

/// Separator between service and function in a tagged message name.
pub const SEPARATOR: char = MultiplexConfig::SEPARATOR;
