//! Structured message framing over a transport.
//!
//! A [`Protocol`] turns messages, structs, fields, containers and scalars
//! into bytes on a [`Transport`]. Every `write_*_begin` is matched by exactly
//! one `write_*_end` in strict nesting order; the same holds on the read side.
//!
//! - [`BinaryProtocol`]: strict binary encoding
//! - [`decorator`]: forwarding wrappers used to compose protocol behavior

pub mod binary;
pub mod decorator;

pub use binary::{BinaryProtocol, BinaryProtocolFactory};
pub use decorator::{Decorate, ProtocolDecorator};

use crate::config::ProtocolConfig;
use crate::transport::Transport;
use crate::{MuxError, ProtocolErrorKind, Result};
use std::fmt;

/// Kind of message carried by a message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Call = 1,
    Reply = 2,
    Exception = 3,
    Oneway = 4,
}

impl MessageType {
    /// Whether this message type may arrive at a server as a request.
    pub fn is_request(self) -> bool {
        matches!(self, MessageType::Call | MessageType::Oneway)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Call => write!(f, "CALL"),
            MessageType::Reply => write!(f, "REPLY"),
            MessageType::Exception => write!(f, "EXCEPTION"),
            MessageType::Oneway => write!(f, "ONEWAY"),
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = MuxError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(MessageType::Call),
            2 => Ok(MessageType::Reply),
            3 => Ok(MessageType::Exception),
            4 => Ok(MessageType::Oneway),
            other => Err(MuxError::protocol(
                ProtocolErrorKind::InvalidData,
                format!("unknown message type {}", other),
            )),
        }
    }
}

/// Wire type of a field or container element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Stop = 0,
    Void = 1,
    Bool = 2,
    Byte = 3,
    Double = 4,
    I16 = 6,
    I32 = 8,
    I64 = 10,
    String = 11,
    Struct = 12,
    Map = 13,
    Set = 14,
    List = 15,
}

impl TryFrom<u8> for FieldType {
    type Error = MuxError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(FieldType::Stop),
            1 => Ok(FieldType::Void),
            2 => Ok(FieldType::Bool),
            3 => Ok(FieldType::Byte),
            4 => Ok(FieldType::Double),
            6 => Ok(FieldType::I16),
            8 => Ok(FieldType::I32),
            10 => Ok(FieldType::I64),
            11 => Ok(FieldType::String),
            12 => Ok(FieldType::Struct),
            13 => Ok(FieldType::Map),
            14 => Ok(FieldType::Set),
            15 => Ok(FieldType::List),
            other => Err(MuxError::protocol(
                ProtocolErrorKind::InvalidData,
                format!("unknown field type {}", other),
            )),
        }
    }
}

/// The `(name, type, sequence id)` triple that starts every message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: String,
    pub message_type: MessageType,
    pub seq_id: i32,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, message_type: MessageType, seq_id: i32) -> Self {
        Self {
            name: name.into(),
            message_type,
            seq_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldHeader {
    pub name: String,
    pub field_type: FieldType,
    pub id: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapHeader {
    pub key_type: FieldType,
    pub value_type: FieldType,
    pub size: usize,
}

/// Header of a list or a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionHeader {
    pub element_type: FieldType,
    pub size: usize,
}

/// Structured message framing over a single transport.
pub trait Protocol {
    fn write_message_begin(&mut self, name: &str, message_type: MessageType, seq_id: i32)
        -> Result<()>;
    fn write_message_end(&mut self) -> Result<()>;
    fn write_struct_begin(&mut self, name: &str) -> Result<()>;
    fn write_struct_end(&mut self) -> Result<()>;
    fn write_field_begin(&mut self, name: &str, field_type: FieldType, id: i16) -> Result<()>;
    fn write_field_end(&mut self) -> Result<()>;
    fn write_field_stop(&mut self) -> Result<()>;
    fn write_map_begin(&mut self, key_type: FieldType, value_type: FieldType, size: usize)
        -> Result<()>;
    fn write_map_end(&mut self) -> Result<()>;
    fn write_list_begin(&mut self, element_type: FieldType, size: usize) -> Result<()>;
    fn write_list_end(&mut self) -> Result<()>;
    fn write_set_begin(&mut self, element_type: FieldType, size: usize) -> Result<()>;
    fn write_set_end(&mut self) -> Result<()>;
    fn write_bool(&mut self, value: bool) -> Result<()>;
    fn write_byte(&mut self, value: i8) -> Result<()>;
    fn write_i16(&mut self, value: i16) -> Result<()>;
    fn write_i32(&mut self, value: i32) -> Result<()>;
    fn write_i64(&mut self, value: i64) -> Result<()>;
    fn write_double(&mut self, value: f64) -> Result<()>;
    fn write_string(&mut self, value: &str) -> Result<()>;
    fn write_binary(&mut self, value: &[u8]) -> Result<()>;

    fn read_message_begin(&mut self) -> Result<MessageHeader>;
    fn read_message_end(&mut self) -> Result<()>;
    fn read_struct_begin(&mut self) -> Result<String>;
    fn read_struct_end(&mut self) -> Result<()>;
    fn read_field_begin(&mut self) -> Result<FieldHeader>;
    fn read_field_end(&mut self) -> Result<()>;
    fn read_map_begin(&mut self) -> Result<MapHeader>;
    fn read_map_end(&mut self) -> Result<()>;
    fn read_list_begin(&mut self) -> Result<CollectionHeader>;
    fn read_list_end(&mut self) -> Result<()>;
    fn read_set_begin(&mut self) -> Result<CollectionHeader>;
    fn read_set_end(&mut self) -> Result<()>;
    fn read_bool(&mut self) -> Result<bool>;
    fn read_byte(&mut self) -> Result<i8>;
    fn read_i16(&mut self) -> Result<i16>;
    fn read_i32(&mut self) -> Result<i32>;
    fn read_i64(&mut self) -> Result<i64>;
    fn read_double(&mut self) -> Result<f64>;
    fn read_string(&mut self) -> Result<String>;
    fn read_binary(&mut self) -> Result<Vec<u8>>;

    /// Consume and discard one value of the given type.
    fn skip(&mut self, field_type: FieldType) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    fn transport(&mut self) -> &mut dyn Transport;
}

/// Builds a protocol on top of a transport handed out by a server or client.
pub trait ProtocolFactory: Send + Sync {
    fn get_protocol(&self, transport: Box<dyn Transport>) -> Box<dyn Protocol>;
}

/// Skip one value of `field_type`, recursing into structs and containers.
///
/// Encodings implement [`Protocol::skip`] with this, starting at
/// `ProtocolConfig::MAX_SKIP_DEPTH`.
pub fn skip<P: Protocol + ?Sized>(protocol: &mut P, field_type: FieldType, depth: usize) -> Result<()> {
    if depth == 0 {
        return Err(MuxError::protocol(
            ProtocolErrorKind::DepthLimit,
            format!(
                "nesting deeper than {} while skipping",
                ProtocolConfig::MAX_SKIP_DEPTH
            ),
        ));
    }

    match field_type {
        FieldType::Bool => protocol.read_bool().map(drop),
        FieldType::Byte => protocol.read_byte().map(drop),
        FieldType::I16 => protocol.read_i16().map(drop),
        FieldType::I32 => protocol.read_i32().map(drop),
        FieldType::I64 => protocol.read_i64().map(drop),
        FieldType::Double => protocol.read_double().map(drop),
        FieldType::String => protocol.read_binary().map(drop),
        FieldType::Struct => {
            protocol.read_struct_begin()?;
            loop {
                let field = protocol.read_field_begin()?;
                if field.field_type == FieldType::Stop {
                    break;
                }
                skip(protocol, field.field_type, depth - 1)?;
                protocol.read_field_end()?;
            }
            protocol.read_struct_end()
        }
        FieldType::Map => {
            let header = protocol.read_map_begin()?;
            for _ in 0..header.size {
                skip(protocol, header.key_type, depth - 1)?;
                skip(protocol, header.value_type, depth - 1)?;
            }
            protocol.read_map_end()
        }
        FieldType::Set => {
            let header = protocol.read_set_begin()?;
            for _ in 0..header.size {
                skip(protocol, header.element_type, depth - 1)?;
            }
            protocol.read_set_end()
        }
        FieldType::List => {
            let header = protocol.read_list_begin()?;
            for _ in 0..header.size {
                skip(protocol, header.element_type, depth - 1)?;
            }
            protocol.read_list_end()
        }
        FieldType::Stop | FieldType::Void => Err(MuxError::protocol(
            ProtocolErrorKind::InvalidData,
            format!("cannot skip field type {:?}", field_type),
        )),
    }
}
