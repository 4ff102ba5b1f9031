//! Strict binary encoding.
//!
//! All integers are big-endian. A message header starts with the version word
//! `0x8001_00TT` (TT = message type), followed by the length-prefixed name and
//! the sequence id:
//!
//! ```text
//! [i32 BE: VERSION_1 | type][i32 BE: len][name bytes][i32 BE: seq_id]
//! ```
//!
//! Readers also accept the older non-strict header (`[len][name][type byte][seq_id]`)
//! unless `strict_read` is set.

use super::{
    CollectionHeader, FieldHeader, FieldType, MapHeader, MessageHeader, MessageType, Protocol,
    ProtocolFactory,
};
use crate::config::ProtocolConfig;
use crate::transport::Transport;
use crate::{MuxError, ProtocolErrorKind, Result};

/// Binary protocol over a transport.
#[derive(Debug)]
pub struct BinaryProtocol<T> {
    transport: T,
    strict_read: bool,
    strict_write: bool,
}

impl<T: Transport> BinaryProtocol<T> {
    /// Strict writes, lenient reads.
    pub fn new(transport: T) -> Self {
        Self::with_strictness(transport, false, true)
    }

    pub fn with_strictness(transport: T, strict_read: bool, strict_write: bool) -> Self {
        Self {
            transport,
            strict_read,
            strict_write,
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.transport.read_all(&mut buf)?;
        Ok(buf)
    }

    fn read_size(&mut self, limit: usize, what: &str) -> Result<usize> {
        let size = self.read_i32()?;
        if size < 0 {
            return Err(MuxError::protocol(
                ProtocolErrorKind::NegativeSize,
                format!("negative {} size: {}", what, size),
            ));
        }
        let size = size as usize;
        if size > limit {
            return Err(MuxError::protocol(
                ProtocolErrorKind::SizeLimit,
                format!("{} size {} exceeds maximum {}", what, size, limit),
            ));
        }
        Ok(size)
    }

    fn read_field_type(&mut self) -> Result<FieldType> {
        FieldType::try_from(self.read_byte()? as u8)
    }

    fn read_string_body(&mut self, len: usize) -> Result<String> {
        let mut buf = vec![0u8; len];
        self.transport.read_all(&mut buf)?;
        String::from_utf8(buf).map_err(|e| {
            MuxError::protocol(
                ProtocolErrorKind::InvalidData,
                format!("string is not valid UTF-8: {}", e),
            )
        })
    }

    fn write_size(&mut self, size: usize) -> Result<()> {
        let size = i32::try_from(size).map_err(|_| {
            MuxError::protocol(
                ProtocolErrorKind::SizeLimit,
                format!("size {} does not fit the wire format", size),
            )
        })?;
        self.write_i32(size)
    }
}

impl<T: Transport> Protocol for BinaryProtocol<T> {
    fn write_message_begin(
        &mut self,
        name: &str,
        message_type: MessageType,
        seq_id: i32,
    ) -> Result<()> {
        if self.strict_write {
            let version = ProtocolConfig::BINARY_VERSION_1 | message_type as u32;
            self.write_i32(version as i32)?;
            self.write_string(name)?;
        } else {
            self.write_string(name)?;
            self.write_byte(message_type as i8)?;
        }
        self.write_i32(seq_id)
    }

    fn write_message_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_struct_begin(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn write_struct_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_field_begin(&mut self, _name: &str, field_type: FieldType, id: i16) -> Result<()> {
        self.write_byte(field_type as i8)?;
        self.write_i16(id)
    }

    fn write_field_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_field_stop(&mut self) -> Result<()> {
        self.write_byte(FieldType::Stop as i8)
    }

    fn write_map_begin(
        &mut self,
        key_type: FieldType,
        value_type: FieldType,
        size: usize,
    ) -> Result<()> {
        self.write_byte(key_type as i8)?;
        self.write_byte(value_type as i8)?;
        self.write_size(size)
    }

    fn write_map_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_list_begin(&mut self, element_type: FieldType, size: usize) -> Result<()> {
        self.write_byte(element_type as i8)?;
        self.write_size(size)
    }

    fn write_list_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_set_begin(&mut self, element_type: FieldType, size: usize) -> Result<()> {
        self.write_byte(element_type as i8)?;
        self.write_size(size)
    }

    fn write_set_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_byte(value as i8)
    }

    fn write_byte(&mut self, value: i8) -> Result<()> {
        self.transport.write_all(&value.to_be_bytes())
    }

    fn write_i16(&mut self, value: i16) -> Result<()> {
        self.transport.write_all(&value.to_be_bytes())
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.transport.write_all(&value.to_be_bytes())
    }

    fn write_i64(&mut self, value: i64) -> Result<()> {
        self.transport.write_all(&value.to_be_bytes())
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        self.transport.write_all(&value.to_bits().to_be_bytes())
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_binary(value.as_bytes())
    }

    fn write_binary(&mut self, value: &[u8]) -> Result<()> {
        self.write_size(value.len())?;
        self.transport.write_all(value)
    }

    fn read_message_begin(&mut self) -> Result<MessageHeader> {
        let size = self.read_i32()?;
        if size < 0 {
            let word = size as u32;
            let version = word & ProtocolConfig::BINARY_VERSION_MASK;
            if version != ProtocolConfig::BINARY_VERSION_1 {
                return Err(MuxError::protocol(
                    ProtocolErrorKind::BadVersion,
                    format!("bad version in message header: {:#010x}", version),
                ));
            }
            let message_type =
                MessageType::try_from((word & ProtocolConfig::BINARY_TYPE_MASK) as u8)?;
            let name = self.read_string()?;
            let seq_id = self.read_i32()?;
            return Ok(MessageHeader::new(name, message_type, seq_id));
        }

        if self.strict_read {
            return Err(MuxError::protocol(
                ProtocolErrorKind::BadVersion,
                "missing version in message header",
            ));
        }
        let len = size as usize;
        if len > ProtocolConfig::MAX_STRING_LENGTH {
            return Err(MuxError::protocol(
                ProtocolErrorKind::SizeLimit,
                format!("message name length {} exceeds maximum", len),
            ));
        }
        let name = self.read_string_body(len)?;
        let message_type = MessageType::try_from(self.read_byte()? as u8)?;
        let seq_id = self.read_i32()?;
        Ok(MessageHeader::new(name, message_type, seq_id))
    }

    fn read_message_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_struct_begin(&mut self) -> Result<String> {
        Ok(String::new())
    }

    fn read_struct_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_field_begin(&mut self) -> Result<FieldHeader> {
        let field_type = self.read_field_type()?;
        let id = if field_type == FieldType::Stop {
            0
        } else {
            self.read_i16()?
        };
        Ok(FieldHeader {
            name: String::new(),
            field_type,
            id,
        })
    }

    fn read_field_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_map_begin(&mut self) -> Result<MapHeader> {
        let key_type = self.read_field_type()?;
        let value_type = self.read_field_type()?;
        let size = self.read_size(ProtocolConfig::MAX_CONTAINER_SIZE, "map")?;
        Ok(MapHeader {
            key_type,
            value_type,
            size,
        })
    }

    fn read_map_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_list_begin(&mut self) -> Result<CollectionHeader> {
        let element_type = self.read_field_type()?;
        let size = self.read_size(ProtocolConfig::MAX_CONTAINER_SIZE, "list")?;
        Ok(CollectionHeader { element_type, size })
    }

    fn read_list_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_set_begin(&mut self) -> Result<CollectionHeader> {
        let element_type = self.read_field_type()?;
        let size = self.read_size(ProtocolConfig::MAX_CONTAINER_SIZE, "set")?;
        Ok(CollectionHeader { element_type, size })
    }

    fn read_set_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_byte()? != 0)
    }

    fn read_byte(&mut self) -> Result<i8> {
        Ok(i8::from_be_bytes(self.read_bytes()?))
    }

    fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_bytes()?))
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_bytes()?))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_bytes()?))
    }

    fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(u64::from_be_bytes(self.read_bytes()?)))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_size(ProtocolConfig::MAX_STRING_LENGTH, "string")?;
        self.read_string_body(len)
    }

    fn read_binary(&mut self) -> Result<Vec<u8>> {
        let len = self.read_size(ProtocolConfig::MAX_STRING_LENGTH, "binary")?;
        let mut buf = vec![0u8; len];
        self.transport.read_all(&mut buf)?;
        Ok(buf)
    }

    fn skip(&mut self, field_type: FieldType) -> Result<()> {
        super::skip(self, field_type, ProtocolConfig::MAX_SKIP_DEPTH)
    }

    fn flush(&mut self) -> Result<()> {
        self.transport.flush()
    }

    fn transport(&mut self) -> &mut dyn Transport {
        &mut self.transport
    }
}

/// Builds [`BinaryProtocol`]s over boxed transports.
#[derive(Debug, Clone, Copy)]
pub struct BinaryProtocolFactory {
    strict_read: bool,
    strict_write: bool,
}

impl BinaryProtocolFactory {
    pub fn new(strict_read: bool, strict_write: bool) -> Self {
        Self {
            strict_read,
            strict_write,
        }
    }
}

impl Default for BinaryProtocolFactory {
    fn default() -> Self {
        Self::new(false, true)
    }
}

impl ProtocolFactory for BinaryProtocolFactory {
    fn get_protocol(&self, transport: Box<dyn Transport>) -> Box<dyn Protocol> {
        Box::new(BinaryProtocol::with_strictness(
            transport,
            self.strict_read,
            self.strict_write,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryBuffer;

    fn protocol_with(bytes: &[u8]) -> BinaryProtocol<MemoryBuffer> {
        BinaryProtocol::new(MemoryBuffer::from_bytes(bytes))
    }

    #[test]
    fn test_strict_message_header_layout() {
        let mut protocol = BinaryProtocol::new(MemoryBuffer::new());
        protocol
            .write_message_begin("add", MessageType::Call, 1)
            .unwrap();
        assert_eq!(
            protocol.get_ref().bytes(),
            &[0x80, 0x01, 0x00, 0x01, 0, 0, 0, 3, b'a', b'd', b'd', 0, 0, 0, 1]
        );

        let header = protocol.read_message_begin().unwrap();
        assert_eq!(header, MessageHeader::new("add", MessageType::Call, 1));
    }

    #[test]
    fn test_non_strict_header_accepted_unless_strict_read() {
        let mut writer = BinaryProtocol::with_strictness(MemoryBuffer::new(), false, false);
        writer
            .write_message_begin("ping", MessageType::Oneway, 5)
            .unwrap();
        let bytes = writer.into_inner().into_bytes();

        let header = protocol_with(&bytes).read_message_begin().unwrap();
        assert_eq!(header, MessageHeader::new("ping", MessageType::Oneway, 5));

        let mut strict = BinaryProtocol::with_strictness(MemoryBuffer::from_bytes(&bytes), true, true);
        let err = strict.read_message_begin().unwrap_err();
        assert!(matches!(
            err,
            MuxError::Protocol {
                kind: ProtocolErrorKind::BadVersion,
                ..
            }
        ));
    }

    #[test]
    fn test_bad_version_rejected() {
        let mut protocol = protocol_with(&[0x80, 0x02, 0x00, 0x01, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(
            protocol.read_message_begin().unwrap_err(),
            MuxError::Protocol {
                kind: ProtocolErrorKind::BadVersion,
                ..
            }
        ));
    }

    #[test]
    fn test_negative_sizes_rejected() {
        let mut protocol = protocol_with(&(-1i32).to_be_bytes());
        assert!(matches!(
            protocol.read_string().unwrap_err(),
            MuxError::Protocol {
                kind: ProtocolErrorKind::NegativeSize,
                ..
            }
        ));

        let mut bytes = vec![FieldType::I32 as u8];
        bytes.extend_from_slice(&(-4i32).to_be_bytes());
        assert!(protocol_with(&bytes).read_list_begin().is_err());
    }

    #[test]
    fn test_invalid_utf8_string() {
        let mut bytes = 2i32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        assert!(matches!(
            protocol_with(&bytes).read_string().unwrap_err(),
            MuxError::Protocol {
                kind: ProtocolErrorKind::InvalidData,
                ..
            }
        ));
    }

    #[test]
    fn test_skip_nested_struct() {
        let mut protocol = BinaryProtocol::new(MemoryBuffer::new());
        protocol.write_struct_begin("outer").unwrap();
        protocol.write_field_begin("tags", FieldType::Map, 1).unwrap();
        protocol
            .write_map_begin(FieldType::String, FieldType::List, 1)
            .unwrap();
        protocol.write_string("k").unwrap();
        protocol.write_list_begin(FieldType::Double, 2).unwrap();
        protocol.write_double(1.5).unwrap();
        protocol.write_double(-2.25).unwrap();
        protocol.write_list_end().unwrap();
        protocol.write_map_end().unwrap();
        protocol.write_field_end().unwrap();
        protocol.write_field_begin("flag", FieldType::Bool, 2).unwrap();
        protocol.write_bool(true).unwrap();
        protocol.write_field_end().unwrap();
        protocol.write_field_stop().unwrap();
        protocol.write_struct_end().unwrap();
        protocol.write_i32(77).unwrap();

        protocol.skip(FieldType::Struct).unwrap();
        assert_eq!(protocol.read_i32().unwrap(), 77);
    }

    #[test]
    fn test_skip_depth_limit() {
        // A list of lists nested past the limit.
        let mut protocol = BinaryProtocol::new(MemoryBuffer::new());
        for _ in 0..=ProtocolConfig::MAX_SKIP_DEPTH {
            protocol.write_list_begin(FieldType::List, 1).unwrap();
        }
        let err = protocol.skip(FieldType::List).unwrap_err();
        assert!(matches!(
            err,
            MuxError::Protocol {
                kind: ProtocolErrorKind::DepthLimit,
                ..
            }
        ));
    }

    #[test]
    fn test_factory_builds_working_protocol() {
        let factory = BinaryProtocolFactory::default();
        let mut protocol = factory.get_protocol(Box::new(MemoryBuffer::new()));
        protocol.write_double(3.25).unwrap();
        protocol.write_binary(&[1, 2, 3]).unwrap();
        assert_eq!(protocol.read_double().unwrap(), 3.25);
        assert_eq!(protocol.read_binary().unwrap(), vec![1, 2, 3]);
    }
}
