//! Application-level exceptions carried in EXCEPTION replies.
//!
//! When a handler-processor cannot serve a call (unknown function, bad
//! arguments) it answers with an EXCEPTION message whose body is an
//! [`ApplicationException`] struct:
//!
//! ```text
//! struct { 1: string message, 2: i32 type }
//! ```

use crate::protocol::{FieldType, MessageType, Protocol};
use crate::{MuxError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationErrorKind {
    Unknown = 0,
    UnknownMethod = 1,
    InvalidMessageType = 2,
    WrongMethodName = 3,
    BadSequenceId = 4,
    MissingResult = 5,
    InternalError = 6,
    ProtocolError = 7,
}

impl From<i32> for ApplicationErrorKind {
    fn from(value: i32) -> Self {
        match value {
            1 => ApplicationErrorKind::UnknownMethod,
            2 => ApplicationErrorKind::InvalidMessageType,
            3 => ApplicationErrorKind::WrongMethodName,
            4 => ApplicationErrorKind::BadSequenceId,
            5 => ApplicationErrorKind::MissingResult,
            6 => ApplicationErrorKind::InternalError,
            7 => ApplicationErrorKind::ProtocolError,
            _ => ApplicationErrorKind::Unknown,
        }
    }
}

impl fmt::Display for ApplicationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplicationErrorKind::Unknown => "unknown",
            ApplicationErrorKind::UnknownMethod => "unknown method",
            ApplicationErrorKind::InvalidMessageType => "invalid message type",
            ApplicationErrorKind::WrongMethodName => "wrong method name",
            ApplicationErrorKind::BadSequenceId => "bad sequence id",
            ApplicationErrorKind::MissingResult => "missing result",
            ApplicationErrorKind::InternalError => "internal error",
            ApplicationErrorKind::ProtocolError => "protocol error",
        };
        write!(f, "{}", name)
    }
}

/// Error reported by a remote handler-processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationException {
    pub kind: ApplicationErrorKind,
    pub message: String,
}

impl ApplicationException {
    pub fn new(kind: ApplicationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Decode the exception struct, skipping unknown fields.
    pub fn read(protocol: &mut dyn Protocol) -> Result<Self> {
        let mut kind = ApplicationErrorKind::Unknown;
        let mut message = String::new();

        protocol.read_struct_begin()?;
        loop {
            let field = protocol.read_field_begin()?;
            match (field.id, field.field_type) {
                (_, FieldType::Stop) => break,
                (1, FieldType::String) => message = protocol.read_string()?,
                (2, FieldType::I32) => kind = ApplicationErrorKind::from(protocol.read_i32()?),
                (_, other) => protocol.skip(other)?,
            }
            protocol.read_field_end()?;
        }
        protocol.read_struct_end()?;

        Ok(Self { kind, message })
    }

    /// Encode the exception struct.
    pub fn write(&self, protocol: &mut dyn Protocol) -> Result<()> {
        protocol.write_struct_begin("ApplicationException")?;
        protocol.write_field_begin("message", FieldType::String, 1)?;
        protocol.write_string(&self.message)?;
        protocol.write_field_end()?;
        protocol.write_field_begin("type", FieldType::I32, 2)?;
        protocol.write_i32(self.kind as i32)?;
        protocol.write_field_end()?;
        protocol.write_field_stop()?;
        protocol.write_struct_end()
    }

    /// Write a complete EXCEPTION reply for `name`/`seq_id` and flush it.
    pub fn write_reply(&self, protocol: &mut dyn Protocol, name: &str, seq_id: i32) -> Result<()> {
        protocol.write_message_begin(name, MessageType::Exception, seq_id)?;
        self.write(protocol)?;
        protocol.write_message_end()?;
        protocol.flush()
    }
}

impl From<ApplicationException> for MuxError {
    fn from(exception: ApplicationException) -> Self {
        MuxError::Application {
            kind: exception.kind,
            message: exception.message,
        }
    }
}
