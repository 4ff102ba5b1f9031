//! Error types for rpcmux.
//!
//! Every failure surfaced by a transport, an encoding, or the multiplexed
//! dispatcher is one of a small closed set of variants, so callers can branch
//! on the kind of failure instead of matching message strings.

use crate::application::ApplicationErrorKind;
use crate::protocol::MessageType;
use std::fmt;
use thiserror::Error;

/// Classification of byte-level transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Unknown,
    NotOpen,
    AlreadyOpen,
    TimedOut,
    EndOfFile,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Unknown => write!(f, "unknown"),
            TransportErrorKind::NotOpen => write!(f, "not open"),
            TransportErrorKind::AlreadyOpen => write!(f, "already open"),
            TransportErrorKind::TimedOut => write!(f, "timed out"),
            TransportErrorKind::EndOfFile => write!(f, "end of file"),
        }
    }
}

/// Classification of encoding failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    InvalidData,
    NegativeSize,
    SizeLimit,
    BadVersion,
    DepthLimit,
}

impl fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolErrorKind::InvalidData => write!(f, "invalid data"),
            ProtocolErrorKind::NegativeSize => write!(f, "negative size"),
            ProtocolErrorKind::SizeLimit => write!(f, "size limit exceeded"),
            ProtocolErrorKind::BadVersion => write!(f, "bad version"),
            ProtocolErrorKind::DepthLimit => write!(f, "depth limit exceeded"),
        }
    }
}

/// Main error type for rpcmux.
#[derive(Debug, Error)]
pub enum MuxError {
    // Transport errors
    #[error("Transport error ({kind}): {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("HTTP response code: {status}")]
    HttpStatus { status: u16 },

    // Encoding errors
    #[error("Protocol error ({kind}): {message}")]
    Protocol {
        kind: ProtocolErrorKind,
        message: String,
    },

    // Dispatch errors
    #[error("Unexpected message type {got} for an inbound request, expected CALL or ONEWAY")]
    UnexpectedMessageType { got: MessageType },

    #[error(
        "Service name not found in message name: {name}. Did you forget to use a \
         MultiplexedProtocol in your client?"
    )]
    MalformedHeader { name: String },

    #[error("Service name not found: {name}. Did you forget to call register_processor()?")]
    UnknownService { name: String },

    #[error("Invalid service name {name:?}: must be non-empty and must not contain ':'")]
    InvalidServiceName { name: String },

    #[error("Message header already consumed")]
    HeaderConsumed,

    // Remote application errors
    #[error("Application error ({kind}): {message}")]
    Application {
        kind: ApplicationErrorKind,
        message: String,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for rpcmux operations.
pub type Result<T> = std::result::Result<T, MuxError>;

impl From<std::io::Error> for MuxError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::UnexpectedEof => TransportErrorKind::EndOfFile,
            std::io::ErrorKind::TimedOut => TransportErrorKind::TimedOut,
            std::io::ErrorKind::NotConnected => TransportErrorKind::NotOpen,
            _ => TransportErrorKind::Unknown,
        };
        MuxError::Transport {
            kind,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl MuxError {
    /// Create a transport error without an underlying IO cause.
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        MuxError::Transport {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// The transport ran out of bytes.
    pub fn end_of_file() -> Self {
        Self::transport(TransportErrorKind::EndOfFile, "end of stream")
    }

    /// Create a protocol (encoding) error.
    pub fn protocol(kind: ProtocolErrorKind, message: impl Into<String>) -> Self {
        MuxError::Protocol {
            kind,
            message: message.into(),
        }
    }

    /// Check if this error means the peer closed the stream.
    ///
    /// Servers treat this as a normal connection close rather than a failure.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(
            self,
            MuxError::Transport {
                kind: TransportErrorKind::EndOfFile,
                ..
            }
        )
    }

    /// Check if the dispatcher rejected the request before reaching a handler.
    pub fn is_request_rejection(&self) -> bool {
        matches!(
            self,
            MuxError::UnexpectedMessageType { .. }
                | MuxError::MalformedHeader { .. }
                | MuxError::UnknownService { .. }
        )
    }

    /// The HTTP status carried by this error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            MuxError::HttpStatus { status } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MuxError::UnknownService {
            name: "Calculator".into(),
        };
        assert_eq!(
            err.to_string(),
            "Service name not found: Calculator. Did you forget to call register_processor()?"
        );

        let err = MuxError::HttpStatus { status: 500 };
        assert_eq!(err.to_string(), "HTTP response code: 500");
    }

    #[test]
    fn test_io_error_mapping() {
        let err: MuxError =
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read").into();
        assert!(err.is_end_of_stream());

        let err: MuxError = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow").into();
        assert!(matches!(
            err,
            MuxError::Transport {
                kind: TransportErrorKind::TimedOut,
                ..
            }
        ));
        assert!(!err.is_end_of_stream());
    }

    #[test]
    fn test_request_rejections() {
        assert!(MuxError::MalformedHeader {
            name: "add".into()
        }
        .is_request_rejection());
        assert!(MuxError::UnexpectedMessageType {
            got: MessageType::Reply
        }
        .is_request_rejection());
        assert!(!MuxError::end_of_file().is_request_rejection());
    }

    #[test]
    fn test_http_status() {
        assert_eq!(MuxError::HttpStatus { status: 404 }.http_status(), Some(404));
        assert_eq!(MuxError::HeaderConsumed.http_status(), None);
    }
}
