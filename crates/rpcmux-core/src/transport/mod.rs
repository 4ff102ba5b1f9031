//! Byte-level transports.
//!
//! A [`Transport`] is a duplex byte channel. Protocols own exactly one
//! transport and never look past it, so anything that can move bytes (a socket,
//! an HTTP exchange, an in-memory buffer) can carry any encoding.
//!
//! - [`MemoryBuffer`]: in-memory byte queue
//! - [`StreamTransport`]: adapter over `std::io::Read` / `std::io::Write`

mod memory;
mod stream;

pub use memory::MemoryBuffer;
pub use stream::StreamTransport;

use crate::{MuxError, Result};

/// Duplex byte channel used by a protocol.
pub trait Transport {
    /// Open the channel. Transports that are always open treat this as a no-op.
    fn open(&mut self) -> Result<()>;

    /// Close the channel and release buffered data.
    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Whether reading may yield data.
    fn peek(&self) -> bool {
        self.is_open()
    }

    /// Read up to `buf.len()` bytes.
    ///
    /// Fails with `EndOfFile` when no byte is available for a non-empty buffer.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    fn flush(&mut self) -> Result<()>;

    /// Fill `buf` completely.
    fn read_all(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(MuxError::end_of_file());
            }
            filled += n;
        }
        Ok(())
    }

    /// Write all of `buf`.
    fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write(buf)?;
            if n == 0 {
                return Err(MuxError::transport(
                    crate::TransportErrorKind::Unknown,
                    "transport accepted no bytes",
                ));
            }
            buf = &buf[n..];
        }
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn peek(&self) -> bool {
        (**self).peek()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn peek(&self) -> bool {
        (**self).peek()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Wraps a transport handed out by a server before a protocol is built on it.
pub trait TransportFactory: Send + Sync {
    fn get_transport(&self, transport: Box<dyn Transport>) -> Result<Box<dyn Transport>>;
}

/// Factory that hands the transport back unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTransportFactory;

impl TransportFactory for PassthroughTransportFactory {
    fn get_transport(&self, transport: Box<dyn Transport>) -> Result<Box<dyn Transport>> {
        Ok(transport)
    }
}
