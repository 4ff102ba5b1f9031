//! In-memory transport.

use super::Transport;
use crate::{MuxError, Result};
use bytes::{Buf, BufMut, BytesMut};

/// Byte queue transport: writes append, reads consume from the front.
#[derive(Debug, Clone, Default)]
pub struct MemoryBuffer {
    buf: BytesMut,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Create a buffer pre-filled with data to be read.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            buf: BytesMut::from(data),
        }
    }

    /// Bytes not yet read.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

impl Transport for MemoryBuffer {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.buf.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        true
    }

    fn peek(&self) -> bool {
        !self.buf.is_empty()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.buf.is_empty() {
            return Err(MuxError::end_of_file());
        }
        let n = buf.len().min(self.buf.len());
        self.buf.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.buf.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
