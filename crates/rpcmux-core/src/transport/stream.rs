//! Transport over standard IO streams.

use super::Transport;
use crate::{MuxError, Result, TransportErrorKind};
use std::io::{Read, Write};

/// Adapts an `io::Read` and/or an `io::Write` into a [`Transport`].
///
/// Either side may be absent; using a missing side fails with `NotOpen`.
/// Closing drops both sides.
#[derive(Debug)]
pub struct StreamTransport<R, W> {
    reader: Option<R>,
    writer: Option<W>,
}

impl<R: Read, W: Write> StreamTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Some(reader),
            writer: Some(writer),
        }
    }
}

impl<R: Read> StreamTransport<R, std::io::Sink> {
    /// Read-only transport.
    pub fn reader(reader: R) -> Self {
        Self {
            reader: Some(reader),
            writer: None,
        }
    }
}

impl<W: Write> StreamTransport<std::io::Empty, W> {
    /// Write-only transport.
    pub fn writer(writer: W) -> Self {
        Self {
            reader: None,
            writer: Some(writer),
        }
    }
}

impl<R: Read, W: Write> Transport for StreamTransport<R, W> {
    fn open(&mut self) -> Result<()> {
        Err(MuxError::transport(
            TransportErrorKind::AlreadyOpen,
            "stream transport is already open",
        ))
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.reader.is_some() || self.writer.is_some()
    }

    fn peek(&self) -> bool {
        self.reader.is_some()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let reader = self.reader.as_mut().ok_or_else(|| {
            MuxError::transport(TransportErrorKind::NotOpen, "stream has no reader")
        })?;
        if buf.is_empty() {
            return Ok(0);
        }
        match reader.read(buf)? {
            0 => Err(MuxError::end_of_file()),
            n => Ok(n),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            MuxError::transport(TransportErrorKind::NotOpen, "stream has no writer")
        })?;
        Ok(writer.write(buf)?)
    }

    fn flush(&mut self) -> Result<()> {
        match self.writer.as_mut() {
            Some(writer) => Ok(writer.flush()?),
            None => Ok(()),
        }
    }
}
