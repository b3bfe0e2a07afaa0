use crate::codec::HeaderEncoder;
use crate::net::Socket;
use crate::protocol::{PayloadSize, ResponseHead, SendError};
use bytes::{Buf, BytesMut};
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Encoder;
use tracing::trace;

/// Staging buffer for an outgoing response.
///
/// [`MessageWriter::write`] serializes a complete response into the buffer,
/// [`MessageWriter::flush`] pushes it to the socket without blocking and keeps
/// whatever the socket did not take for the next turn.
#[derive(Debug)]
pub struct MessageWriter {
    buffer: BytesMut,
    encoder: HeaderEncoder,
}

impl MessageWriter {
    pub fn with_capacity(buffer_size: usize) -> Self {
        Self { buffer: BytesMut::with_capacity(buffer_size), encoder: HeaderEncoder }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn write(&mut self, head: ResponseHead, payload: &[u8]) -> Result<(), SendError> {
        self.encoder.encode((head, PayloadSize::Length(payload.len() as u64)), &mut self.buffer)?;
        self.buffer.extend_from_slice(payload);
        Ok(())
    }

    /// Returns the number of bytes the socket accepted.
    pub fn flush(&mut self, socket: &dyn Socket) -> Result<usize, SendError> {
        let mut written = 0;
        while !self.buffer.is_empty() {
            match socket.try_write(&self.buffer) {
                Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero).into()),
                Ok(n) => {
                    self.buffer.advance(n);
                    written += n;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }
        trace!(written, remaining = self.buffer.len(), "flushed response bytes");
        Ok(written)
    }
}
