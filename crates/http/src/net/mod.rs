//! Non-blocking socket abstraction.
//!
//! Everything in this module is driven from a single thread by a turn based
//! scheduler. Readiness checks and reads never wait: a socket with nothing to offer
//! answers `false` or [`std::io::ErrorKind::WouldBlock`] and the caller retries on
//! a later turn. The async [`Readiness::readable`] / [`Readiness::writable`]
//! methods exist only so the scheduler can sleep until some registered socket
//! has work, they carry no data.

mod tcp;

pub use tcp::{ListenSocket, TcpSocket};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::io;

/// Readiness of a socket, checked without waiting.
#[async_trait(?Send)]
pub trait Readiness {
    /// Whether a read would make progress right now.
    fn is_readable(&self) -> io::Result<bool>;

    /// Whether a write would make progress right now.
    fn is_writable(&self) -> io::Result<bool>;

    /// Resolves once the socket becomes readable.
    async fn readable(&self) -> io::Result<()>;

    /// Resolves once the socket becomes writable.
    async fn writable(&self) -> io::Result<()>;
}

/// A connected, non-blocking byte stream.
pub trait Socket: Readiness {
    /// Appends whatever is available to `buf`.
    ///
    /// Returns `Ok(0)` once the peer closed its side and
    /// [`io::ErrorKind::WouldBlock`] when nothing is pending.
    fn try_read(&self, buf: &mut BytesMut) -> io::Result<usize>;

    /// Writes as much of `buf` as the socket accepts without blocking.
    fn try_write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Puts bytes back in front of the stream.
    ///
    /// The next [`Socket::try_read`] returns them first and the socket reports
    /// itself readable until they are taken.
    fn unread(&self, data: Bytes);
}
