use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::FutureExt;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::trace;

use super::{Readiness, Socket};

/// A tokio [`TcpStream`] polled for readiness without waiting.
///
/// Bytes handed back with [`Socket::unread`] are kept in front of the kernel
/// buffer, so a transport can over-read and return the excess.
pub struct TcpSocket {
    stream: TcpStream,
    unread: RefCell<BytesMut>,
}

impl TcpSocket {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream, unread: RefCell::new(BytesMut::new()) }
    }

    fn has_unread(&self) -> bool {
        !self.unread.borrow().is_empty()
    }
}

impl fmt::Debug for TcpSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpSocket")
            .field("peer", &self.stream.peer_addr().ok())
            .field("unread", &self.unread.borrow().len())
            .finish()
    }
}

#[async_trait(?Send)]
impl Readiness for TcpSocket {
    fn is_readable(&self) -> io::Result<bool> {
        if self.has_unread() {
            return Ok(true);
        }
        match self.stream.readable().now_or_never() {
            Some(result) => result.map(|()| true),
            None => Ok(false),
        }
    }

    fn is_writable(&self) -> io::Result<bool> {
        match self.stream.writable().now_or_never() {
            Some(result) => result.map(|()| true),
            None => Ok(false),
        }
    }

    async fn readable(&self) -> io::Result<()> {
        if self.has_unread() {
            return Ok(());
        }
        self.stream.readable().await
    }

    async fn writable(&self) -> io::Result<()> {
        self.stream.writable().await
    }
}

impl Socket for TcpSocket {
    fn try_read(&self, buf: &mut BytesMut) -> io::Result<usize> {
        {
            let mut unread = self.unread.borrow_mut();
            if !unread.is_empty() {
                let pending = unread.split();
                buf.extend_from_slice(&pending);
                return Ok(pending.len());
            }
        }
        self.stream.try_read_buf(buf)
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        self.stream.try_write(buf)
    }

    fn unread(&self, data: Bytes) {
        if data.is_empty() {
            return;
        }
        trace!(size = data.len(), "put back bytes");
        let mut unread = self.unread.borrow_mut();
        let mut merged = BytesMut::with_capacity(data.len() + unread.len());
        merged.extend_from_slice(&data);
        merged.extend_from_slice(&unread);
        *unread = merged;
    }
}

/// A listening socket accepting connections without waiting.
///
/// Waiting for readability has to accept the connection to learn about it, so
/// connections accepted that way are queued and handed out by the next
/// [`ListenSocket::try_accept`].
pub struct ListenSocket {
    listener: TcpListener,
    accepted: RefCell<VecDeque<(TcpStream, SocketAddr)>>,
}

impl ListenSocket {
    pub async fn bind<A: ToSocketAddrs>(address: A) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self { listener, accepted: RefCell::new(VecDeque::new()) })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts one pending connection, `Ok(None)` when there is none.
    pub fn try_accept(&self) -> io::Result<Option<(TcpSocket, SocketAddr)>> {
        if let Some((stream, address)) = self.accepted.borrow_mut().pop_front() {
            return Ok(Some((TcpSocket::new(stream), address)));
        }
        match self.listener.accept().now_or_never() {
            Some(Ok((stream, address))) => Ok(Some((TcpSocket::new(stream), address))),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for ListenSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenSocket").field("local", &self.listener.local_addr().ok()).finish()
    }
}

#[async_trait(?Send)]
impl Readiness for ListenSocket {
    fn is_readable(&self) -> io::Result<bool> {
        if !self.accepted.borrow().is_empty() {
            return Ok(true);
        }
        match self.listener.accept().now_or_never() {
            Some(accepted) => {
                self.accepted.borrow_mut().push_back(accepted?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn is_writable(&self) -> io::Result<bool> {
        Ok(false)
    }

    async fn readable(&self) -> io::Result<()> {
        if !self.accepted.borrow().is_empty() {
            return Ok(());
        }
        let accepted = self.listener.accept().await?;
        self.accepted.borrow_mut().push_back(accepted);
        Ok(())
    }

    async fn writable(&self) -> io::Result<()> {
        std::future::pending().await
    }
}
