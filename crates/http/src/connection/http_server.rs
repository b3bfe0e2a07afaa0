use std::fmt;
use std::io;
use std::io::ErrorKind;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use http::{Response, StatusCode, Version, header};
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::codec::{HeaderDecoder, LengthDecoder};
use crate::connection::{MessageWriter, Transport};
use crate::ensure;
use crate::net::Socket;
use crate::protocol::{ParseError, PayloadItem, RequestHeader, SendError};

/// Capacity reserved before every read
const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Initial capacity of the response staging buffer
const WRITE_BUFFER_SIZE: usize = 4 * 1024;

/// Largest body accepted unless configured otherwise
pub const DEFAULT_MAX_BODY_SIZE: u64 = 2 * 1024 * 1024;

/// Outcome of a single non-blocking read
enum ReadStatus {
    Data(usize),
    Pending,
    Eof,
}

/// The server side of one HTTP exchange over a non-blocking [`Socket`].
///
/// The header and the body are received by separate commands across as many
/// turns as the peer needs. Bytes read past the end of the header or the body
/// are put back into the socket, so the next phase sees the socket readable
/// and a pipelined request is not lost.
pub struct HttpServer {
    socket: Rc<dyn Socket>,
    read_buf: BytesMut,
    header_decoder: HeaderDecoder,
    header: Option<RequestHeader>,
    body_decoder: LengthDecoder,
    body: BytesMut,
    content_length: u64,
    accepts_gzip: bool,
    keep_alive: bool,
    max_body_size: u64,
    writer: MessageWriter,
}

impl HttpServer {
    pub fn new(socket: Rc<dyn Socket>) -> Self {
        Self {
            socket,
            read_buf: BytesMut::new(),
            header_decoder: HeaderDecoder,
            header: None,
            body_decoder: LengthDecoder::new(0),
            body: BytesMut::new(),
            content_length: 0,
            accepts_gzip: false,
            keep_alive: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            writer: MessageWriter::with_capacity(WRITE_BUFFER_SIZE),
        }
    }

    /// Rejects requests declaring a body larger than `max_body_size`.
    pub fn with_max_body_size(mut self, max_body_size: u64) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    fn reset(&mut self) {
        self.header = None;
        self.body_decoder = LengthDecoder::new(0);
        self.body.clear();
        self.content_length = 0;
        self.accepts_gzip = false;
        self.keep_alive = false;
    }

    fn fill_buf(&mut self) -> Result<ReadStatus, ParseError> {
        self.read_buf.reserve(READ_BUFFER_SIZE);
        match self.socket.try_read(&mut self.read_buf) {
            Ok(0) => Ok(ReadStatus::Eof),
            Ok(n) => {
                trace!(size = n, "read from socket");
                Ok(ReadStatus::Data(n))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(ReadStatus::Pending),
            Err(e) => Err(e.into()),
        }
    }

    fn put_back_excess(&mut self) {
        if !self.read_buf.is_empty() {
            let excess = self.read_buf.split().freeze();
            self.socket.unread(excess);
        }
    }

    fn response_version(&self) -> Version {
        match self.header.as_ref().map(RequestHeader::version) {
            Some(Version::HTTP_10) => Version::HTTP_10,
            _ => Version::HTTP_11,
        }
    }
}

impl Transport for HttpServer {
    fn receive_request(&mut self) -> Result<bool, ParseError> {
        if self.header.is_some() {
            self.reset();
        }

        if let ReadStatus::Eof = self.fill_buf()? {
            let eof = io::Error::new(ErrorKind::UnexpectedEof, "connection closed before request header");
            return Err(ParseError::io(eof));
        }

        let Some((header, payload_size)) = self.header_decoder.decode(&mut self.read_buf)? else {
            return Ok(false);
        };

        ensure!(
            payload_size.len() <= self.max_body_size,
            ParseError::too_large_body(payload_size.len(), self.max_body_size)
        );

        debug!(
            method = %header.method(),
            path = header.path(),
            content_length = payload_size.len(),
            "received request header"
        );
        self.content_length = payload_size.len();
        self.body_decoder = LengthDecoder::new(self.content_length);
        self.accepts_gzip = header.accepts_gzip();
        self.keep_alive = header.keep_alive();
        self.header = Some(header);
        self.put_back_excess();
        Ok(true)
    }

    fn content_length(&self) -> u64 {
        self.content_length
    }

    fn receive_body(&mut self) -> Result<bool, ParseError> {
        if self.body_decoder.is_finished() {
            return Ok(true);
        }

        if let ReadStatus::Eof = self.fill_buf()? {
            return Err(ParseError::invalid_body(format!(
                "connection closed with {} of {} body bytes missing",
                self.body_decoder.remaining(),
                self.content_length
            )));
        }

        while let Some(item) = self.body_decoder.decode(&mut self.read_buf)? {
            match item {
                PayloadItem::Chunk(bytes) => self.body.extend_from_slice(&bytes),
                PayloadItem::Eof => break,
            }
        }

        if !self.body_decoder.is_finished() {
            return Ok(false);
        }

        self.put_back_excess();
        Ok(true)
    }

    fn request_path(&self) -> &str {
        self.header.as_ref().map_or("", RequestHeader::path)
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    fn supports_gzip(&self) -> bool {
        self.accepts_gzip
    }

    fn feed_response(&mut self, payload: Bytes, content_type: &str) -> Result<(), SendError> {
        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .version(self.response_version())
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::EXPIRES, "0");
        if self.accepts_gzip {
            builder = builder.header(header::CONTENT_ENCODING, "gzip");
        }
        if !self.keep_alive {
            builder = builder.header(header::CONNECTION, "close");
        }

        let head = builder.body(()).map_err(SendError::invalid_header)?;
        self.writer.write(head, &payload)
    }

    fn send_response(&mut self) -> Result<usize, SendError> {
        self.writer.flush(self.socket.as_ref())
    }

    fn send_buffer_is_empty(&self) -> bool {
        self.writer.is_empty()
    }

    fn supports_persistent_connection(&self) -> bool {
        self.keep_alive
    }
}

impl fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpServer")
            .field("path", &self.request_path())
            .field("content_length", &self.content_length)
            .field("received", &self.body.len())
            .field("staged", &self.writer.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Readiness;
    use async_trait::async_trait;
    use mockall::mock;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    mock! {
        pub Stream {}

        #[async_trait(?Send)]
        impl Readiness for Stream {
            fn is_readable(&self) -> io::Result<bool>;
            fn is_writable(&self) -> io::Result<bool>;
            async fn readable(&self) -> io::Result<()>;
            async fn writable(&self) -> io::Result<()>;
        }

        impl Socket for Stream {
            fn try_read(&self, buf: &mut BytesMut) -> io::Result<usize>;
            fn try_write(&self, buf: &[u8]) -> io::Result<usize>;
            fn unread(&self, data: Bytes);
        }
    }

    /// The remote end of a mocked socket: one queued entry per read, `None` is EOF.
    #[derive(Clone, Default)]
    struct Peer {
        incoming: Arc<Mutex<VecDeque<Option<Bytes>>>>,
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl Peer {
        fn send(&self, data: &'static [u8]) {
            self.incoming.lock().unwrap().push_back(Some(Bytes::from_static(data)));
        }

        fn close(&self) {
            self.incoming.lock().unwrap().push_back(None);
        }

        fn pending(&self) -> Vec<u8> {
            self.incoming.lock().unwrap().iter().flatten().flat_map(|bytes| bytes.to_vec()).collect()
        }

        fn written(&self) -> String {
            String::from_utf8(self.written.lock().unwrap().clone()).unwrap()
        }

        fn socket(&self, write_limit: usize) -> Rc<dyn Socket> {
            let mut socket = MockStream::new();

            let incoming = Arc::clone(&self.incoming);
            socket.expect_try_read().returning(move |buf| match incoming.lock().unwrap().pop_front() {
                Some(Some(bytes)) => {
                    buf.extend_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(None) => Ok(0),
                None => Err(ErrorKind::WouldBlock.into()),
            });

            let incoming = Arc::clone(&self.incoming);
            socket.expect_unread().returning(move |data| incoming.lock().unwrap().push_front(Some(data)));

            let written = Arc::clone(&self.written);
            socket.expect_try_write().returning(move |buf| {
                let n = buf.len().min(write_limit);
                written.lock().unwrap().extend_from_slice(&buf[..n]);
                Ok(n)
            });

            Rc::new(socket)
        }
    }

    const RPC_REQUEST: &[u8] = b"POST /rpc HTTP/1.1\r\nHost: localhost\r\nContent-Length: 10\r\n\r\n";

    #[test]
    fn header_and_body_in_one_read() {
        let peer = Peer::default();
        peer.send(b"POST /rpc HTTP/1.1\r\nContent-Length: 5\r\nAccept-Encoding: gzip\r\n\r\nhello");
        let mut server = HttpServer::new(peer.socket(usize::MAX));

        assert!(server.receive_request().unwrap());
        assert_eq!(server.request_path(), "/rpc");
        assert_eq!(server.content_length(), 5);
        assert!(server.supports_gzip());
        assert!(server.supports_persistent_connection());

        assert!(server.receive_body().unwrap());
        assert_eq!(server.body(), b"hello");
    }

    #[test]
    fn body_trickles_in_across_calls() {
        let peer = Peer::default();
        peer.send(RPC_REQUEST);
        let mut server = HttpServer::new(peer.socket(usize::MAX));
        assert!(server.receive_request().unwrap());

        assert!(!server.receive_body().unwrap());

        peer.send(b"0123");
        assert!(!server.receive_body().unwrap());
        assert_eq!(server.body(), b"0123");

        peer.send(b"456789");
        assert!(server.receive_body().unwrap());
        assert_eq!(server.body(), b"0123456789");
    }

    #[test]
    fn partial_header_waits_for_more() {
        let peer = Peer::default();
        peer.send(b"POST /rpc HTTP/1.1\r\nContent-");
        let mut server = HttpServer::new(peer.socket(usize::MAX));

        assert!(!server.receive_request().unwrap());
        assert_eq!(server.request_path(), "");

        peer.send(b"Length: 0\r\n\r\n");
        assert!(server.receive_request().unwrap());
        assert_eq!(server.content_length(), 0);
    }

    #[test]
    fn zero_length_body_completes_without_reading() {
        let peer = Peer::default();
        peer.send(b"POST /rpc HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
        let mut server = HttpServer::new(peer.socket(usize::MAX));
        assert!(server.receive_request().unwrap());

        peer.send(b"GET / HTTP/1.1\r\n\r\n");
        assert!(server.receive_body().unwrap());
        assert!(server.body().is_empty());
        assert_eq!(peer.pending(), b"GET / HTTP/1.1\r\n\r\n");
    }

    #[test]
    fn pipelined_request_is_put_back() {
        let peer = Peer::default();
        peer.send(b"POST /rpc HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}POST /next HTTP/1.1\r\n");
        let mut server = HttpServer::new(peer.socket(usize::MAX));

        assert!(server.receive_request().unwrap());
        assert!(server.receive_body().unwrap());
        assert_eq!(server.body(), b"{}");
        assert_eq!(peer.pending(), b"POST /next HTTP/1.1\r\n");
    }

    #[test]
    fn eof_before_body_complete() {
        let peer = Peer::default();
        peer.send(RPC_REQUEST);
        peer.send(b"0123");
        peer.close();
        let mut server = HttpServer::new(peer.socket(usize::MAX));
        assert!(server.receive_request().unwrap());
        assert!(!server.receive_body().unwrap());

        let result = server.receive_body();
        assert!(matches!(result, Err(ParseError::InvalidBody { .. })));
    }

    #[test]
    fn eof_before_header() {
        let peer = Peer::default();
        peer.close();
        let mut server = HttpServer::new(peer.socket(usize::MAX));

        assert!(matches!(server.receive_request(), Err(ParseError::Io { .. })));
    }

    #[test]
    fn rejects_too_large_body() {
        let peer = Peer::default();
        peer.send(RPC_REQUEST);
        let mut server = HttpServer::new(peer.socket(usize::MAX)).with_max_body_size(9);

        let result = server.receive_request();
        assert!(matches!(result, Err(ParseError::TooLargeBody { declared_size: 10, max_size: 9 })));
    }

    #[test]
    fn staged_response_is_flushed_in_pieces() {
        let peer = Peer::default();
        peer.send(b"POST /rpc HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
        let mut server = HttpServer::new(peer.socket(16));
        assert!(server.receive_request().unwrap());
        assert!(server.receive_body().unwrap());

        server.feed_response(Bytes::from_static(b"{\"result\":[]}"), "application/json-rpc").unwrap();
        assert!(!server.send_buffer_is_empty());

        let mut total = 0;
        while !server.send_buffer_is_empty() {
            total += server.send_response().unwrap();
        }

        let written = peer.written();
        assert_eq!(total, written.len());
        assert!(written.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(written.contains("content-type: application/json-rpc\r\n"));
        assert!(written.contains("content-length: 13\r\n"));
        assert!(written.contains("cache-control: no-cache\r\n"));
        assert!(!written.contains("content-encoding"));
        assert!(!written.contains("connection: close"));
        assert!(written.ends_with("\r\n\r\n{\"result\":[]}"));
    }

    #[test]
    fn http_10_response_closes_and_marks_gzip() {
        let peer = Peer::default();
        peer.send(b"POST /rpc HTTP/1.0\r\nAccept-Encoding: gzip, deflate\r\nContent-Length: 0\r\n\r\n");
        let mut server = HttpServer::new(peer.socket(usize::MAX));
        assert!(server.receive_request().unwrap());
        assert!(!server.supports_persistent_connection());

        server.feed_response(Bytes::from_static(b"gz"), "application/json-rpc").unwrap();
        server.send_response().unwrap();

        let written = peer.written();
        assert!(written.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(written.contains("content-encoding: gzip\r\n"));
        assert!(written.contains("connection: close\r\n"));
    }

    #[test]
    fn invalid_content_type_is_rejected() {
        let peer = Peer::default();
        let mut server = HttpServer::new(peer.socket(usize::MAX));

        let result = server.feed_response(Bytes::new(), "bad\nvalue");
        assert!(matches!(result, Err(SendError::InvalidHeader { .. })));
        assert!(server.send_buffer_is_empty());
    }

    #[test]
    fn next_request_resets_exchange() {
        let peer = Peer::default();
        peer.send(b"POST /rpc HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}");
        let mut server = HttpServer::new(peer.socket(usize::MAX));
        assert!(server.receive_request().unwrap());
        assert!(server.receive_body().unwrap());

        peer.send(b"POST /other HTTP/1.1\r\nContent-Length: 1\r\n\r\n");
        assert!(server.receive_request().unwrap());
        assert_eq!(server.request_path(), "/other");
        assert!(server.body().is_empty());
        assert!(!server.receive_body().unwrap());
    }
}
