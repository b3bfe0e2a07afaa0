use bytes::Bytes;

use crate::protocol::{ParseError, SendError};

/// One HTTP exchange, advanced a step at a time by whichever command currently
/// owns it.
///
/// None of the methods wait for the peer. A method that needs more data than the
/// socket has returns `Ok(false)` and is called again on a later turn; the state
/// needed to resume lives in the implementation.
pub trait Transport {
    /// Reads what is available and tries to decode the request header.
    ///
    /// Returns `true` once a complete header was decoded. Calling it again after
    /// a finished exchange starts the next request on the same connection.
    fn receive_request(&mut self) -> Result<bool, ParseError>;

    /// Body length declared by the request header.
    fn content_length(&self) -> u64;

    /// Accumulates more body bytes, returns `true` once the declared length has
    /// been received.
    fn receive_body(&mut self) -> Result<bool, ParseError>;

    /// Path of the request target, empty before a header was decoded.
    fn request_path(&self) -> &str;

    /// The body accumulated so far.
    fn body(&self) -> &[u8];

    /// Whether the peer accepts a gzip encoded response.
    fn supports_gzip(&self) -> bool;

    /// Stages a `200 OK` response carrying `payload`.
    fn feed_response(&mut self, payload: Bytes, content_type: &str) -> Result<(), SendError>;

    /// Writes as much of the staged response as the socket accepts, returning the
    /// number of bytes written.
    fn send_response(&mut self) -> Result<usize, SendError>;

    fn send_buffer_is_empty(&self) -> bool;

    /// Whether the connection stays open for another request after this one.
    fn supports_persistent_connection(&self) -> bool;
}
