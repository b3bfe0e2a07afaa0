//! Decoder for request bodies framed by `Content-Length`
//! ([RFC 9112 Section 6.2](https://www.rfc-editor.org/rfc/rfc9112#section-6.2)).

use std::cmp;

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Yields body chunks until the declared number of bytes has been taken,
/// then [`PayloadItem::Eof`] on every further call.
///
/// Bytes past the declared length are never consumed, so a pipelined request
/// stays in the source buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    /// The number of bytes remaining to be read from the payload
    length: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { length }
    }

    /// Bytes still expected from the peer.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.length
    }

    /// Whether the whole body has been taken.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.length == 0
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// - `Ok(Some(PayloadItem::Eof))` when all bytes have been read
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` when some of the body was available
    /// - `Ok(None)` when more data is needed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.length == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = cmp::min(self.length, src.len() as u64);
        let bytes = src.split_to(usize::try_from(len).map_err(ParseError::invalid_body)?).freeze();

        self.length -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}
