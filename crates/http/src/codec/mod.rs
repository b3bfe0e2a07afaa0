//! HTTP codec module.
//!
//! The codecs work on a caller owned `BytesMut` and never touch a socket, which
//! lets the transport feed them whatever a non-blocking read produced and call
//! them again on a later turn.
//!
//! # Example
//!
//! ```
//! use rpc_http::codec::{HeaderDecoder, LengthDecoder};
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut buffer = BytesMut::from("POST /rpc HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}");
//! let (header, payload_size) = HeaderDecoder.decode(&mut buffer).unwrap().unwrap();
//! assert_eq!(header.path(), "/rpc");
//!
//! let mut body = LengthDecoder::new(payload_size.len());
//! let chunk = body.decode(&mut buffer).unwrap().unwrap();
//! assert_eq!(chunk.as_bytes().unwrap().as_ref(), b"{}");
//! ```

mod body;
mod header;

pub use body::LengthDecoder;
pub use header::{HeaderDecoder, HeaderEncoder};
