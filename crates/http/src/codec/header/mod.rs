//! Header encoding and decoding.
//!
//! - [`HeaderDecoder`]: request line and header fields, with size limits
//! - [`HeaderEncoder`]: status line and header fields of a staged response

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
