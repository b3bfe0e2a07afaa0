//! Request body decoding.
//!
//! Bodies are framed by `Content-Length` only; [`LengthDecoder`] hands out the
//! bytes as they arrive and reports the end once the declared length is reached.

mod length_decoder;

pub use length_decoder::LengthDecoder;
