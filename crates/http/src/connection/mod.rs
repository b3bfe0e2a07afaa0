//! Per-connection HTTP exchange.
//!
//! - [`Transport`]: the contract the connection commands drive, one non-blocking
//!   step per call
//! - [`HttpServer`]: the transport over a [`Socket`](crate::net::Socket), owning
//!   the partial header, the accumulated body and the staged response
//! - [`MessageWriter`]: response staging and non-blocking flushing

mod http_server;
mod message_writer;
mod transport;

pub use http_server::{DEFAULT_MAX_BODY_SIZE, HttpServer};
pub use message_writer::MessageWriter;
pub use transport::Transport;
