//! A turn based HTTP/1.1 transport for an embedded JSON-RPC endpoint
//!
//! This crate provides the HTTP side of a single threaded RPC server. Nothing in
//! it waits for the network: every operation performs one non-blocking step and
//! reports whether it finished, so a cooperative scheduler can drive many
//! connections from one thread by calling the same operation again on a later
//! turn.
//!
//! # Features
//!
//! - Incremental request header decoding built on `httparse`
//! - `Content-Length` framed bodies accumulated across any number of reads
//! - Over-read bytes put back into the socket, so pipelined requests survive
//! - Fully staged responses flushed as far as the socket accepts
//! - Keep-alive detection for HTTP/1.0 and HTTP/1.1
//!
//! # Example
//!
//! ```no_run
//! use std::rc::Rc;
//!
//! use bytes::Bytes;
//! use rpc_http::connection::{HttpServer, Transport};
//! use rpc_http::net::{ListenSocket, Readiness, Socket};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let listener = ListenSocket::bind("127.0.0.1:6800").await?;
//!     listener.readable().await?;
//!     let Some((socket, _peer)) = listener.try_accept()? else {
//!         return Ok(());
//!     };
//!
//!     let socket: Rc<dyn Socket> = Rc::new(socket);
//!     let mut server = HttpServer::new(Rc::clone(&socket));
//!     loop {
//!         socket.readable().await?;
//!         if server.receive_request()? {
//!             break;
//!         }
//!     }
//!     while !server.receive_body()? {
//!         socket.readable().await?;
//!     }
//!
//!     let echo = Bytes::copy_from_slice(server.body());
//!     server.feed_response(echo, "application/json-rpc")?;
//!     while !server.send_buffer_is_empty() {
//!         socket.writable().await?;
//!         server.send_response()?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`net`]: the non-blocking [`net::Socket`] abstraction and its TCP implementation
//! - [`codec`]: header and body codecs working on caller owned buffers
//! - [`connection`]: the [`connection::Transport`] contract and [`connection::HttpServer`]
//! - [`protocol`]: request, response and error types
//!
//! # Limitations
//!
//! - HTTP/1.x only
//! - No chunked request bodies, `Transfer-Encoding` is rejected
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod net;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
