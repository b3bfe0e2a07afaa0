//! A single threaded command engine serving a JSON-RPC endpoint over HTTP.
//!
//! Work is split into [`Command`]s that the [`Engine`] runs one turn at a time.
//! A command never blocks: it polls its socket, does whatever is possible
//! right now and either finishes or asks for another turn. Sockets a command is
//! interested in are registered with the engine so it can sleep until one of
//! them is ready.
//!
//! # Serving RPC
//!
//! Each connection is handled by a chain of commands from the [`http`] module:
//!
//! 1. [`http::HttpListenCommand`] accepts the connection
//! 2. [`http::HttpServerCommand`] reads the request header
//! 3. [`http::HttpServerBodyCommand`] receives the body and executes `/rpc` calls
//! 4. [`http::HttpServerResponseCommand`] sends the reply
//!
//! Calls are looked up in the engine's [`rpc::MethodRegistry`] and run against
//! its [`download::DownloadQueue`].
//!
//! # Wire format
//!
//! Calls are JSON-RPC 2.0 objects, not the XML-RPC `methodCall` documents aria2
//! accepts on the same path. Replies are sent as `application/json-rpc`
//! ([`rpc::RPC_CONTENT_TYPE`]) rather than `text/xml`, so XML-RPC clients are not
//! served.
//!
//! # Example
//!
//! ```no_run
//! use rpc_engine::http::HttpListenCommand;
//! use rpc_engine::Engine;
//! use rpc_http::net::ListenSocket;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> std::io::Result<()> {
//!     let listener = ListenSocket::bind("127.0.0.1:6800").await?;
//!
//!     let mut engine = Engine::default();
//!     let cuid = engine.new_cuid();
//!     let command = HttpListenCommand::new(cuid, listener, &engine);
//!     engine.schedule_next(Box::new(command));
//!
//!     engine.run().await;
//!     Ok(())
//! }
//! ```
//!
//! # Limitations
//!
//! - Everything runs on the current thread, the engine is neither `Send` nor `Sync`
//! - Only `POST /rpc` with a JSON-RPC body is executed, other paths are read and dropped
//! - No XML-RPC, see [Wire format](#wire-format)
//! - Errors close the connection without an HTTP error response

pub mod command;
pub mod config;
pub mod download;
pub mod engine;
pub mod error;
pub mod http;
pub mod rpc;

pub use command::{Command, Cuid};
pub use config::EngineConfig;
pub use engine::{Engine, SocketCheck};
pub use error::CommandError;
