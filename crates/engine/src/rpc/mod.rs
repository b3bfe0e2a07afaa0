//! JSON-RPC 2.0 over `POST /rpc`.
//!
//! - [`RpcRequest`]: a parsed call
//! - [`RpcMethod`] / [`MethodRegistry`]: method lookup and execution against the engine
//! - [`RpcResponse`]: the result, serialized and optionally gzip compressed
//! - [`methods`]: the built-in methods

mod error;
mod method;
pub mod methods;
mod request;
mod response;

pub use error::RpcError;
pub use method::{MethodRegistry, RpcMethod};
pub use request::RpcRequest;
pub use response::RpcResponse;

/// Content type of every RPC response
pub const RPC_CONTENT_TYPE: &str = "application/json-rpc";
