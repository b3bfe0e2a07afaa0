use std::io;

use rpc_http::protocol::{ParseError, SendError};
use thiserror::Error;

use crate::rpc::RpcError;

/// Anything that ends a connection command early.
///
/// Commands never hand these to the engine: `execute` logs them and reports the
/// command as finished.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("request error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    Send {
        #[from]
        source: SendError,
    },

    #[error("rpc error: {source}")]
    Rpc {
        #[from]
        source: RpcError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}
