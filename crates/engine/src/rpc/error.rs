use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("malformed request: {source}")]
    Parse {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("no such method: {name}")]
    NoSuchMethod { name: String },

    #[error("invalid params: {reason}")]
    InvalidParams { reason: String },

    #[error("{reason}")]
    Execution { reason: String },

    #[error("serialize response error: {source}")]
    Serialize {
        #[from]
        source: io::Error,
    },
}

impl RpcError {
    pub fn invalid_request<S: ToString>(str: S) -> Self {
        Self::InvalidRequest { reason: str.to_string() }
    }

    pub fn no_such_method<S: ToString>(str: S) -> Self {
        Self::NoSuchMethod { name: str.to_string() }
    }

    pub fn invalid_params<S: ToString>(str: S) -> Self {
        Self::InvalidParams { reason: str.to_string() }
    }

    pub fn execution<S: ToString>(str: S) -> Self {
        Self::Execution { reason: str.to_string() }
    }
}
