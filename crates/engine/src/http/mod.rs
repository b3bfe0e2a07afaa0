//! Commands serving the RPC endpoint, one chain per connection.
//!
//! [`HttpListenCommand`] accepts connections and starts an [`HttpServerCommand`]
//! for each. That command reads the request header and hands the exchange to an
//! [`HttpServerBodyCommand`], which receives the body and dispatches `/rpc`
//! calls. The reply is sent by an [`HttpServerResponseCommand`], which starts
//! over with a new [`HttpServerCommand`] when the connection is persistent.
//!
//! Every command owns the exchange while it runs and passes it on when it
//! finishes, so two commands never touch the same connection in one turn.

mod body_command;
mod listen_command;
mod response_command;
mod server_command;

use std::time::Duration;

pub use body_command::{HttpServerBodyCommand, Termination};
pub use listen_command::HttpListenCommand;
pub use response_command::HttpServerResponseCommand;
pub use server_command::HttpServerCommand;

/// Path of the RPC endpoint
pub const RPC_PATH: &str = "/rpc";

/// Longest pause allowed between two request body reads
pub const BODY_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest pause allowed while the request header arrives
pub const HEADER_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest time the peer may refuse to take response bytes
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);
