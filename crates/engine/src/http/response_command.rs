use std::rc::Rc;

use rpc_http::connection::Transport;
use rpc_http::net::Socket;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::command::{Command, Cuid};
use crate::engine::{Engine, SocketCheck};
use crate::error::CommandError;
use crate::http::{HttpServerCommand, RESPONSE_TIMEOUT};

/// Sends the staged response.
///
/// Once the last byte is out, a persistent connection goes back to reading
/// the next request header; otherwise the connection is closed.
pub struct HttpServerResponseCommand<T> {
    cuid: Cuid,
    socket: Rc<dyn Socket>,
    transport: Option<T>,
    last_progress: Instant,
    _write_check: SocketCheck,
}

impl<T: Transport + 'static> HttpServerResponseCommand<T> {
    pub fn new(cuid: Cuid, transport: T, engine: &Engine, socket: Rc<dyn Socket>) -> Self {
        let write_check = engine.watch_writable(Rc::<dyn Socket>::clone(&socket), cuid);
        Self { cuid, socket, transport: Some(transport), last_progress: engine.now(), _write_check: write_check }
    }

    fn process(&mut self, engine: &mut Engine) -> Result<bool, CommandError> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(true);
        };

        let written = transport.send_response()?;
        if written > 0 {
            trace!(cuid = %self.cuid, written, "response bytes sent");
            self.last_progress = engine.now();
        }

        if transport.send_buffer_is_empty() {
            if !transport.supports_persistent_connection() {
                debug!(cuid = %self.cuid, "response sent, closing connection");
                return Ok(true);
            }
            if let Some(transport) = self.transport.take() {
                debug!(cuid = %self.cuid, "response sent, waiting for next request");
                let command = HttpServerCommand::new(self.cuid, transport, engine, Rc::clone(&self.socket));
                engine.schedule_next(Box::new(command));
            }
            return Ok(true);
        }

        if engine.now().duration_since(self.last_progress) >= RESPONSE_TIMEOUT {
            info!(cuid = %self.cuid, "http response timeout");
            return Ok(true);
        }
        Ok(false)
    }
}

impl<T: Transport + 'static> Command for HttpServerResponseCommand<T> {
    fn cuid(&self) -> Cuid {
        self.cuid
    }

    fn execute(&mut self, engine: &mut Engine) -> bool {
        if engine.is_all_downloads_finished() || engine.is_halt_requested() {
            return true;
        }

        self.process(engine).unwrap_or_else(|e| {
            info!(cuid = %self.cuid, cause = %e, "error occurred while sending http response");
            true
        })
    }
}
