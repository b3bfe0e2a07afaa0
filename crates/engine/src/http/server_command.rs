use std::io::ErrorKind;
use std::rc::Rc;

use rpc_http::connection::Transport;
use rpc_http::net::Socket;
use rpc_http::protocol::ParseError;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::command::{Command, Cuid};
use crate::engine::{Engine, SocketCheck};
use crate::error::CommandError;
use crate::http::{HEADER_TIMEOUT, HttpServerBodyCommand};

/// Reads the request header, then hands the exchange to an
/// [`HttpServerBodyCommand`] in the same cycle.
pub struct HttpServerCommand<T> {
    cuid: Cuid,
    socket: Rc<dyn Socket>,
    transport: Option<T>,
    last_progress: Instant,
    _read_check: SocketCheck,
}

impl<T: Transport + 'static> HttpServerCommand<T> {
    pub fn new(cuid: Cuid, transport: T, engine: &Engine, socket: Rc<dyn Socket>) -> Self {
        let read_check = engine.watch_readable(Rc::<dyn Socket>::clone(&socket), cuid);
        Self { cuid, socket, transport: Some(transport), last_progress: engine.now(), _read_check: read_check }
    }

    fn process(&mut self, engine: &mut Engine) -> Result<bool, CommandError> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(true);
        };

        if self.socket.is_readable()? {
            self.last_progress = engine.now();
            if !transport.receive_request()? {
                return Ok(false);
            }

            let Some(transport) = self.transport.take() else {
                return Ok(true);
            };
            debug!(
                cuid = %self.cuid,
                path = transport.request_path(),
                content_length = transport.content_length(),
                "request header received"
            );
            let command = HttpServerBodyCommand::new(self.cuid, transport, engine, Rc::clone(&self.socket));
            engine.schedule_now(Box::new(command));
            return Ok(true);
        }

        if engine.now().duration_since(self.last_progress) >= HEADER_TIMEOUT {
            info!(cuid = %self.cuid, "http request timeout");
            return Ok(true);
        }
        Ok(false)
    }
}

impl<T: Transport + 'static> Command for HttpServerCommand<T> {
    fn cuid(&self) -> Cuid {
        self.cuid
    }

    fn execute(&mut self, engine: &mut Engine) -> bool {
        if engine.is_all_downloads_finished() || engine.is_halt_requested() {
            return true;
        }

        match self.process(engine) {
            Ok(finished) => finished,
            Err(CommandError::Parse { source: ParseError::Io { source } })
                if source.kind() == ErrorKind::UnexpectedEof =>
            {
                debug!(cuid = %self.cuid, "peer closed connection");
                true
            }
            Err(e) => {
                info!(cuid = %self.cuid, cause = %e, "error occurred while reading http request");
                true
            }
        }
    }
}
