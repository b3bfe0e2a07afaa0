use std::rc::Rc;

use rpc_http::connection::HttpServer;
use rpc_http::net::{ListenSocket, Socket};
use tracing::{info, warn};

use crate::command::{Command, Cuid};
use crate::engine::{Engine, SocketCheck};
use crate::http::HttpServerCommand;

/// Accepts connections on the RPC port for as long as the engine runs.
pub struct HttpListenCommand {
    cuid: Cuid,
    listener: Rc<ListenSocket>,
    _read_check: SocketCheck,
}

impl HttpListenCommand {
    pub fn new(cuid: Cuid, listener: ListenSocket, engine: &Engine) -> Self {
        let listener = Rc::new(listener);
        let read_check = engine.watch_readable(Rc::<ListenSocket>::clone(&listener), cuid);
        Self { cuid, listener, _read_check: read_check }
    }

    fn accept_pending(&self, engine: &mut Engine) {
        loop {
            let (socket, address) = match self.listener.try_accept() {
                Ok(Some(accepted)) => accepted,
                Ok(None) => return,
                Err(e) => {
                    warn!(cuid = %self.cuid, cause = %e, "failed to accept");
                    return;
                }
            };

            let cuid = engine.new_cuid();
            info!(cuid = %cuid, peer = %address, "accepted rpc connection");
            let socket: Rc<dyn Socket> = Rc::new(socket);
            let server = HttpServer::new(Rc::clone(&socket)).with_max_body_size(engine.config().max_request_size());
            let command = HttpServerCommand::new(cuid, server, engine, socket);
            engine.schedule_next(Box::new(command));
        }
    }
}

impl Command for HttpListenCommand {
    fn cuid(&self) -> Cuid {
        self.cuid
    }

    fn execute(&mut self, engine: &mut Engine) -> bool {
        if engine.is_all_downloads_finished() || engine.is_halt_requested() {
            info!(cuid = %self.cuid, "stop listening");
            return true;
        }
        self.accept_pending(engine);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpc_http::net::Readiness;

    #[tokio::test]
    async fn accepts_and_schedules_connections() {
        let listener = ListenSocket::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let mut engine = Engine::default();
        let cuid = engine.new_cuid();
        let mut command = HttpListenCommand::new(cuid, listener, &engine);
        assert_eq!(engine.socket_checks(cuid), 1);

        assert!(!command.execute(&mut engine));
        assert_eq!(engine.pending_commands(), 0);

        let _first = tokio::net::TcpStream::connect(address).await.unwrap();
        let _second = tokio::net::TcpStream::connect(address).await.unwrap();
        let mut accepted = 0;
        while accepted < 2 {
            command.listener.readable().await.unwrap();
            assert!(!command.execute(&mut engine));
            accepted = engine.pending_commands();
        }
        assert_eq!(accepted, 2);

        engine.request_halt();
        assert!(command.execute(&mut engine));
    }
}
