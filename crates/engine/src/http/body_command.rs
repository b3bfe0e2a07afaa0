use std::mem;
use std::rc::Rc;

use rpc_http::connection::Transport;
use rpc_http::net::Socket;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::command::{Command, Cuid};
use crate::engine::{Engine, SocketCheck};
use crate::error::CommandError;
use crate::http::{BODY_TIMEOUT, HttpServerResponseCommand, RPC_PATH};
use crate::rpc::{RPC_CONTENT_TYPE, RpcRequest};

/// How an [`HttpServerBodyCommand`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The call was executed and its response handed to a response command.
    Dispatched,
    /// The body was received for a path other than the RPC endpoint.
    Skipped,
    /// The peer sent nothing for [`BODY_TIMEOUT`].
    TimedOut,
    /// The engine is shutting down.
    Aborted,
    /// Receiving the body or executing the call failed.
    Failed,
}

enum State<T> {
    Receiving(T),
    Terminated(Termination),
}

/// Receives the request body across as many turns as the peer needs, then
/// dispatches `/rpc` calls.
///
/// The body is read only when the socket is readable, or right away when the
/// request declared no body. The idle timer restarts on every such turn, so a
/// slow peer is fine as long as it never pauses for [`BODY_TIMEOUT`].
///
/// Dispatch takes the transport out of the command, which is what makes it
/// happen at most once. Failures end the command without a response and the
/// connection is closed when the transport is dropped.
///
/// The read registration is released before the response command registers its
/// write interest, so a connection never holds both.
pub struct HttpServerBodyCommand<T> {
    cuid: Cuid,
    socket: Rc<dyn Socket>,
    state: State<T>,
    last_progress: Instant,
    read_check: Option<SocketCheck>,
}

impl<T: Transport + 'static> HttpServerBodyCommand<T> {
    pub fn new(cuid: Cuid, transport: T, engine: &Engine, socket: Rc<dyn Socket>) -> Self {
        let read_check = engine.watch_readable(Rc::<dyn Socket>::clone(&socket), cuid);
        Self {
            cuid,
            socket,
            state: State::Receiving(transport),
            last_progress: engine.now(),
            read_check: Some(read_check),
        }
    }

    /// How the command ended, `None` while it is still receiving.
    pub fn termination(&self) -> Option<Termination> {
        match self.state {
            State::Receiving(_) => None,
            State::Terminated(termination) => Some(termination),
        }
    }

    /// Runs one turn, `Ok(None)` asks for another.
    fn process(&mut self, engine: &mut Engine) -> Result<Option<Termination>, CommandError> {
        let State::Receiving(transport) = &mut self.state else {
            return Ok(self.termination());
        };

        if self.socket.is_readable()? || transport.content_length() == 0 {
            self.last_progress = engine.now();
            if !transport.receive_body()? {
                trace!(cuid = %self.cuid, "request body incomplete");
                return Ok(None);
            }

            if transport.request_path() != RPC_PATH {
                debug!(cuid = %self.cuid, path = transport.request_path(), "not an rpc request, skipped");
                return Ok(Some(Termination::Skipped));
            }

            let dispatched = State::Terminated(Termination::Dispatched);
            let State::Receiving(transport) = mem::replace(&mut self.state, dispatched) else {
                return Ok(Some(Termination::Dispatched));
            };
            self.dispatch(transport, engine)?;
            return Ok(Some(Termination::Dispatched));
        }

        if engine.now().duration_since(self.last_progress) >= BODY_TIMEOUT {
            info!(cuid = %self.cuid, "http request body timeout");
            return Ok(Some(Termination::TimedOut));
        }
        Ok(None)
    }

    fn dispatch(&mut self, mut transport: T, engine: &mut Engine) -> Result<(), CommandError> {
        let request = RpcRequest::from_slice(transport.body())?;
        debug!(cuid = %self.cuid, method = request.method(), "executing rpc method");

        let method = engine.methods().lookup(request.method())?;
        let response = method.execute(&request, engine)?;
        let payload = response.serialize(transport.supports_gzip())?;
        transport.feed_response(payload, RPC_CONTENT_TYPE)?;

        self.read_check = None;
        let command = HttpServerResponseCommand::new(self.cuid, transport, engine, Rc::clone(&self.socket));
        engine.schedule_next(Box::new(command));
        engine.request_immediate_next_turn();
        Ok(())
    }
}

impl<T: Transport + 'static> Command for HttpServerBodyCommand<T> {
    fn cuid(&self) -> Cuid {
        self.cuid
    }

    fn execute(&mut self, engine: &mut Engine) -> bool {
        if engine.is_all_downloads_finished() || engine.is_halt_requested() {
            if let State::Receiving(_) = self.state {
                self.state = State::Terminated(Termination::Aborted);
            }
            return true;
        }

        match self.process(engine) {
            Ok(None) => false,
            Ok(Some(termination)) => {
                self.state = State::Terminated(termination);
                true
            }
            Err(e) => {
                info!(cuid = %self.cuid, cause = %e, "error occurred while reading http request body");
                self.state = State::Terminated(Termination::Failed);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::http::testing::{Exchange, FakeTransport, Recorder, socket, transport};
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    const TELL_ACTIVE: &[u8] = br#"{"jsonrpc":"2.0","id":"1","method":"aria2.tellActive"}"#;

    struct Fixture {
        engine: Engine,
        readable: Arc<AtomicBool>,
        calls: Rc<RefCell<Vec<String>>>,
        cuid: Cuid,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_engine(Engine::default())
        }

        fn with_engine(mut engine: Engine) -> Self {
            let calls = Rc::new(RefCell::new(Vec::new()));
            let recorder = Recorder { name: "aria2.tellActive", calls: Rc::clone(&calls) };
            engine.methods_mut().register(Rc::new(recorder));
            let cuid = engine.new_cuid();
            Self { engine, readable: Arc::new(AtomicBool::new(false)), calls, cuid }
        }

        fn command(
            &self,
            path: &str,
            body: &[u8],
            exchange: Exchange,
        ) -> (HttpServerBodyCommand<FakeTransport>, Rc<RefCell<Exchange>>) {
            let (transport, exchange) = transport(path, body, exchange);
            (HttpServerBodyCommand::new(self.cuid, transport, &self.engine, socket(&self.readable)), exchange)
        }

        fn set_readable(&self, readable: bool) {
            self.readable.store(readable, Ordering::SeqCst);
        }
    }

    fn body_of(length: u64, complete_on: usize) -> Exchange {
        Exchange { content_length: length, complete_on, ..Exchange::default() }
    }

    #[test]
    fn empty_body_dispatches_on_first_turn() {
        let mut fixture = Fixture::new();
        let (mut command, exchange) = fixture.command(RPC_PATH, TELL_ACTIVE, body_of(0, 1));

        assert!(command.execute(&mut fixture.engine));
        assert_eq!(command.termination(), Some(Termination::Dispatched));
        assert_eq!(*fixture.calls.borrow(), vec!["aria2.tellActive"]);

        let exchange = exchange.borrow();
        let (payload, content_type) = exchange.staged.as_ref().unwrap();
        assert_eq!(content_type, "application/json-rpc");
        let response: Value = serde_json::from_slice(payload).unwrap();
        assert_eq!(response, json!({"id": "1", "jsonrpc": "2.0", "result": []}));

        assert_eq!(fixture.engine.pending_commands(), 1);
        assert!(fixture.engine.is_immediate_next_turn_requested());
    }

    #[test]
    fn waits_until_socket_readable() {
        let mut fixture = Fixture::new();
        let (mut command, exchange) = fixture.command(RPC_PATH, TELL_ACTIVE, body_of(50, 2));

        assert!(!command.execute(&mut fixture.engine));
        assert!(!command.execute(&mut fixture.engine));
        assert_eq!(exchange.borrow().body_calls, 0);

        fixture.set_readable(true);
        assert!(!command.execute(&mut fixture.engine));
        assert!(command.execute(&mut fixture.engine));
        assert_eq!(exchange.borrow().body_calls, 2);
        assert_eq!(command.termination(), Some(Termination::Dispatched));
    }

    #[test]
    fn gzip_capable_peer_gets_compressed_response() {
        let mut fixture = Fixture::new();
        let exchange = Exchange { gzip: true, ..body_of(0, 1) };
        let (mut command, exchange) = fixture.command(RPC_PATH, TELL_ACTIVE, exchange);

        assert!(command.execute(&mut fixture.engine));
        let exchange = exchange.borrow();
        let (payload, _) = exchange.staged.as_ref().unwrap();
        assert_eq!(&payload[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn other_paths_are_skipped() {
        let mut fixture = Fixture::new();
        fixture.set_readable(true);
        let (mut command, exchange) = fixture.command("/download-status", TELL_ACTIVE, body_of(50, 1));

        assert!(command.execute(&mut fixture.engine));
        assert_eq!(command.termination(), Some(Termination::Skipped));
        assert!(fixture.calls.borrow().is_empty());
        assert!(exchange.borrow().staged.is_none());
        assert_eq!(fixture.engine.pending_commands(), 0);
    }

    #[test]
    fn rpc_failures_end_without_response() {
        let bodies: [&[u8]; 4] = [
            b"{not json",
            br#"{"jsonrpc":"2.0","id":1,"method":"aria2.noSuchMethod"}"#,
            br#"{"jsonrpc":"2.0","id":1,"method":"aria2.tellStatus","params":["0000000000000abc"]}"#,
            br#"{"jsonrpc":"2.0","id":1,"method":"aria2.addUri","params":[[]]}"#,
        ];

        for body in bodies {
            let mut fixture = Fixture::new();
            let (mut command, exchange) = fixture.command(RPC_PATH, body, body_of(0, 1));

            assert!(command.execute(&mut fixture.engine));
            assert_eq!(command.termination(), Some(Termination::Failed));
            assert!(exchange.borrow().staged.is_none());
            assert_eq!(fixture.engine.pending_commands(), 0);
            assert!(!fixture.engine.is_immediate_next_turn_requested());
        }
    }

    #[test]
    fn receive_failure_ends_command() {
        let mut fixture = Fixture::new();
        fixture.set_readable(true);
        let exchange = Exchange { fail_body: true, ..body_of(50, 1) };
        let (mut command, _exchange) = fixture.command(RPC_PATH, TELL_ACTIVE, exchange);

        assert!(command.execute(&mut fixture.engine));
        assert_eq!(command.termination(), Some(Termination::Failed));
        assert!(fixture.calls.borrow().is_empty());
    }

    #[test]
    fn halt_takes_precedence_over_complete_body() {
        let mut fixture = Fixture::new();
        fixture.set_readable(true);
        let (mut command, exchange) = fixture.command(RPC_PATH, TELL_ACTIVE, body_of(0, 1));

        fixture.engine.request_halt();
        assert!(command.execute(&mut fixture.engine));
        assert_eq!(command.termination(), Some(Termination::Aborted));
        assert_eq!(exchange.borrow().body_calls, 0);
        assert!(fixture.calls.borrow().is_empty());
    }

    #[test]
    fn finished_downloads_abort_too() {
        let mut fixture = Fixture::with_engine(Engine::new(EngineConfig::builder().keep_running(false).build()));
        let (mut command, exchange) = fixture.command(RPC_PATH, TELL_ACTIVE, body_of(0, 1));

        assert!(command.execute(&mut fixture.engine));
        assert_eq!(command.termination(), Some(Termination::Aborted));
        assert!(exchange.borrow().staged.is_none());
    }

    #[test]
    fn dispatches_at_most_once() {
        let mut fixture = Fixture::new();
        let (mut command, _exchange) = fixture.command(RPC_PATH, TELL_ACTIVE, body_of(0, 1));

        assert!(command.execute(&mut fixture.engine));
        assert!(command.execute(&mut fixture.engine));
        assert!(command.execute(&mut fixture.engine));
        assert_eq!(fixture.calls.borrow().len(), 1);
        assert_eq!(fixture.engine.pending_commands(), 1);
        assert_eq!(command.termination(), Some(Termination::Dispatched));
    }

    #[test]
    fn one_registration_per_command_on_every_exit() {
        let outcomes = [
            (RPC_PATH, TELL_ACTIVE, Exchange::default(), false),
            ("/other", TELL_ACTIVE, Exchange::default(), false),
            (RPC_PATH, &b"{"[..], Exchange::default(), false),
            (RPC_PATH, TELL_ACTIVE, Exchange::default(), true),
        ];

        for (path, body, exchange, halt) in outcomes {
            let mut fixture = Fixture::new();
            let (mut command, _exchange) = fixture.command(path, body, Exchange { complete_on: 1, ..exchange });
            assert_eq!(fixture.engine.socket_checks(fixture.cuid), 1);

            if halt {
                fixture.engine.request_halt();
            }
            assert!(command.execute(&mut fixture.engine));
            assert_eq!(fixture.engine.socket_checks(fixture.cuid), 1);

            drop(command);
            // a dispatched response command holds its own write registration
            let remaining = usize::from(fixture.engine.pending_commands() > 0);
            assert_eq!(fixture.engine.socket_checks(fixture.cuid), remaining);
        }
    }

    #[test]
    fn read_interest_released_before_response_registers() {
        let mut fixture = Fixture::new();
        let (mut command, _exchange) = fixture.command(RPC_PATH, TELL_ACTIVE, body_of(0, 1));
        assert_eq!(fixture.engine.socket_checks(fixture.cuid), 1);

        assert!(command.execute(&mut fixture.engine));
        assert_eq!(fixture.engine.pending_commands(), 1);
        // the body command is still alive, only the response command's write interest is held
        assert_eq!(fixture.engine.socket_checks(fixture.cuid), 1);

        drop(command);
        assert_eq!(fixture.engine.socket_checks(fixture.cuid), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_thirty_idle_seconds() {
        let mut fixture = Fixture::new();
        let (mut command, exchange) = fixture.command(RPC_PATH, TELL_ACTIVE, body_of(50, 1));

        assert!(!command.execute(&mut fixture.engine));
        tokio::time::advance(Duration::from_millis(29_999)).await;
        assert!(!command.execute(&mut fixture.engine));
        assert_eq!(fixture.engine.socket_checks(fixture.cuid), 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(command.execute(&mut fixture.engine));
        assert_eq!(command.termination(), Some(Termination::TimedOut));
        assert_eq!(exchange.borrow().body_calls, 0);
        assert!(fixture.calls.borrow().is_empty());

        drop(command);
        assert_eq!(fixture.engine.socket_checks(fixture.cuid), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_from_last_progress() {
        let mut fixture = Fixture::new();
        let (mut command, _exchange) = fixture.command(RPC_PATH, TELL_ACTIVE, body_of(50, 3));

        tokio::time::advance(Duration::from_secs(20)).await;
        fixture.set_readable(true);
        assert!(!command.execute(&mut fixture.engine));
        fixture.set_readable(false);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!command.execute(&mut fixture.engine));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(command.execute(&mut fixture.engine));
        assert_eq!(command.termination(), Some(Termination::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn trickling_body_never_times_out() {
        let mut fixture = Fixture::new();
        fixture.set_readable(true);
        let (mut command, _exchange) = fixture.command(RPC_PATH, TELL_ACTIVE, body_of(50, 4));

        for _ in 0..3 {
            assert!(!command.execute(&mut fixture.engine));
            tokio::time::advance(Duration::from_secs(25)).await;
        }
        assert!(command.execute(&mut fixture.engine));
        assert_eq!(command.termination(), Some(Termination::Dispatched));
    }
}
