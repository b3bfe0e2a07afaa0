//! The cooperative scheduler.
//!
//! One [`Engine`] runs every command of the process on a single thread. A
//! cycle executes every queued command once. Between cycles the engine either
//! moves on right away, when some command asked for it, or sleeps until one of
//! the sockets commands registered interest in becomes ready, bounded by the
//! configured select timeout.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use futures::future::select_all;
use rpc_http::net::Readiness;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::command::{Command, Cuid};
use crate::config::EngineConfig;
use crate::download::DownloadQueue;
use crate::rpc::MethodRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interest {
    Read,
    Write,
}

struct Watch {
    id: u64,
    cuid: Cuid,
    interest: Interest,
    socket: Rc<dyn Readiness>,
}

#[derive(Default)]
struct SocketTable {
    watches: Vec<Watch>,
    next_id: u64,
}

impl SocketTable {
    fn insert(&mut self, cuid: Cuid, interest: Interest, socket: Rc<dyn Readiness>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.watches.push(Watch { id, cuid, interest, socket });
        id
    }

    fn remove(&mut self, id: u64) {
        self.watches.retain(|watch| watch.id != id);
    }
}

/// A registered interest in a socket, removed again when the guard is dropped.
///
/// Commands keep the guard in a field, so the registration lives exactly as
/// long as the command does whichever way it finishes.
#[must_use = "the registration is removed as soon as the guard is dropped"]
pub struct SocketCheck {
    table: Weak<RefCell<SocketTable>>,
    id: u64,
}

impl Drop for SocketCheck {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            table.borrow_mut().remove(self.id);
        }
    }
}

impl fmt::Debug for SocketCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketCheck").field("id", &self.id).finish()
    }
}

pub struct Engine {
    config: EngineConfig,
    routine: VecDeque<Box<dyn Command>>,
    next: VecDeque<Box<dyn Command>>,
    checks: Rc<RefCell<SocketTable>>,
    no_wait: bool,
    halt_requested: bool,
    next_cuid: u64,
    downloads: DownloadQueue,
    methods: MethodRegistry,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let downloads = DownloadQueue::new(config.max_concurrent_downloads(), config.keep_running());
        Self {
            config,
            routine: VecDeque::new(),
            next: VecDeque::new(),
            checks: Rc::new(RefCell::new(SocketTable::default())),
            no_wait: false,
            halt_requested: false,
            next_cuid: 1,
            downloads,
            methods: MethodRegistry::with_builtin_methods(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Allocates the identity of a new connection.
    pub fn new_cuid(&mut self) -> Cuid {
        let cuid = Cuid::new(self.next_cuid);
        self.next_cuid += 1;
        cuid
    }

    /// Runs `command` later in the current cycle, or in the next one when no
    /// cycle is in progress.
    pub fn schedule_now(&mut self, command: Box<dyn Command>) {
        trace!(cuid = %command.cuid(), "scheduled for this cycle");
        self.routine.push_back(command);
    }

    /// Runs `command` in the cycle after the current one.
    pub fn schedule_next(&mut self, command: Box<dyn Command>) {
        trace!(cuid = %command.cuid(), "scheduled for next cycle");
        self.next.push_back(command);
    }

    /// Skips the readiness wait before the next cycle.
    pub fn request_immediate_next_turn(&mut self) {
        self.no_wait = true;
    }

    pub fn is_immediate_next_turn_requested(&self) -> bool {
        self.no_wait
    }

    /// Number of commands waiting for a turn.
    pub fn pending_commands(&self) -> usize {
        self.routine.len() + self.next.len()
    }

    pub fn now(&self) -> Instant {
        Instant::now()
    }

    pub fn request_halt(&mut self) {
        if !self.halt_requested {
            info!("halt requested");
        }
        self.halt_requested = true;
    }

    pub fn is_halt_requested(&self) -> bool {
        self.halt_requested
    }

    pub fn is_all_downloads_finished(&self) -> bool {
        self.downloads.is_finished()
    }

    pub fn downloads(&self) -> &DownloadQueue {
        &self.downloads
    }

    pub fn downloads_mut(&mut self) -> &mut DownloadQueue {
        &mut self.downloads
    }

    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    pub fn methods_mut(&mut self) -> &mut MethodRegistry {
        &mut self.methods
    }

    /// Wakes the engine when `socket` becomes readable, for as long as the
    /// returned guard lives.
    pub fn watch_readable(&self, socket: Rc<dyn Readiness>, cuid: Cuid) -> SocketCheck {
        self.watch(socket, cuid, Interest::Read)
    }

    /// Wakes the engine when `socket` becomes writable, for as long as the
    /// returned guard lives.
    pub fn watch_writable(&self, socket: Rc<dyn Readiness>, cuid: Cuid) -> SocketCheck {
        self.watch(socket, cuid, Interest::Write)
    }

    fn watch(&self, socket: Rc<dyn Readiness>, cuid: Cuid, interest: Interest) -> SocketCheck {
        let id = self.checks.borrow_mut().insert(cuid, interest, socket);
        trace!(cuid = %cuid, ?interest, "socket registered");
        SocketCheck { table: Rc::downgrade(&self.checks), id }
    }

    /// Number of socket registrations currently held for `cuid`.
    pub fn socket_checks(&self, cuid: Cuid) -> usize {
        self.checks.borrow().watches.iter().filter(|watch| watch.cuid == cuid).count()
    }

    /// Runs one cycle: every command queued so far gets one turn, and so does
    /// every command scheduled with [`Engine::schedule_now`] meanwhile.
    ///
    /// Commands that are not finished are queued for the next cycle.
    pub fn run_once(&mut self) {
        let next = mem::take(&mut self.next);
        self.routine.extend(next);

        while let Some(mut command) = self.routine.pop_front() {
            if !command.execute(self) {
                self.next.push_back(command);
            }
        }
    }

    /// Runs cycles until no command is left.
    pub async fn run(&mut self) {
        info!(commands = self.pending_commands(), "engine started");
        while self.pending_commands() > 0 {
            self.run_once();
            if self.pending_commands() == 0 {
                break;
            }
            if mem::take(&mut self.no_wait) {
                tokio::task::yield_now().await;
            } else {
                self.wait_for_sockets().await;
            }
        }
        info!("engine stopped");
    }

    async fn wait_for_sockets(&self) {
        let watched: Vec<(Interest, Rc<dyn Readiness>)> =
            self.checks.borrow().watches.iter().map(|watch| (watch.interest, Rc::clone(&watch.socket))).collect();

        if watched.is_empty() {
            tokio::time::sleep(self.config.select_timeout()).await;
            return;
        }

        let waits = watched.iter().map(|(interest, socket)| match interest {
            Interest::Read => socket.readable(),
            Interest::Write => socket.writable(),
        });
        match tokio::time::timeout(self.config.select_timeout(), select_all(waits)).await {
            Ok((Ok(()), index, _)) => trace!(index, "socket ready"),
            Ok((Err(e), index, _)) => debug!(index, cause = %e, "socket wait failed"),
            Err(_) => trace!("select timeout"),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("pending_commands", &self.pending_commands())
            .field("socket_checks", &self.checks.borrow().watches.len())
            .field("no_wait", &self.no_wait)
            .field("halt_requested", &self.halt_requested)
            .finish_non_exhaustive()
    }
}
