//! The unit of work the [`Engine`] drives.

use std::fmt;

use crate::engine::Engine;

/// Identity of a connection, shared by every command serving it.
///
/// Only used to correlate log lines and socket registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cuid(u64);

impl Cuid {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A resumable task run by the [`Engine`], one turn per call to [`Command::execute`].
///
/// A command never waits. Everything it needs to resume lives in its own
/// fields, and returning `false` is how it suspends: the engine keeps the same
/// object and calls it again on the next cycle. Returning `true` finishes the
/// command and the engine drops it.
///
/// A command may hand its work to a successor by scheduling it through the
/// engine before it returns.
pub trait Command {
    fn cuid(&self) -> Cuid;

    /// Runs one turn, returns whether the command is finished.
    fn execute(&mut self, engine: &mut Engine) -> bool;
}

impl fmt::Debug for dyn Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("cuid", &self.cuid()).finish_non_exhaustive()
    }
}
