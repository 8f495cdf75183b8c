use chrono::{DateTime, Duration, Utc};

use crate::{
    errors::ServiceError,
    events::Event,
    models::{Operator, Workspace},
    services::{canonicalizer::Canonicalizer, log_book::LogWrite},
};

/// Command trait for implementing the Command Pattern
///
/// Each mutation is one object that validates its input, applies itself to
/// the local workspace and records what changed. Execution is synchronous:
/// the workspace is fully updated when `execute` returns, and the caller
/// publishes the recorded changes afterwards.
///
/// A command that returns an error must leave the workspace untouched.
pub trait Command {
    /// The return type of the command when executed successfully
    type Result;

    /// Execute the command against the local workspace
    ///
    /// # Arguments
    /// * `workspace` - Mirror and log book owned by this client
    /// * `ctx` - Operator, clock reading and the change/event collectors
    ///
    /// # Returns
    /// * `Result<Self::Result, ServiceError>` - The result of command execution or an error
    fn execute(
        &self,
        workspace: &mut Workspace,
        ctx: &mut CommandContext,
    ) -> Result<Self::Result, ServiceError>;
}

/// What a command touched, for the sync engine.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub inventory: bool,
    pub log_writes: Vec<LogWrite>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        !self.inventory && self.log_writes.is_empty()
    }
}

/// Per-execution context handed to a [`Command`].
#[derive(Debug)]
pub struct CommandContext {
    pub operator: Operator,
    pub now: DateTime<Utc>,
    pub merge_window: Duration,
    pub canonicalizer: Canonicalizer,
    changes: ChangeSet,
    events: Vec<Event>,
}

impl CommandContext {
    pub fn new(operator: Operator, now: DateTime<Utc>, merge_window: Duration) -> Self {
        Self {
            operator,
            now,
            merge_window,
            canonicalizer: Canonicalizer::default(),
            changes: ChangeSet::default(),
            events: Vec::new(),
        }
    }

    pub fn inventory_changed(&mut self) {
        self.changes.inventory = true;
    }

    pub fn log_write(&mut self, write: LogWrite) {
        self.changes.log_writes.push(write);
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn into_parts(self) -> (ChangeSet, Vec<Event>) {
        (self.changes, self.events)
    }
}

pub mod inventory;
pub mod logs;
