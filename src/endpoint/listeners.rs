//! Subscriber registry.
//!
//! Commands and lifecycle notifications live in separate tables: a map from
//! command name to handlers, and one list for open/close/error. Reserved
//! names are rejected before anything reaches the command table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::Replier;
use crate::{CloseInfo, LifecycleKind};

/// Handler invoked for every received command with a given name.
pub type CommandListener = Arc<dyn Fn(Replier, Value) + Send + Sync>;

/// Handler invoked for open, close and error notifications.
pub type LifecycleListener = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Opaque handle returned by listener registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Lifecycle notification published by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Open,
    Close(CloseInfo),
    Error(String),
}

impl LifecycleEvent {
    pub fn kind(&self) -> LifecycleKind {
        match self {
            LifecycleEvent::Open => LifecycleKind::Open,
            LifecycleEvent::Close(_) => LifecycleKind::Close,
            LifecycleEvent::Error(_) => LifecycleKind::Error,
        }
    }
}

#[derive(Default)]
pub(super) struct Listeners {
    // ---
    next_id: u64,
    commands: HashMap<String, Vec<(ListenerId, CommandListener)>>,
    lifecycle: Vec<(ListenerId, LifecycleListener)>,
}

impl Listeners {
    // ---
    fn allocate(&mut self) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Handle that was never registered; removing it is a no-op.
    pub fn detached_id(&mut self) -> ListenerId {
        self.allocate()
    }

    pub fn add_command(&mut self, cmd: &str, listener: CommandListener) -> ListenerId {
        // ---
        let id = self.allocate();
        self.commands
            .entry(cmd.to_owned())
            .or_default()
            .push((id, listener));
        id
    }

    pub fn add_lifecycle(&mut self, listener: LifecycleListener) -> ListenerId {
        // ---
        let id = self.allocate();
        self.lifecycle.push((id, listener));
        id
    }

    /// Remove one registration, wherever it lives.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        // ---
        if let Some(pos) = self.lifecycle.iter().position(|(lid, _)| *lid == id) {
            self.lifecycle.remove(pos);
            return true;
        }

        let mut emptied = None;
        let mut found = false;
        for (cmd, handlers) in self.commands.iter_mut() {
            if let Some(pos) = handlers.iter().position(|(lid, _)| *lid == id) {
                handlers.remove(pos);
                found = true;
                if handlers.is_empty() {
                    emptied = Some(cmd.clone());
                }
                break;
            }
        }
        if let Some(cmd) = emptied {
            self.commands.remove(&cmd);
        }
        found
    }

    /// Snapshot of the handlers for `cmd`, in registration order.
    pub fn commands_for(&self, cmd: &str) -> Vec<CommandListener> {
        self.commands
            .get(cmd)
            .map(|handlers| handlers.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }

    pub fn command_count(&self, cmd: &str) -> usize {
        self.commands.get(cmd).map_or(0, Vec::len)
    }

    /// Snapshot of the lifecycle handlers, in registration order.
    pub fn lifecycle(&self) -> Vec<LifecycleListener> {
        self.lifecycle.iter().map(|(_, h)| h.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.lifecycle.clear();
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("lifecycle", &self.lifecycle.len())
            .finish()
    }
}
