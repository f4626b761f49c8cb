//! Synchronous "compile commands changed" notifications.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};

/// Callback invoked with the affected file paths when their commands change.
pub type CommandListener = Box<dyn Fn(&[PathBuf]) + Send + Sync>;

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    listeners: Vec<(u64, Arc<CommandListener>)>,
}

/// Broadcast list shared by a resolver and its [`Subscription`] handles.
///
/// Every [`CommandResolver`](crate::CommandResolver) implementation embeds
/// one (clones share the same listener list). Listeners run on the
/// broadcasting thread in registration order. The listener list is copied
/// out from under the lock before any callback runs, so listeners may
/// re-enter the owning resolver.
#[derive(Clone, Default)]
pub struct ChangeBroadcaster {
    table: Arc<Mutex<ListenerTable>>,
}

impl ChangeBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` until the returned handle is dropped.
    pub fn subscribe(&self, listener: CommandListener) -> Subscription {
        let mut table = self.table.lock().expect("listener table mutex poisoned");
        let id = table.next_id;
        table.next_id += 1;
        table.listeners.push((id, Arc::new(listener)));
        Subscription {
            table: Arc::downgrade(&self.table),
            id,
        }
    }

    /// Invokes every registered listener with `paths`, synchronously.
    pub fn broadcast(&self, paths: &[PathBuf]) {
        let listeners: Vec<Arc<CommandListener>> = {
            let table = self.table.lock().expect("listener table mutex poisoned");
            table
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in listeners {
            listener(paths);
        }
    }
}

impl fmt::Debug for ChangeBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self
            .table
            .lock()
            .map(|table| table.listeners.len())
            .unwrap_or(0);
        f.debug_struct("ChangeBroadcaster")
            .field("listeners", &listeners)
            .finish()
    }
}

/// Registration handle returned by
/// [`CommandResolver::subscribe`](crate::CommandResolver::subscribe).
///
/// Dropping it unregisters the listener.
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    table: Weak<Mutex<ListenerTable>>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };
        let mut table = match table.lock() {
            Ok(table) => table,
            Err(poisoned) => poisoned.into_inner(),
        };
        table.listeners.retain(|(id, _)| *id != self.id);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
