//! crates/florescer_core/src/events.rs
//!
//! Push-based session-change notifications: the listener registry that auth
//! provider implementations embed, and the handle returned to subscribers.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::domain::Session;

/// What happened to the provider's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// A callback invoked with every session change.
pub type SessionListener = Arc<dyn Fn(SessionEvent, Option<Session>) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, SessionListener)>,
}

/// Registry of session listeners.
#[derive(Clone, Default)]
pub struct SessionChangeHub {
    listeners: Arc<Mutex<Listeners>>,
}

impl SessionChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: SessionListener) -> Subscription {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, listener));

        Subscription {
            listeners: Arc::downgrade(&self.listeners),
            id,
        }
    }

    /// Invokes every registered listener, in registration order, on the caller's stack.
    pub fn emit(&self, event: SessionEvent, session: Option<Session>) {
        // Snapshot first so a listener may unsubscribe without deadlocking.
        let snapshot: Vec<SessionListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in snapshot {
            listener(event, session.clone());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

/// Handle of a registered listener. Dropping it unsubscribes.
pub struct Subscription {
    listeners: Weak<Mutex<Listeners>>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
