//! Events Module
//!
//! Per-namespace publish/subscribe over the fixed PUT, REMOVE, CLEAR
//! vocabulary. One sink is shared by every hoard of a namespace within a
//! [`HoardContext`](crate::hoard::HoardContext), so subscribers see writes
//! made through any of them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::debug;

use crate::error::{HoardError, Result};
use crate::hoard::reentrancy::ReentrancyProtector;

// == Event Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Put,
    Remove,
    Clear,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Put, EventKind::Remove, EventKind::Clear];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Put => "PUT",
            EventKind::Remove => "REMOVE",
            EventKind::Clear => "CLEAR",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = HoardError;

    /// Names are matched exactly; `DELETE` is not an alias for `REMOVE`.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PUT" => Ok(EventKind::Put),
            "REMOVE" => Ok(EventKind::Remove),
            "CLEAR" => Ok(EventKind::Clear),
            other => Err(HoardError::InvalidEvent(other.to_string())),
        }
    }
}

// == Hoard Event ==
/// What a handler receives.
#[derive(Debug, Clone, PartialEq)]
pub enum HoardEvent {
    /// A value was written under `key`.
    Put { key: String, value: Value },
    /// A record left the hoard: removed, expired or evicted.
    Remove { key: String, value: Value },
    /// Every record of the namespace was removed.
    Clear,
}

impl HoardEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HoardEvent::Put { .. } => EventKind::Put,
            HoardEvent::Remove { .. } => EventKind::Remove,
            HoardEvent::Clear => EventKind::Clear,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            HoardEvent::Put { key, .. } | HoardEvent::Remove { key, .. } => Some(key),
            HoardEvent::Clear => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            HoardEvent::Put { value, .. } | HoardEvent::Remove { value, .. } => Some(value),
            HoardEvent::Clear => None,
        }
    }
}

/// Subscriber callback. Identity is the `Arc` allocation: keep a clone to
/// unsubscribe later.
pub type EventHandler = Arc<dyn Fn(&HoardEvent) + Send + Sync>;

// == Event Sink ==
#[derive(Default)]
pub struct EventSink {
    handlers: Mutex<HashMap<EventKind, Vec<EventHandler>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event` by name.
    pub fn on(&self, event: &str, handler: EventHandler) -> Result<()> {
        let kind = event.parse()?;
        self.subscribe(kind, handler);
        Ok(())
    }

    /// Removes every registration of `handler` for `event` by name.
    pub fn off(&self, event: &str, handler: &EventHandler) -> Result<()> {
        let kind = event.parse()?;
        self.unsubscribe(kind, handler);
        Ok(())
    }

    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) {
        self.lock().entry(kind).or_default().push(handler);
    }

    /// Unregistering a handler that was never registered is a no-op.
    pub fn unsubscribe(&self, kind: EventKind, handler: &EventHandler) {
        if let Some(list) = self.lock().get_mut(&kind) {
            list.retain(|h| !same_handler(h, handler));
        }
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Emits by name. Fails on an unknown name, or a name that does not
    /// match the payload, whether or not anyone is listening.
    pub fn emit(&self, event: &str, data: HoardEvent, protector: &dyn ReentrancyProtector) -> Result<()> {
        let kind: EventKind = event.parse()?;
        if kind != data.kind() {
            return Err(HoardError::InvalidEvent(format!(
                "{event} with a {} payload",
                data.kind()
            )));
        }
        self.publish(data, protector);
        Ok(())
    }

    /// Hands one task per subscribed handler to `protector`, in
    /// subscription order.
    pub fn publish(&self, event: HoardEvent, protector: &dyn ReentrancyProtector) {
        // Snapshot so handlers may subscribe or unsubscribe while we dispatch.
        let handlers = match self.lock().get(&event.kind()) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => return,
        };

        debug!("Dispatching {} to {} handler(s)", event.kind(), handlers.len());

        let event = Arc::new(event);
        for handler in handlers {
            let event = Arc::clone(&event);
            protector.protect(Box::new(move || handler(event.as_ref())));
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EventKind, Vec<EventHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("EventSink");
        for kind in EventKind::ALL {
            out.field(kind.as_str(), &self.handler_count(kind));
        }
        out.finish()
    }
}

/// Compares handler allocations, ignoring vtable identity.
fn same_handler(a: &EventHandler, b: &EventHandler) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
