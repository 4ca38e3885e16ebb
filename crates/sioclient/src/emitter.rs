//! Named event listeners.
//!
//! The [`Emitter`] is shared by a [`Manager`](crate::Manager) or a [`Socket`](crate::Socket) and
//! the tasks of its event loop. Listeners are called outside of the registry lock, so a listener
//! can register or remove listeners, including itself.
use std::{
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, MutexGuard},
};

use bytes::Bytes;
use serde_json::Value;

use crate::ack::AckSender;

/// The reserved event name receiving every application event.
/// Its listeners get the event name as the first argument.
pub const WILDCARD: &str = "*";

/// A listener registered on an [`Emitter`].
pub type Listener = Arc<dyn Fn(&EventArgs) + Send + Sync + 'static>;

/// Identifies a registered listener, see [`Emitter::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The arguments of an event.
#[derive(Debug, Clone, Default)]
pub struct EventArgs {
    /// The json arguments. Binary attachments are referenced by placeholders
    /// (see [`Payload::placeholder`](sioclient_core::packet::Payload::placeholder)).
    pub args: Vec<Value>,
    /// The binary attachments, in order
    pub binary: Vec<Bytes>,
    /// Set when the server requested an acknowledgement for this event
    pub ack: Option<AckSender>,
}

impl EventArgs {
    /// Create arguments without binary attachments
    pub fn new(args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            args: args.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Get the argument at `index`
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Resolve the binary attachment referenced by the argument at `index`.
    pub fn binary_at(&self, index: usize) -> Option<&Bytes> {
        let num = sioclient_core::packet::Payload::placeholder_index(self.args.get(index)?)?;
        self.binary.get(num)
    }

    /// Prepend the event name to the arguments, as received by wildcard listeners.
    pub(crate) fn with_event_name(&self, event: &str) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(Value::String(event.to_owned()));
        args.extend(self.args.iter().cloned());
        Self {
            args,
            binary: self.binary.clone(),
            ack: self.ack.clone(),
        }
    }
}

struct Entry {
    id: ListenerId,
    once: bool,
    listener: Listener,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    listeners: HashMap<String, Vec<Entry>>,
}

/// A registry of named event listeners.
#[derive(Clone, Default)]
pub struct Emitter {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        let mut map = f.debug_map();
        for (event, entries) in &inner.listeners {
            map.entry(event, &entries.len());
        }
        map.finish()
    }
}

impl Emitter {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Listeners never run under the lock, a poisoned lock still holds a consistent map.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn add(&self, event: String, once: bool, listener: Listener) -> ListenerId {
        let mut inner = self.lock();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.entry(event).or_default().push(Entry {
            id,
            once,
            listener,
        });
        id
    }

    /// Register a listener for `event`. Listeners of one event are called in registration order.
    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&EventArgs) + Send + Sync + 'static,
    {
        self.add(event.into(), false, Arc::new(listener))
    }

    /// Register a listener that is removed after its first call.
    pub fn once<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&EventArgs) + Send + Sync + 'static,
    {
        self.add(event.into(), true, Arc::new(listener))
    }

    /// Remove a listener. Returns `false` if it was not registered anymore.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        let mut removed = false;
        inner.listeners.retain(|_, entries| {
            if let Some(i) = entries.iter().position(|e| e.id == id) {
                entries.remove(i);
                removed = true;
            }
            !entries.is_empty()
        });
        removed
    }

    /// Remove every listener of `event`, or every listener if `event` is `None`.
    pub fn off_all(&self, event: Option<&str>) {
        let mut inner = self.lock();
        match event {
            Some(event) => {
                inner.listeners.remove(event);
            }
            None => inner.listeners.clear(),
        }
    }

    /// The number of listeners registered for `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().listeners.get(event).map_or(0, Vec::len)
    }

    /// Call every listener of `event` with `args`.
    ///
    /// A panicking listener is logged and does not prevent the next listeners from being called.
    pub fn emit(&self, event: &str, args: &EventArgs) {
        let listeners: Vec<Listener> = {
            let mut inner = self.lock();
            let Some(entries) = inner.listeners.get_mut(event) else {
                return;
            };
            let listeners = entries.iter().map(|e| e.listener.clone()).collect();
            entries.retain(|e| !e.once);
            if entries.is_empty() {
                inner.listeners.remove(event);
            }
            listeners
        };

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(args))).is_err() {
                tracing::error!(event, "event listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<Value>>>, impl Fn(&EventArgs) + Send + Sync + 'static) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls_ = calls.clone();
        (calls, move |args: &EventArgs| {
            calls_.lock().unwrap().push(Value::Array(args.args.clone()))
        })
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let emitter = Emitter::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            emitter.on("event", move |_| order.lock().unwrap().push(i));
        }
        emitter.emit("event", &EventArgs::default());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn once_listener_is_called_once() {
        let emitter = Emitter::new();
        let (calls, listener) = recorder();
        emitter.once("event", listener);
        emitter.emit("event", &EventArgs::new([json!(1)]));
        emitter.emit("event", &EventArgs::new([json!(2)]));
        assert_eq!(*calls.lock().unwrap(), vec![json!([1])]);
        assert_eq!(emitter.listener_count("event"), 0);
    }

    #[test]
    fn off_removes_listener() {
        let emitter = Emitter::new();
        let (calls, listener) = recorder();
        let id = emitter.on("event", listener);
        assert_eq!(emitter.listener_count("event"), 1);
        assert!(emitter.off(id));
        assert!(!emitter.off(id));
        emitter.emit("event", &EventArgs::default());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn off_all() {
        let emitter = Emitter::new();
        emitter.on("a", |_| ());
        emitter.on("a", |_| ());
        emitter.on("b", |_| ());
        emitter.off_all(Some("a"));
        assert_eq!(emitter.listener_count("a"), 0);
        assert_eq!(emitter.listener_count("b"), 1);
        emitter.off_all(None);
        assert_eq!(emitter.listener_count("b"), 0);
    }

    #[test]
    fn panicking_listener_does_not_stop_delivery() {
        let emitter = Emitter::new();
        let count = Arc::new(AtomicUsize::new(0));
        emitter.on("event", |_| panic!("listener failure"));
        let count_ = count.clone();
        emitter.on("event", move |_| {
            count_.fetch_add(1, Ordering::SeqCst);
        });
        emitter.emit("event", &EventArgs::default());
        emitter.emit("event", &EventArgs::default());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listener_can_register_listeners() {
        let emitter = Emitter::new();
        let (calls, listener) = recorder();
        let listener = Arc::new(listener);
        let emitter_ = emitter.clone();
        emitter.once("event", move |_| {
            let listener = listener.clone();
            emitter_.on("other", move |args| listener(args));
        });
        emitter.emit("event", &EventArgs::default());
        emitter.emit("other", &EventArgs::new([json!("ok")]));
        assert_eq!(*calls.lock().unwrap(), vec![json!(["ok"])]);
    }

    #[test]
    fn wildcard_args() {
        let args = EventArgs::new([json!(1), json!(2)]).with_event_name("foo");
        assert_eq!(args.args, vec![json!("foo"), json!(1), json!(2)]);
    }

    #[test]
    fn binary_args() {
        let args = EventArgs {
            args: vec![json!("file"), json!({ "_placeholder": true, "num": 0 })],
            binary: vec![Bytes::from_static(b"data")],
            ack: None,
        };
        assert_eq!(args.binary_at(1).unwrap(), "data");
        assert_eq!(args.binary_at(0), None);
        assert_eq!(args.get(0), Some(&json!("file")));
    }
}
