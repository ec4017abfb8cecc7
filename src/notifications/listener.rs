//! Notification Listener and Registry
//!
//! Observer pattern fan-out from the delivery channel to every interested
//! component. The registry is constructed once and shared by reference.

use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use log::{debug, error};
use parking_lot::RwLock;

use crate::notifications::message::IncomingMessage;

/// Boxed error returned by listener callbacks
pub type ListenerError = Box<dyn Error + Send + Sync>;

/// Trait for components interested in delivery channel events
pub trait NotificationListener: Send + Sync {
    /// Handle one arrived message
    fn on_message(&self, message: &IncomingMessage) -> Result<(), ListenerError>;

    /// The transport dropped pending messages
    fn on_deleted_messages(&self) -> Result<(), ListenerError> {
        Ok(())
    }

    /// Name used when logging listener failures
    fn listener_name(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Registry of listeners receiving delivery channel events
///
/// Duplicate registrations are kept and each one receives its own callback;
/// callers balance `add_listener` with `remove_listener`.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn NotificationListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn NotificationListener>) {
        debug!("Adding notification listener '{}'", listener.listener_name());
        self.listeners.write().push(listener);
    }

    /// Remove one registration of `listener`; no-op if it is not registered
    pub fn remove_listener(&self, listener: &Arc<dyn NotificationListener>) {
        let mut listeners = self.listeners.write();
        if let Some(index) = listeners.iter().position(|l| same_listener(l, listener)) {
            listeners.remove(index);
            debug!("Removed notification listener '{}'", listener.listener_name());
        }
    }

    pub fn contains(&self, listener: &Arc<dyn NotificationListener>) -> bool {
        self.listeners.read().iter().any(|l| same_listener(l, listener))
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver `message` to every listener registered at the time of the call
    pub fn dispatch_message(&self, message: &IncomingMessage) {
        debug!("Dispatching message '{}'", message.identifier());
        for listener in self.snapshot() {
            deliver(&listener, "on_message", || listener.on_message(message));
        }
    }

    pub fn dispatch_deleted_messages(&self) {
        debug!("Dispatching deleted messages notice");
        for listener in self.snapshot() {
            deliver(&listener, "on_deleted_messages", || listener.on_deleted_messages());
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn NotificationListener>> {
        self.listeners.read().clone()
    }
}

fn same_listener(a: &Arc<dyn NotificationListener>, b: &Arc<dyn NotificationListener>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Run one callback, containing both returned errors and panics
fn deliver<F>(listener: &Arc<dyn NotificationListener>, callback: &str, f: F)
where
    F: FnOnce() -> Result<(), ListenerError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!("Listener '{}' failed in {}: {}", listener.listener_name(), callback, e);
        }
        Err(_) => {
            error!("Listener '{}' panicked in {}", listener.listener_name(), callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockListener {
        received: Mutex<Vec<String>>,
        deleted: AtomicUsize,
    }

    impl MockListener {
        fn new() -> Self {
            Self {
                received: Mutex::new(Vec::new()),
                deleted: AtomicUsize::new(0),
            }
        }

        fn received_count(&self) -> usize {
            self.received.lock().unwrap().len()
        }
    }

    impl NotificationListener for MockListener {
        fn on_message(&self, message: &IncomingMessage) -> Result<(), ListenerError> {
            self.received.lock().unwrap().push(message.identifier().to_string());
            Ok(())
        }

        fn on_deleted_messages(&self) -> Result<(), ListenerError> {
            self.deleted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingListener {
        panic: bool,
    }

    impl NotificationListener for FailingListener {
        fn on_message(&self, _message: &IncomingMessage) -> Result<(), ListenerError> {
            if self.panic {
                panic!("listener blew up");
            }
            Err("listener refused".into())
        }
    }

    fn message(id: &str) -> IncomingMessage {
        IncomingMessage::new(Some(id.to_string()), json!({}))
    }

    #[test]
    fn test_fan_out_to_all_listeners() {
        let registry = ListenerRegistry::new();
        let first = Arc::new(MockListener::new());
        let second = Arc::new(MockListener::new());
        registry.add_listener(first.clone());
        registry.add_listener(second.clone());

        registry.dispatch_message(&message("a"));
        registry.dispatch_deleted_messages();

        assert_eq!(first.received_count(), 1);
        assert_eq!(second.received_count(), 1);
        assert_eq!(first.deleted.load(Ordering::SeqCst), 1);
        assert_eq!(second.deleted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_removed_listener_misses_later_dispatches() {
        let registry = ListenerRegistry::new();
        let listener = Arc::new(MockListener::new());
        let handle: Arc<dyn NotificationListener> = listener.clone();
        registry.add_listener(handle.clone());

        registry.dispatch_message(&message("a"));
        registry.remove_listener(&handle);
        registry.dispatch_message(&message("b"));

        assert_eq!(listener.received_count(), 1);
        assert_eq!(registry.listener_count(), 0);
    }

    #[test]
    fn test_remove_unknown_listener_is_noop() {
        let registry = ListenerRegistry::new();
        let handle: Arc<dyn NotificationListener> = Arc::new(MockListener::new());
        registry.remove_listener(&handle);
        assert_eq!(registry.listener_count(), 0);
    }

    #[test]
    fn test_duplicate_registration_is_not_deduplicated() {
        let registry = ListenerRegistry::new();
        let listener = Arc::new(MockListener::new());
        let handle: Arc<dyn NotificationListener> = listener.clone();
        registry.add_listener(handle.clone());
        registry.add_listener(handle.clone());

        registry.dispatch_message(&message("a"));
        assert_eq!(listener.received_count(), 2);

        // One removal undoes one registration
        registry.remove_listener(&handle);
        assert!(registry.contains(&handle));
        registry.dispatch_message(&message("b"));
        assert_eq!(listener.received_count(), 3);
    }

    #[test]
    fn test_failing_listeners_do_not_block_others() {
        let registry = ListenerRegistry::new();
        let healthy = Arc::new(MockListener::new());
        registry.add_listener(Arc::new(FailingListener { panic: false }));
        registry.add_listener(Arc::new(FailingListener { panic: true }));
        registry.add_listener(healthy.clone());

        registry.dispatch_message(&message("a"));
        assert_eq!(healthy.received_count(), 1);
    }

    #[test]
    fn test_concurrent_dispatch_and_mutation() {
        let registry = Arc::new(ListenerRegistry::new());
        let listener = Arc::new(MockListener::new());
        registry.add_listener(listener.clone());

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for n in 0..100 {
                        if i % 2 == 0 {
                            registry.dispatch_message(&message(&format!("{i}-{n}")));
                        } else {
                            let extra: Arc<dyn NotificationListener> = Arc::new(MockListener::new());
                            registry.add_listener(extra.clone());
                            registry.remove_listener(&extra);
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(listener.received_count(), 200);
        assert_eq!(registry.listener_count(), 1);
    }
}
