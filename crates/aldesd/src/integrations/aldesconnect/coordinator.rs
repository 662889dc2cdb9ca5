//! Shared data-update coordinator.
//!
//! The coordinator owns the current products snapshot and fans refresh
//! notifications out to its listeners. Fetching the data is not its job: the
//! owner hands it whole snapshots through [`DataUpdateCoordinator::set_data`].

use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use arc_swap::ArcSwap;
use tracing::debug;

use super::model::Product;

/// Callback run after every snapshot refresh.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`Coordinator::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// What entities need from a coordinator: read the snapshot, hear about refreshes.
pub trait Coordinator: Send + Sync {
    /// Current snapshot. Replaced wholesale on refresh, never mutated in place.
    fn data(&self) -> Arc<Vec<Product>>;

    /// Register a listener. Listeners are invoked in registration order.
    fn subscribe(&self, listener: Listener) -> ListenerId;

    /// Remove a listener. Returns false if it was not registered.
    fn unsubscribe(&self, id: ListenerId) -> bool;
}

/// In-process coordinator holding the latest products snapshot.
pub struct DataUpdateCoordinator {
    name: String,
    data: ArcSwap<Vec<Product>>,
    listeners: std::sync::Mutex<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
}

impl DataUpdateCoordinator {
    pub fn new(name: impl Into<String>, data: Vec<Product>) -> Self {
        Self {
            name: name.into(),
            data: ArcSwap::from_pointee(data),
            listeners: std::sync::Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the snapshot and notify every listener, one after another.
    ///
    /// Listeners run on the caller's task. The listener list is copied first,
    /// so a listener may read `data()` or (un)subscribe without deadlocking.
    pub fn set_data(&self, data: Vec<Product>) {
        self.data.store(Arc::new(data));

        let listeners: Vec<Listener> = self
            .lock_listeners()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();

        debug!(
            "[{}] snapshot refreshed, notifying {} listener(s)",
            self.name,
            listeners.len()
        );
        for listener in listeners {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    /// The list is only ever pushed to or filtered, so a panic elsewhere
    /// cannot leave it half-updated.
    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Coordinator for DataUpdateCoordinator {
    fn data(&self) -> Arc<Vec<Product>> {
        self.data.load_full()
    }

    fn subscribe(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.lock_listeners().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }
}
