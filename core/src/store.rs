use std::sync::{Arc, RwLock};

use crate::{
    broadcast::{Broadcast, IntoListener, ListenerGuard},
    snapshot::Snapshot,
};

/// The state container a coordinator is embedded in.
///
/// The coordinator is the only writer. Everyone else reads snapshots.
pub trait HostStore<R>: Send + Sync {
    /// The current collection
    fn get(&self) -> Snapshot<R>;
    /// Replace the whole collection
    fn set(&self, next: Snapshot<R>);
}

impl<R, S: HostStore<R> + ?Sized> HostStore<R> for Arc<S> {
    fn get(&self) -> Snapshot<R> { (**self).get() }
    fn set(&self, next: Snapshot<R>) { (**self).set(next) }
}

/// Default in-memory [`HostStore`] that notifies listeners on every replace
pub struct Store<R> {
    current: Arc<RwLock<Snapshot<R>>>,
    changes: Broadcast<Snapshot<R>>,
}

impl<R> Clone for Store<R> {
    fn clone(&self) -> Self { Self { current: self.current.clone(), changes: self.changes.clone() } }
}

impl<R: Send + Sync + 'static> Default for Store<R> {
    fn default() -> Self { Self::new(Vec::new()) }
}

impl<R: Send + Sync + 'static> Store<R> {
    pub fn new(records: impl Into<Snapshot<R>>) -> Self {
        Self { current: Arc::new(RwLock::new(records.into())), changes: Broadcast::new() }
    }

    /// Be notified with the new snapshot after every replace.
    /// Listeners run synchronously and must not call back into the owning coordinator.
    /// A listener that panics skips the listeners after it for that change.
    pub fn listen<L: IntoListener<Snapshot<R>>>(&self, listener: L) -> ListenerGuard<Snapshot<R>> { self.changes.listen(listener) }
}

impl<R: Send + Sync + 'static> HostStore<R> for Store<R> {
    fn get(&self) -> Snapshot<R> { self.current.read().unwrap().clone() }

    fn set(&self, next: Snapshot<R>) {
        {
            let mut current = self.current.write().unwrap();
            *current = next.clone();
        }
        // write lock released so listeners can read the store
        self.changes.send(next);
    }
}
