use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

type Listener<T> = Arc<dyn Fn(T) + Send + Sync + 'static>;

/// Synchronous fan-out of values to any number of listeners.
///
/// Used by [`Store`](crate::store::Store) to announce snapshot replacements and by
/// the [`Coordinator`](crate::coordinator::Coordinator) to announce reconciliation events.
pub struct Broadcast<T>(Arc<Inner<T>>);

struct Inner<T> {
    listeners: RwLock<BTreeMap<usize, Listener<T>>>,
    next_id: AtomicUsize,
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T> std::fmt::Debug for Broadcast<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcast").field("listeners", &self.listener_count()).finish()
    }
}

impl<T: Clone> Default for Broadcast<T> {
    fn default() -> Self { Self::new() }
}

/// Unsubscribes its listener when dropped
#[must_use = "the listener is removed as soon as the guard is dropped"]
pub struct ListenerGuard<T> {
    inner: Weak<Inner<T>>,
    id: usize,
}

impl<T> Drop for ListenerGuard<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.listeners.write().unwrap().remove(&self.id);
        }
    }
}

/// Things that can be turned into a broadcast listener
pub trait IntoListener<T> {
    fn into_listener(self) -> Listener<T>;
}

impl<F, T> IntoListener<T> for F
where F: Fn(T) + Send + Sync + 'static
{
    fn into_listener(self) -> Listener<T> { Arc::new(self) }
}

impl<T> IntoListener<T> for tokio::sync::mpsc::UnboundedSender<T>
where T: Send + Sync + 'static
{
    fn into_listener(self) -> Listener<T> {
        Arc::new(move |value| {
            // receiver gone means nobody is interested anymore
            let _ = self.send(value);
        })
    }
}

impl<T> IntoListener<T> for std::sync::mpsc::Sender<T>
where T: Send + Sync + 'static
{
    fn into_listener(self) -> Listener<T> {
        let sender = std::sync::Mutex::new(self);
        Arc::new(move |value| {
            let _ = sender.lock().unwrap().send(value);
        })
    }
}

impl<T: Clone> Broadcast<T> {
    pub fn new() -> Self { Self(Arc::new(Inner { listeners: RwLock::new(BTreeMap::new()), next_id: AtomicUsize::new(0) })) }

    pub fn listen<L: IntoListener<T>>(&self, listener: L) -> ListenerGuard<T> {
        let id = self.0.next_id.fetch_add(1, Ordering::Relaxed);
        self.0.listeners.write().unwrap().insert(id, listener.into_listener());
        ListenerGuard { inner: Arc::downgrade(&self.0), id }
    }

    /// Calls every listener with `value`, in subscription order.
    /// No lock is held while listeners run, so they may subscribe or unsubscribe.
    pub fn send(&self, value: T) {
        let listeners: Vec<Listener<T>> = self.0.listeners.read().unwrap().values().cloned().collect();
        if let Some((last, rest)) = listeners.split_last() {
            for listener in rest {
                listener(value.clone());
            }
            last(value);
        }
    }
}

impl<T> Broadcast<T> {
    pub fn listener_count(&self) -> usize { self.0.listeners.read().unwrap().len() }
}
