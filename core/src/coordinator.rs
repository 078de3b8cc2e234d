use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::{
    broadcast::{Broadcast, IntoListener, ListenerGuard},
    config::CoordinatorConfig,
    error::ConfigError,
    lane::Lanes,
    ledger::Ledger,
    operation::{OperationEvent, OperationId, OperationState, PendingInfo},
    record::{Record, Transform},
    snapshot::Snapshot,
    store::{HostStore, Store},
    util::{action_debug, action_warn},
};

/// Applies speculative changes to a collection right away and reconciles them
/// once the remote side has answered.
///
/// The coordinator is the only writer of its store. Each call is atomic with
/// respect to the others: the store goes from one snapshot to the next in a
/// single replace. Only the caller's action inside [`perform`](Self::perform)
/// ever suspends.
///
/// There is no retry and no timeout here. Wrap the action if you need either.
pub struct Coordinator<R: Record, S: HostStore<R> = Store<R>> {
    store: S,
    transform: Transform<R>,
    config: CoordinatorConfig,
    ledger: Mutex<Ledger<R>>,
    lanes: Lanes<R::Key>,
    events: Broadcast<OperationEvent<R::Key>>,
}

impl<R: Record, S: HostStore<R>> Coordinator<R, S> {
    /// `transform` is the speculative change applied by [`start`](Self::start) and [`perform`](Self::perform)
    pub fn new<F>(store: S, transform: F) -> Self
    where F: Fn(&mut R) + Send + Sync + 'static {
        Self::build(store, std::sync::Arc::new(transform), CoordinatorConfig::default())
    }

    pub fn with_config<F>(store: S, transform: F, config: CoordinatorConfig) -> Result<Self, ConfigError>
    where F: Fn(&mut R) + Send + Sync + 'static {
        config.validate()?;
        Ok(Self::build(store, std::sync::Arc::new(transform), config))
    }

    fn build(store: S, transform: Transform<R>, config: CoordinatorConfig) -> Self {
        Self {
            store,
            transform,
            ledger: Mutex::new(Ledger::new(config.rollback)),
            config,
            lanes: Lanes::new(),
            events: Broadcast::new(),
        }
    }

    pub fn store(&self) -> &S { &self.store }

    pub fn config(&self) -> &CoordinatorConfig { &self.config }

    /// The current collection
    pub fn snapshot(&self) -> Snapshot<R> { self.store.get() }

    // A panicking store listener poisons the lock after the ledger and store already agree
    fn ledger(&self) -> MutexGuard<'_, Ledger<R>> { self.ledger.lock().unwrap_or_else(PoisonError::into_inner) }

    /// Apply the coordinator's speculative transformation to `key` and track it.
    /// A key that is not in the collection is still tracked; the change is simply a no-op.
    pub fn start(&self, key: R::Key) -> OperationId { self.start_with(key, self.transform.clone()) }

    /// Like [`start`](Self::start), with a transformation for this operation only
    pub fn start_with(&self, key: R::Key, transform: Transform<R>) -> OperationId {
        let id = OperationId::new();
        let applied = {
            let mut ledger = self.ledger();
            let current = self.store.get();
            match ledger.start(id, key.clone(), transform, &current) {
                Some(next) => {
                    self.store.set(next);
                    true
                }
                None => false,
            }
        };

        if applied {
            action_debug!(id, "start", "{:?}", key);
        } else {
            action_debug!(id, "start", "{:?} (not in collection)", key);
        }
        self.events.send(OperationEvent::Started { id, key });
        id
    }

    /// Confirm an operation, merging `patch` into the current record if given.
    /// Unknown or already reconciled ids are ignored.
    pub fn commit(&self, id: OperationId, patch: Option<R::Patch>) {
        let committed = {
            let mut ledger = self.ledger();
            let current = self.store.get();
            ledger.commit(&id, patch.as_ref(), &current).map(|(operation, next)| {
                let merged = next.is_some();
                if let Some(next) = next {
                    self.store.set(next);
                }
                (operation.key, merged)
            })
        };

        match committed {
            Some((key, merged)) => {
                action_debug!(id, "commit", "{:?} merged={}", key, merged);
                self.events.send(OperationEvent::Committed { id, key, merged });
            }
            None => action_debug!(id, "commit", "ignored: not pending"),
        }
    }

    /// Undo an operation's speculative change. Unknown or already reconciled ids are ignored.
    pub fn rollback(&self, id: OperationId) {
        let rolled_back = {
            let mut ledger = self.ledger();
            let current = self.store.get();
            ledger.rollback(&id, &current).map(|rolled_back| {
                if let Some(next) = rolled_back.next {
                    self.store.set(next);
                }
                (rolled_back.operation.key, rolled_back.clobbered)
            })
        };

        match rolled_back {
            Some((key, clobbered)) => {
                if !clobbered.is_empty() {
                    let ids: Vec<String> = clobbered.iter().map(|id| id.to_string()).collect();
                    action_warn!(id, "rollback", "snapshot restore discarded pending {}", ids.join(", "));
                }
                action_debug!(id, "rollback", "{:?}", key);
                self.events.send(OperationEvent::RolledBack { id, key });
            }
            None => action_debug!(id, "rollback", "ignored: not pending"),
        }
    }

    /// `start`, await `action`, then `commit` on `Ok` or `rollback` on `Err`.
    /// The action's error is returned unchanged, after the rollback.
    ///
    /// If the returned future is dropped before the action settles, the operation is rolled back.
    pub async fn perform<F, Fut, T, E>(&self, key: R::Key, action: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.reconcile(key, action, |_| None).await
    }

    /// Like [`perform`](Self::perform), where the action resolves to the
    /// server-authoritative fields to merge on commit
    pub async fn perform_and_merge<F, Fut, E>(&self, key: R::Key, action: F) -> Result<(), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R::Patch, E>>,
    {
        self.reconcile(key, action, |patch| Some(patch.clone())).await.map(|_| ())
    }

    async fn reconcile<F, Fut, T, E>(&self, key: R::Key, action: F, merge: impl FnOnce(&T) -> Option<R::Patch>) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _lane = match self.config.serialize_per_key {
            true => Some(self.lanes.acquire(&key).await),
            false => None,
        };

        let mut pending = PendingGuard { coordinator: self, id: Some(self.start(key)) };
        let result = action().await;
        let id = pending.id.take();
        match (&result, id) {
            (Ok(value), Some(id)) => self.commit(id, merge(value)),
            (Err(_), Some(id)) => self.rollback(id),
            (_, None) => {}
        }
        result
    }

    /// Replace the whole collection with confirmed records (initial load or refetch).
    /// With the rebase strategy, pending operations stay applied on keys that survive.
    pub fn load(&self, records: Vec<R>) {
        let mut ledger = self.ledger();
        let next = ledger.load(records);
        self.store.set(next);
    }

    /// Apply a confirmed (non-speculative) change to one record
    pub fn apply(&self, key: &R::Key, f: impl Fn(&mut R)) -> bool {
        let mut ledger = self.ledger();
        let current = self.store.get();
        match ledger.apply(key, f, &current) {
            Some(next) => {
                self.store.set(next);
                true
            }
            None => false,
        }
    }

    /// Insert a confirmed record, or replace the record with the same key
    pub fn upsert(&self, record: R) {
        let mut ledger = self.ledger();
        let current = self.store.get();
        let next = ledger.upsert(record, &current);
        self.store.set(next);
    }

    /// Remove a record. Pending operations on it become no-ops when reconciled.
    pub fn remove(&self, key: &R::Key) -> bool {
        let mut ledger = self.ledger();
        let current = self.store.get();
        match ledger.remove(key, &current) {
            Some(next) => {
                self.store.set(next);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, id: &OperationId) -> bool { self.ledger().contains(id) }

    /// `Pending` while in flight. Finished and unknown ids are not remembered.
    pub fn state(&self, id: &OperationId) -> Option<OperationState> { self.is_pending(id).then_some(OperationState::Pending) }

    pub fn pending_count(&self) -> usize { self.ledger().len() }

    /// In-flight operations, oldest first
    pub fn pending(&self) -> Vec<PendingInfo<R::Key>> { self.ledger().pending(Instant::now()) }

    /// In-flight operations older than `config.stale_after`
    pub fn stale(&self) -> Vec<PendingInfo<R::Key>> {
        let stale: Vec<_> = self.pending().into_iter().filter(|info| info.age >= self.config.stale_after).collect();
        for info in &stale {
            action_warn!(info.id, "stale", "{:?} pending for {:?}", info.key, info.age);
        }
        stale
    }

    /// Be notified of every start, commit and rollback
    pub fn listen<L: IntoListener<OperationEvent<R::Key>>>(&self, listener: L) -> ListenerGuard<OperationEvent<R::Key>> {
        self.events.listen(listener)
    }
}

impl<R: Record> Coordinator<R, Store<R>> {
    /// A coordinator over a fresh [`Store`] holding `records`
    pub fn from_records<F>(records: Vec<R>, transform: F) -> Self
    where F: Fn(&mut R) + Send + Sync + 'static {
        Self::new(Store::new(records), transform)
    }
}

/// Rolls the operation back if `perform` is abandoned before reconciling it
struct PendingGuard<'a, R: Record, S: HostStore<R>> {
    coordinator: &'a Coordinator<R, S>,
    id: Option<OperationId>,
}

impl<R: Record, S: HostStore<R>> Drop for PendingGuard<'_, R, S> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            action_debug!(id, "abandoned");
            self.coordinator.rollback(id);
        }
    }
}
