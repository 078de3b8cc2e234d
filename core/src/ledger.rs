//! Bookkeeping for in-flight operations.
//!
//! The ledger never touches the store. Every method takes the current snapshot
//! and returns the snapshot that should replace it (or `None` if nothing
//! changes), so the coordinator can apply it while holding its lock.

use std::collections::HashMap;
use std::time::Instant;

use crate::{
    config::RollbackStrategy,
    operation::{OperationId, PendingInfo},
    record::{Patch, Record, Transform},
    snapshot::Snapshot,
};

pub(crate) struct PendingOperation<R: Record> {
    pub id: OperationId,
    pub key: R::Key,
    pub started_at: Instant,
    /// Whole collection immediately before this operation's speculative change
    pub snapshot_before: Snapshot<R>,
    pub transform: Transform<R>,
    seq: u64,
}

/// Rebase state for one key with pending operations
struct Chain<R: Record> {
    /// The record without any still-pending speculation
    base: R,
    /// Pending operations on this key, in start order
    pending: Vec<OperationId>,
}

pub(crate) struct Ledger<R: Record> {
    strategy: RollbackStrategy,
    operations: HashMap<OperationId, PendingOperation<R>>,
    chains: HashMap<R::Key, Chain<R>>,
    next_seq: u64,
}

/// Result of a rollback, for logging
pub(crate) struct RolledBack<R: Record> {
    pub operation: PendingOperation<R>,
    pub next: Option<Snapshot<R>>,
    /// Later operations whose speculative change was discarded along with this one
    pub clobbered: Vec<OperationId>,
}

impl<R: Record> Ledger<R> {
    pub fn new(strategy: RollbackStrategy) -> Self { Self { strategy, operations: HashMap::new(), chains: HashMap::new(), next_seq: 0 } }

    pub fn contains(&self, id: &OperationId) -> bool { self.operations.contains_key(id) }

    pub fn len(&self) -> usize { self.operations.len() }

    pub fn start(&mut self, id: OperationId, key: R::Key, transform: Transform<R>, current: &Snapshot<R>) -> Option<Snapshot<R>> {
        let next = current.with_updated(&key, |record| transform(record));

        if self.strategy == RollbackStrategy::Rebase {
            if let Some(record) = current.get(&key) {
                let chain = self.chains.entry(key.clone()).or_insert_with(|| Chain { base: record.clone(), pending: Vec::new() });
                chain.pending.push(id);
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.operations.insert(
            id,
            PendingOperation { id, key, started_at: Instant::now(), snapshot_before: current.clone(), transform, seq },
        );
        next
    }

    pub fn commit(
        &mut self,
        id: &OperationId,
        patch: Option<&R::Patch>,
        current: &Snapshot<R>,
    ) -> Option<(PendingOperation<R>, Option<Snapshot<R>>)> {
        let operation = self.operations.remove(id)?;
        let patch = patch.filter(|p| !p.is_empty());

        let tracked = match self.strategy {
            RollbackStrategy::Snapshot => true,
            RollbackStrategy::Rebase => match Self::unlink(&mut self.chains, &operation) {
                Some(chain) => {
                    (operation.transform)(&mut chain.base);
                    if let Some(patch) = patch {
                        chain.base.apply_patch(patch);
                    }
                    self.prune(&operation.key);
                    true
                }
                // the record this operation targeted is gone
                None => false,
            },
        };

        // merge into the current record, never the snapshot
        let next = match (tracked, patch) {
            (true, Some(patch)) => current.with_updated(&operation.key, |record| record.apply_patch(patch)),
            _ => None,
        };
        Some((operation, next))
    }

    pub fn rollback(&mut self, id: &OperationId, current: &Snapshot<R>) -> Option<RolledBack<R>> {
        let operation = self.operations.remove(id)?;

        match self.strategy {
            RollbackStrategy::Snapshot => {
                let mut clobbered: Vec<&PendingOperation<R>> =
                    self.operations.values().filter(|other| other.seq > operation.seq).collect();
                clobbered.sort_by_key(|other| other.seq);
                let clobbered = clobbered.into_iter().map(|other| other.id).collect();
                let next = Some(operation.snapshot_before.clone());
                Some(RolledBack { operation, next, clobbered })
            }
            RollbackStrategy::Rebase => {
                let next = match Self::unlink(&mut self.chains, &operation) {
                    Some(chain) => {
                        let record = replay(&chain.base, &chain.pending, &self.operations);
                        self.prune(&operation.key);
                        current.with_replaced(&operation.key, record)
                    }
                    None => None,
                };
                Some(RolledBack { operation, next, clobbered: Vec::new() })
            }
        }
    }

    /// Takes the operation out of its key's chain. `None` if it is not part of
    /// that chain (key absent at start, or removed since).
    fn unlink<'a>(chains: &'a mut HashMap<R::Key, Chain<R>>, operation: &PendingOperation<R>) -> Option<&'a mut Chain<R>> {
        let chain = chains.get_mut(&operation.key)?;
        let position = chain.pending.iter().position(|pending| *pending == operation.id)?;
        chain.pending.remove(position);
        Some(chain)
    }

    fn prune(&mut self, key: &R::Key) {
        if self.chains.get(key).is_some_and(|chain| chain.pending.is_empty()) {
            self.chains.remove(key);
        }
    }

    /// A confirmed change to one record. Folded into the base of any pending chain on that key.
    pub fn apply(&mut self, key: &R::Key, f: impl Fn(&mut R), current: &Snapshot<R>) -> Option<Snapshot<R>> {
        if let Some(chain) = self.chains.get_mut(key) {
            f(&mut chain.base);
        }
        current.with_updated(key, f)
    }

    /// A confirmed record arriving from outside (insert or full replace of one record)
    pub fn upsert(&mut self, record: R, current: &Snapshot<R>) -> Snapshot<R> {
        let key = record.key();
        let record = match self.chains.get_mut(&key) {
            Some(chain) => {
                chain.base = record;
                replay(&chain.base, &chain.pending, &self.operations)
            }
            None => record,
        };
        current.with_upserted(record)
    }

    pub fn remove(&mut self, key: &R::Key, current: &Snapshot<R>) -> Option<Snapshot<R>> {
        self.chains.remove(key);
        current.without(key)
    }

    /// Replace the whole collection with confirmed records, keeping pending
    /// speculation on keys that survive the reload
    pub fn load(&mut self, records: Vec<R>) -> Snapshot<R> {
        let mut next = Vec::with_capacity(records.len());
        let mut surviving = HashMap::new();
        for record in records {
            let key = record.key();
            match self.chains.remove(&key) {
                Some(mut chain) => {
                    chain.base = record;
                    next.push(replay(&chain.base, &chain.pending, &self.operations));
                    surviving.insert(key, chain);
                }
                None => next.push(record),
            }
        }
        self.chains = surviving;
        Snapshot::new(next)
    }

    pub fn pending(&self, now: Instant) -> Vec<PendingInfo<R::Key>> {
        let mut operations: Vec<&PendingOperation<R>> = self.operations.values().collect();
        operations.sort_by_key(|operation| operation.seq);
        operations
            .into_iter()
            .map(|operation| PendingInfo {
                id: operation.id,
                key: operation.key.clone(),
                started_at: operation.started_at,
                age: now.saturating_duration_since(operation.started_at),
            })
            .collect()
    }
}

fn replay<R: Record>(base: &R, pending: &[OperationId], operations: &HashMap<OperationId, PendingOperation<R>>) -> R {
    let mut record = base.clone();
    for id in pending {
        if let Some(operation) = operations.get(id) {
            (operation.transform)(&mut record);
        }
    }
    record
}
