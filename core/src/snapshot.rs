use std::{ops::Deref, sync::Arc};

use crate::record::Record;

/// An immutable view of a collection at one point in time.
///
/// Cloning is cheap (the records are shared). The collection only ever changes
/// by replacing one snapshot with another, so a reader holding a snapshot
/// never observes a half-applied mutation.
pub struct Snapshot<R>(Arc<Vec<R>>);

impl<R> Clone for Snapshot<R> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<R> Default for Snapshot<R> {
    fn default() -> Self { Self(Arc::new(Vec::new())) }
}

impl<R> Deref for Snapshot<R> {
    type Target = [R];
    fn deref(&self) -> &[R] { &self.0 }
}

impl<R: std::fmt::Debug> std::fmt::Debug for Snapshot<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.debug_list().entries(self.0.iter()).finish() }
}

impl<R: PartialEq> PartialEq for Snapshot<R> {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0 }
}

impl<R: Eq> Eq for Snapshot<R> {}

impl<R> From<Vec<R>> for Snapshot<R> {
    fn from(records: Vec<R>) -> Self { Self(Arc::new(records)) }
}

impl<R> FromIterator<R> for Snapshot<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self { Self(Arc::new(iter.into_iter().collect())) }
}

impl<R> Snapshot<R> {
    pub fn new(records: Vec<R>) -> Self { Self(Arc::new(records)) }

    /// True if both snapshots share the same allocation (no replace happened in between)
    pub fn same(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }
}

impl<R: Clone> Snapshot<R> {
    pub fn to_vec(&self) -> Vec<R> { self.0.as_ref().clone() }
}

impl<R: Record> Snapshot<R> {
    pub fn get(&self, key: &R::Key) -> Option<&R> { self.0.iter().find(|r| &r.key() == key) }

    pub fn contains(&self, key: &R::Key) -> bool { self.position(key).is_some() }

    pub fn keys(&self) -> Vec<R::Key> { self.0.iter().map(|r| r.key()).collect() }

    fn position(&self, key: &R::Key) -> Option<usize> { self.0.iter().position(|r| &r.key() == key) }

    /// Returns a new snapshot with `f` applied to the record matching `key`.
    /// Returns `None` if no record has that key.
    pub fn with_updated(&self, key: &R::Key, f: impl FnOnce(&mut R)) -> Option<Self> {
        let index = self.position(key)?;
        let mut records = self.to_vec();
        f(&mut records[index]);
        Some(Self::new(records))
    }

    /// Returns a new snapshot with the record matching `key` replaced by `record`.
    /// Returns `None` if no record has that key.
    pub fn with_replaced(&self, key: &R::Key, record: R) -> Option<Self> { self.with_updated(key, move |current| *current = record) }

    /// Returns a new snapshot without the record matching `key`, or `None` if there is none.
    pub fn without(&self, key: &R::Key) -> Option<Self> {
        let index = self.position(key)?;
        let mut records = self.to_vec();
        records.remove(index);
        Some(Self::new(records))
    }

    /// Returns a new snapshot with `record` appended, or replacing the record with the same key in place
    pub fn with_upserted(&self, record: R) -> Self {
        let key = record.key();
        let mut records = self.to_vec();
        match records.iter().position(|r| r.key() == key) {
            Some(index) => records[index] = record,
            None => records.push(record),
        }
        Self::new(records)
    }
}
