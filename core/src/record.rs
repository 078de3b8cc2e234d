use std::fmt::Debug;
use std::hash::Hash;

/// A keyed domain record held in an optimistic collection.
///
/// Usually derived with `#[derive(Record)]`, which marks one field as the key
/// and generates a sparse `<Name>Patch` type for the remaining fields.
pub trait Record: Clone + Send + Sync + 'static {
    /// Stable identifier of the record within its collection
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;
    /// Sparse set of field overrides, typically server-authoritative values merged on commit
    type Patch: Patch + Clone + Debug + Send + Sync + 'static;

    fn key(&self) -> Self::Key;

    /// Overwrites every field that is set in `patch`, leaving the others untouched
    fn apply_patch(&mut self, patch: &Self::Patch);
}

/// A partial record: a set of optional field overrides
pub trait Patch {
    /// True if applying this patch would change nothing
    fn is_empty(&self) -> bool;
}

/// The unit patch, for records that never merge server fields
impl Patch for () {
    fn is_empty(&self) -> bool { true }
}

/// A speculative (or authoritative) transformation of a single record
pub type Transform<R> = std::sync::Arc<dyn Fn(&mut R) + Send + Sync + 'static>;

/// Build a [`Transform`] from a closure
pub fn transform<R, F>(f: F) -> Transform<R>
where F: Fn(&mut R) + Send + Sync + 'static {
    std::sync::Arc::new(f)
}
