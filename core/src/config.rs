use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How `rollback` restores the state an operation replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStrategy {
    /// Restore the whole collection as it was when the operation started.
    /// Also discards the speculative changes of any operation that started later
    /// and is still pending.
    Snapshot,
    /// Keep a confirmed base value per key and replay the remaining pending
    /// transformations on top of it. Only the target record is touched.
    #[default]
    Rebase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub rollback: RollbackStrategy,

    /// When set, `perform` waits for any in-flight `perform` on the same key to
    /// reconcile before starting its own operation
    pub serialize_per_key: bool,

    /// Age after which a pending operation is reported by `stale()`
    #[serde(with = "duration_millis")]
    pub stale_after: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self { Self { rollback: RollbackStrategy::default(), serialize_per_key: false, stale_after: Duration::from_secs(30) } }
}

impl CoordinatorConfig {
    pub fn new(rollback: RollbackStrategy, serialize_per_key: bool) -> Self { Self { rollback, serialize_per_key, ..Self::default() } }

    /// Whole-collection snapshots and no per-key ordering
    pub fn faithful() -> Self { Self::new(RollbackStrategy::Snapshot, false) }

    /// Per-key rebase and one `perform` in flight per key
    pub fn hardened() -> Self { Self::new(RollbackStrategy::Rebase, true) }

    pub fn with_rollback(mut self, rollback: RollbackStrategy) -> Self {
        self.rollback = rollback;
        self
    }

    pub fn with_serialize_per_key(mut self, serialize_per_key: bool) -> Self {
        self.serialize_per_key = serialize_per_key;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stale_after.is_zero() {
            return Err(ConfigError::ZeroStaleAfter(self.stale_after));
        }
        Ok(())
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
