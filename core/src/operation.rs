use std::{
    fmt,
    str::FromStr,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::OperationIdError;

/// Opaque token correlating a `start` with its later `commit` or `rollback`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(Ulid);

impl OperationId {
    pub fn new() -> Self { Self(Ulid::new()) }

    /// The full, parseable form. `Display` only shows a short suffix.
    pub fn to_full_string(&self) -> String { self.0.to_string() }
}

impl Default for OperationId {
    fn default() -> Self { Self::new() }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id_str = self.0.to_string();
        write!(f, "O{}", &id_str[20..])
    }
}

impl FromStr for OperationId {
    type Err = OperationIdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(OperationIdError::Empty);
        }
        Ok(Self(Ulid::from_string(s)?))
    }
}

/// Lifecycle of one speculative mutation. `Committed` and `RolledBack` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationState {
    Pending,
    Committed,
    RolledBack,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool { !matches!(self, OperationState::Pending) }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationState::Pending => write!(f, "pending"),
            OperationState::Committed => write!(f, "committed"),
            OperationState::RolledBack => write!(f, "rolled back"),
        }
    }
}

/// Diagnostic view of an in-flight operation
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInfo<K> {
    pub id: OperationId,
    pub key: K,
    pub started_at: Instant,
    pub age: Duration,
}

/// Announced by a coordinator whenever an operation changes state
#[derive(Debug, Clone, PartialEq)]
pub enum OperationEvent<K> {
    Started { id: OperationId, key: K },
    Committed { id: OperationId, key: K, merged: bool },
    RolledBack { id: OperationId, key: K },
}

impl<K> OperationEvent<K> {
    pub fn id(&self) -> OperationId {
        match self {
            OperationEvent::Started { id, .. } | OperationEvent::Committed { id, .. } | OperationEvent::RolledBack { id, .. } => *id,
        }
    }

    pub fn key(&self) -> &K {
        match self {
            OperationEvent::Started { key, .. } | OperationEvent::Committed { key, .. } | OperationEvent::RolledBack { key, .. } => key,
        }
    }

    /// The state the operation is in after this event
    pub fn state(&self) -> OperationState {
        match self {
            OperationEvent::Started { .. } => OperationState::Pending,
            OperationEvent::Committed { .. } => OperationState::Committed,
            OperationEvent::RolledBack { .. } => OperationState::RolledBack,
        }
    }
}
