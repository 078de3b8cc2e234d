//! Core optimistic mutation primitives.
//!
//! A [`Coordinator`] owns a keyed collection of [`Record`]s inside a [`HostStore`].
//! It applies a speculative change the moment the user acts, tracks it under an
//! [`OperationId`], and later commits it (optionally merging server fields) or
//! rolls it back.

pub mod broadcast;
pub mod config;
pub mod coordinator;
pub mod error;
mod lane;
mod ledger;
pub mod operation;
pub mod record;
pub mod snapshot;
pub mod store;
mod util;

pub use config::{CoordinatorConfig, RollbackStrategy};
pub use coordinator::Coordinator;
pub use operation::{OperationEvent, OperationId, OperationState, PendingInfo};
pub use record::{transform, Patch, Record, Transform};
pub use snapshot::Snapshot;
pub use store::{HostStore, Store};
