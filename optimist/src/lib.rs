//! # Optimist
//!
//! Optimistic local mutations for client-side state. Apply a change the moment
//! the user acts, keep the UI responsive while the remote call is in flight,
//! then commit it (merging any server-authoritative fields) or roll it back.
//!
//! ## Core Concepts
//!
//! - **Record**: a keyed domain value in a collection (derive it with `#[derive(Record)]`)
//! - **Patch**: sparse field overrides for a record, merged on commit
//! - **Snapshot**: an immutable view of the collection at one point in time
//! - **Store**: the host state container holding the current snapshot
//! - **Coordinator**: applies speculative changes and reconciles them
//! - **Operation**: one in-flight speculative change, `Pending` until committed or rolled back
//!
//! ## Example
//!
//! ```rust
//! use optimist::{Coordinator, Record};
//!
//! #[derive(Record, Debug, Clone, PartialEq)]
//! pub struct Comment {
//!     #[record(key)]
//!     pub id: String,
//!     pub reply_count: u32,
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let comments = Coordinator::from_records(
//!     vec![Comment { id: "c1".into(), reply_count: 2 }],
//!     |comment: &mut Comment| comment.reply_count += 1,
//! );
//!
//! // succeeds: the increment sticks
//! comments.perform("c1".to_string(), || async { Ok::<_, String>(()) }).await.unwrap();
//! assert_eq!(comments.snapshot().get(&"c1".to_string()).unwrap().reply_count, 3);
//!
//! // fails: the increment is undone and the error comes back
//! let result = comments.perform("c1".to_string(), || async { Err::<(), _>("network".to_string()) }).await;
//! assert_eq!(result, Err("network".to_string()));
//! assert_eq!(comments.snapshot().get(&"c1".to_string()).unwrap().reply_count, 3);
//! # }
//! ```
//!
//! Retries and timeouts are not the coordinator's business: wrap the action.

pub use optimist_core as core;
#[cfg(feature = "derive")]
pub use optimist_derive as derive;

pub use optimist_core::{
    broadcast::{Broadcast, ListenerGuard},
    config, error, operation, record, snapshot, store, transform, Coordinator, CoordinatorConfig, HostStore, OperationEvent,
    OperationId, OperationState, Patch, PendingInfo, Record, RollbackStrategy, Snapshot, Store, Transform,
};

// Re-export the derive macro
#[cfg(feature = "derive")]
pub use optimist_derive::*;
