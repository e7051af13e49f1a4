//! Per-entity state tracking for AVDECC (IEEE 1722.1) controllers.
//!
//! A controller discovers entities on the network, enumerates their
//! entity model over AECP, and then keeps that model in sync with
//! unsolicited notifications. This crate holds everything it knows about
//! one entity while that happens:
//!
//! - **[`ControlledEntity`]**: identity, global state (acquire, lock,
//!   Milan info), the learned [`EntityTree`] and the [`EntityNode`] graph
//!   derived from it, plus [`EntityStatistics`].
//!
//! - **[`EntityLock`]**: a depth-counted reentrant lock, shared between
//!   trackers of the same device, which can be fully released around
//!   observer callbacks and restored afterwards.
//!
//! - **[`SharedEntity`]**: a [`ControlledEntity`] shared across threads,
//!   whose state is only reachable through an [`EntityGuard`] holding a
//!   level of its lock.
//!
//! - **[`PendingQueryTracker`]**: which queries of each enumeration
//!   category are still outstanding, with per-category retry budgets from
//!   [`TrackerConfig`].
//!
//! - **[`redundancy`]**: primary/secondary classification of redundant
//!   stream pairs.
//!
//! - **[`EntityModelCache`]**: complete static models shared across
//!   entities of the same entity model ID.
//!
//! Nothing here talks to the network; the protocol layer feeds responses
//! in and reads decisions out.

pub mod cache;
pub mod config;
pub mod entity;
pub mod enumeration;
pub mod error;
pub mod lock;
pub mod model;
pub mod pending;
pub mod redundancy;
pub mod shared;
pub mod statistics;
pub mod visitor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::EntityModelCache;
pub use config::{Backoff, RetryPolicy, TrackerConfig};
pub use entity::ControlledEntity;
pub use enumeration::{
    DescriptorDynamicInfoType, DescriptorKey, DynamicInfoType, EnumerationSteps, MilanInfoType,
};
pub use error::CoreError;
pub use lock::{EntityLock, EntityLockGuard, ReleasedScope, SharedLock};
pub use pending::{PendingQueryTracker, RetryDecision};
pub use redundancy::{RedundancyClassification, RedundancyIssue, RedundantStreamNode};
pub use shared::{EntityGuard, SharedEntity};
pub use statistics::{EntityStatistics, StatisticsSnapshot};
pub use visitor::EntityModelVisitor;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ConfigurationNode, ConfigurationTree, Entity, EntityCapabilities, EntityDescriptor,
    EntityNode, EntityTree, UniqueIdentifier,
};
