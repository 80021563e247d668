//! Hierarchical propagation of scores through Fund → Company → Project trees.
//!
//! Leaves are scored from their own data; parents aggregate their children;
//! entities with neither are estimated from same-kind, same-sector peers.
//! Independent trees run in parallel, and each tree is written atomically
//! under its own lock.

pub mod aggregation;
pub mod cancel;
pub mod hierarchy;
pub mod peer;
pub mod propagator;

pub use aggregation::{
    aggregate_children, estimate_from_peers, AggregateSource, AggregationSettings, NodeAggregate,
};
pub use cancel::{CancellationToken, TreeLocks};
pub use hierarchy::{Hierarchy, HierarchyIssue, TreePlan};
pub use peer::{estimated_observations, lookup_peers, PeerIndex};
pub use propagator::{
    EntityState, FailureKind, MetricsPropagator, PropagationFailure, PropagationSummary,
};
