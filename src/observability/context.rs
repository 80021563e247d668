//! Thread-local context tracking for crash reports.
//!
//! Records which pipeline phase and which entity the current thread is
//! working on. Uses thread-local storage so each rayon worker keeps its own
//! context, and atomic counters for run-wide progress.
//!
//! ## Thread Safety
//!
//! - Thread-local context: Each thread has its own context (via `thread_local!`)
//! - Global progress: Atomic counters for entities processed/total
//! - Context guards use RAII for automatic cleanup on drop

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};

static ENTITIES_PROCESSED: AtomicUsize = AtomicUsize::new(0);
static ENTITIES_TOTAL: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static CURRENT_CONTEXT: RefCell<PipelineContext> = const { RefCell::new(PipelineContext::new()) };
}

/// Context snapshot for the current pipeline operation.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    /// Current pipeline phase
    pub phase: Option<PipelinePhase>,
    /// Entity currently being processed
    pub current_entity: Option<String>,
    /// Root of the tree currently being propagated
    pub current_tree: Option<String>,
}

impl PipelineContext {
    /// Create a new empty context.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: None,
            current_entity: None,
            current_tree: None,
        }
    }
}

/// Major stages of a scoring or propagation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Flattening metric observations into a feature map
    FeatureExtraction,
    /// Scoring quality dimensions of provider bundles
    QualityValidation,
    /// Comparing provider bundles against each other
    Reconciliation,
    /// Running the pillar models
    ComponentScoring,
    /// Combining pillars into the composite
    CompositeScoring,
    /// Resolving leaf scores and direct aggregates
    LeafResolution,
    /// Bottom-up aggregation through the hierarchy
    Propagation,
    /// Imputing from sector peers
    PeerEstimation,
    /// Writing staged results to the store
    Commit,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FeatureExtraction => write!(f, "feature_extraction"),
            Self::QualityValidation => write!(f, "quality_validation"),
            Self::Reconciliation => write!(f, "reconciliation"),
            Self::ComponentScoring => write!(f, "component_scoring"),
            Self::CompositeScoring => write!(f, "composite_scoring"),
            Self::LeafResolution => write!(f, "leaf_resolution"),
            Self::Propagation => write!(f, "propagation"),
            Self::PeerEstimation => write!(f, "peer_estimation"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// RAII guard for restoring pipeline context on drop.
pub struct ContextGuard {
    previous: PipelineContext,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT_CONTEXT.with(|ctx| {
            *ctx.borrow_mut() = self.previous.clone();
        });
    }
}

fn update_context(apply: impl FnOnce(&mut PipelineContext)) -> ContextGuard {
    CURRENT_CONTEXT.with(|ctx| {
        let previous = ctx.borrow().clone();
        apply(&mut ctx.borrow_mut());
        ContextGuard { previous }
    })
}

/// Set the current pipeline phase.
///
/// Returns a guard that restores the previous phase on drop.
#[must_use]
pub fn set_phase(phase: PipelinePhase) -> ContextGuard {
    update_context(|ctx| ctx.phase = Some(phase))
}

/// Set the entity currently being processed.
#[must_use]
pub fn set_current_entity(entity_id: impl Into<String>) -> ContextGuard {
    let entity_id = entity_id.into();
    update_context(|ctx| ctx.current_entity = Some(entity_id))
}

/// Set the tree root currently being propagated.
#[must_use]
pub fn set_current_tree(root_id: impl Into<String>) -> ContextGuard {
    let root_id = root_id.into();
    update_context(|ctx| ctx.current_tree = Some(root_id))
}

/// Set the progress counters (processed and total entities).
pub fn set_progress(processed: usize, total: usize) {
    ENTITIES_PROCESSED.store(processed, Ordering::Relaxed);
    ENTITIES_TOTAL.store(total, Ordering::Relaxed);
}

/// Increment the processed entity count.
pub fn increment_processed() {
    ENTITIES_PROCESSED.fetch_add(1, Ordering::Relaxed);
}

/// Get the current context snapshot.
#[must_use]
pub fn get_current_context() -> PipelineContext {
    CURRENT_CONTEXT.with(|ctx| ctx.borrow().clone())
}

/// Get the current progress (processed, total).
#[must_use]
pub fn get_progress() -> (usize, usize) {
    (
        ENTITIES_PROCESSED.load(Ordering::Relaxed),
        ENTITIES_TOTAL.load(Ordering::Relaxed),
    )
}

/// Reset the current thread's context to empty.
pub fn reset_context() {
    CURRENT_CONTEXT.with(|ctx| {
        *ctx.borrow_mut() = PipelineContext::new();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_guard_restores_previous() {
        reset_context();

        let _phase1 = set_phase(PipelinePhase::LeafResolution);
        {
            let _phase2 = set_phase(PipelinePhase::PeerEstimation);
            assert_eq!(
                get_current_context().phase,
                Some(PipelinePhase::PeerEstimation)
            );
        }

        assert_eq!(
            get_current_context().phase,
            Some(PipelinePhase::LeafResolution),
            "Phase should be restored after inner guard drops"
        );
    }

    #[test]
    fn test_nested_context_guards() {
        reset_context();

        let _phase = set_phase(PipelinePhase::Propagation);
        let _tree = set_current_tree("fund-1");
        let _entity = set_current_entity("company-7");

        let ctx = get_current_context();
        assert_eq!(ctx.phase, Some(PipelinePhase::Propagation));
        assert_eq!(ctx.current_tree.as_deref(), Some("fund-1"));
        assert_eq!(ctx.current_entity.as_deref(), Some("company-7"));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(PipelinePhase::QualityValidation.to_string(), "quality_validation");
        assert_eq!(PipelinePhase::Commit.to_string(), "commit");
    }

    #[test]
    fn test_empty_context_by_default() {
        reset_context();
        let ctx = get_current_context();
        assert!(ctx.phase.is_none());
        assert!(ctx.current_entity.is_none());
        assert!(ctx.current_tree.is_none());
    }
}
