//! Observability infrastructure for crash reports and debugging.
//!
//! ## Features
//!
//! - **Panic Hook**: Produces structured crash reports with context
//! - **Context Tracking**: Thread-local pipeline phase, tree and entity
//! - **Progress Tracking**: Atomic counters for propagation progress
//! - **Logging**: `tracing` subscriber setup for the CLI
//!
//! ## Usage
//!
//! ```ignore
//! use esgmap::observability::{set_phase, set_current_entity, PipelinePhase};
//!
//! let _phase = set_phase(PipelinePhase::Propagation);
//! for id in entity_ids {
//!     let _entity = set_current_entity(id);
//!     // If a panic occurs here, the crash report shows phase and entity
//! }
//! ```

pub mod context;
pub mod panic_hook;

pub use context::{
    get_current_context, get_progress, increment_processed, reset_context, set_current_entity,
    set_current_tree, set_phase, set_progress, ContextGuard, PipelineContext, PipelinePhase,
};
pub use panic_hook::install_panic_hook;

use tracing_subscriber::EnvFilter;

/// Install a `tracing` fmt subscriber writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `verbosity` picks the level
/// (0 = warn, 1 = info, 2+ = debug). `log` records from dependencies are
/// bridged through the subscriber.
pub fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second initialisation (e.g. in tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
