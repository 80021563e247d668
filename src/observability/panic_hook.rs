//! Panic hook printing a crash report with the pipeline position.
//!
//! The report names the phase, tree and entity being worked on and the
//! propagation progress, so a crash mid-run can be traced to its input.

use super::context::{get_current_context, get_progress, PipelineContext};
use std::fmt::{self, Write as _};
use std::panic::PanicHookInfo;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const RULE: &str = "----------------------------------------------------------------";

/// Install the crash-report hook. Call before any scoring starts.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let report = CrashReport::capture(info);
        eprintln!("\n{}", report);
        if std::env::var_os("RUST_BACKTRACE").is_some() {
            eprintln!("{}", std::backtrace::Backtrace::capture());
        } else {
            eprintln!("Set RUST_BACKTRACE=1 for a stack trace.");
        }
    }));
}

/// Everything printed for one panic
#[derive(Debug, Clone)]
struct CrashReport {
    message: String,
    location: Option<String>,
    span: Option<&'static str>,
    context: PipelineContext,
    processed: usize,
    total: usize,
}

impl CrashReport {
    fn capture(info: &PanicHookInfo<'_>) -> Self {
        let (processed, total) = get_progress();
        Self {
            message: panic_message(info.payload()),
            location: info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column())),
            span: tracing::Span::current().metadata().map(|m| m.name()),
            context: get_current_context(),
            processed,
            total,
        }
    }
}

impl fmt::Display for CrashReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        writeln!(out, "{}", RULE)?;
        writeln!(out, "esgmap {} crashed on {}", VERSION, std::env::consts::OS)?;
        writeln!(out, "{}", RULE)?;
        writeln!(out, "panic:    {}", self.message)?;
        if let Some(location) = &self.location {
            writeln!(out, "at:       {}", location)?;
        }

        let phase = self
            .context
            .phase
            .map_or_else(|| "(none)".to_string(), |p| p.to_string());
        writeln!(out, "phase:    {}", phase)?;
        if let Some(span) = self.span {
            writeln!(out, "span:     {}", span)?;
        }
        if let Some(tree) = &self.context.current_tree {
            writeln!(out, "tree:     {}", tree)?;
        }
        if let Some(entity) = &self.context.current_entity {
            writeln!(out, "entity:   {}", entity)?;
        }
        if self.total > 0 {
            writeln!(
                out,
                "progress: {}/{} entities",
                self.processed.min(self.total),
                self.total
            )?;
        }
        write!(out, "{}", RULE)?;
        f.write_str(&out)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
