//! Quote workflows: draft saving, recalculation, duplication and revisions.

pub mod orchestrator;

pub use orchestrator::{
    normalize_inputs, OrchestrationError, Orchestrator, Preview, QuoteView, RevisionCreated,
};
