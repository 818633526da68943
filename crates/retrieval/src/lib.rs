//! Query-time half of the knowledge engine
//!
//! The intent router classifies a query with weighted keyword scoring and
//! maps the winning intent to a source plan; the context retrieval engine
//! executes that plan against the chunk store under per-source token
//! budgets and returns a [`engine::ContextBundle`] for the generation step.

pub mod engine;
pub mod router;

pub use engine::{ContextBundle, ContextRetriever};
pub use router::{IntentRoute, IntentRouter, KeywordRule, RoutingDecision};
