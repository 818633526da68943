//! Source sync pipeline
//!
//! Converts business source records (crawled pages, extracted products,
//! generated Q&A pairs, manually authored notes) into searchable knowledge
//! chunks: compose text, detect language, embed, upsert. The delete path
//! runs inline with source deletion so orphaned chunks never survive as
//! stale context.

pub mod errors;
pub mod pipeline;
pub mod sources;

pub use errors::{Result, SyncError};
pub use pipeline::{SyncOutcome, SyncPipeline};
pub use sources::SourceRecord;
