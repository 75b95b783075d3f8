//! The multi-stage query pipeline.
//!
//! A request moves through three stages in a fixed order:
//!
//! 1. **Retrieval** — find relevant schema, generate SQL, execute it.
//!    The only stage that can abort the request.
//! 2. **Analysis** — summarize the result rows in natural language.
//!    Infallible: a failed summarization degrades to a deterministic
//!    row-count answer.
//! 3. **Enrichment** — attach live market or filing data when the question
//!    asks for it. Strictly best-effort.
//!
//! The [`orchestrator::Orchestrator`] owns the stage sequence, the audit
//! record, and response assembly.

pub mod analysis;
pub mod enrichment;
pub mod orchestrator;
pub mod retrieval;

pub use orchestrator::Orchestrator;
