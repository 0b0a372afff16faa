//! Evaluation persistence: the sink contract and the local JSONL log.

pub mod jsonl;
pub mod traits;

pub use jsonl::JsonlEvaluationLog;
pub use traits::{EvaluationRecord, EvaluationSink};
