//! Evaluation persistence contract.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::scoring::PersuasionScore;

/// One persisted persuasion evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub id: String,
    /// RFC 3339 timestamp of the evaluation.
    pub timestamp: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub argument: String,
    pub total_score: u8,
    pub clarity_score: u8,
    pub evidence_score: u8,
    pub emotional_score: u8,
    pub objections_score: u8,
    pub overall_score: u8,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub convinced: bool,
    pub time_used: String,
}

impl EvaluationRecord {
    pub fn from_score(
        id: String,
        timestamp: String,
        user_id: String,
        user_name: Option<String>,
        argument: String,
        score: &PersuasionScore,
    ) -> Self {
        Self {
            id,
            timestamp,
            user_id,
            user_name,
            argument,
            total_score: score.total,
            clarity_score: score.clarity,
            evidence_score: score.evidence,
            emotional_score: score.emotional,
            objections_score: score.objections,
            overall_score: score.overall,
            strengths: score.strengths.clone(),
            weaknesses: score.weaknesses.clone(),
            convinced: score.convinced,
            time_used: score.time_used.clone(),
        }
    }
}

/// Sink for evaluation records. Failures are non-fatal by contract: the
/// dispatcher logs them and moves on.
#[async_trait]
pub trait EvaluationSink: Send + Sync {
    /// Persist a record. Returns whether the record was stored.
    async fn save(&self, record: &EvaluationRecord) -> Result<bool>;

    fn name(&self) -> &str;
}
