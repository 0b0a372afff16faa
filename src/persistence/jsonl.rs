//! JSON-lines evaluation log on the local filesystem.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use super::traits::{EvaluationRecord, EvaluationSink};

/// Appends one JSON object per evaluation to a local file.
pub struct JsonlEvaluationLog {
    path: PathBuf,
}

impl JsonlEvaluationLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl EvaluationSink for JsonlEvaluationLog {
    async fn save(&self, record: &EvaluationRecord) -> Result<bool> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating evaluation log dir {}", parent.display()))?;
        }

        let mut line = serde_json::to_string(record).context("serializing evaluation record")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening evaluation log {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .context("appending evaluation record")?;
        file.flush().await.context("flushing evaluation log")?;
        Ok(true)
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}
