use super::enums::{RunStatus, Stage, TriggeredBy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: i64,
    pub stage: Stage,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items_processed: i64,
    pub error_message: Option<String>,
    pub config_snapshot: serde_json::Value,
    pub triggered_by: TriggeredBy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiAuditEntry {
    pub id: i64,
    pub pipeline_run_id: i64,
    pub stage: Stage,
    pub sender_domain: Option<String>,
    pub prompt_template_id: String,
    pub prompt_rendered: String,
    pub system_prompt: String,
    pub model_used: String,
    pub response_raw: String,
    pub response_parsed: Option<serde_json::Value>,
    pub duration_ms: i64,
}
