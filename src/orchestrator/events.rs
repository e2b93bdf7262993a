//! Pipeline event bus (§4.10, §6.5). Supersedes the teacher's chat-room
//! `EventBus` with pipeline-stage lifecycle events, broadcast to SSE
//! subscribers on the admin portal's `/api/pipeline/stream`.

use crate::domain::enums::Stage;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Started { run_id: i64, stage: Stage },
    Done { run_id: i64, stage: Stage, items: i64 },
    Failed { run_id: i64, stage: Stage, error: String },
}

pub struct PipelineEventBus {
    pub sender: broadcast::Sender<PipelineEvent>,
}

impl Default for PipelineEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        PipelineEventBus { sender }
    }

    pub fn publish(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }
}
