use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Singleton row tracking the provider's resumable history cursor.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncState {
    pub last_history_id: Option<String>,
    pub last_full_sync: Option<DateTime<Utc>>,
    pub last_incremental_sync: Option<DateTime<Utc>>,
    pub total_synced: i64,
}
