use crate::domain::SyncState;
use crate::error::AppResult;
use rusqlite::{params, Connection};

pub fn get(conn: &Connection) -> AppResult<SyncState> {
    let result = conn.query_row(
        "SELECT last_history_id, last_full_sync, last_incremental_sync, total_synced FROM sync_state WHERE id = 1",
        [],
        |row| {
            Ok(SyncState {
                last_history_id: row.get(0)?,
                last_full_sync: row.get(1)?,
                last_incremental_sync: row.get(2)?,
                total_synced: row.get(3)?,
            })
        },
    );
    match result {
        Ok(s) => Ok(s),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(SyncState::default()),
        Err(e) => Err(e.into()),
    }
}

pub fn save(conn: &Connection, state: &SyncState) -> AppResult<()> {
    conn.execute(
        "INSERT INTO sync_state (id, last_history_id, last_full_sync, last_incremental_sync, total_synced)
         VALUES (1, ?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
            last_history_id=excluded.last_history_id,
            last_full_sync=excluded.last_full_sync,
            last_incremental_sync=excluded.last_incremental_sync,
            total_synced=excluded.total_synced",
        params![
            state.last_history_id,
            state.last_full_sync,
            state.last_incremental_sync,
            state.total_synced,
        ],
    )?;
    Ok(())
}
