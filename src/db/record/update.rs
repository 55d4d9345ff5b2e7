use anyhow::Result;
use chrono::Utc;
use log::info;
use rusqlite::Connection;

use crate::record::QueueEntry;

pub fn append_entries(conn: &Connection, job: &str, entries: &[QueueEntry]) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let mut stmt = conn.prepare(
        "INSERT INTO queue_id (job, task, backend_id, recorded_at) VALUES (?1, ?2, ?3, ?4)",
    )?;

    for entry in entries {
        info!("Recording {} under {job}/{}", entry.queue_id, entry.task);
        stmt.execute((job, &entry.task, &entry.queue_id, &now))?;
    }

    Ok(())
}
