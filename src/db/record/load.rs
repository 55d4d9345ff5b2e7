use anyhow::Result;
use log::info;
use rusqlite::Connection;

use crate::record::{JobRecord, QueueEntry};

pub fn load_record(conn: &Connection, job: &str) -> Result<JobRecord> {
    let mut stmt =
        conn.prepare("SELECT task, backend_id FROM queue_id WHERE job = ?1 ORDER BY seq")?;
    let rows = stmt.query_map([job], |row| {
        Ok(QueueEntry { task: row.get(0)?, queue_id: row.get(1)? })
    })?;

    let entries = rows.collect::<rusqlite::Result<Vec<QueueEntry>>>()?;
    info!("Loaded {} recorded id(s) for job {job}", entries.len());
    Ok(JobRecord::from_entries(entries))
}
