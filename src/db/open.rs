use anyhow::{Context, Result};
use log::info;
use rusqlite::Connection;

use crate::WorkingDirectory;

pub fn open_db(wd: &WorkingDirectory) -> Result<Connection> {
    let path = &wd.path.join("crysub.db");
    if !path.exists() { info!("Creating new database {}", path.display()) }
    let conn = Connection::open(path)
        .with_context(|| format!("Can't open database {}", path.display()))?;

    static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/db/schema.sql"));
    conn.execute(SCHEMA, [])?;

    info!("Creating dry run save point");
    conn.execute("SAVEPOINT dry_run", [])?;

    Ok(conn)
}

/// Undo everything since [`open_db`] when `dry_run` is set, keep it otherwise
pub fn release_or_rollback(conn: &Connection, dry_run: bool) -> Result<()> {
    match dry_run {
        true => {
            info!("--dry-run set, rolling back database state");
            conn.execute("ROLLBACK TO dry_run", [])?;
            conn.execute("RELEASE dry_run", [])?;
        }
        false => {
            info!("--dry-run not set, releasing dry run save point");
            conn.execute("RELEASE dry_run", [])?;
        }
    }
    Ok(())
}
