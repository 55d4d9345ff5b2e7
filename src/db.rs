//! JobRecords are persisted in a SQLite database between runs

/// Connect to a SQLite database
pub mod open;
/// Load and append JobRecord entries
pub mod record;
