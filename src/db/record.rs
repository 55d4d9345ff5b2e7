//! A JobRecord is stored as rows of (job, task, backend id), one row per recorded id
//!
//! Rows are only inserted, never updated or deleted, and are read back in insertion order.

pub mod load;
pub mod update;
