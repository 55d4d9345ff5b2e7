use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// One submission: the task that asked for it and the id the backend handed back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub task: String,
    pub queue_id: String,
}

/// Every backend id produced for one scientific calculation
///
/// Entries are only ever appended. A task that was resubmitted keeps its earlier ids, so status
/// queries return one value per attempt. Appends take a lock and may come from several threads;
/// reads work on a snapshot.
#[derive(Debug, Default)]
pub struct JobRecord {
    queue_id: Mutex<Vec<QueueEntry>>,
}

/// Plain form used for JSON export
#[derive(Serialize, Deserialize)]
struct RecordFile {
    queue_id: Vec<QueueEntry>,
}

impl JobRecord {
    pub fn new() -> JobRecord {
        JobRecord::default()
    }

    pub fn from_entries(entries: Vec<QueueEntry>) -> JobRecord {
        JobRecord { queue_id: Mutex::new(entries) }
    }

    /// Append ids under a task, keeping their order
    pub fn append<I, S>(&self, task: &str, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut guard = self.lock();
        for id in ids {
            guard.push(QueueEntry { task: task.to_string(), queue_id: id.into() });
        }
    }

    pub fn entries(&self) -> Vec<QueueEntry> {
        self.lock().clone()
    }

    pub fn ids_for(&self, task: &str) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|entry| entry.task == task)
            .map(|entry| entry.queue_id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&RecordFile { queue_id: self.entries() })
    }

    pub fn from_json(json: &str) -> serde_json::Result<JobRecord> {
        let file: RecordFile = serde_json::from_str(json)?;
        Ok(JobRecord::from_entries(file.queue_id))
    }

    // a panic while holding the lock can't leave a half-written entry behind
    fn lock(&self) -> MutexGuard<'_, Vec<QueueEntry>> {
        self.queue_id.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
