use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubmitError {
    /// The process or queue submission could not start, or the queue rejected it
    #[error("submission of {job} failed: {reason}")]
    SubmissionFailure { job: String, reason: String },

    /// A command in a local sequence exited non-zero. `output` is the stdout captured so far.
    #[error("command `{command}` exited with {}", exit_text(.code))]
    ExecutionFailure {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("task name must not be empty")]
    InvalidTaskName,

    #[error("no input files given for task {0}")]
    NoInputFiles(String),

    #[error("input file {} is missing or unreadable", .0.display())]
    MissingInput(PathBuf),

    #[error("output file {} is not in the working directory", .0.display())]
    OutputNotResident(PathBuf),

    #[error("can't render job script: {0}")]
    Template(#[from] tinytemplate::error::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn exit_text(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}
