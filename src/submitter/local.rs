use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use log::{info, warn};
use tempfile::NamedTempFile;

use crate::submitter::{Backend, CancelOutcome, JobSpec, JobStatus, SubmitError};
use crate::WorkingDirectory;

/// Run a job synchronously in the working directory
///
/// Preparation commands, the executable and finalisation commands run in that order through
/// `sh -c`, and their combined stdout becomes the output file. Stderr goes wherever the parent's
/// stderr goes. There is no asynchronous handle, so submission returns no ids and the job is
/// complete (or failed) by the time `submit_job` returns.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    pub exe: String,
    pub prep_commands: Vec<String>,
    pub final_commands: Vec<String>,
    pub shell: String,
}

impl LocalBackend {
    pub fn new(exe: impl Into<String>) -> LocalBackend {
        LocalBackend {
            exe: exe.into(),
            prep_commands: Vec::new(),
            final_commands: Vec::new(),
            shell: "sh".to_string(),
        }
    }

    pub fn with_prep_commands(mut self, commands: Vec<String>) -> LocalBackend {
        self.prep_commands = commands;
        self
    }

    pub fn with_final_commands(mut self, commands: Vec<String>) -> LocalBackend {
        self.final_commands = commands;
        self
    }

    /// order is important: prep, then the executable, then finalisation
    fn commands(&self) -> impl Iterator<Item = &String> {
        self.prep_commands
            .iter()
            .chain(std::iter::once(&self.exe))
            .chain(self.final_commands.iter())
    }

    /// Run every command, stopping at the first one that exits non-zero
    fn run_commands(&self, job_name: &str, wd: &WorkingDirectory) -> Result<String, SubmitError> {
        let mut output = String::new();

        for command in self.commands() {
            info!("Running `{command}` for {job_name}");
            let result = Command::new(&self.shell)
                .arg("-c")
                .arg(command)
                .current_dir(&wd.path)
                .stdin(Stdio::null())
                .stderr(Stdio::inherit())
                .output()
                .map_err(|err| SubmitError::SubmissionFailure {
                    job: job_name.to_string(),
                    reason: format!("can't spawn `{command}`: {err}"),
                })?;

            output.push_str(&String::from_utf8_lossy(&result.stdout));

            if !result.status.success() {
                warn!("`{command}` failed for {job_name}: {}", result.status);
                return Err(SubmitError::ExecutionFailure {
                    command: command.clone(),
                    code: result.status.code(),
                    output,
                });
            }
        }

        Ok(output)
    }
}

impl Backend for LocalBackend {
    fn submit_job(&self, job: &JobSpec) -> Result<Vec<String>, SubmitError> {
        let wd = job.working_dir()?;
        let job_name = job.job_name();
        job.check_inputs(&wd)?;

        let output = self.run_commands(&job_name, &wd)?;
        let out_path = wd.resolve(&job.output_file());
        info!("Writing output of {job_name} to {}", out_path.display());
        write_atomic(&out_path, &output)?;

        Ok(Vec::new())
    }

    fn job_status(&self, _queue_id: &str) -> Result<JobStatus, SubmitError> {
        Ok(JobStatus::Unknown)
    }

    fn job_cancel(&self, queue_id: &str) -> Result<CancelOutcome, SubmitError> {
        warn!("Cancel was called for {queue_id}, but local execution can't be cancelled");
        Ok(CancelOutcome::Unimplemented)
    }
}

/// Write to a temporary file next to `path` and rename it into place
fn write_atomic(path: &Path, contents: &str) -> Result<(), SubmitError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::record::JobRecord;
    use crate::submitter::Submitter;

    fn setup() -> (tempfile::TempDir, WorkingDirectory) {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.in"), "CRYSTAL\n").unwrap();
        let wd = WorkingDirectory::new(tmp.path());
        (tmp, wd)
    }

    fn inputs() -> Vec<PathBuf> {
        vec![PathBuf::from("a.in")]
    }

    #[test]
    fn echo_writes_output_and_returns_no_ids() {
        let (tmp, wd) = setup();
        let submitter = Submitter::new(LocalBackend::new("echo hello"), wd);
        let record = JobRecord::new();

        let ids = submitter
            .execute(&record, &[], &inputs(), Some(Path::new("crys.out")), "crystal")
            .unwrap();

        assert!(ids.is_empty());
        assert!(record.is_empty());
        assert_eq!(fs::read_to_string(tmp.path().join("crys.out")).unwrap(), "hello\n");
    }

    #[test]
    fn commands_run_in_order_in_the_working_directory() {
        let (tmp, wd) = setup();
        let backend = LocalBackend::new("cat a.in")
            .with_prep_commands(vec!["echo prep".to_string()])
            .with_final_commands(vec!["echo final".to_string(), "touch finished".to_string()]);
        let submitter = Submitter::new(backend, wd);

        submitter.execute(&JobRecord::new(), &[], &inputs(), None, "crystal").unwrap();

        let output = fs::read_to_string(tmp.path().join("stdout")).unwrap();
        assert_eq!(output, "prep\nCRYSTAL\nfinal\n");
        assert!(tmp.path().join("finished").exists());
    }

    #[test]
    fn failing_command_aborts_the_sequence() {
        let (tmp, wd) = setup();
        let backend = LocalBackend::new("echo partial; exit 3")
            .with_final_commands(vec!["touch finished".to_string()]);
        let submitter = Submitter::new(backend, wd);
        let record = JobRecord::new();

        let err = submitter
            .execute(&record, &[], &inputs(), Some(Path::new("crys.out")), "crystal")
            .unwrap_err();

        match err {
            SubmitError::ExecutionFailure { command, code, output } => {
                assert_eq!(command, "echo partial; exit 3");
                assert_eq!(code, Some(3));
                assert_eq!(output, "partial\n");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(record.is_empty());
        assert!(!tmp.path().join("finished").exists());
        assert!(!tmp.path().join("crys.out").exists());
    }

    #[test]
    fn missing_shell_is_a_submission_failure() {
        let (_tmp, wd) = setup();
        let mut backend = LocalBackend::new("echo hello");
        backend.shell = "/nonexistent/shell".to_string();
        let submitter = Submitter::new(backend, wd);

        let err = submitter
            .execute(&JobRecord::new(), &[], &inputs(), None, "crystal")
            .unwrap_err();
        assert!(matches!(err, SubmitError::SubmissionFailure { .. }));
    }

    #[test]
    fn status_is_unknown_and_cancel_is_a_notice() {
        let (_tmp, wd) = setup();
        let submitter = Submitter::new(LocalBackend::new("true"), wd);
        let record = JobRecord::new();
        record.append("crystal", ["local-1"]);

        assert_eq!(submitter.status(&record, "crystal").unwrap(), vec![JobStatus::Unknown]);
        let outcomes = submitter.cancel(&["local-1".to_string()]).unwrap();
        assert_eq!(outcomes, vec![CancelOutcome::Unimplemented]);
    }
}
