//! A calculation driven across several invocations: submit, persist, reload, poll

use std::fs;
use std::path::{Path, PathBuf};

use crysub::db::open::{open_db, release_or_rollback};
use crysub::db::record::load::load_record;
use crysub::db::record::update::append_entries;
use crysub::submitter::local::LocalBackend;
use crysub::submitter::{JobStatus, SubmitError, Submitter};
use crysub::WorkingDirectory;

fn job_dir(root: &Path) -> WorkingDirectory {
    let wd = WorkingDirectory::new(root).join("si");
    wd.ensure().unwrap();
    fs::write(wd.path.join("si.d12"), "Si\nCRYSTAL\nEND\n").unwrap();
    wd
}

#[test]
fn local_run_persists_across_invocations() {
    let tmp = tempfile::tempdir().unwrap();
    let root = WorkingDirectory::new(tmp.path());
    let wd = job_dir(tmp.path());
    let inputs = vec![PathBuf::from("si.d12")];

    // first invocation: run crystal, nothing to record for a local run
    {
        let conn = open_db(&root).unwrap();
        let record = load_record(&conn, "si").unwrap();
        let submitter = Submitter::new(LocalBackend::new("grep -c CRYSTAL si.d12"), wd.clone());
        let before = record.len();
        let ids = submitter
            .execute(&record, &[], &inputs, Some(Path::new("si.d12.o")), "crystal")
            .unwrap();
        assert!(ids.is_empty());
        append_entries(&conn, "si", &record.entries()[before..]).unwrap();
        release_or_rollback(&conn, false).unwrap();
    }
    assert_eq!(fs::read_to_string(wd.path.join("si.d12.o")).unwrap(), "1\n");

    // a queue backend handed out one id per run, only the new rows are persisted each time
    for id in ["101", "102"] {
        let conn = open_db(&root).unwrap();
        let record = load_record(&conn, "si").unwrap();
        let before = record.len();
        record.append("properties", [id]);
        append_entries(&conn, "si", &record.entries()[before..]).unwrap();
        release_or_rollback(&conn, false).unwrap();
    }

    // later invocation: reload and poll
    let conn = open_db(&root).unwrap();
    let record = load_record(&conn, "si").unwrap();
    assert_eq!(record.ids_for("properties"), vec!["101", "102"]);

    let submitter = Submitter::new(LocalBackend::new("true"), wd);
    let status = submitter.status(&record, "properties").unwrap();
    assert_eq!(status, vec![JobStatus::Unknown, JobStatus::Unknown]);
    assert!(submitter.status(&record, "nonexistent").unwrap().is_empty());
    assert_eq!(record.len(), 2);
}

#[test]
fn failed_local_run_is_not_recorded() {
    let tmp = tempfile::tempdir().unwrap();
    let root = WorkingDirectory::new(tmp.path());
    let wd = job_dir(tmp.path());

    let conn = open_db(&root).unwrap();
    let record = load_record(&conn, "si").unwrap();
    let submitter = Submitter::new(LocalBackend::new("exit 1"), wd);

    let err = submitter
        .execute(&record, &[], &[PathBuf::from("si.d12")], None, "crystal")
        .unwrap_err();
    assert!(matches!(err, SubmitError::ExecutionFailure { code: Some(1), .. }));
    assert!(record.is_empty());
}
