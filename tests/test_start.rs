mod common;

use common::{FakeProcs, fast_settings, server_def, write_pid};
use servman::pid_file;
use servman::supervisor::{LaunchMode, LogMode, StartOutcome, Supervisor, prepare_log_file};
use std::fs;
use tempfile::TempDir;

#[tokio::test]
async fn test_start_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let server = server_def(temp_dir.path(), "backend", &["sleep", "30"], &[8080]);
    write_pid(&server, 100);
    fs::create_dir_all(server.log_file.parent().unwrap()).unwrap();
    fs::write(&server.log_file, "previous run\n").unwrap();

    let procs = FakeProcs::new();
    procs.spawn(100);
    let supervisor = Supervisor::new(procs, fast_settings());

    let outcome = supervisor
        .start(&server, LaunchMode::Background)
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::AlreadyRunning { pid: 100 });
    assert_eq!(pid_file::read(&server.pid_file), Some(100));
    // nothing was launched, so the old log is untouched
    assert_eq!(fs::read_to_string(&server.log_file).unwrap(), "previous run\n");
}

#[tokio::test]
async fn test_missing_directory() {
    let temp_dir = TempDir::new().unwrap();
    let mut server = server_def(temp_dir.path(), "backend", &["sleep", "30"], &[8080]);
    server.directory = temp_dir.path().join("does-not-exist");
    let supervisor = Supervisor::new(FakeProcs::new(), fast_settings());

    let err = supervisor
        .start(&server, LaunchMode::Background)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"), "{err}");
    assert!(!server.pid_file.exists());
    assert!(!server.log_file.exists());
}

#[tokio::test]
async fn test_missing_executable() {
    let temp_dir = TempDir::new().unwrap();
    let server = server_def(
        temp_dir.path(),
        "backend",
        &["servman-test-no-such-binary", "--serve"],
        &[8080],
    );
    let supervisor = Supervisor::new(FakeProcs::new(), fast_settings());

    let err = supervisor
        .start(&server, LaunchMode::Background)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("is not on PATH"), "{err}");
    assert!(!server.pid_file.exists());
}

#[test]
fn test_prepare_log_file_removes_previous_log() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("logs").join("app.log");
    assert_eq!(prepare_log_file(&path), LogMode::Truncate);
    assert!(path.parent().unwrap().is_dir());

    fs::write(&path, "old").unwrap();
    assert_eq!(prepare_log_file(&path), LogMode::Truncate);
    assert!(!path.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_background_start_writes_pid_and_log() {
    use servman::probe::ProcessTable;
    use servman::procs::Procs;

    let temp_dir = TempDir::new().unwrap();
    let server = server_def(
        temp_dir.path(),
        "echoer",
        &["sh", "-c", "echo hello; sleep 30"],
        &[1],
    );
    let supervisor = Supervisor::new(Procs::new(), fast_settings());

    let outcome = supervisor
        .start(&server, LaunchMode::Background)
        .await
        .unwrap();
    let StartOutcome::Started { pid } = outcome else {
        panic!("unexpected outcome {outcome:?}");
    };
    assert_eq!(pid_file::read(&server.pid_file), Some(pid));
    assert!(supervisor.procs().is_alive(pid));
    assert_eq!(fs::read_to_string(&server.log_file).unwrap(), "hello\n");

    // a second start finds it running
    let again = supervisor
        .start(&server, LaunchMode::Background)
        .await
        .unwrap();
    assert_eq!(again, StartOutcome::AlreadyRunning { pid });

    assert!(supervisor.terminate_tree(pid).await);
}

#[cfg(unix)]
#[tokio::test]
async fn test_background_start_reports_early_exit() {
    use servman::procs::Procs;

    let temp_dir = TempDir::new().unwrap();
    let server = server_def(temp_dir.path(), "crasher", &["sh", "-c", "exit 1"], &[1]);
    let supervisor = Supervisor::new(Procs::new(), fast_settings());

    let outcome = supervisor
        .start(&server, LaunchMode::Background)
        .await
        .unwrap();
    assert!(matches!(outcome, StartOutcome::ExitedEarly { .. }), "{outcome:?}");
}

#[cfg(unix)]
#[tokio::test]
async fn test_foreground_start_tees_output() {
    use servman::procs::Procs;

    let temp_dir = TempDir::new().unwrap();
    let server = server_def(
        temp_dir.path(),
        "oneshot",
        &["sh", "-c", "echo out; echo err >&2; exit 3"],
        &[1],
    );
    let supervisor = Supervisor::new(Procs::new(), fast_settings());

    let outcome = supervisor
        .start(&server, LaunchMode::Foreground)
        .await
        .unwrap();
    assert!(
        matches!(outcome, StartOutcome::Exited { code: Some(3), .. }),
        "{outcome:?}"
    );
    assert!(!server.pid_file.exists());

    let log = fs::read_to_string(&server.log_file).unwrap();
    assert!(log.contains("out\n"), "{log}");
    assert!(log.contains("err\n"), "{log}");
}
