mod common;

use common::{FakeProcs, fast_settings, server_def, write_pid};
use servman::supervisor::{Supervisor, tail_log};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_tail_returns_last_lines_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.log");
    let content: String = (1..=10).map(|i| format!("line {i}\n")).collect();
    fs::write(&path, content).unwrap();

    assert_eq!(tail_log(&path, 3), vec!["line 8", "line 9", "line 10"]);
    assert_eq!(tail_log(&path, 50).len(), 10);
}

#[test]
fn test_tail_without_trailing_newline() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.log");
    fs::write(&path, "a\nb\nc").unwrap();
    assert_eq!(tail_log(&path, 2), vec!["b", "c"]);
}

#[test]
fn test_tail_replaces_invalid_utf8() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("app.log");
    fs::write(&path, b"ok\nbad \xff byte\n").unwrap();
    assert_eq!(tail_log(&path, 5), vec!["ok", "bad \u{FFFD} byte"]);
}

#[test]
fn test_tail_missing_log() {
    let temp_dir = TempDir::new().unwrap();
    assert!(tail_log(&temp_dir.path().join("missing.log"), 10).is_empty());
}

#[tokio::test]
async fn test_status_not_running() {
    let temp_dir = TempDir::new().unwrap();
    let server = server_def(temp_dir.path(), "backend", &["sleep", "30"], &[8080]);
    let supervisor = Supervisor::new(FakeProcs::new(), fast_settings());

    let status = supervisor.status(&server, 10).await;
    assert_eq!(status.running_pid, None);
    assert!(status.usage.is_none());
    assert!(status.listening_ports.is_empty());

    let out = status.to_string();
    assert!(out.starts_with("=== BACKEND ===\n"), "{out}");
    assert!(out.contains("Not running"), "{out}");
    assert!(out.contains("No expected ports (8080) are listening"), "{out}");
    assert!(out.contains("No log file at"), "{out}");
}

#[tokio::test]
async fn test_status_stale_pid_is_not_running() {
    let temp_dir = TempDir::new().unwrap();
    let server = server_def(temp_dir.path(), "backend", &["sleep", "30"], &[8080]);
    write_pid(&server, 555);
    let supervisor = Supervisor::new(FakeProcs::new(), fast_settings());

    let status = supervisor.status(&server, 10).await;
    assert_eq!(status.running_pid, None);
    // status only reports; it never cleans up
    assert!(server.pid_file.exists());
}

#[tokio::test]
async fn test_status_running() {
    let temp_dir = TempDir::new().unwrap();
    let server = server_def(temp_dir.path(), "backend", &["sleep", "30"], &[8080, 8081]);
    write_pid(&server, 100);
    fs::create_dir_all(server.log_file.parent().unwrap()).unwrap();
    fs::write(&server.log_file, "booting\nready\n").unwrap();

    let procs = FakeProcs::new();
    procs.listen(100, 8080);
    let supervisor = Supervisor::new(procs, fast_settings());

    let status = supervisor.status(&server, 1).await;
    assert_eq!(status.running_pid, Some(100));
    assert_eq!(status.listening_ports, vec![8080]);
    assert_eq!(status.log_lines, vec!["ready"]);

    let out = status.to_string();
    assert!(out.contains("Running (PID 100)"), "{out}");
    assert!(out.contains("CPU: 2.0%  RAM: 10.0 MiB"), "{out}");
    assert!(out.contains("Ports in use: 8080\n"), "{out}");
    assert!(out.contains("Last 1 log lines from backend.log:\n    ready\n"), "{out}");
}

#[cfg(unix)]
#[tokio::test]
async fn test_status_sees_real_listener() {
    use servman::procs::Procs;

    let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
    let port = listener.local_addr().unwrap().port();
    let temp_dir = TempDir::new().unwrap();
    let server = server_def(temp_dir.path(), "backend", &["sleep", "30"], &[port]);
    write_pid(&server, std::process::id());
    let supervisor = Supervisor::new(Procs::new(), fast_settings());

    let status = supervisor.status(&server, 10).await;
    assert_eq!(status.running_pid, Some(std::process::id()));
    assert_eq!(status.listening_ports, vec![port]);
    let out = status.to_string();
    assert!(out.contains(&format!("Running (PID {})", std::process::id())), "{out}");
    assert!(out.contains(&format!("Ports in use: {port}\n")), "{out}");

    drop(listener);
    let status = supervisor.status(&server, 10).await;
    assert!(status.listening_ports.is_empty());
}
