#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tmuxcast_core::{Key, Stroke};
use tmuxcast_tmux::{Session, SessionConfig, SessionError, TmuxError};

/// Stand-in tmux: logs argv and control input, answers `-C` with a short
/// control stream.
const FAKE_TMUX: &str = r#"#!/bin/sh
LOG="__LOG__"
echo "argv: $*" >> "$LOG"
case "$*" in
  new-session*)
    __ON_NEW_SESSION__
    ;;
  kill-session*)
    exit __KILL_STATUS__
    ;;
  *"-C attach-session"*)
    printf '%%begin 1 1 0\n%%end 1 1 0\n'
    printf '%%output %%0 hello\\015\\012\n'
    cat >> "$LOG"
    printf '%%exit\n'
    ;;
esac
exit 0
"#;

fn fake_tmux(dir: &Path) -> (PathBuf, PathBuf) {
    fake_tmux_with(dir, ":", 0)
}

/// `on_new_session` runs inside the `new-session` branch; `kill-session`
/// exits with `kill_status`.
fn fake_tmux_with(dir: &Path, on_new_session: &str, kill_status: u8) -> (PathBuf, PathBuf) {
    let log = dir.join("tmux.log");
    let bin = dir.join("tmux");
    let script = FAKE_TMUX
        .replace("__LOG__", &log.display().to_string())
        .replace("__ON_NEW_SESSION__", on_new_session)
        .replace("__KILL_STATUS__", &kill_status.to_string());
    std::fs::write(&bin, script).unwrap();
    std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
    (bin, log)
}

fn config(tmux: &Path) -> SessionConfig {
    SessionConfig::default()
        .with_tmux_bin(tmux.display().to_string())
        .with_cps(1000.0)
        .with_settle(Duration::ZERO)
        .with_startup_delay(Duration::from_millis(50))
}

#[tokio::test]
async fn scripted_session_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (tmux, log) = fake_tmux(dir.path());

    let mut session = Session::open(config(&tmux)).await.unwrap();
    let id = session.id().to_string();
    assert!(id.starts_with("tmuxcast_"));

    session.mark("typed");
    {
        let mut scope = session.recorder(dir.path().join("scoped.cast"));
        let sent = scope
            .type_keys(&[Stroke::from("ab"), Stroke::from(Key::ENTER)], None)
            .await
            .unwrap();
        assert_eq!(sent, 3);
    }
    session.record(dir.path().join("full.cast"), None, None);
    assert_eq!(session.info().recordings, 2);

    let report = session.close().await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.saved.len(), 2);

    let full = std::fs::read_to_string(dir.path().join("full.cast")).unwrap();
    let mut lines = full.lines();
    let header: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
    assert_eq!(header["width"], 80);
    assert_eq!(header["height"], 25);
    let events: Vec<serde_json::Value> = lines.map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0][2], "hello\r\n");
    assert!(dir.path().join("scoped.cast").exists());

    let log = std::fs::read_to_string(&log).unwrap();
    for expected in [
        format!("argv: new-session -d -s {id} -x 80 -y 25"),
        format!("argv: -C attach-session -t {id}"),
        format!("resize-window -t {id} -x 80 -y 25"),
        format!("send-keys -t {id} -l 'a'"),
        format!("send-keys -t {id} -l 'b'"),
        format!("send-keys -t {id} 'Enter'"),
        format!("argv: kill-session -t {id}"),
    ] {
        assert!(log.contains(&expected), "missing {expected:?} in log:\n{log}");
    }

    // An unclosed session still gets killed.
    let dropped = Session::open(config(&tmux)).await.unwrap();
    let dropped_id = dropped.id().to_string();
    drop(dropped);
    let log = std::fs::read_to_string(dir.path().join("tmux.log")).unwrap();
    assert!(log.contains(&format!("argv: kill-session -t {dropped_id}")));
}

#[tokio::test]
async fn failing_new_session_is_reported() {
    let config = SessionConfig::default().with_tmux_bin("false");
    let err = Session::open(config).await.err().unwrap();
    assert!(
        matches!(
            err,
            SessionError::Create {
                source: TmuxError::CommandFailed(_),
                ..
            }
        ),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn failed_kill_still_exports_then_reports_destroy() {
    let dir = tempfile::tempdir().unwrap();
    let (tmux, log) = fake_tmux_with(dir.path(), ":", 1);

    let mut session = Session::open(config(&tmux)).await.unwrap();
    let id = session.id().to_string();
    let path = dir.path().join("a.cast");
    session.record(&path, None, None);

    let err = session.close().await.err().unwrap();
    match err {
        SessionError::Destroy { session_id, source } => {
            assert_eq!(session_id, id);
            assert!(matches!(source, TmuxError::CommandFailed(_)), "got: {source:?}");
        }
        other => panic!("expected Destroy, got {other:?}"),
    }

    let cast = std::fs::read_to_string(&path).unwrap();
    let mut lines = cast.lines();
    let header: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
    assert_eq!(header["version"], 2);
    let events: Vec<serde_json::Value> = lines.map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0][2], "hello\r\n");

    let log = std::fs::read_to_string(&log).unwrap();
    assert!(log.contains(&format!("argv: kill-session -t {id}")));
}

#[tokio::test]
async fn unattachable_session_is_reported_as_attach_error() {
    let dir = tempfile::tempdir().unwrap();
    // The binary stops being executable right after creating the session,
    // so the control client cannot be spawned.
    let (tmux, log) = fake_tmux_with(dir.path(), r#"chmod 644 "$0""#, 0);

    let err = Session::open(config(&tmux)).await.err().unwrap();
    let created = std::fs::read_to_string(&log).unwrap();
    match err {
        SessionError::Attach { session_id, source } => {
            assert!(created.contains(&format!("argv: new-session -d -s {session_id}")));
            assert!(matches!(source, TmuxError::Io(_)), "got: {source:?}");
        }
        other => panic!("expected Attach, got {other:?}"),
    }
    assert!(!created.contains("attach-session"));
}
