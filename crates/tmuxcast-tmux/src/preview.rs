//! Live preview: a terminal window attached read-only to the session.

use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::error::TmuxError;
use crate::executor::TmuxExecutor;

/// Default terminal launcher; the attach command is appended to it.
pub const DEFAULT_PREVIEW_COMMAND: &[&str] = &["xfce4-terminal", "-x"];

/// Full argv for the preview window.
pub fn preview_argv(terminal: &[String], executor: &TmuxExecutor, session_id: &str) -> Vec<String> {
    let mut argv: Vec<String> = terminal.to_vec();
    argv.push(executor.tmux_bin().to_string());
    if let Some(name) = executor.socket_name() {
        argv.push("-L".into());
        argv.push(name.to_string());
    }
    argv.extend(["attach-session", "-r", "-t", session_id].map(String::from));
    argv
}

/// Spawn the preview window. The viewer closes by itself when the session dies.
pub fn spawn_preview(
    terminal: &[String],
    executor: &TmuxExecutor,
    session_id: &str,
) -> Result<Child, TmuxError> {
    let argv = preview_argv(terminal, executor, session_id);
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| TmuxError::CommandFailed("empty preview command".into()))?;

    tracing::info!(session_id, command = %argv.join(" "), "opening live preview");
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TmuxError::NotFound
            } else {
                TmuxError::Io(e)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_terminal() -> Vec<String> {
        DEFAULT_PREVIEW_COMMAND.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn argv_appends_read_only_attach() {
        let argv = preview_argv(&default_terminal(), &TmuxExecutor::default(), "tmuxcast_abc");
        assert_eq!(
            argv,
            ["xfce4-terminal", "-x", "tmux", "attach-session", "-r", "-t", "tmuxcast_abc"]
        );
    }

    #[test]
    fn argv_carries_socket_name() {
        let exec = TmuxExecutor::new("/opt/tmux").with_socket_name("rec");
        let argv = preview_argv(&["kitty".to_string()], &exec, "s");
        assert_eq!(
            argv,
            ["kitty", "/opt/tmux", "-L", "rec", "attach-session", "-r", "-t", "s"]
        );
    }

    #[tokio::test]
    async fn missing_terminal_is_an_error() {
        let err = spawn_preview(
            &["/nonexistent/terminal".to_string()],
            &TmuxExecutor::default(),
            "s",
        )
        .unwrap_err();
        assert!(matches!(err, TmuxError::NotFound), "got: {err:?}");
    }
}
