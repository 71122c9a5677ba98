//! TmuxCommandRunner trait and TmuxExecutor (sync subprocess wrapper).
//!
//! One-shot lifecycle commands (`new-session`, `kill-session`) go through
//! here so their exit status can be asserted. The long-lived control client
//! is built from the same base command via [`TmuxExecutor::command`].

use std::process::{Command, Output};

use crate::error::TmuxError;

/// Trait for executing tmux commands. Enables mock injection for testing.
pub trait TmuxCommandRunner: Send + Sync {
    fn run(&self, args: &[&str]) -> Result<String, TmuxError>;
}

impl<T: TmuxCommandRunner + ?Sized> TmuxCommandRunner for &T {
    fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        (**self).run(args)
    }
}

/// Real tmux executor using `std::process::Command`.
#[derive(Debug, Clone)]
pub struct TmuxExecutor {
    tmux_bin: String,
    socket_name: Option<String>,
}

impl TmuxExecutor {
    pub fn new(tmux_bin: impl Into<String>) -> Self {
        Self {
            tmux_bin: tmux_bin.into(),
            socket_name: None,
        }
    }

    /// Run against a private server (`tmux -L <name>`).
    #[must_use]
    pub fn with_socket_name(mut self, name: impl Into<String>) -> Self {
        self.socket_name = Some(name.into());
        self
    }

    pub fn tmux_bin(&self) -> &str {
        &self.tmux_bin
    }

    pub fn socket_name(&self) -> Option<&str> {
        self.socket_name.as_deref()
    }

    /// Base command with socket selection applied and no subcommand yet.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.tmux_bin);
        if let Some(ref name) = self.socket_name {
            cmd.args(["-L", name]);
        }
        cmd
    }

    fn run_raw(&self, args: &[&str]) -> Result<Output, TmuxError> {
        self.command().args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TmuxError::NotFound
            } else {
                TmuxError::Io(e)
            }
        })
    }
}

impl Default for TmuxExecutor {
    fn default() -> Self {
        Self::new("tmux")
    }
}

impl TmuxCommandRunner for TmuxExecutor {
    fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        let output = self.run_raw(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TmuxError::CommandFailed(format!(
                "exit {}: {}",
                output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".into()),
                stderr.trim(),
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_executor() {
        let exec = TmuxExecutor::default();
        assert_eq!(exec.tmux_bin(), "tmux");
        assert!(exec.socket_name.is_none());
    }

    #[test]
    fn socket_name_prefixes_args() {
        let exec = TmuxExecutor::default().with_socket_name("demo");
        let cmd = exec.command();
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, ["-L", "demo"]);
    }

    #[test]
    fn not_found_binary() {
        let exec = TmuxExecutor::new("/nonexistent/tmux-binary");
        let err = exec.run(&["list-sessions"]).unwrap_err();
        assert!(
            matches!(err, TmuxError::NotFound),
            "expected NotFound, got: {err:?}"
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_command_failed() {
        let exec = TmuxExecutor::new("false");
        let err = exec.run(&["kill-session"]).unwrap_err();
        assert!(matches!(err, TmuxError::CommandFailed(_)), "got: {err:?}");
    }

    #[test]
    fn blanket_ref_impl() {
        struct Mock;
        impl TmuxCommandRunner for Mock {
            fn run(&self, _args: &[&str]) -> Result<String, TmuxError> {
                Ok("ok".to_string())
            }
        }
        let mock = Mock;
        let r: &Mock = &mock;
        assert_eq!(r.run(&[]).expect("ok"), "ok");
    }
}
