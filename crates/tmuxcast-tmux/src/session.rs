//! Scripted tmux session: lifecycle, typing, markers and recordings.
//!
//! A session owns one detached tmux session and one control client attached
//! to it. Keystrokes go out over the client's stdin; everything the panes
//! print comes back on its stdout and lands in the timeline. Recordings are
//! exported when the session is closed.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tmuxcast_core::{
    CastMetadata, ExportReport, KeystrokeBatch, MarkerId, RecordTarget, Recording,
    RecordingManager, RecordingScope, Speed, Stroke, Timeline, Timing, random_letters,
};

use crate::channel::ControlChannel;
use crate::control_mode::{ControlCommand, OptionScope};
use crate::error::{SessionError, TmuxError};
use crate::executor::{TmuxCommandRunner, TmuxExecutor};
use crate::keyboard::Keyboard;
use crate::preview::{DEFAULT_PREVIEW_COMMAND, spawn_preview};
use crate::reader::{ControlStreamReader, ReaderStats};

const SESSION_TOKEN_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub width: u16,
    pub height: u16,
    /// Typing rate in characters per second.
    pub cps: f64,
    /// Open a read-only terminal attached to the session.
    pub interactive: bool,
    pub tmux_bin: String,
    /// Private tmux server socket (`tmux -L`).
    pub socket_name: Option<String>,
    pub id_prefix: String,
    /// Terminal launcher for the live preview; the attach command is appended.
    pub preview_command: Vec<String>,
    /// Pause after every typed batch.
    pub settle: Duration,
    /// Pause at the end of `open` so the shell prompt is drawn.
    pub startup_delay: Duration,
    pub metadata: CastMetadata,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: 80,
            height: 25,
            cps: 10.0,
            interactive: false,
            tmux_bin: "tmux".into(),
            socket_name: None,
            id_prefix: "tmuxcast_".into(),
            preview_command: DEFAULT_PREVIEW_COMMAND.iter().map(|s| s.to_string()).collect(),
            settle: Duration::from_millis(100),
            startup_delay: Duration::from_millis(200),
            metadata: CastMetadata::default(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_size(mut self, width: u16, height: u16) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    #[must_use]
    pub fn with_cps(mut self, cps: f64) -> Self {
        self.cps = cps;
        self
    }

    #[must_use]
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    #[must_use]
    pub fn with_tmux_bin(mut self, tmux_bin: impl Into<String>) -> Self {
        self.tmux_bin = tmux_bin.into();
        self
    }

    #[must_use]
    pub fn with_socket_name(mut self, name: impl Into<String>) -> Self {
        self.socket_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_preview_command(mut self, argv: Vec<String>) -> Self {
        self.preview_command = argv;
        self
    }

    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    #[must_use]
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: CastMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    fn executor(&self) -> TmuxExecutor {
        let executor = TmuxExecutor::new(&self.tmux_bin);
        match &self.socket_name {
            Some(name) => executor.with_socket_name(name),
            None => executor,
        }
    }
}

/// Options applied to every new session before anything is typed.
pub fn baseline_commands(session_id: &str, width: u16, height: u16) -> Vec<ControlCommand> {
    let option = |name: &str, value: &str, scope| ControlCommand::SetOption {
        name: name.into(),
        value: value.into(),
        scope,
        target: session_id.into(),
    };
    vec![
        option("destroy-unattached", "off", OptionScope::Session),
        option("window-size", "manual", OptionScope::Window),
        ControlCommand::ResizeWindow {
            target: session_id.into(),
            width,
            height,
        },
        option("aggressive-resize", "on", OptionScope::Window),
        option("allow-rename", "off", OptionScope::Window),
        option("set-titles", "off", OptionScope::Session),
    ]
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Snapshot of a session's state for status output.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub session_id: String,
    pub width: u16,
    pub height: u16,
    pub cps: f64,
    pub delay_ms: f64,
    pub interactive: bool,
    pub timeline_len: usize,
    pub recordings: usize,
}

pub struct Session {
    id: String,
    config: SessionConfig,
    executor: TmuxExecutor,
    keyboard: Keyboard<ChildStdin>,
    recordings: RecordingManager,
    cancel: CancellationToken,
    reader: Option<JoinHandle<ReaderStats>>,
    control_client: Option<Child>,
    preview: Option<Child>,
    closed: bool,
}

impl Session {
    /// Create the tmux session, attach the control client and apply the
    /// baseline options.
    pub async fn open(config: SessionConfig) -> Result<Self, SessionError> {
        let timing = Timing::from_cps(config.cps)?;
        let id = format!("{}{}", config.id_prefix, random_letters(SESSION_TOKEN_LEN));
        let executor = config.executor();
        let (width, height) = (config.width.to_string(), config.height.to_string());

        let new_session: [&str; 8] = ["new-session", "-d", "-s", &id, "-x", &width, "-y", &height];
        run_blocking(executor.clone(), &new_session)
            .await
            .map_err(|source| SessionError::Create {
                session_id: id.clone(),
                source,
            })?;
        tracing::info!(session_id = %id, width = config.width, height = config.height, "tmux session created");

        let mut client = match spawn_control_client(&executor, &id) {
            Ok(child) => child,
            Err(source) => return Err(abort_attach(executor, id, source).await),
        };
        let (Some(stdin), Some(stdout)) = (client.stdin.take(), client.stdout.take()) else {
            return Err(abort_attach(executor, id, TmuxError::ChannelClosed).await);
        };

        let timeline = Timeline::new();
        let cancel = CancellationToken::new();
        let reader = ControlStreamReader::new(timeline.clone(), &id)
            .spawn(BufReader::new(stdout), cancel.clone());

        let keyboard = Keyboard::new(ControlChannel::new(stdin), &id, timing)
            .with_settle(config.settle);
        let recordings =
            RecordingManager::new(timeline, config.width, config.height, config.metadata.clone());

        let mut session = Self {
            id,
            config,
            executor,
            keyboard,
            recordings,
            cancel,
            reader: Some(reader),
            control_client: Some(client),
            preview: None,
            closed: false,
        };

        for command in baseline_commands(&session.id, session.config.width, session.config.height) {
            session.keyboard.channel_mut().send(&command).await?;
        }

        if session.config.interactive {
            match spawn_preview(&session.config.preview_command, &session.executor, &session.id) {
                Ok(child) => session.preview = Some(child),
                Err(e) => {
                    tracing::warn!(session_id = %session.id, error = %e, "live preview unavailable");
                }
            }
        }

        if !session.config.startup_delay.is_zero() {
            tokio::time::sleep(session.config.startup_delay).await;
        }
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn timeline(&self) -> &Timeline {
        self.recordings.timeline()
    }

    pub fn recordings(&self) -> &[Recording] {
        self.recordings.recordings()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            width: self.config.width,
            height: self.config.height,
            cps: self.cps(),
            delay_ms: self.delay_ms(),
            interactive: self.config.interactive,
            timeline_len: self.timeline().len(),
            recordings: self.recordings().len(),
        }
    }

    // -- typing -------------------------------------------------------------

    /// Type `strokes` at the session's pace, scaled by `speed`.
    ///
    /// Returns the number of keystrokes sent.
    pub async fn type_keys(
        &mut self,
        strokes: &[Stroke],
        speed: Option<Speed>,
    ) -> Result<usize, SessionError> {
        let batch = KeystrokeBatch {
            strokes: strokes.to_vec(),
            speed,
        };
        self.type_batch(&batch).await
    }

    pub async fn type_batch(&mut self, batch: &KeystrokeBatch) -> Result<usize, SessionError> {
        Ok(self.keyboard.dispatch(batch).await?)
    }

    pub async fn sleep(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    pub fn cps(&self) -> f64 {
        self.keyboard.timing().cps()
    }

    pub fn cpm(&self) -> f64 {
        self.keyboard.timing().cpm()
    }

    pub fn delay_ms(&self) -> f64 {
        self.keyboard.timing().delay_ms()
    }

    pub fn set_cps(&mut self, cps: f64) -> Result<(), SessionError> {
        Ok(self.keyboard.timing_mut().set_cps(cps)?)
    }

    pub fn set_cpm(&mut self, cpm: f64) -> Result<(), SessionError> {
        Ok(self.keyboard.timing_mut().set_cpm(cpm)?)
    }

    pub fn set_delay_ms(&mut self, delay_ms: f64) -> Result<(), SessionError> {
        Ok(self.keyboard.timing_mut().set_delay_ms(delay_ms)?)
    }

    // -- markers & recordings -----------------------------------------------

    /// Insert a marker at the current end of the timeline; returns its position.
    pub fn mark(&self, id: impl Into<MarkerId>) -> usize {
        self.recordings.mark(id)
    }

    pub fn record(
        &mut self,
        path: impl Into<PathBuf>,
        start: Option<MarkerId>,
        end: Option<MarkerId>,
    ) {
        self.recordings.record(path, start, end);
    }

    /// Record everything from now until the returned scope is dropped.
    pub fn recorder(&mut self, path: impl Into<PathBuf>) -> RecordingScope<'_, Self> {
        RecordingScope::begin(self, path)
    }

    // -- teardown -----------------------------------------------------------

    /// Kill the tmux session, drain the control stream and export every
    /// recording.
    ///
    /// A failed kill is reported as [`SessionError::Destroy`] after the
    /// remaining cleanup and exports have run.
    pub async fn close(mut self) -> Result<ExportReport, SessionError> {
        self.closed = true;
        let destroyed =
            run_blocking(self.executor.clone(), &["kill-session", "-t", &self.id]).await;
        if let Err(ref e) = destroyed {
            tracing::warn!(session_id = %self.id, error = %e, "kill-session failed");
            // The client may still be attached; stop waiting on it.
            self.cancel.cancel();
        }

        if let Err(e) = self.keyboard.channel_mut().close().await {
            tracing::debug!(session_id = %self.id, error = %e, "control stdin already closed");
        }

        if let Some(reader) = self.reader.take() {
            match reader.await {
                Ok(stats) => tracing::info!(
                    session_id = %self.id,
                    lines = stats.lines,
                    outputs = stats.outputs,
                    malformed = stats.malformed,
                    "control stream drained"
                ),
                Err(e) => tracing::warn!(session_id = %self.id, error = %e, "reader task failed"),
            }
        }

        if let Some(mut client) = self.control_client.take() {
            if destroyed.is_err() {
                let _ = client.start_kill();
            }
            match client.wait().await {
                Ok(status) => tracing::debug!(session_id = %self.id, %status, "control client reaped"),
                Err(e) => tracing::warn!(session_id = %self.id, error = %e, "failed to reap control client"),
            }
        }

        if let Some(preview) = self.preview.take() {
            tracing::debug!(session_id = %self.id, pid = ?preview.id(), "live preview left to exit with the session");
        }

        let report = self.recordings.resolve_all();
        tracing::info!(
            session_id = %self.id,
            saved = report.saved.len(),
            failed = report.failed.len(),
            "session closed"
        );

        destroyed.map_err(|source| SessionError::Destroy {
            session_id: self.id.clone(),
            source,
        })?;
        Ok(report)
    }
}

impl RecordTarget for Session {
    fn mark(&mut self, id: MarkerId) {
        self.recordings.mark(id);
    }

    fn register(&mut self, recording: Recording) {
        self.recordings.push(recording);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        tracing::warn!(session_id = %self.id, "session dropped without close, killing it");
        self.cancel.cancel();
        kill_session_best_effort(&self.executor, &self.id);
    }
}

fn spawn_control_client(executor: &TmuxExecutor, session_id: &str) -> Result<Child, TmuxError> {
    let mut cmd = Command::from(executor.command());
    cmd.args(["-C", "attach-session", "-t", session_id])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TmuxError::NotFound
        } else {
            TmuxError::Io(e)
        }
    })
}

/// Run a one-shot tmux command on the blocking pool.
async fn run_blocking<R>(runner: R, args: &[&str]) -> Result<String, TmuxError>
where
    R: TmuxCommandRunner + 'static,
{
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        runner.run(&args)
    })
    .await?
}

/// The session exists but no client could attach: kill it, then report.
async fn abort_attach<R>(runner: R, session_id: String, source: TmuxError) -> SessionError
where
    R: TmuxCommandRunner + 'static,
{
    if let Err(e) = run_blocking(runner, &["kill-session", "-t", &session_id]).await {
        tracing::warn!(session_id = %session_id, error = %e, "best-effort kill-session failed");
    }
    SessionError::Attach { session_id, source }
}

fn kill_session_best_effort(executor: &TmuxExecutor, session_id: &str) {
    if let Err(e) = executor.run(&["kill-session", "-t", session_id]) {
        tracing::warn!(session_id, error = %e, "best-effort kill-session failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = SessionConfig::default();
        assert_eq!((config.width, config.height), (80, 25));
        assert_eq!(config.cps, 10.0);
        assert!(!config.interactive);
        assert_eq!(config.tmux_bin, "tmux");
        assert_eq!(config.id_prefix, "tmuxcast_");
        assert_eq!(config.preview_command, ["xfce4-terminal", "-x"]);
        assert_eq!(config.settle, Duration::from_millis(100));
        assert_eq!(config.startup_delay, Duration::from_millis(200));
    }

    #[test]
    fn builders_chain() {
        let config = SessionConfig::default()
            .with_size(120, 40)
            .with_cps(30.0)
            .interactive(true)
            .with_socket_name("rec");
        assert_eq!((config.width, config.height), (120, 40));
        assert_eq!(config.cps, 30.0);
        assert!(config.interactive);
        assert_eq!(config.executor().socket_name(), Some("rec"));
    }

    #[test]
    fn baseline_pins_size_and_titles() {
        let lines: Vec<String> = baseline_commands("s", 100, 30)
            .iter()
            .map(ControlCommand::to_line)
            .collect();
        assert_eq!(
            lines,
            [
                "set-option -t s destroy-unattached 'off'",
                "set-option -w -t s window-size 'manual'",
                "resize-window -t s -x 100 -y 30",
                "set-option -w -t s aggressive-resize 'on'",
                "set-option -w -t s allow-rename 'off'",
                "set-option -t s set-titles 'off'",
            ]
        );
    }

    #[derive(Clone, Default)]
    struct CallLog(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

    impl TmuxCommandRunner for CallLog {
        fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
            self.0.lock().unwrap().push(args.join(" "));
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn failed_attach_kills_created_session() {
        let calls = CallLog::default();
        let err = abort_attach(calls.clone(), "tmuxcast_abc".into(), TmuxError::NotFound).await;
        match err {
            SessionError::Attach { session_id, source } => {
                assert_eq!(session_id, "tmuxcast_abc");
                assert!(matches!(source, TmuxError::NotFound));
            }
            other => panic!("expected Attach, got {other:?}"),
        }
        assert_eq!(*calls.0.lock().unwrap(), ["kill-session -t tmuxcast_abc"]);
    }

    #[tokio::test]
    async fn invalid_cps_fails_before_tmux_runs() {
        let config = SessionConfig::default()
            .with_cps(0.0)
            .with_tmux_bin("/nonexistent/tmux");
        let err = Session::open(config).await.err().unwrap();
        assert!(matches!(err, SessionError::Timing(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn missing_tmux_is_a_create_error() {
        let config = SessionConfig::default().with_tmux_bin("/nonexistent/tmux");
        let err = Session::open(config).await.err().unwrap();
        match err {
            SessionError::Create { session_id, source } => {
                assert!(session_id.starts_with("tmuxcast_"));
                assert_eq!(session_id.len(), "tmuxcast_".len() + SESSION_TOKEN_LEN);
                assert!(matches!(source, TmuxError::NotFound));
            }
            other => panic!("expected Create, got {other:?}"),
        }
    }
}
