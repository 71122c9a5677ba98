//! Paced keystroke dispatch over the control channel.

use std::time::Duration;

use tokio::io::AsyncWrite;
use tmuxcast_core::{KeystrokeBatch, Timing};

use crate::channel::ControlChannel;
use crate::control_mode::ControlCommand;
use crate::error::TmuxError;

pub struct Keyboard<W> {
    channel: ControlChannel<W>,
    target: String,
    timing: Timing,
    settle: Duration,
}

impl<W: AsyncWrite + Unpin> Keyboard<W> {
    pub fn new(channel: ControlChannel<W>, target: impl Into<String>, timing: Timing) -> Self {
        Self {
            channel,
            target: target.into(),
            timing,
            settle: Duration::ZERO,
        }
    }

    /// Pause after each batch so the pane can render before the next action.
    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn timing_mut(&mut self) -> &mut Timing {
        &mut self.timing
    }

    pub fn channel_mut(&mut self) -> &mut ControlChannel<W> {
        &mut self.channel
    }

    pub fn into_channel(self) -> ControlChannel<W> {
        self.channel
    }

    /// Send every keystroke of `batch`, pacing between consecutive ones.
    ///
    /// Returns the number of keystrokes sent.
    pub async fn dispatch(&mut self, batch: &KeystrokeBatch) -> Result<usize, TmuxError> {
        let keystrokes = batch.keystrokes();
        let delay = self.timing.effective_delay(batch.speed);
        tracing::debug!(
            target_session = %self.target,
            keystrokes = keystrokes.len(),
            delay_ms = delay.as_secs_f64() * 1000.0,
            "typing"
        );

        for (i, keystroke) in keystrokes.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.channel
                .send(&ControlCommand::send_keystroke(&self.target, keystroke))
                .await?;
        }

        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
        Ok(keystrokes.len())
    }
}
