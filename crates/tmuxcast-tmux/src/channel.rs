//! Write side of the control client: one command per line on its stdin.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::control_mode::ControlCommand;
use crate::error::TmuxError;

pub struct ControlChannel<W> {
    writer: Option<W>,
    sent: usize,
}

impl<W: AsyncWrite + Unpin> ControlChannel<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
            sent: 0,
        }
    }

    pub async fn send(&mut self, command: &ControlCommand) -> Result<(), TmuxError> {
        let writer = self.writer.as_mut().ok_or(TmuxError::ChannelClosed)?;
        let mut line = command.to_line();
        tracing::trace!(command = %line, "control command");
        line.push('\n');
        writer.write_all(line.as_bytes()).await.map_err(closed_or_io)?;
        writer.flush().await.map_err(closed_or_io)?;
        self.sent += 1;
        Ok(())
    }

    pub fn commands_sent(&self) -> usize {
        self.sent
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    /// Flush and drop the writer so the control client sees EOF.
    pub async fn close(&mut self) -> Result<(), TmuxError> {
        match self.writer.take() {
            Some(mut writer) => writer.shutdown().await.map_err(closed_or_io),
            None => Ok(()),
        }
    }

    /// The writer, unless the channel was closed.
    pub fn into_inner(self) -> Option<W> {
        self.writer
    }
}

fn closed_or_io(e: std::io::Error) -> TmuxError {
    if e.kind() == std::io::ErrorKind::BrokenPipe {
        TmuxError::ChannelClosed
    } else {
        TmuxError::Io(e)
    }
}
