//! tmuxcast-tmux: drives a detached tmux session through a control-mode
//! client and feeds its output into the recording timeline.

pub mod channel;
pub mod control_mode;
pub mod error;
pub mod executor;
pub mod keyboard;
pub mod preview;
pub mod reader;
pub mod session;

pub use channel::ControlChannel;
pub use control_mode::{ControlCommand, ControlEvent, OptionScope, decode_octal_escaped, parse_line};
pub use error::{SessionError, TmuxError};
pub use executor::{TmuxCommandRunner, TmuxExecutor};
pub use keyboard::Keyboard;
pub use reader::{ControlStreamReader, ReaderStats};
pub use session::{Session, SessionConfig, SessionInfo, baseline_commands};
