//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tmuxcast", about = "Record scripted tmux sessions as asciicast files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Type each LINE into a fresh tmux session and record it
    Record(RecordOpts),
}

#[derive(clap::Args)]
pub struct RecordOpts {
    /// Capture file for the typed lines
    #[arg(long, short = 'o')]
    pub output: PathBuf,

    /// Also capture the whole session, startup included
    #[arg(long)]
    pub full: Option<PathBuf>,

    #[arg(long, env = "TMUXCAST_WIDTH", default_value = "80")]
    pub width: u16,

    #[arg(long, env = "TMUXCAST_HEIGHT", default_value = "25")]
    pub height: u16,

    /// Typing rate in characters per second
    #[arg(long, env = "TMUXCAST_CPS", default_value = "10")]
    pub cps: f64,

    /// Open a read-only terminal attached to the session
    #[arg(long)]
    pub interactive: bool,

    /// Pause after each line, in milliseconds
    #[arg(long, default_value = "1000")]
    pub pause_ms: u64,

    #[arg(long, env = "TMUXCAST_TMUX_BIN", default_value = "tmux")]
    pub tmux_bin: String,

    /// Use a private tmux server (`tmux -L <name>`)
    #[arg(long)]
    pub socket_name: Option<String>,

    /// Capture title written into the header
    #[arg(long)]
    pub title: Option<String>,

    /// Print the export report as JSON
    #[arg(long)]
    pub json: bool,

    /// Lines to type; each is followed by Enter
    #[arg(required = true)]
    pub lines: Vec<String>,
}
