//! tmuxcast: record scripted tmux sessions as asciicast v2 files.

use clap::Parser;

mod cli;
mod cmd_record;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("TMUXCAST_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        cli::Command::Record(opts) => {
            let json = opts.json;
            let report = cmd_record::cmd_record(opts).await?;
            cmd_record::print_report(&report, json)?;
            if !report.is_complete() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
