//! `tmuxcast record`: type lines into a fresh session and export captures.

use std::time::Duration;

use anyhow::Context;
use tmuxcast_core::{CastMetadata, ExportReport, Key, Stroke};
use tmuxcast_tmux::{Session, SessionConfig};

use crate::cli::RecordOpts;

pub fn session_config(opts: &RecordOpts) -> SessionConfig {
    let mut metadata = CastMetadata::default();
    if let Some(ref title) = opts.title {
        metadata.title = title.clone();
    }
    let config = SessionConfig::default()
        .with_size(opts.width, opts.height)
        .with_cps(opts.cps)
        .interactive(opts.interactive)
        .with_tmux_bin(&opts.tmux_bin)
        .with_metadata(metadata);
    match opts.socket_name {
        Some(ref name) => config.with_socket_name(name),
        None => config,
    }
}

pub async fn cmd_record(opts: RecordOpts) -> anyhow::Result<ExportReport> {
    let mut session = Session::open(session_config(&opts))
        .await
        .context("failed to open recording session")?;
    tracing::info!(session_id = %session.id(), lines = opts.lines.len(), "recording");

    if let Some(ref full) = opts.full {
        session.record(full, None, None);
    }

    let typed = type_lines(&mut session, &opts).await;
    let report = session.close().await.context("failed to close recording session")?;
    typed?;
    Ok(report)
}

async fn type_lines(session: &mut Session, opts: &RecordOpts) -> anyhow::Result<()> {
    let mut scope = session.recorder(&opts.output);
    for line in &opts.lines {
        scope
            .type_keys(&[Stroke::from(line.as_str()), Stroke::from(Key::ENTER)], None)
            .await
            .with_context(|| format!("failed to type {line:?}"))?;
        tokio::time::sleep(Duration::from_millis(opts.pause_ms)).await;
    }
    Ok(())
}

pub fn print_report(report: &ExportReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for saved in &report.saved {
        println!("{}  {} events", saved.path.display(), saved.events);
    }
    for failed in &report.failed {
        eprintln!("{}  FAILED: {}", failed.path.display(), failed.error);
    }
    Ok(())
}
