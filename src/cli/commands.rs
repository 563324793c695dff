//! Command handlers.

use crate::cli::{Cli, Command};
use crate::config::{ConfigLoader, Settings};
use crate::rotation::{clamp_cooldown_minutes, KeyRotationManager, SlotStatus};
use crate::{build_manager, build_relay};
use anyhow::Context;
use std::time::Duration;

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::from_path(path),
        None => ConfigLoader::new(),
    }
    .context("failed to load configuration")?;

    if let Some(source) = loader.source() {
        tracing::debug!(path = %source.display(), "Using configuration file");
    }
    Ok(loader.into_settings())
}

/// Run the parsed command; returns the process exit code
pub async fn run(cli: Cli) -> anyhow::Result<i32> {
    let settings = load_settings(&cli)?;

    match cli.command {
        Command::Status { json } => {
            let manager = build_manager(&settings, env_lookup);
            print_status(&manager, json)?;
        }
        Command::Mark { index, minutes } => {
            let manager = build_manager(&settings, env_lookup);
            ensure_index(&manager, index)?;
            manager.mark_key_limited(index, cooldown_override(minutes));
            print_status(&manager, false)?;
        }
        Command::Clear { index } => {
            let manager = build_manager(&settings, env_lookup);
            ensure_index(&manager, index)?;
            manager.clear_cooldown(index);
            print_status(&manager, false)?;
        }
        Command::Ask { prompt } => {
            let relay = build_relay(&settings, env_lookup)?;
            match relay.ask(&prompt.join(" ")).await {
                Ok(answer) => println!("{}", answer),
                Err(e) if e.is_unavailable() => {
                    tracing::warn!(error = %e, "Chat relay unavailable");
                    eprintln!("{}", e.user_message());
                    return Ok(2);
                }
                Err(e) => return Err(e).context("chat request failed"),
            }
        }
    }

    Ok(0)
}

/// Minute overrides follow the same 1..=1440 bound as the configured default
fn cooldown_override(minutes: Option<u64>) -> Option<Duration> {
    minutes.map(clamp_cooldown_minutes)
}

fn ensure_index(manager: &KeyRotationManager, index: usize) -> anyhow::Result<()> {
    anyhow::ensure!(
        index < manager.len(),
        "key index {} out of range ({} keys configured)",
        index,
        manager.len()
    );
    Ok(())
}

fn print_status(manager: &KeyRotationManager, json: bool) -> anyhow::Result<()> {
    let snapshot = manager.snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if snapshot.is_empty() {
        println!("No API keys configured.");
        return Ok(());
    }

    for status in &snapshot {
        println!("{}", format_status(status));
    }
    Ok(())
}

fn format_status(status: &SlotStatus) -> String {
    let state = match (status.is_limited, status.cooldown_until) {
        (true, Some(until)) => format!("limited until {}", until.format("%Y-%m-%d %H:%M:%S UTC")),
        _ => "available".to_string(),
    };
    format!("[{}] {:<28} {}", status.index, status.identifier, state)
}
