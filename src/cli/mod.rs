//! CLI module for keyrotate
//!
//! Subcommands:
//! - `status`: show every key and its cooldown
//! - `mark`: put a key into cooldown by hand
//! - `clear`: lift a key's cooldown
//! - `ask`: send a prompt through the chat relay

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// keyrotate - LLM API key rotation with rate-limit cooldowns
#[derive(Debug, Parser)]
#[command(name = "keyrotate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to KEYROTATE_CONFIG, ./keyrotate.json, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show every configured key and its cooldown
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Mark a key as rate limited
    Mark {
        /// Key index as shown by `status`
        index: usize,

        /// Cooldown in minutes (configured default when omitted)
        #[arg(long)]
        minutes: Option<u64>,
    },

    /// Clear a key's cooldown
    Clear {
        /// Key index as shown by `status`
        index: usize,
    },

    /// Send a prompt through the chat relay
    Ask {
        /// Prompt text; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
}
