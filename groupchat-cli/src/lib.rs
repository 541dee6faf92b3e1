//! Command-line client for the group chat server: session handling, history,
//! and the live chat view.
#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(warnings, clippy::pedantic)]
#![allow(clippy::multiple_crate_versions)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use shared::config::ClientConfig;

pub mod api;
pub mod chat_view;
pub mod commands;
pub mod error;
pub mod history;
pub mod live;
pub mod render;
pub mod session;
#[cfg(test)]
mod test_support;
pub mod tracer;

use commands::{
    AppContext,
    chat::{DeleteArgs, EditArgs},
    session::SessionCommand,
};

/// Group chat CLI
#[derive(Parser, Debug)]
#[command(name = "Groupchat CLI")]
#[command(about = "Command-line client for group chat", long_about = None)]
pub struct Cli {
    /// Path to the configuration file (e.g., config.yaml or config.json)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the Groupchat CLI
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the stored session
    #[command(subcommand)]
    Session(SessionCommand),

    /// Open the live chat for the active group
    Chat,

    /// Print the group's history with the unread divider
    History,

    /// List the members of the active group
    Members,

    /// Edit one of your messages
    Edit(EditArgs),

    /// Delete one of your messages
    Delete(DeleteArgs),

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell to generate the completion script for
        #[arg(long, short, value_enum)]
        shell: Shell,
    },

    /// Generate a configuration file
    Config {
        /// Format of the configuration file to generate (yaml or json)
        #[arg(long, short, default_value = "yaml")]
        format: String,
    },
}

/// Dispatches a parsed command line.
///
/// # Errors
/// Returns the failure of the selected command with user-facing context.
pub async fn run(cli: Cli) -> Result<()> {
    let command = match cli.command {
        Commands::Completion { shell } => {
            commands::completion::generate_completion(shell);
            return Ok(());
        }
        Commands::Config { format } => {
            let cwd = std::env::current_dir().context("failed to resolve working directory")?;
            return commands::config::generate_config(&format, &cwd);
        }
        other => other,
    };

    let config = ClientConfig::load_config(cli.config.as_deref())
        .context("failed to load configuration")?;
    let level = tracer::initialize_tracing(&config);
    tracing::debug!(%level, "logging initialized");
    let ctx = AppContext::new(config);

    match command {
        Commands::Session(command) => commands::session::handle(&ctx, command).await,
        Commands::Chat => commands::chat::run_chat(&ctx).await,
        Commands::History => commands::chat::show_history(&ctx).await,
        Commands::Members => commands::chat::show_members(&ctx).await,
        Commands::Edit(args) => commands::chat::edit(&ctx, &args).await,
        Commands::Delete(args) => commands::chat::delete(&ctx, &args).await,
        Commands::Completion { .. } | Commands::Config { .. } => Ok(()),
    }
}
