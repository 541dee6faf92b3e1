use anyhow::{Context, Result, bail};
use chrono::Duration;
use clap::{Args, Subcommand};
use shared::models::GroupId;

use super::AppContext;
use crate::{
    api::ChatApi,
    session::{SessionAccessor, StoredSession},
};

/// Subcommands of `cli session`.
#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Store the identity issued by the server
    Set(SetArgs),
    /// Print the stored session
    Show,
    /// Ask the server whether the stored session is still valid
    Check,
    /// Remove the stored session
    Clear,
}

/// Arguments of `cli session set`.
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Username the token was issued for
    #[arg(long, short)]
    pub username: String,

    /// Bearer token issued by the server
    #[arg(long, short)]
    pub token: String,

    /// Identifier of the group to chat in
    #[arg(long, short)]
    pub group: i64,

    /// Display name of the group
    #[arg(long)]
    pub group_name: Option<String>,
}

/// Runs one session subcommand.
///
/// # Errors
/// Returns an error if the session file cannot be written or removed, or if
/// the server rejects or cannot check the session.
pub async fn handle(ctx: &AppContext, command: SessionCommand) -> Result<()> {
    match command {
        SessionCommand::Set(args) => set(ctx, args),
        SessionCommand::Show => {
            show(ctx);
            Ok(())
        }
        SessionCommand::Check => check(ctx).await,
        SessionCommand::Clear => clear(ctx),
    }
}

fn set(ctx: &AppContext, args: SetArgs) -> Result<()> {
    if args.username.trim().is_empty() || args.token.trim().is_empty() {
        bail!("username and token must not be empty");
    }
    let ttl = Duration::hours(i64::from(ctx.config.session.ttl_hours));
    let session = StoredSession::new(args.username.trim(), args.token.trim(), ttl)
        .with_group(GroupId(args.group), args.group_name);
    let expires_at = session.expires_at;
    ctx.session
        .set_session(session)
        .with_context(|| format!("failed to write session file {}", ctx.session.path().display()))?;
    println!("Session saved to {}", ctx.session.path().display());
    println!("expires at: {expires_at}");
    Ok(())
}

fn show(ctx: &AppContext) {
    let Some(session) = ctx.session.snapshot() else {
        println!("No active session at {}", ctx.session.path().display());
        return;
    };
    println!("user: {}", session.username);
    match (session.group_id, session.group_name.as_deref()) {
        (Some(id), Some(name)) => println!("group: {id} ({name})"),
        (Some(id), None) => println!("group: {id}"),
        (None, _) => println!("group: (none)"),
    }
    println!("expires at: {}", session.expires_at);
}

async fn check(ctx: &AppContext) -> Result<()> {
    if ctx.session.current_token().is_none() {
        bail!("no active session; run `cli session set` first");
    }
    let api = ctx.api()?;
    let valid = api
        .check_session()
        .await
        .context("failed to reach the server")?;
    if valid {
        println!("Session is valid");
        return Ok(());
    }
    ctx.session
        .clear_session()
        .context("failed to remove rejected session")?;
    bail!("session rejected by the server and cleared; sign in again")
}

fn clear(ctx: &AppContext) -> Result<()> {
    ctx.session
        .clear_session()
        .with_context(|| format!("failed to remove session file {}", ctx.session.path().display()))?;
    println!("Removed session at {}", ctx.session.path().display());
    Ok(())
}
