use std::io::{self, BufRead};

use anyhow::{Context, Result, bail};
use clap::Args;
use shared::models::MessageId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::AppContext;
use crate::{
    api::ChatApi,
    chat_view::{ViewCommand, ViewExit},
    session::SessionAccessor,
};

const INPUT_HELP: &str =
    "commands: /edit <id> <text>, /delete <id>, /members, /logout, /quit; anything else is sent";

/// Arguments of `cli edit`.
#[derive(Args, Debug)]
#[command(about = "Edit one of your messages")]
pub struct EditArgs {
    /// Identifier of the message to edit
    #[arg(long)]
    pub id: i64,

    /// Replacement text
    #[arg(long)]
    pub text: String,
}

/// Arguments of `cli delete`.
#[derive(Args, Debug)]
#[command(about = "Delete one of your messages")]
pub struct DeleteArgs {
    /// Identifier of the message to delete
    #[arg(long)]
    pub id: i64,
}

/// A line typed into the interactive chat.
#[derive(Debug, PartialEq, Eq)]
enum InputLine {
    Command(ViewCommand),
    Quit,
    Blank,
    Invalid(&'static str),
}

fn parse_input(line: &str) -> InputLine {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return InputLine::Blank;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return InputLine::Command(ViewCommand::Send(line.to_owned()));
    };
    let (name, args) = rest.split_once(' ').unwrap_or((rest, ""));
    match name {
        "quit" | "exit" => InputLine::Quit,
        "logout" => InputLine::Command(ViewCommand::Logout),
        "members" => InputLine::Command(ViewCommand::Members),
        "delete" => match args.trim().parse::<MessageId>() {
            Ok(id) => InputLine::Command(ViewCommand::Delete(id)),
            Err(_) => InputLine::Invalid("usage: /delete <id>"),
        },
        "edit" => {
            let args = args.trim_start();
            let (id, text) = args.split_once(' ').unwrap_or((args, ""));
            match id.parse::<MessageId>() {
                Ok(id) => InputLine::Command(ViewCommand::Edit {
                    id,
                    text: text.to_owned(),
                }),
                Err(_) => InputLine::Invalid("usage: /edit <id> <text>"),
            }
        }
        _ => InputLine::Invalid(INPUT_HELP),
    }
}

/// Reads stdin on a dedicated thread; the channel closes on `/quit` or EOF.
fn spawn_input_reader(commands: mpsc::Sender<ViewCommand>) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_input(&line) {
                InputLine::Command(command) => {
                    if commands.blocking_send(command).is_err() {
                        break;
                    }
                }
                InputLine::Quit => break,
                InputLine::Blank => {}
                InputLine::Invalid(usage) => eprintln!("{usage}"),
            }
        }
        debug!("input reader finished");
    });
}

/// Opens the interactive chat on stdin/stdout until `/quit`, EOF, Ctrl+C or
/// logout.
///
/// # Errors
/// Returns an error if the session is incomplete or the view cannot be built.
pub async fn run_chat(ctx: &AppContext) -> Result<()> {
    let identity = ctx.session.require()?;
    let mut view = ctx.view(io::stdout())?;

    let title = identity
        .group_name
        .clone()
        .unwrap_or_else(|| format!("group {}", identity.group_id));
    println!("Chatting in {title} as {} (press Ctrl+C to stop)", identity.username);
    println!("{INPUT_HELP}");

    view.activate().await.context("failed to open the chat view")?;

    let (commands, rx) = mpsc::channel(16);
    spawn_input_reader(commands);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    match view.run(rx, cancel).await {
        ViewExit::Closed => println!("Bye."),
        ViewExit::LoggedOut => println!("Logged out; run `cli session set` to sign in again."),
    }
    Ok(())
}

/// Prints the group's history with the unread divider.
///
/// # Errors
/// Returns an error if the session is incomplete or the view cannot be built.
pub async fn show_history(ctx: &AppContext) -> Result<()> {
    let mut view = ctx.view(io::stdout())?;
    view.load_history().await?;
    if view.timeline().is_empty() {
        println!("No messages yet.");
    }
    Ok(())
}

/// Prints the members of the active group.
///
/// # Errors
/// Returns an error if the session is incomplete or the request fails.
pub async fn show_members(ctx: &AppContext) -> Result<()> {
    let identity = ctx.session.require()?;
    let response = ctx
        .api()?
        .group_members(identity.group_id)
        .await
        .context("failed to fetch group members")?;
    println!("Members of group {}:", response.group_id);
    for member in &response.members {
        println!("- {member}");
    }
    Ok(())
}

/// Edits one of the user's messages.
///
/// # Errors
/// Returns an error for blank text, a message that is not the user's own, or
/// a failed request.
pub async fn edit(ctx: &AppContext, args: &EditArgs) -> Result<()> {
    if args.text.trim().is_empty() {
        bail!("replacement text must not be empty");
    }
    let mut view = ctx.view(io::sink())?;
    view.load_history().await?;
    view.edit(MessageId(args.id), &args.text)
        .await
        .context("edit failed")?;
    println!("Edit of message {} submitted", args.id);
    Ok(())
}

/// Deletes one of the user's messages.
///
/// # Errors
/// Returns an error for a message that is not the user's own or a failed
/// request.
pub async fn delete(ctx: &AppContext, args: &DeleteArgs) -> Result<()> {
    let mut view = ctx.view(io::sink())?;
    view.load_history().await?;
    view.delete(MessageId(args.id))
        .await
        .context("delete failed")?;
    println!("Deletion of message {} submitted", args.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("hello there", InputLine::Command(ViewCommand::Send("hello there".into())) ; "plain text sends")]
    #[test_case("  ", InputLine::Blank ; "blank line")]
    #[test_case("/quit", InputLine::Quit ; "quit")]
    #[test_case("/logout", InputLine::Command(ViewCommand::Logout) ; "logout")]
    #[test_case("/members", InputLine::Command(ViewCommand::Members) ; "members")]
    #[test_case("/delete 12", InputLine::Command(ViewCommand::Delete(MessageId(12))) ; "delete")]
    #[test_case("/delete x", InputLine::Invalid("usage: /delete <id>") ; "delete needs an id")]
    #[test_case("/edit 7 new words here", InputLine::Command(ViewCommand::Edit { id: MessageId(7), text: "new words here".into() }) ; "edit")]
    #[test_case("/edit seven text", InputLine::Invalid("usage: /edit <id> <text>") ; "edit needs an id")]
    #[test_case("/shrug", InputLine::Invalid(INPUT_HELP) ; "unknown command")]
    fn parses_input_lines(line: &str, expected: InputLine) {
        assert_eq!(parse_input(line), expected);
    }

    #[test]
    fn edit_without_text_reaches_the_view_blank() {
        assert_eq!(
            parse_input("/edit 3"),
            InputLine::Command(ViewCommand::Edit {
                id: MessageId(3),
                text: String::new()
            })
        );
    }
}
