//! Render sink contract and the terminal implementation.

use std::{fmt, io::Write, time::Duration};

use shared::{
    models::{Message, MessageId, MessageState, Side},
    timeline::{Timeline, TimelineDiff},
};
use tracing::debug;

/// User-visible notices that are not timeline content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The live connection is up.
    Connected,
    /// Connectivity was lost; a reconnect follows after `retry_in`.
    ConnectionLost { retry_in: Duration },
    /// The session was cleared.
    LoggedOut,
    /// A user action failed.
    Error(String),
}

/// Reflects timeline mutations. Sinks only read diffs and never mutate the
/// timeline; they own whatever id-to-view mapping they need.
pub trait RenderSink {
    /// Renders one diff; `timeline` is the state after the ingestion.
    fn apply(&mut self, diff: &TimelineDiff, timeline: &Timeline);

    /// Called right before the message the unread divider precedes.
    fn unread_divider(&mut self, before: MessageId);

    fn notify(&mut self, notice: &Notice);

    /// Current group members; empty when they could not be fetched.
    fn members(&mut self, members: &[String]);

    /// A send went out; the input buffer can be cleared.
    fn input_cleared(&mut self);
}

/// Line-oriented sink for a terminal.
pub struct TerminalSink<W: Write> {
    out: W,
    current_user: String,
}

impl<W: Write> fmt::Debug for TerminalSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalSink")
            .field("current_user", &self.current_user)
            .finish_non_exhaustive()
    }
}

impl<W: Write> TerminalSink<W> {
    /// Sink writing to `out`, marking messages sent by `current_user` as own.
    #[must_use]
    pub fn new(out: W, current_user: impl Into<String>) -> Self {
        Self {
            out,
            current_user: current_user.into(),
        }
    }

    /// Gives back the writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if let Err(err) = self.out.write_fmt(args).and_then(|()| self.out.write_all(b"\n")) {
            debug!(error = %err, "terminal write failed");
        }
    }

    fn author(&self, message: &Message) -> String {
        match message.side(&self.current_user) {
            Side::Own => format!("{} (you)", message.sender_id),
            Side::Other => message.sender_id.clone(),
        }
    }
}

impl<W: Write> RenderSink for TerminalSink<W> {
    fn apply(&mut self, diff: &TimelineDiff, timeline: &Timeline) {
        match diff {
            TimelineDiff::Created { message, .. } => {
                let author = self.author(message);
                let time = message.created_at.0.format("%H:%M");
                self.line(format_args!(
                    "[{time}] #{id} <{author}> {text}",
                    id = message.id,
                    text = message.text
                ));
            }
            TimelineDiff::TextChanged { id, text } => {
                let Some(message) = timeline.get(*id) else {
                    return;
                };
                if message.state == MessageState::Deleted {
                    return;
                }
                let author = self.author(message);
                self.line(format_args!("#{id} <{author}> edited: {text}"));
            }
            TimelineDiff::StateChanged { id, state } => {
                if *state != MessageState::Deleted {
                    return;
                }
                let author = timeline
                    .get(*id)
                    .map_or_else(|| "?".to_owned(), |message| self.author(message));
                self.line(format_args!("#{id} <{author}> message deleted"));
            }
        }
    }

    fn unread_divider(&mut self, _before: MessageId) {
        self.line(format_args!("---------------- unread ----------------"));
    }

    fn notify(&mut self, notice: &Notice) {
        match notice {
            Notice::Connected => self.line(format_args!("-- connected --")),
            Notice::ConnectionLost { retry_in } => self.line(format_args!(
                "!! connection lost, reconnecting in {}s",
                retry_in.as_secs()
            )),
            Notice::LoggedOut => self.line(format_args!("!! session is no longer valid, logged out")),
            Notice::Error(message) => self.line(format_args!("!! {message}")),
        }
    }

    fn members(&mut self, members: &[String]) {
        if members.is_empty() {
            self.line(format_args!("members: (unavailable)"));
        } else {
            self.line(format_args!("members: {}", members.join(" | ")));
        }
    }

    fn input_cleared(&mut self) {
        if let Err(err) = self.out.flush() {
            debug!(error = %err, "terminal flush failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use shared::models::{Message, Timestamp};

    use super::*;

    fn render(diffs: &[TimelineDiff], timeline: &Timeline) -> String {
        let mut sink = TerminalSink::new(Vec::new(), "alice");
        for diff in diffs {
            sink.apply(diff, timeline);
        }
        String::from_utf8(sink.into_inner()).unwrap()
    }

    fn message(id: i64, sender: &str, text: &str) -> Message {
        Message::new(
            MessageId(id),
            sender,
            text,
            Timestamp::parse("2024-03-01 09:05:00").unwrap(),
        )
    }

    #[test]
    fn marks_own_messages() {
        let mut timeline = Timeline::new();
        let diffs = timeline.ingest_history([message(1, "alice", "hi"), message(2, "bob", "yo")]);

        let output = render(&diffs, &timeline);
        assert_eq!(
            output,
            "[09:05] #1 <alice (you)> hi\n[09:05] #2 <bob> yo\n"
        );
    }

    #[test]
    fn edit_prints_once_and_delete_prints_tombstone() {
        let mut timeline = Timeline::new();
        timeline.ingest_history([message(1, "bob", "hi")]);

        let edit = timeline.ingest_edit(MessageId(1), "hi!").unwrap();
        assert_eq!(render(&edit, &timeline), "#1 <bob> edited: hi!\n");

        let delete = timeline.ingest_delete(MessageId(1)).unwrap();
        assert_eq!(render(&delete, &timeline), "#1 <bob> message deleted\n");
    }

    #[test]
    fn notices_and_members() {
        let mut sink = TerminalSink::new(Vec::new(), "alice");
        sink.unread_divider(MessageId(1));
        sink.notify(&Notice::ConnectionLost {
            retry_in: Duration::from_secs(6),
        });
        sink.members(&["alice".to_owned(), "bob".to_owned()]);
        sink.members(&[]);

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert!(lines[0].contains("unread"));
        assert_eq!(lines[1], "!! connection lost, reconnecting in 6s");
        assert_eq!(lines[2], "members: alice | bob");
        assert_eq!(lines[3], "members: (unavailable)");
    }
}
