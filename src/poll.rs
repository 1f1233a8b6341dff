use crate::store::Store;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serenity::all::{ChannelId, MessageId, UserId};
use std::collections::HashMap;

pub const POLLS_DOCUMENT: &str = "polls";
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;

/// Reaction markers, one per option, in option order.
pub const MARKERS: [&str; MAX_OPTIONS] = [
    "1\u{FE0F}\u{20E3}",
    "2\u{FE0F}\u{20E3}",
    "3\u{FE0F}\u{20E3}",
    "4\u{FE0F}\u{20E3}",
    "5\u{FE0F}\u{20E3}",
    "6\u{FE0F}\u{20E3}",
    "7\u{FE0F}\u{20E3}",
    "8\u{FE0F}\u{20E3}",
    "9\u{FE0F}\u{20E3}",
    "\u{1F51F}",
];

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PollOption {
    pub marker: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Poll {
    pub question: String,
    pub options: Vec<PollOption>,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub created: DateTime<Utc>,
}

pub type Polls = HashMap<MessageId, Poll>;

#[derive(Debug, PartialEq)]
pub enum PollError {
    MissingQuestion,
    TooFewOptions(usize),
    TooManyOptions(usize),
}

impl std::fmt::Display for PollError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PollError::MissingQuestion => write!(f, "A poll needs a question"),
            PollError::TooFewOptions(n) => write!(
                f,
                "A poll needs at least {} options, got {}",
                MIN_OPTIONS, n
            ),
            PollError::TooManyOptions(n) => write!(
                f,
                "A poll can have at most {} options, got {}",
                MAX_OPTIONS, n
            ),
        }
    }
}

impl std::error::Error for PollError {}

impl Poll {
    pub fn new(
        question: &str,
        options: &[&str],
        channel_id: ChannelId,
        author_id: UserId,
        created: DateTime<Utc>,
    ) -> Result<Self, PollError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PollError::MissingQuestion);
        }
        if options.len() < MIN_OPTIONS {
            return Err(PollError::TooFewOptions(options.len()));
        }
        if options.len() > MAX_OPTIONS {
            return Err(PollError::TooManyOptions(options.len()));
        }

        let options = options
            .iter()
            .zip(MARKERS)
            .map(|(text, marker)| PollOption {
                marker: marker.to_string(),
                text: text.trim().to_string(),
            })
            .collect();

        Ok(Self {
            question: question.to_string(),
            options,
            channel_id,
            author_id,
            created,
        })
    }

    /// Parse `question | option | option ...`.  Empty segments are skipped.
    pub fn parse(
        args: &str,
        channel_id: ChannelId,
        author_id: UserId,
        created: DateTime<Utc>,
    ) -> Result<Self, PollError> {
        let mut parts = args.split('|').map(str::trim);
        let question = parts.next().unwrap_or_default();
        let options: Vec<&str> = parts.filter(|s| !s.is_empty()).collect();
        Self::new(question, &options, channel_id, author_id, created)
    }

    /// Embed body: one line per option, prefixed by its marker.
    pub fn description(&self) -> String {
        self.options
            .iter()
            .map(|o| format!("{} {}", o.marker, o.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Remember a poll under the id of the message it was posted as.
pub async fn record(store: &Store, message_id: MessageId, poll: Poll) -> Result<()> {
    store
        .update(POLLS_DOCUMENT, |polls: &mut Polls| {
            polls.insert(message_id, poll);
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn poll_with(options: &[&str]) -> Result<Poll, PollError> {
        Poll::new(
            "Lunch?",
            options,
            ChannelId::new(1),
            UserId::new(2),
            Utc::now(),
        )
    }

    #[test]
    fn option_count_limits() {
        assert_eq!(poll_with(&["pizza"]), Err(PollError::TooFewOptions(1)));

        let eleven: Vec<String> = (1..=11).map(|n| format!("option {n}")).collect();
        let eleven: Vec<&str> = eleven.iter().map(String::as_str).collect();
        assert_eq!(poll_with(&eleven), Err(PollError::TooManyOptions(11)));

        for n in MIN_OPTIONS..=MAX_OPTIONS {
            let texts: Vec<String> = (1..=n).map(|i| format!("option {i}")).collect();
            let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
            let poll = poll_with(&texts).unwrap();
            let stored: Vec<&str> = poll.options.iter().map(|o| o.text.as_str()).collect();
            assert_eq!(stored, texts);
        }
    }

    #[test]
    fn markers_follow_option_order() {
        let poll = poll_with(&["pizza", "sushi", "tacos"]).unwrap();
        let markers: Vec<&str> = poll.options.iter().map(|o| o.marker.as_str()).collect();
        assert_eq!(markers, MARKERS[..3].to_vec());
        assert_eq!(
            poll.description(),
            format!("{} pizza\n{} sushi\n{} tacos", MARKERS[0], MARKERS[1], MARKERS[2])
        );
    }

    #[test]
    fn parses_pipe_separated_arguments() {
        let poll = Poll::parse(
            " Best editor? | vim |  emacs | | nano ",
            ChannelId::new(1),
            UserId::new(2),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(poll.question, "Best editor?");
        let texts: Vec<&str> = poll.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["vim", "emacs", "nano"]);

        assert_eq!(
            Poll::parse("| a | b", ChannelId::new(1), UserId::new(2), Utc::now()),
            Err(PollError::MissingQuestion)
        );
        assert_eq!(
            Poll::parse("Question only", ChannelId::new(1), UserId::new(2), Utc::now()),
            Err(PollError::TooFewOptions(0))
        );
    }

    #[tokio::test]
    async fn polls_are_kept_by_message_id() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());

        let first = poll_with(&["a", "b"]).unwrap();
        let second = poll_with(&["c", "d", "e"]).unwrap();
        record(&store, MessageId::new(100), first.clone())
            .await
            .unwrap();
        record(&store, MessageId::new(200), second.clone())
            .await
            .unwrap();

        let polls: Polls = store.load(POLLS_DOCUMENT).await;
        assert_eq!(polls.len(), 2);
        assert_eq!(polls[&MessageId::new(100)], first);
        assert_eq!(polls[&MessageId::new(200)], second);
    }
}
