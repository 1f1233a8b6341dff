//! Reminders and the background sweeper that delivers them
//!
//! Delivery is at-most-once: due reminders are removed from the store before they are sent, and a
//! reminder that cannot be delivered is dropped rather than retried.

use crate::{log_internal, store::Store};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serenity::all::{ChannelId, CreateAllowedMentions, CreateMessage, Http, Mentionable, UserId};
use std::{sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub const REMINDERS_DOCUMENT: &str = "reminders";

/// Discord's message length limit, in characters.
const MESSAGE_LIMIT: usize = 2000;
/// Room taken by `<@{id}> Reminder: ` with the longest possible user id.
const DELIVERY_PREFIX_LEN: usize = "<@> Reminder: ".len() + 20;
pub const MAX_TEXT_LEN: usize = MESSAGE_LIMIT - DELIVERY_PREFIX_LEN;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Reminder {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub text: String,
    pub due: DateTime<Utc>,
}

#[derive(Debug, PartialEq)]
pub enum ReminderError {
    NotInFuture,
    EmptyText,
    TooLong,
}

impl std::fmt::Display for ReminderError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ReminderError::NotInFuture => {
                write!(f, "Reminders must be set for a time in the future")
            }
            ReminderError::EmptyText => write!(f, "What should I remind you about?"),
            ReminderError::TooLong => write!(
                f,
                "Reminders can be at most {} characters long",
                MAX_TEXT_LEN
            ),
        }
    }
}

impl std::error::Error for ReminderError {}

#[derive(Debug, PartialEq)]
pub enum DurationError {
    Empty,
    MissingUnit,
    UnknownUnit(char),
    TooLong,
}

impl std::fmt::Display for DurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DurationError::Empty => write!(f, "Missing duration, e.g. `10m` or `1h30m`"),
            DurationError::MissingUnit => {
                write!(f, "Every number needs a unit: `s`, `m`, `h` or `d`")
            }
            DurationError::UnknownUnit(unit) => {
                write!(f, "Unknown unit `{}`, use `s`, `m`, `h` or `d`", unit)
            }
            DurationError::TooLong => write!(f, "That's too far in the future"),
        }
    }
}

impl std::error::Error for DurationError {}

/// Parse durations such as `45s`, `10m`, `1h30m` or `2d`.
pub fn parse_duration(s: &str) -> Result<ChronoDuration, DurationError> {
    if s.is_empty() {
        return Err(DurationError::Empty);
    }

    let mut total: i64 = 0;
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let unit_secs = match c.to_ascii_lowercase() {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            other => return Err(DurationError::UnknownUnit(other)),
        };
        if digits.is_empty() {
            return Err(DurationError::MissingUnit);
        }
        let value: i64 = digits.parse().map_err(|_| DurationError::TooLong)?;
        total = value
            .checked_mul(unit_secs)
            .and_then(|secs| total.checked_add(secs))
            .ok_or(DurationError::TooLong)?;
        digits.clear();
    }

    if !digits.is_empty() {
        return Err(DurationError::MissingUnit);
    }

    ChronoDuration::try_seconds(total).ok_or(DurationError::TooLong)
}

impl Reminder {
    pub fn new(
        user_id: UserId,
        channel_id: ChannelId,
        text: &str,
        due: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Self, ReminderError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ReminderError::EmptyText);
        }
        if text.chars().count() > MAX_TEXT_LEN {
            return Err(ReminderError::TooLong);
        }
        if due <= now {
            return Err(ReminderError::NotInFuture);
        }

        Ok(Self {
            user_id,
            channel_id,
            text: text.to_string(),
            due,
        })
    }
}

pub async fn add(store: &Store, reminder: Reminder) -> Result<()> {
    store
        .update(REMINDERS_DOCUMENT, |reminders: &mut Vec<Reminder>| {
            reminders.push(reminder)
        })
        .await
}

/// A user's reminders, soonest first.
pub async fn pending_for(store: &Store, user_id: UserId) -> Vec<Reminder> {
    let reminders: Vec<Reminder> = store.load(REMINDERS_DOCUMENT).await;
    let mut mine: Vec<Reminder> = reminders
        .into_iter()
        .filter(|r| r.user_id == user_id)
        .collect();
    mine.sort_by_key(|r| r.due);
    mine
}

/// Cancel the `index`-th (1-based) reminder in the order [`pending_for`] lists them.
pub async fn cancel(store: &Store, user_id: UserId, index: usize) -> Result<Option<Reminder>> {
    let _guard = store.lock(REMINDERS_DOCUMENT).await;
    let mut reminders: Vec<Reminder> = store.load(REMINDERS_DOCUMENT).await;

    let mut mine: Vec<(usize, &Reminder)> = reminders
        .iter()
        .enumerate()
        .filter(|(_, r)| r.user_id == user_id)
        .collect();
    mine.sort_by_key(|(_, r)| r.due);

    let Some(&(position, _)) = index.checked_sub(1).and_then(|i| mine.get(i)) else {
        return Ok(None);
    };

    let removed = reminders.remove(position);
    store.save(REMINDERS_DOCUMENT, &reminders).await?;
    Ok(Some(removed))
}

/// Split reminders into those due at `now` and those still pending, preserving order.
pub fn partition_due(
    reminders: Vec<Reminder>,
    now: DateTime<Utc>,
) -> (Vec<Reminder>, Vec<Reminder>) {
    reminders.into_iter().partition(|r| r.due <= now)
}

#[serenity::async_trait]
pub trait ReminderDispatch: Send + Sync {
    async fn deliver(&self, reminder: &Reminder) -> Result<()>;
}

/// Posts reminders in the channel they were set from.
pub struct DiscordReminderDispatch {
    http: Arc<Http>,
}

impl DiscordReminderDispatch {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[serenity::async_trait]
impl ReminderDispatch for DiscordReminderDispatch {
    async fn deliver(&self, reminder: &Reminder) -> Result<()> {
        let user = reminder
            .user_id
            .to_user(&self.http)
            .await
            .map_err(|e| anyhow!("Could not resolve user {}: {}", reminder.user_id, e))?;
        let channel = reminder
            .channel_id
            .to_channel(&self.http)
            .await
            .map_err(|e| anyhow!("Could not resolve channel {}: {}", reminder.channel_id, e))?;

        channel
            .id()
            .send_message(&self.http, delivery_message(user.id, &reminder.text))
            .await?;
        Ok(())
    }
}

/// The reminder as posted.  Only the owner is pinged, whatever the text mentions.
pub fn delivery_message(user_id: UserId, text: &str) -> CreateMessage {
    CreateMessage::new()
        .content(format!("{} Reminder: {}", user_id.mention(), text))
        .allowed_mentions(CreateAllowedMentions::new().users([user_id]))
}

pub struct Sweeper {
    store: Arc<Store>,
    dispatch: Arc<dyn ReminderDispatch>,
    period: Duration,
}

impl Sweeper {
    pub fn new(store: Arc<Store>, dispatch: Arc<dyn ReminderDispatch>, period: Duration) -> Self {
        Self {
            store,
            dispatch,
            period,
        }
    }

    /// One sweep evaluated at `now`.  Returns how many reminders were taken out of the store.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<usize> {
        let due = {
            let _guard = self.store.lock(REMINDERS_DOCUMENT).await;
            let reminders: Vec<Reminder> = self.store.load(REMINDERS_DOCUMENT).await;
            let (due, pending) = partition_due(reminders, now);
            if due.is_empty() {
                return Ok(0);
            }
            // Persist before sending so a crash mid-delivery can't send anything twice.
            self.store.save(REMINDERS_DOCUMENT, &pending).await?;
            due
        };

        for reminder in &due {
            if let Err(e) = self.dispatch.deliver(reminder).await {
                tracing::warn!(
                    "Dropping reminder for user {} in channel {}: {}",
                    reminder.user_id,
                    reminder.channel_id,
                    e
                );
            }
        }

        Ok(due.len())
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log_internal!(
            "Reminder sweeper started, checking every {}s",
            self.period.as_secs()
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let now = Utc::now();
                    match self.tick(now).await {
                        Ok(0) => {}
                        Ok(n) => log_internal!("Sent {} reminder(s)", n),
                        Err(e) => tracing::error!("Reminder sweep failed: {}", e),
                    }
                }
            }
        }

        log_internal!("Reminder sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingDispatch {
        delivered: Mutex<Vec<Reminder>>,
        unreachable: Option<UserId>,
    }

    #[serenity::async_trait]
    impl ReminderDispatch for RecordingDispatch {
        async fn deliver(&self, reminder: &Reminder) -> Result<()> {
            if Some(reminder.user_id) == self.unreachable {
                return Err(anyhow!("unknown user"));
            }
            self.delivered.lock().unwrap().push(reminder.clone());
            Ok(())
        }
    }

    fn reminder(user: u64, text: &str, due: DateTime<Utc>) -> Reminder {
        Reminder {
            user_id: UserId::new(user),
            channel_id: ChannelId::new(10),
            text: text.to_string(),
            due,
        }
    }

    fn sweeper(dir: &TempDir, dispatch: Arc<RecordingDispatch>) -> (Arc<Store>, Sweeper) {
        let store = Arc::new(Store::new(dir.path()));
        let sweeper = Sweeper::new(store.clone(), dispatch, Duration::from_secs(60));
        (store, sweeper)
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("45s"), Ok(ChronoDuration::seconds(45)));
        assert_eq!(parse_duration("10m"), Ok(ChronoDuration::minutes(10)));
        assert_eq!(parse_duration("1h30m"), Ok(ChronoDuration::minutes(90)));
        assert_eq!(parse_duration("2D"), Ok(ChronoDuration::days(2)));
        assert_eq!(parse_duration("0s"), Ok(ChronoDuration::zero()));
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert_eq!(parse_duration("10"), Err(DurationError::MissingUnit));
        assert_eq!(parse_duration("m"), Err(DurationError::MissingUnit));
        assert_eq!(parse_duration("3w"), Err(DurationError::UnknownUnit('w')));
        assert_eq!(parse_duration("-5m"), Err(DurationError::UnknownUnit('-')));
        assert_eq!(
            parse_duration("99999999999999999999d"),
            Err(DurationError::TooLong)
        );
    }

    #[test]
    fn reminders_must_be_in_the_future() {
        let now = Utc::now();
        let user = UserId::new(1);
        let channel = ChannelId::new(2);

        assert_eq!(
            Reminder::new(user, channel, "tea", now, now),
            Err(ReminderError::NotInFuture)
        );
        assert_eq!(
            Reminder::new(user, channel, "tea", now - ChronoDuration::seconds(1), now),
            Err(ReminderError::NotInFuture)
        );
        assert_eq!(
            Reminder::new(user, channel, "   ", now + ChronoDuration::minutes(1), now),
            Err(ReminderError::EmptyText)
        );

        let ok = Reminder::new(user, channel, " tea ", now + ChronoDuration::minutes(1), now)
            .unwrap();
        assert_eq!(ok.text, "tea");
    }

    #[test]
    fn reminder_text_must_fit_in_one_message() {
        let now = Utc::now();
        let due = now + ChronoDuration::minutes(1);
        let user = UserId::new(u64::MAX);
        let channel = ChannelId::new(2);

        let longest = "é".repeat(MAX_TEXT_LEN);
        let reminder = Reminder::new(user, channel, &longest, due, now).unwrap();
        let delivered = format!("{} Reminder: {}", user.mention(), reminder.text);
        assert!(delivered.chars().count() <= MESSAGE_LIMIT);

        let too_long = "a".repeat(MAX_TEXT_LEN + 1);
        assert_eq!(
            Reminder::new(user, channel, &too_long, due, now),
            Err(ReminderError::TooLong)
        );
    }

    #[test]
    fn delivery_pings_only_the_owner() {
        let message = delivery_message(UserId::new(42), "@everyone <@&7> standup");
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["content"], "<@42> Reminder: @everyone <@&7> standup");
        let allowed = &json["allowed_mentions"];
        assert_eq!(allowed["users"], serde_json::json!(["42"]));
        assert!(allowed["parse"]
            .as_array()
            .map_or(true, |parse| parse.is_empty()));
        assert!(allowed["roles"]
            .as_array()
            .map_or(true, |roles| roles.is_empty()));
    }

    #[tokio::test]
    async fn sweep_sends_only_due_reminders() {
        let dir = TempDir::new().unwrap();
        let dispatch = Arc::new(RecordingDispatch::default());
        let (store, sweeper) = sweeper(&dir, dispatch.clone());

        let now = Utc::now();
        let overdue = reminder(1, "overdue", now - ChronoDuration::seconds(10));
        let later = reminder(1, "later", now + ChronoDuration::seconds(10));
        store
            .save(REMINDERS_DOCUMENT, &vec![overdue.clone(), later.clone()])
            .await
            .unwrap();

        assert_eq!(sweeper.tick(now).await.unwrap(), 1);
        assert_eq!(*dispatch.delivered.lock().unwrap(), vec![overdue]);

        let remaining: Vec<Reminder> = store.load(REMINDERS_DOCUMENT).await;
        assert_eq!(remaining, vec![later]);

        // A second sweep at the same instant has nothing to do
        assert_eq!(sweeper.tick(now).await.unwrap(), 0);
        assert_eq!(dispatch.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reminder_due_exactly_now_is_sent() {
        let dir = TempDir::new().unwrap();
        let dispatch = Arc::new(RecordingDispatch::default());
        let (store, sweeper) = sweeper(&dir, dispatch.clone());

        let now = Utc::now();
        add(&store, reminder(1, "now", now)).await.unwrap();

        assert_eq!(sweeper.tick(now).await.unwrap(), 1);
        let remaining: Vec<Reminder> = store.load(REMINDERS_DOCUMENT).await;
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn undeliverable_reminder_is_dropped() {
        let dir = TempDir::new().unwrap();
        let dispatch = Arc::new(RecordingDispatch {
            delivered: Mutex::new(Vec::new()),
            unreachable: Some(UserId::new(666)),
        });
        let (store, sweeper) = sweeper(&dir, dispatch.clone());

        let now = Utc::now();
        let gone = reminder(666, "gone", now - ChronoDuration::minutes(1));
        let fine = reminder(1, "fine", now - ChronoDuration::minutes(1));
        store
            .save(REMINDERS_DOCUMENT, &vec![gone, fine.clone()])
            .await
            .unwrap();

        assert_eq!(sweeper.tick(now).await.unwrap(), 2);
        assert_eq!(*dispatch.delivered.lock().unwrap(), vec![fine]);

        // Not retried
        let remaining: Vec<Reminder> = store.load(REMINDERS_DOCUMENT).await;
        assert!(remaining.is_empty());
        assert_eq!(sweeper.tick(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sweep_without_due_reminders_leaves_store_alone() {
        let dir = TempDir::new().unwrap();
        let dispatch = Arc::new(RecordingDispatch::default());
        let (_store, sweeper) = sweeper(&dir, dispatch.clone());

        assert_eq!(sweeper.tick(Utc::now()).await.unwrap(), 0);
        assert!(!dir.path().join("reminders.json").exists());
    }

    #[tokio::test]
    async fn listing_and_cancelling() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        let now = Utc::now();

        add(&store, reminder(1, "third", now + ChronoDuration::hours(3)))
            .await
            .unwrap();
        add(&store, reminder(2, "other user", now + ChronoDuration::hours(1)))
            .await
            .unwrap();
        add(&store, reminder(1, "first", now + ChronoDuration::hours(1)))
            .await
            .unwrap();
        add(&store, reminder(1, "second", now + ChronoDuration::hours(2)))
            .await
            .unwrap();

        let mine: Vec<String> = pending_for(&store, UserId::new(1))
            .await
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert_eq!(mine, vec!["first", "second", "third"]);

        let cancelled = cancel(&store, UserId::new(1), 2).await.unwrap().unwrap();
        assert_eq!(cancelled.text, "second");
        assert!(cancel(&store, UserId::new(1), 0).await.unwrap().is_none());
        assert!(cancel(&store, UserId::new(1), 3).await.unwrap().is_none());

        let mine: Vec<String> = pending_for(&store, UserId::new(1))
            .await
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert_eq!(mine, vec!["first", "third"]);
        assert_eq!(pending_for(&store, UserId::new(2)).await.len(), 1);
    }

    #[tokio::test]
    async fn run_sweeps_until_cancelled() {
        struct ChannelDispatch(tokio::sync::mpsc::UnboundedSender<Reminder>);

        #[serenity::async_trait]
        impl ReminderDispatch for ChannelDispatch {
            async fn deliver(&self, reminder: &Reminder) -> Result<()> {
                self.0.send(reminder.clone())?;
                Ok(())
            }
        }

        let dir = TempDir::new().unwrap();
        let store = Arc::new(Store::new(dir.path()));
        add(&store, reminder(1, "ping", Utc::now() - ChronoDuration::seconds(1)))
            .await
            .unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sweeper = Sweeper::new(
            store.clone(),
            Arc::new(ChannelDispatch(tx)),
            Duration::from_secs(3600),
        );
        let cancel = CancellationToken::new();
        let task = tokio::spawn(sweeper.run(cancel.clone()));

        // The first interval tick fires immediately
        let sent = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent.text, "ping");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
