use crate::store::Store;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serenity::all::{GuildId, UserId};
use std::collections::HashMap;

pub const WARNINGS_DOCUMENT: &str = "warnings";
pub const NO_REASON: &str = "No reason provided";

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Warning {
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub moderator_id: UserId,
}

/// guild -> user -> warnings, oldest first
pub type Warnings = HashMap<GuildId, HashMap<UserId, Vec<Warning>>>;

impl Warning {
    pub fn new(reason: Option<&str>, moderator_id: UserId, timestamp: DateTime<Utc>) -> Self {
        let reason = match reason.map(str::trim) {
            Some(reason) if !reason.is_empty() => reason.to_string(),
            _ => NO_REASON.to_string(),
        };
        Self {
            reason,
            timestamp,
            moderator_id,
        }
    }
}

/// Record a warning.  Returns how many warnings the user now has in this guild.
pub async fn warn(
    store: &Store,
    guild_id: GuildId,
    user_id: UserId,
    warning: Warning,
) -> Result<usize> {
    store
        .update(WARNINGS_DOCUMENT, |warnings: &mut Warnings| {
            let list = warnings
                .entry(guild_id)
                .or_default()
                .entry(user_id)
                .or_default();
            list.push(warning);
            list.len()
        })
        .await
}

pub async fn list(store: &Store, guild_id: GuildId, user_id: UserId) -> Vec<Warning> {
    let mut warnings: Warnings = store.load(WARNINGS_DOCUMENT).await;
    warnings
        .get_mut(&guild_id)
        .and_then(|users| users.remove(&user_id))
        .unwrap_or_default()
}

/// Forget every warning the user has in this guild.  Returns how many were removed.
pub async fn clear(store: &Store, guild_id: GuildId, user_id: UserId) -> Result<usize> {
    store
        .update(WARNINGS_DOCUMENT, |warnings: &mut Warnings| {
            let Some(users) = warnings.get_mut(&guild_id) else {
                return 0;
            };
            let removed = users.remove(&user_id).map(|w| w.len()).unwrap_or(0);
            if users.is_empty() {
                warnings.remove(&guild_id);
            }
            removed
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const GUILD: GuildId = GuildId::new(1);
    const MODERATOR: UserId = UserId::new(99);

    #[test]
    fn missing_reason_uses_placeholder() {
        let now = Utc::now();
        assert_eq!(Warning::new(None, MODERATOR, now).reason, NO_REASON);
        assert_eq!(Warning::new(Some("  "), MODERATOR, now).reason, NO_REASON);
        assert_eq!(Warning::new(Some(" spam "), MODERATOR, now).reason, "spam");
    }

    #[tokio::test]
    async fn warn_list_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        let alice = UserId::new(10);
        let bob = UserId::new(11);

        let first = Warning::new(Some("spam"), MODERATOR, Utc::now());
        let second = Warning::new(None, MODERATOR, Utc::now());
        assert_eq!(warn(&store, GUILD, alice, first.clone()).await.unwrap(), 1);
        assert_eq!(warn(&store, GUILD, alice, second.clone()).await.unwrap(), 2);
        assert_eq!(warn(&store, GUILD, bob, first.clone()).await.unwrap(), 1);

        assert_eq!(list(&store, GUILD, alice).await, vec![first.clone(), second]);

        assert_eq!(clear(&store, GUILD, alice).await.unwrap(), 2);
        assert!(list(&store, GUILD, alice).await.is_empty());
        assert_eq!(list(&store, GUILD, bob).await, vec![first]);
    }

    #[tokio::test]
    async fn warnings_are_per_guild() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path());
        let user = UserId::new(10);
        let other_guild = GuildId::new(2);

        warn(&store, GUILD, user, Warning::new(None, MODERATOR, Utc::now()))
            .await
            .unwrap();

        assert!(list(&store, other_guild, user).await.is_empty());
        assert_eq!(clear(&store, other_guild, user).await.unwrap(), 0);
        assert_eq!(list(&store, GUILD, user).await.len(), 1);
    }
}
