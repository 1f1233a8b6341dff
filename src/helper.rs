//! Miscellaneous convenience methods

use crate::context::Context;
use anyhow::{anyhow, Result};
use serenity::all::{
    ChannelId, CreateAllowedMentions, CreateMessage, GuildId, Permissions, UserId,
};

#[serenity::async_trait]
pub trait MessageHelper {
    async fn is_from_owner(&self, ctx: &Context<'_>) -> bool;
    async fn author_permissions(&self, ctx: &Context<'_>) -> Result<Permissions>;
    fn author_voice_channel(&self, ctx: &Context<'_>) -> Option<ChannelId>;
    fn require_guild(&self) -> Result<GuildId>;
}

#[serenity::async_trait]
impl MessageHelper for serenity::all::Message {
    async fn is_from_owner(&self, ctx: &Context<'_>) -> bool {
        let owners = &ctx.cfg.read().await.general.bot_owners;
        let author_global_name = &self.author.name;

        owners.contains(author_global_name)
    }

    /// Guild-wide permissions of the author.  Errors outside of a guild.
    async fn author_permissions(&self, ctx: &Context<'_>) -> Result<Permissions> {
        let member = self.member(ctx.cache_http).await?;
        let guild = self
            .guild(ctx.cache)
            .ok_or(anyhow!("Guild for message {} not in cache", self.id))?;

        #[allow(deprecated)]
        let permissions = guild.member_permissions(&member);
        Ok(permissions)
    }

    /// The voice channel the author is currently sitting in, if any.
    fn author_voice_channel(&self, ctx: &Context<'_>) -> Option<ChannelId> {
        let guild = self.guild(ctx.cache)?;
        guild
            .voice_states
            .get(&self.author.id)
            .and_then(|state| state.channel_id)
    }

    fn require_guild(&self) -> Result<GuildId> {
        self.guild_id
            .ok_or(anyhow!("Message {} was not sent in a guild", self.id))
    }
}

/// Accepts a user mention (`<@123>` or `<@!123>`) or a raw user id.
pub fn parse_user(arg: &str) -> Option<UserId> {
    let arg = arg.trim();
    let id = match arg.strip_prefix("<@").and_then(|s| s.strip_suffix('>')) {
        Some(mention) => mention.strip_prefix('!').unwrap_or(mention),
        None => arg,
    };

    match id.parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(id) => Some(UserId::new(id)),
    }
}

/// A message echoing user-supplied text.  Nothing in it pings anyone.
pub fn without_mentions(content: impl Into<String>) -> CreateMessage {
    CreateMessage::new()
        .content(content)
        .allowed_mentions(CreateAllowedMentions::new())
}

/// Split off the first whitespace-separated argument.
pub fn split_first_arg(args: &str) -> (&str, &str) {
    let args = args.trim();
    match args.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (args, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_from_mentions_and_ids() {
        assert_eq!(parse_user("<@42>"), Some(UserId::new(42)));
        assert_eq!(parse_user("<@!42>"), Some(UserId::new(42)));
        assert_eq!(parse_user(" 42 "), Some(UserId::new(42)));
        assert_eq!(parse_user("<@&42>"), None);
        assert_eq!(parse_user("someone"), None);
        assert_eq!(parse_user("0"), None);
        assert_eq!(parse_user(""), None);
    }

    #[test]
    fn echoed_text_pings_nobody() {
        let json = serde_json::to_value(without_mentions("@everyone <@42> hi")).unwrap();

        assert_eq!(json["content"], "@everyone <@42> hi");
        let allowed = &json["allowed_mentions"];
        assert!(allowed.is_object());
        for kind in ["parse", "users", "roles"] {
            assert!(allowed[kind]
                .as_array()
                .map_or(true, |list| list.is_empty()));
        }
    }

    #[test]
    fn first_argument_split() {
        assert_eq!(split_first_arg("<@42> spamming  "), ("<@42>", "spamming"));
        assert_eq!(split_first_arg("<@42>"), ("<@42>", ""));
        assert_eq!(split_first_arg(""), ("", ""));
    }
}
