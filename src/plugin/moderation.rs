use crate::{
    event::*,
    helper::{parse_user, split_first_arg, without_mentions, MessageHelper},
    log_internal,
    plugin::*,
    warning::{self, Warning, NO_REASON},
};
use anyhow::Result;
use chrono::Utc;
use serenity::all::{GuildId, Mentionable, Message, Permissions, UserId};

/// `warn`, `warnings`, `clearwarns`, `kick` and `ban`
pub struct Moderation;

const COMMANDS: [&str; 5] = ["warn", "warnings", "clearwarns", "kick", "ban"];

/// Guild permission the caller must hold, if any.
fn required_permission(command: &str) -> Option<Permissions> {
    match command {
        "warn" | "clearwarns" => Some(Permissions::MODERATE_MEMBERS),
        "kick" => Some(Permissions::KICK_MEMBERS),
        "ban" => Some(Permissions::BAN_MEMBERS),
        _ => None,
    }
}

fn reason_or_default(reason: &str) -> &str {
    match reason.trim() {
        "" => NO_REASON,
        reason => reason,
    }
}

fn format_warnings(user_id: UserId, warnings: &[Warning]) -> String {
    if warnings.is_empty() {
        return format!("{} has no warnings.", user_id.mention());
    }

    let mut out = format!("Warnings for {}:\n", user_id.mention());
    for (i, w) in warnings.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} (by {}, <t:{}:f>)\n",
            i + 1,
            w.reason,
            w.moderator_id.mention(),
            w.timestamp.timestamp()
        ));
    }
    out
}

impl Moderation {
    async fn warn(
        &self,
        ctx: &Context<'_>,
        msg: &Message,
        guild_id: GuildId,
        user_id: UserId,
        reason: &str,
    ) -> Result<String> {
        let warning = Warning::new(Some(reason), msg.author.id, Utc::now());
        let reason = warning.reason.clone();
        let count = warning::warn(ctx.store, guild_id, user_id, warning).await?;
        log_internal!(
            "{} warned {} in {}: {}",
            msg.author.name,
            user_id,
            guild_id,
            reason
        );
        Ok(format!(
            "Warned {} ({} warning(s) total). Reason: {}",
            user_id.mention(),
            count,
            reason
        ))
    }

    async fn kick(
        &self,
        ctx: &Context<'_>,
        msg: &Message,
        guild_id: GuildId,
        user_id: UserId,
        reason: &str,
    ) -> Result<String> {
        let reason = reason_or_default(reason);
        guild_id.kick_with_reason(ctx.http, user_id, reason).await?;
        log_internal!(
            "{} kicked {} from {}: {}",
            msg.author.name,
            user_id,
            guild_id,
            reason
        );
        Ok(format!("Kicked {}. Reason: {}", user_id.mention(), reason))
    }

    async fn ban(
        &self,
        ctx: &Context<'_>,
        msg: &Message,
        guild_id: GuildId,
        user_id: UserId,
        reason: &str,
    ) -> Result<String> {
        let reason = reason_or_default(reason);
        guild_id.ban_with_reason(ctx.http, user_id, 0, reason).await?;
        log_internal!(
            "{} banned {} from {}: {}",
            msg.author.name,
            user_id,
            guild_id,
            reason
        );
        Ok(format!("Banned {}. Reason: {}", user_id.mention(), reason))
    }
}

#[serenity::async_trait]
impl Plugin for Moderation {
    fn name(&self) -> &'static str {
        "moderation"
    }

    async fn usage(&self, ctx: &Context<'_>) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{0}warn <user> [reason] - warn a member\n\
             {0}warnings <user> - list a member's warnings\n\
             {0}clearwarns <user> - forget a member's warnings\n\
             {0}kick <user> [reason] - kick a member\n\
             {0}ban <user> [reason] - ban a member",
            prefix
        ))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let Some((msg, name, args)) = event.bot_cmd(ctx).await else {
            return Ok(EventHandled::No);
        };
        if !COMMANDS.contains(&name) {
            return Ok(EventHandled::No);
        }

        let Some(guild_id) = msg.guild_id else {
            msg.reply(ctx.cache_http, "That only works in a server.")
                .await?;
            return Ok(EventHandled::Yes);
        };

        if let Some(needed) = required_permission(name) {
            if !MessageHelper::author_permissions(msg, ctx).await?.contains(needed) {
                msg.reply(ctx.cache_http, "You don't have permission to do that.")
                    .await?;
                return Ok(EventHandled::Yes);
            }
        }

        let (user, reason) = split_first_arg(args);
        let Some(user_id) = parse_user(user) else {
            let prefix = ctx.cfg.read().await.general.command_prefix.clone();
            msg.reply(
                ctx.cache_http,
                format!("Usage: {}{} <@user|user id> [reason]", prefix, name),
            )
            .await?;
            return Ok(EventHandled::Yes);
        };

        let reply = match name {
            "warn" => self.warn(ctx, msg, guild_id, user_id, reason).await?,
            "warnings" => {
                let warnings = warning::list(ctx.store, guild_id, user_id).await;
                format_warnings(user_id, &warnings)
            }
            "clearwarns" => {
                let removed = warning::clear(ctx.store, guild_id, user_id).await?;
                format!("Cleared {} warning(s) for {}.", removed, user_id.mention())
            }
            "kick" => self.kick(ctx, msg, guild_id, user_id, reason).await?,
            _ => self.ban(ctx, msg, guild_id, user_id, reason).await?,
        };

        // Reasons are user-supplied.
        msg.channel_id
            .send_message(ctx.cache_http, without_mentions(reply).reference_message(msg))
            .await?;
        Ok(EventHandled::Yes)
    }
}
