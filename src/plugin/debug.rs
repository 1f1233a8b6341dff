use crate::{event::*, log_event, logging::*, plugin::*};
use anyhow::Result;
use serenity::all::{Interaction, ReactionType};
use std::borrow::Cow;

/// Logs every event before the other plugins look at it
pub struct Debug;

fn emoji_name(emoji: &ReactionType) -> String {
    match emoji {
        ReactionType::Custom { name, .. } => name.clone().unwrap_or("<unknown-emoji>".to_owned()),
        ReactionType::Unicode(s) => s.clone(),
        _ => "<unknown-emoji>".to_owned(),
    }
}

#[serenity::async_trait]
impl Plugin for Debug {
    fn name(&self) -> &'static str {
        "debug"
    }

    async fn usage(&self, _ctx: &Context<'_>) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        match event {
            Event::Ready(ready) => {
                log_event!(
                    "Connected to {} server(s) as {}",
                    ready.guilds.len(),
                    ctx.cache.current_user().color(),
                );
            }
            Event::Message(msg) => {
                log_event!(
                    "{}{}{}{}{}{} {}",
                    msg.guild_id.color(ctx.http).await,
                    Glue {}.color(),
                    msg.channel_id.color(ctx.http).await,
                    Glue {}.color(),
                    msg.author.color(),
                    Glue {}.color(),
                    msg.content,
                );
            }
            Event::Interaction(Interaction::Command(cmd)) => {
                log_event!(
                    "{}{}{}{}{} used /{}",
                    cmd.guild_id.color(ctx.http).await,
                    Glue {}.color(),
                    cmd.channel_id.color(ctx.http).await,
                    Glue {}.color(),
                    cmd.user.color(),
                    cmd.data.name,
                );
            }
            Event::Interaction(_) => {}
            Event::VoiceStateUpdate { old, new } => match (old, new.channel_id) {
                (Some(old), Some(new_id)) if old.channel_id == Some(new_id) => {
                    // State change within same channel, e.g. mute/unmute
                    // Not currently debug logging this
                }
                (Some(old), Some(_)) => log_event!(
                    "{} moved VC channel from \"{}\" to \"{}\"",
                    new.user_id.color(ctx.http).await,
                    old.channel_id.color(ctx.http).await,
                    new.channel_id.color(ctx.http).await,
                ),
                (Some(old), None) => log_event!(
                    "{} left VC channel \"{}\"",
                    new.user_id.color(ctx.http).await,
                    old.channel_id.color(ctx.http).await,
                ),
                (None, Some(_)) => log_event!(
                    "{} joined VC channel \"{}\"",
                    new.user_id.color(ctx.http).await,
                    new.channel_id.color(ctx.http).await,
                ),
                (None, None) => log_event!("Unknown voice state update"),
            },
            Event::ReactionAdd(reaction) => {
                let message = match reaction.message(ctx.cache_http).await {
                    Ok(msg) => Cow::Owned(msg.content),
                    Err(_) => Cow::Borrowed("<unknown-message>"),
                };

                log_event!(
                    "{} reacted to message \"{}\" with \"{}\"",
                    reaction.user_id.color(ctx.http).await,
                    message,
                    emoji_name(&reaction.emoji)
                );
            }
        }

        Ok(EventHandled::No)
    }
}
