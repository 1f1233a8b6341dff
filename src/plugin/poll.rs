use crate::{
    event::*,
    log_internal,
    plugin::*,
    poll::{self, Poll},
};
use anyhow::Result;
use chrono::Utc;
use serenity::all::{CreateEmbed, CreateEmbedFooter, CreateMessage, ReactionType};

/// `poll question | option | option ...`
pub struct PollCommand;

fn poll_embed(poll: &Poll, author: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title(&poll.question)
        .description(poll.description())
        .footer(CreateEmbedFooter::new(format!("Poll by {}", author)))
        .timestamp(poll.created)
}

#[serenity::async_trait]
impl Plugin for PollCommand {
    fn name(&self) -> &'static str {
        "poll"
    }

    async fn usage(&self, ctx: &Context<'_>) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{}{} <question> | <option> | <option> ... - start a poll with 2 to {} options",
            prefix,
            self.name(),
            poll::MAX_OPTIONS
        ))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let Some((msg, args)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };

        let poll = match Poll::parse(args, msg.channel_id, msg.author.id, Utc::now()) {
            Ok(poll) => poll,
            Err(e) => {
                msg.reply(ctx.cache_http, e.to_string()).await?;
                return Ok(EventHandled::Yes);
            }
        };

        let posted = msg
            .channel_id
            .send_message(
                ctx.cache_http,
                CreateMessage::new().embed(poll_embed(&poll, &msg.author.name)),
            )
            .await?;

        // Record first, so a failed reaction still leaves the poll on file.
        let markers: Vec<String> = poll.options.iter().map(|o| o.marker.clone()).collect();
        log_internal!(
            "{} started poll \"{}\" ({})",
            msg.author.name,
            poll.question,
            posted.id
        );
        poll::record(ctx.store, posted.id, poll).await?;

        for marker in markers {
            posted
                .react(ctx.cache_http, ReactionType::Unicode(marker))
                .await?;
        }

        Ok(EventHandled::Yes)
    }
}
