use crate::{
    event::*,
    helper::{split_first_arg, without_mentions},
    log_internal,
    plugin::*,
    reminder::{self, parse_duration, DurationError, Reminder},
};
use anyhow::Result;
use chrono::Utc;
use serenity::all::Message;

/// `remind`, `reminders` and `unremind`
pub struct Remind;

fn relative_time(reminder: &Reminder) -> String {
    format!("<t:{}:R>", reminder.due.timestamp())
}

fn format_reminders(reminders: &[Reminder]) -> String {
    if reminders.is_empty() {
        return "You have no pending reminders.".to_string();
    }

    reminders
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {} ({})", i + 1, r.text, relative_time(r)))
        .collect::<Vec<_>>()
        .join("\n")
}

impl Remind {
    async fn remind(&self, ctx: &Context<'_>, msg: &Message, args: &str) -> Result<()> {
        let (duration, text) = split_first_arg(args);
        let duration = match parse_duration(duration) {
            Ok(duration) => duration,
            Err(e) => {
                msg.reply(ctx.cache_http, e.to_string()).await?;
                return Ok(());
            }
        };

        let now = Utc::now();
        let Some(due) = now.checked_add_signed(duration) else {
            msg.reply(ctx.cache_http, DurationError::TooLong.to_string())
                .await?;
            return Ok(());
        };
        let reminder = match Reminder::new(msg.author.id, msg.channel_id, text, due, now) {
            Ok(reminder) => reminder,
            Err(e) => {
                msg.reply(ctx.cache_http, e.to_string()).await?;
                return Ok(());
            }
        };

        let reply = format!("I'll remind you {}.", relative_time(&reminder));
        log_internal!("{} set a reminder for {}", msg.author.name, reminder.due);
        reminder::add(ctx.store, reminder).await?;
        msg.reply(ctx.cache_http, reply).await?;
        Ok(())
    }

    async fn list(&self, ctx: &Context<'_>, msg: &Message) -> Result<()> {
        let pending = reminder::pending_for(ctx.store, msg.author.id).await;
        msg.channel_id
            .send_message(
                ctx.cache_http,
                without_mentions(format_reminders(&pending)).reference_message(msg),
            )
            .await?;
        Ok(())
    }

    async fn unremind(&self, ctx: &Context<'_>, msg: &Message, args: &str) -> Result<()> {
        let Ok(index) = args.trim().parse::<usize>() else {
            let prefix = ctx.cfg.read().await.general.command_prefix.clone();
            msg.reply(
                ctx.cache_http,
                format!("Usage: {0}unremind <n>, see {0}reminders for numbers", prefix),
            )
            .await?;
            return Ok(());
        };

        let reply = match reminder::cancel(ctx.store, msg.author.id, index).await? {
            Some(removed) => format!("Cancelled reminder: {}", removed.text),
            None => format!("You don't have a reminder number {}.", index),
        };
        msg.channel_id
            .send_message(ctx.cache_http, without_mentions(reply).reference_message(msg))
            .await?;
        Ok(())
    }
}

#[serenity::async_trait]
impl Plugin for Remind {
    fn name(&self) -> &'static str {
        "remind"
    }

    async fn usage(&self, ctx: &Context<'_>) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{0}remind <duration> <text> - remind you later, e.g. {0}remind 1h30m stretch\n\
             {0}reminders - list your pending reminders\n\
             {0}unremind <n> - cancel one of your reminders",
            prefix
        ))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let Some((msg, name, args)) = event.bot_cmd(ctx).await else {
            return Ok(EventHandled::No);
        };

        match name {
            "remind" => self.remind(ctx, msg, args).await?,
            "reminders" => self.list(ctx, msg).await?,
            "unremind" => self.unremind(ctx, msg, args).await?,
            _ => return Ok(EventHandled::No),
        }
        Ok(EventHandled::Yes)
    }
}
