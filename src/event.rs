//! The Serenity crate we're using for the Discord API is designed around callbacks to handle
//! events.  However, this does not mesh well with our plugin framework here.  To resolve this,
//! the handler translates the callbacks into a distinct Event enum.

use crate::context::Context;
use serenity::all::{Interaction, Message, Reaction, Ready, VoiceState};

/// A Discord event
pub enum Event {
    Ready(Ready),
    Message(Message),
    Interaction(Interaction),
    VoiceStateUpdate {
        old: Option<VoiceState>,
        new: VoiceState,
    },
    ReactionAdd(Reaction),
}

pub enum EventHandled {
    Yes,
    No,
}

impl Event {
    // When an event occurs, iterate over all the plugins to see if any can/should handle it.
    pub async fn handle(self, ctx: Context<'_>) {
        for plugin in crate::plugin::plugins() {
            match plugin.handle(&ctx, &self).await {
                Ok(EventHandled::Yes) => return,
                Ok(EventHandled::No) => continue,
                Err(err) => tracing::error!("Error in plugin {}: {:#}", plugin.name(), err),
            }
        }
    }

    /// If this is a bot command, the message along with the command name and its arguments.
    pub async fn bot_cmd(&self, ctx: &Context<'_>) -> Option<(&Message, &str, &str)> {
        let Event::Message(msg) = self else {
            return None;
        };

        let prefix = ctx.cfg.read().await.general.command_prefix.clone();
        parse_command(&prefix, &msg.content).map(|(name, args)| (msg, name, args))
    }

    // Check if a message is the given bot command, e.g. `!remind 10m tea`.  Returns the message
    // and the argument text.
    pub async fn is_bot_cmd(&self, ctx: &Context<'_>, cmd: &str) -> Option<(&Message, &str)> {
        match self.bot_cmd(ctx).await {
            Some((msg, name, args)) if name == cmd => Some((msg, args)),
            _ => None,
        }
    }
}

/// Split `<prefix><name> <args>` into name and trimmed args.
pub fn parse_command<'a>(prefix: &str, content: &'a str) -> Option<(&'a str, &'a str)> {
    let rest = content.trim_start().strip_prefix(prefix)?;
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    if name.is_empty() {
        return None;
    }
    Some((name, args))
}
