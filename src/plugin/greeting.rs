use crate::{event::*, plugin::*};
use anyhow::Result;
use serenity::all::{
    CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage,
    Interaction, Mentionable, UserId,
};

/// `hello`, `embed` and the `/greet` slash command
pub struct Greeting;

fn greeting(user_id: UserId) -> String {
    format!("Hello, {}!", user_id.mention())
}

fn example_embed() -> CreateEmbed {
    CreateEmbed::new()
        .title("Example Embed")
        .description("This is an example embed.")
        .colour(0x00ff00)
        .field("Field 1", "Value 1", false)
        .field("Field 2", "Value 2", false)
}

#[serenity::async_trait]
impl Plugin for Greeting {
    fn name(&self) -> &'static str {
        "greeting"
    }

    async fn usage(&self, ctx: &Context<'_>) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{0}hello - say hello\n{0}embed - show an example embed",
            prefix
        ))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        if let Event::Interaction(Interaction::Command(cmd)) = event {
            if cmd.data.name != super::ready::GREET_COMMAND {
                return Ok(EventHandled::No);
            }

            let target = cmd
                .data
                .options
                .iter()
                .find(|option| option.name == "user")
                .and_then(|option| option.value.as_user_id())
                .unwrap_or(cmd.user.id);

            let response = CreateInteractionResponseMessage::new().content(greeting(target));
            cmd.create_response(ctx.cache_http, CreateInteractionResponse::Message(response))
                .await?;
            return Ok(EventHandled::Yes);
        }

        if let Some((msg, _)) = event.is_bot_cmd(ctx, "hello").await {
            msg.channel_id.say(ctx.cache_http, "Hello!").await?;
            return Ok(EventHandled::Yes);
        }

        if let Some((msg, _)) = event.is_bot_cmd(ctx, "embed").await {
            msg.channel_id
                .send_message(ctx.cache_http, CreateMessage::new().embed(example_embed()))
                .await?;
            return Ok(EventHandled::Yes);
        }

        Ok(EventHandled::No)
    }
}
