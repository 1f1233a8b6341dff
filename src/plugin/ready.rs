use crate::{event::*, log_internal, plugin::*};
use anyhow::Result;
use serenity::all::{Command, CommandOptionType, CreateCommand, CreateCommandOption};

/// Registers application commands once the connection to Discord is ready.
pub struct Ready;

pub const GREET_COMMAND: &str = "greet";

fn greet_command() -> CreateCommand {
    CreateCommand::new(GREET_COMMAND)
        .description("Greet a user")
        .add_option(
            CreateCommandOption::new(CommandOptionType::User, "user", "The user to greet")
                .required(true),
        )
}

#[serenity::async_trait]
impl Plugin for Ready {
    fn name(&self) -> &'static str {
        "ready"
    }

    async fn usage(&self, _ctx: &Context<'_>) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let Event::Ready(_) = event else {
            return Ok(EventHandled::No);
        };

        // Registering again on reconnect overwrites the existing command.
        match Command::create_global_command(ctx.http, greet_command()).await {
            Ok(command) => log_internal!("Registered /{} ({})", command.name, command.id),
            Err(e) => tracing::warn!("Could not register /{}: {}", GREET_COMMAND, e),
        }

        Ok(EventHandled::Yes)
    }
}
