use crate::event::{Event, EventHandled};
use anyhow::Result;

pub use crate::context::Context;

mod content;
mod debug;
mod greeting;
mod help;
mod ignore_bots;
mod moderation;
mod music;
mod poll;
mod ready;
mod reload;
mod remind;

#[serenity::async_trait]
pub trait Plugin: Sync + Send {
    /// Plugin name.  Used for debug
    fn name(&self) -> &'static str;
    /// Help message lines.  None if no help message
    async fn usage(&self, ctx: &Context<'_>) -> Option<String>;
    /// Potentially handle event.  Returns:
    /// - Ok(EventHandled::Yes) if the event has been handled and no other plugin should attempt to
    /// handle it
    /// - Ok(EventHandled::No) if another plugin should attempt to handle the event
    /// - Err if an error occurred
    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled>;
}

/// Ordered list of available plugins
pub fn plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        // Core bot operations
        Box::new(debug::Debug),
        Box::new(ignore_bots::IgnoreBots),
        Box::new(ready::Ready),
        Box::new(help::Help),
        Box::new(reload::Reload),
        // Commands
        Box::new(greeting::Greeting),
        Box::new(music::Music),
        Box::new(remind::Remind),
        Box::new(poll::PollCommand),
        Box::new(moderation::Moderation),
        Box::new(content::Content),
    ]
}
