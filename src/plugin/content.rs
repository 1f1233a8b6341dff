use crate::{
    content::{self, ContentKind},
    event::*,
    plugin::*,
};
use anyhow::Result;
use serenity::all::{CreateEmbed, CreateMessage};

/// `joke`, `quote` and `meme`
pub struct Content;

fn kind_for(command: &str) -> Option<ContentKind> {
    match command {
        "joke" => Some(ContentKind::Joke),
        "quote" => Some(ContentKind::Quote),
        "meme" => Some(ContentKind::Meme),
        _ => None,
    }
}

fn unavailable(kind: ContentKind) -> String {
    format!(
        "Couldn't fetch a {} right now, try again later.",
        kind.name()
    )
}

#[serenity::async_trait]
impl Plugin for Content {
    fn name(&self) -> &'static str {
        "content"
    }

    async fn usage(&self, ctx: &Context<'_>) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{0}joke - tell a joke\n{0}quote - share a quote\n{0}meme - post a meme",
            prefix
        ))
    }

    async fn handle(&self, ctx: &Context<'_>, event: &Event) -> Result<EventHandled> {
        let Some((msg, name, _)) = event.bot_cmd(ctx).await else {
            return Ok(EventHandled::No);
        };
        let Some(kind) = kind_for(name) else {
            return Ok(EventHandled::No);
        };

        let url = {
            let cfg = ctx.cfg.read().await;
            match kind {
                ContentKind::Joke => cfg.content.joke_url.clone(),
                ContentKind::Quote => cfg.content.quote_url.clone(),
                ContentKind::Meme => cfg.content.meme_url.clone(),
            }
        };

        let typing = msg.channel_id.start_typing(ctx.http);
        let fetched = content::fetch(ctx.http_client, kind, &url).await;
        typing.stop();

        let message = match fetched {
            Ok(content::Content::Text(text)) => CreateMessage::new().content(text),
            Ok(content::Content::Image {
                title,
                image_url,
                link,
            }) => {
                let mut embed = CreateEmbed::new().title(title).image(image_url);
                if let Some(link) = link {
                    embed = embed.url(link);
                }
                CreateMessage::new().embed(embed)
            }
            Err(e) => {
                tracing::warn!("Could not fetch {} from {}: {:#}", kind.name(), url, e);
                CreateMessage::new().content(unavailable(kind))
            }
        };

        msg.channel_id.send_message(ctx.cache_http, message).await?;
        Ok(EventHandled::Yes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_map_to_kinds() {
        assert_eq!(kind_for("joke"), Some(ContentKind::Joke));
        assert_eq!(kind_for("quote"), Some(ContentKind::Quote));
        assert_eq!(kind_for("meme"), Some(ContentKind::Meme));
        assert_eq!(kind_for("xkcd"), None);
    }

    #[test]
    fn failure_message_names_kind() {
        assert_eq!(
            unavailable(ContentKind::Quote),
            "Couldn't fetch a quote right now, try again later."
        );
    }
}
