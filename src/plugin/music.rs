use crate::{
    event::*,
    helper::MessageHelper,
    music::{format_duration, player::Enqueued, source, TrackRequest},
    plugin::*,
};
use anyhow::Result;
use serenity::all::{ChannelId, CreateEmbed, CreateMessage, GuildId, Mentionable, Message};

/// Voice channel playback: join, play, skip, stop, leave, queue, nowplaying
pub struct Music;

const COMMANDS: [&str; 7] = ["join", "play", "skip", "stop", "leave", "queue", "nowplaying"];
const QUEUE_LISTING_LIMIT: usize = 10;

fn track_line(track: &TrackRequest) -> String {
    match track.duration_secs {
        Some(secs) => format!("**{}** [{}]", track.title, format_duration(secs)),
        None => format!("**{}**", track.title),
    }
}

fn format_queue(current: Option<&TrackRequest>, upcoming: &[TrackRequest]) -> String {
    if current.is_none() && upcoming.is_empty() {
        return "The queue is empty.".to_string();
    }

    let mut out = String::new();
    if let Some(track) = current {
        out.push_str(&format!("Now playing: {}\n", track_line(track)));
    }
    if !upcoming.is_empty() {
        out.push_str("Up next:\n");
        for (i, track) in upcoming.iter().take(QUEUE_LISTING_LIMIT).enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, track_line(track)));
        }
        if upcoming.len() > QUEUE_LISTING_LIMIT {
            out.push_str(&format!(
                "...and {} more\n",
                upcoming.len() - QUEUE_LISTING_LIMIT
            ));
        }
    }
    out
}

fn join_failed(channel_id: ChannelId) -> String {
    format!("Couldn't join {}", channel_id.mention())
}

fn now_playing_embed(track: &TrackRequest) -> CreateEmbed {
    let duration = track
        .duration_secs
        .map(format_duration)
        .unwrap_or("live".to_string());

    let mut embed = CreateEmbed::new()
        .title("Now playing")
        .description(format!("[{}]({})", track.title, track.stream_url))
        .field("Duration", duration, true)
        .field("Requested by", track.requester.mention().to_string(), true);
    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }
    embed
}

impl Music {
    /// Join the caller's channel, telling them if that fails.  Returns whether we're connected.
    async fn connect(
        &self,
        ctx: &Context<'_>,
        msg: &Message,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<bool> {
        match ctx.player.connect(guild_id, channel_id).await {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::warn!("{:#}", e);
                msg.reply(ctx.cache_http, join_failed(channel_id)).await?;
                Ok(false)
            }
        }
    }

    async fn join(&self, ctx: &Context<'_>, msg: &Message) -> Result<()> {
        let guild_id = msg.require_guild()?;
        let Some(channel_id) = msg.author_voice_channel(ctx) else {
            msg.reply(ctx.cache_http, "Join a voice channel first.")
                .await?;
            return Ok(());
        };

        if !self.connect(ctx, msg, guild_id, channel_id).await? {
            return Ok(());
        }
        msg.reply(ctx.cache_http, format!("Joined {}", channel_id.mention()))
            .await?;
        Ok(())
    }

    async fn play(&self, ctx: &Context<'_>, msg: &Message, query: &str) -> Result<()> {
        let guild_id = msg.require_guild()?;
        if query.is_empty() {
            let prefix = ctx.cfg.read().await.general.command_prefix.clone();
            msg.reply(ctx.cache_http, format!("Usage: {}play <url|search>", prefix))
                .await?;
            return Ok(());
        }
        let Some(channel_id) = msg.author_voice_channel(ctx) else {
            msg.reply(ctx.cache_http, "Join a voice channel first.")
                .await?;
            return Ok(());
        };

        if !self.connect(ctx, msg, guild_id, channel_id).await? {
            return Ok(());
        }

        let typing = msg.channel_id.start_typing(ctx.http);
        let resolved = source::resolve(query, msg.author.id).await;
        typing.stop();

        let track = match resolved {
            Ok(track) => track,
            Err(e) => {
                tracing::warn!("Could not resolve `{}`: {:#}", query, e);
                msg.reply(ctx.cache_http, format!("Couldn't find anything for `{}`.", query))
                    .await?;
                return Ok(());
            }
        };

        match ctx.player.enqueue(guild_id, track.clone()).await {
            Ok(Enqueued::Started(playback)) => {
                msg.channel_id
                    .send_message(
                        ctx.cache_http,
                        CreateMessage::new().embed(now_playing_embed(&playback.track)),
                    )
                    .await?;
            }
            Ok(Enqueued::Queued { position }) => {
                msg.reply(
                    ctx.cache_http,
                    format!("Queued {} at position {}", track_line(&track), position),
                )
                .await?;
            }
            Err(e) => {
                msg.reply(ctx.cache_http, e.to_string()).await?;
            }
        }
        Ok(())
    }

    async fn skip(&self, ctx: &Context<'_>, msg: &Message) -> Result<()> {
        let guild_id = msg.require_guild()?;
        let reply = match ctx.player.skip(guild_id).await {
            Some(track) => format!("Skipped {}", track_line(&track)),
            None => "Nothing is playing.".to_string(),
        };
        msg.reply(ctx.cache_http, reply).await?;
        Ok(())
    }

    async fn stop(&self, ctx: &Context<'_>, msg: &Message) -> Result<()> {
        let guild_id = msg.require_guild()?;
        let reply = if ctx.player.stop(guild_id).await {
            "Stopped playback and cleared the queue."
        } else {
            "Nothing is playing."
        };
        msg.reply(ctx.cache_http, reply).await?;
        Ok(())
    }

    async fn leave(&self, ctx: &Context<'_>, msg: &Message) -> Result<()> {
        let guild_id = msg.require_guild()?;
        if !ctx.player.is_connected(guild_id) {
            msg.reply(ctx.cache_http, "I'm not in a voice channel.")
                .await?;
            return Ok(());
        }

        ctx.player.leave(guild_id).await?;
        msg.reply(ctx.cache_http, "Left the voice channel.").await?;
        Ok(())
    }

    async fn queue(&self, ctx: &Context<'_>, msg: &Message) -> Result<()> {
        let guild_id = msg.require_guild()?;
        let (current, upcoming) = ctx.player.list(guild_id).await;
        msg.reply(ctx.cache_http, format_queue(current.as_ref(), &upcoming))
            .await?;
        Ok(())
    }

    async fn now_playing(&self, ctx: &Context<'_>, msg: &Message) -> Result<()> {
        let guild_id = msg.require_guild()?;
        match ctx.player.current(guild_id).await {
            Some(track) => {
                msg.channel_id
                    .send_message(
                        ctx.cache_http,
                        CreateMessage::new().embed(now_playing_embed(&track)),
                    )
                    .await?;
            }
            None => {
                msg.reply(ctx.cache_http, "Nothing is playing.").await?;
            }
        }
        Ok(())
    }
}

#[serenity::async_trait]
impl Plugin for Music {
    fn name(&self) -> &'static str {
        "music"
    }

    async fn usage(&self, ctx: &Context<'_>) -> Option<String> {
        let prefix = &ctx.cfg.read().await.general.command_prefix;
        Some(format!(
            "{0}join - join your voice channel\n\
             {0}play <url|search> - play or queue a track\n\
             {0}skip - skip the current track\n\
             {0}stop - stop and clear the queue\n\
             {0}leave - stop and leave the voice channel\n\
             {0}queue - show the queue\n\
             {0}nowplaying - show the current track",
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

        if msg.guild_id.is_none() {
            msg.reply(ctx.cache_http, "That only works in a server.")
                .await?;
            return Ok(EventHandled::Yes);
        }

        match name {
            "join" => self.join(ctx, msg).await?,
            "play" => self.play(ctx, msg, args).await?,
            "skip" => self.skip(ctx, msg).await?,
            "stop" => self.stop(ctx, msg).await?,
            "leave" => self.leave(ctx, msg).await?,
            "queue" => self.queue(ctx, msg).await?,
            _ => self.now_playing(ctx, msg).await?,
        }
        Ok(EventHandled::Yes)
    }
}
