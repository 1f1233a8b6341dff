//! Voice connections and audio output
//!
//! The player only talks to [`AudioTransport`].  The songbird implementation below reports track
//! completion back over a channel rather than calling into the player from inside songbird's
//! event handler.

use super::{Completion, Playback};
use anyhow::{anyhow, Result};
use serenity::all::{ChannelId, GuildId};
use songbird::{
    input::YoutubeDl,
    tracks::PlayMode,
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

pub type CompletionSender = UnboundedSender<Completion>;

#[serenity::async_trait]
pub trait AudioTransport: Send + Sync {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()>;
    fn is_connected(&self, guild_id: GuildId) -> bool;
    /// Start `playback`, replacing anything currently playing.  When it ends, one or more
    /// [`Completion`]s carrying its id are sent on `on_complete`.
    async fn play(
        &self,
        guild_id: GuildId,
        playback: &Playback,
        on_complete: CompletionSender,
    ) -> Result<()>;
    async fn stop(&self, guild_id: GuildId);
    async fn disconnect(&self, guild_id: GuildId) -> Result<()>;
}

pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    http_client: reqwest::Client,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>, http_client: reqwest::Client) -> Self {
        Self {
            manager,
            http_client,
        }
    }
}

#[serenity::async_trait]
impl AudioTransport for SongbirdTransport {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()> {
        self.manager
            .join(guild_id, channel_id)
            .await
            .map(|_| ())
            .map_err(|e| anyhow!("Could not join voice channel {}: {}", channel_id, e))
    }

    fn is_connected(&self, guild_id: GuildId) -> bool {
        self.manager.get(guild_id).is_some()
    }

    async fn play(
        &self,
        guild_id: GuildId,
        playback: &Playback,
        on_complete: CompletionSender,
    ) -> Result<()> {
        let call = self
            .manager
            .get(guild_id)
            .ok_or(anyhow!("No voice connection in guild {}", guild_id))?;

        let src = YoutubeDl::new(self.http_client.clone(), playback.track.stream_url.clone());

        let mut handler = call.lock().await;
        let track_handle = handler.play_only_input(src.into());

        for event in [TrackEvent::End, TrackEvent::Error] {
            track_handle
                .add_event(
                    Event::Track(event),
                    TrackEndNotifier {
                        completion: Completion {
                            guild_id,
                            playback_id: playback.id,
                            error: None,
                        },
                        on_complete: on_complete.clone(),
                    },
                )
                .map_err(|e| anyhow!("Could not watch track `{}`: {}", playback.track.title, e))?;
        }

        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) {
        if let Some(call) = self.manager.get(guild_id) {
            call.lock().await.stop();
        }
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<()> {
        if self.manager.get(guild_id).is_none() {
            return Ok(());
        }
        self.manager
            .remove(guild_id)
            .await
            .map_err(|e| anyhow!("Could not leave voice in guild {}: {}", guild_id, e))
    }
}

struct TrackEndNotifier {
    completion: Completion,
    on_complete: CompletionSender,
}

#[serenity::async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut completion = self.completion.clone();

        if let EventContext::Track(tracks) = ctx {
            completion.error = tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{:?}", e)),
                _ => None,
            });
        }

        // The receiver only goes away at shutdown.
        let _ = self.on_complete.send(completion);

        // Remove this handler from the track.
        Some(Event::Cancel)
    }
}
