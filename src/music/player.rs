use super::{
    queue::{Queues, Transition},
    transport::{AudioTransport, CompletionSender},
    Completion, Playback, TrackRequest,
};
use crate::log_internal;
use anyhow::Result;
use serenity::all::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::{
    mpsc::{self, UnboundedReceiver},
    Mutex,
};

/// Reasons a play request is turned away.  Nothing is queued when one of these is returned.
#[derive(Debug, PartialEq)]
pub enum PlaybackError {
    NotConnected,
    StartFailed { title: String, reason: String },
}

impl std::fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PlaybackError::NotConnected => write!(f, "I'm not connected to a voice channel"),
            PlaybackError::StartFailed { title, reason } => {
                write!(f, "Could not play `{}`: {}", title, reason)
            }
        }
    }
}

impl std::error::Error for PlaybackError {}

#[derive(Debug, PartialEq)]
pub enum Enqueued {
    Started(Playback),
    Queued { position: usize },
}

/// Drives the per-guild queues against an audio transport.
///
/// All queue mutations, and the transport calls that go with them, happen while holding one lock.
/// Completions arrive on a channel and are applied by [`Player::run`].
pub struct Player {
    queues: Mutex<Queues>,
    transport: Arc<dyn AudioTransport>,
    completions: CompletionSender,
}

impl Player {
    pub fn new(transport: Arc<dyn AudioTransport>) -> (Self, UnboundedReceiver<Completion>) {
        let (completions, rx) = mpsc::unbounded_channel();
        let player = Self {
            queues: Mutex::new(Queues::new()),
            transport,
            completions,
        };
        (player, rx)
    }

    pub async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()> {
        self.transport.connect(guild_id, channel_id).await
    }

    pub fn is_connected(&self, guild_id: GuildId) -> bool {
        self.transport.is_connected(guild_id)
    }

    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        track: TrackRequest,
    ) -> Result<Enqueued, PlaybackError> {
        if !self.transport.is_connected(guild_id) {
            return Err(PlaybackError::NotConnected);
        }

        let mut queues = self.queues.lock().await;
        let position = queues.enqueue(guild_id, track);
        if queues.is_playing(guild_id) {
            return Ok(Enqueued::Queued { position });
        }

        // Idle guilds have nothing pending, so the request just added is at the front.
        let Transition::Start(playback) = queues.advance(guild_id) else {
            return Ok(Enqueued::Queued { position });
        };

        match self.start(guild_id, &playback).await {
            Ok(()) => Ok(Enqueued::Started(playback)),
            Err(e) => {
                // Whatever was queued behind it gets its turn.
                self.start_next(&mut queues, guild_id).await;
                Err(PlaybackError::StartFailed {
                    title: playback.track.title,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Apply a completion reported by the transport.  Completions for anything other than the
    /// guild's current playback are ignored.
    pub async fn on_complete(&self, completion: Completion) -> Option<Playback> {
        let Completion {
            guild_id,
            playback_id,
            error,
        } = completion;

        let mut queues = self.queues.lock().await;
        if !queues.complete(guild_id, playback_id) {
            tracing::debug!(
                "Ignoring completion of playback {:?} in guild {}",
                playback_id,
                guild_id
            );
            return None;
        }

        if let Some(error) = error {
            tracing::warn!(
                "Playback {:?} in guild {} ended with an error: {}",
                playback_id,
                guild_id,
                error
            );
        }

        self.start_next(&mut queues, guild_id).await
    }

    /// Stop the current track.  The queue advances once the transport reports the track ended.
    pub async fn skip(&self, guild_id: GuildId) -> Option<TrackRequest> {
        let queues = self.queues.lock().await;
        let skipped = queues.current(guild_id)?.track.clone();
        self.transport.stop(guild_id).await;
        Some(skipped)
    }

    /// Empty the queue and stop playback.  Returns whether there was anything to stop.
    pub async fn stop(&self, guild_id: GuildId) -> bool {
        let mut queues = self.queues.lock().await;
        let had_tracks = queues.is_playing(guild_id) || !queues.upcoming(guild_id).is_empty();
        queues.clear(guild_id);
        self.transport.stop(guild_id).await;
        had_tracks
    }

    pub async fn leave(&self, guild_id: GuildId) -> Result<()> {
        self.stop(guild_id).await;
        self.transport.disconnect(guild_id).await
    }

    pub async fn current(&self, guild_id: GuildId) -> Option<TrackRequest> {
        self.queues
            .lock()
            .await
            .current(guild_id)
            .map(|playback| playback.track.clone())
    }

    /// Now-playing track and everything waiting behind it.
    pub async fn list(&self, guild_id: GuildId) -> (Option<TrackRequest>, Vec<TrackRequest>) {
        let queues = self.queues.lock().await;
        let current = queues
            .current(guild_id)
            .map(|playback| playback.track.clone());
        (current, queues.upcoming(guild_id))
    }

    /// Apply completions until every sender is gone.
    pub async fn run(self: Arc<Self>, mut completions: UnboundedReceiver<Completion>) {
        while let Some(completion) = completions.recv().await {
            self.on_complete(completion).await;
        }
    }

    async fn start(&self, guild_id: GuildId, playback: &Playback) -> Result<()> {
        self.transport
            .play(guild_id, playback, self.completions.clone())
            .await?;
        log_internal!(
            "Now playing `{}` in guild {}",
            playback.track.title,
            guild_id
        );
        Ok(())
    }

    // Promote requests until one starts or the queue runs dry.
    async fn start_next(&self, queues: &mut Queues, guild_id: GuildId) -> Option<Playback> {
        loop {
            match queues.advance(guild_id) {
                Transition::Start(playback) => match self.start(guild_id, &playback).await {
                    Ok(()) => return Some(playback),
                    Err(e) => tracing::warn!(
                        "Could not play `{}` in guild {}: {}",
                        playback.track.title,
                        guild_id,
                        e
                    ),
                },
                Transition::Idle => {
                    log_internal!("Queue in guild {} finished", guild_id);
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::music::PlaybackId;
    use anyhow::anyhow;
    use serenity::all::UserId;
    use std::collections::{HashMap, HashSet};

    /// In-memory transport.  Stopping a track reports its completion twice, the way a track that
    /// is both stopped and errored would.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        connected: std::sync::Mutex<HashSet<GuildId>>,
        playing: std::sync::Mutex<HashMap<GuildId, (PlaybackId, CompletionSender)>>,
        pub(crate) played: std::sync::Mutex<Vec<String>>,
        pub(crate) broken: std::sync::Mutex<HashSet<String>>,
    }

    #[serenity::async_trait]
    impl AudioTransport for FakeTransport {
        async fn connect(&self, guild_id: GuildId, _channel_id: ChannelId) -> Result<()> {
            self.connected.lock().unwrap().insert(guild_id);
            Ok(())
        }

        fn is_connected(&self, guild_id: GuildId) -> bool {
            self.connected.lock().unwrap().contains(&guild_id)
        }

        async fn play(
            &self,
            guild_id: GuildId,
            playback: &Playback,
            on_complete: CompletionSender,
        ) -> Result<()> {
            if self.broken.lock().unwrap().contains(&playback.track.title) {
                return Err(anyhow!("unplayable"));
            }
            self.played
                .lock()
                .unwrap()
                .push(playback.track.title.clone());
            self.playing
                .lock()
                .unwrap()
                .insert(guild_id, (playback.id, on_complete));
            Ok(())
        }

        async fn stop(&self, guild_id: GuildId) {
            if let Some((playback_id, sink)) = self.playing.lock().unwrap().remove(&guild_id) {
                for _ in 0..2 {
                    sink.send(Completion {
                        guild_id,
                        playback_id,
                        error: None,
                    })
                    .unwrap();
                }
            }
        }

        async fn disconnect(&self, guild_id: GuildId) -> Result<()> {
            self.connected.lock().unwrap().remove(&guild_id);
            Ok(())
        }
    }

    pub(crate) fn track(title: &str) -> TrackRequest {
        TrackRequest {
            source: title.to_string(),
            stream_url: format!("https://example.com/{}", title.replace(' ', "-")),
            title: title.to_string(),
            duration_secs: Some(180),
            thumbnail: None,
            requester: UserId::new(42),
        }
    }

    async fn connected_player(
        guild_id: GuildId,
    ) -> (Arc<FakeTransport>, Player, UnboundedReceiver<Completion>) {
        let transport = Arc::new(FakeTransport::default());
        let (player, rx) = Player::new(transport.clone());
        player.connect(guild_id, ChannelId::new(5)).await.unwrap();
        (transport, player, rx)
    }

    async fn drain(player: &Player, rx: &mut UnboundedReceiver<Completion>) -> usize {
        let mut advances = 0;
        while let Ok(completion) = rx.try_recv() {
            if player.on_complete(completion).await.is_some() {
                advances += 1;
            }
        }
        advances
    }

    #[tokio::test]
    async fn rejects_requests_without_voice_connection() {
        let transport = Arc::new(FakeTransport::default());
        let (player, _rx) = Player::new(transport.clone());
        let gid = GuildId::new(1);

        let result = player.enqueue(gid, track("Song 1")).await;
        assert_eq!(result, Err(PlaybackError::NotConnected));
        assert_eq!(player.list(gid).await, (None, vec![]));
        assert!(transport.played.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_request_starts_and_later_ones_queue() {
        let gid = GuildId::new(1);
        let (_transport, player, _rx) = connected_player(gid).await;

        let first = player.enqueue(gid, track("Song 1")).await.unwrap();
        assert!(matches!(first, Enqueued::Started(ref p) if p.track.title == "Song 1"));

        assert_eq!(
            player.enqueue(gid, track("Song 2")).await,
            Ok(Enqueued::Queued { position: 1 })
        );
        assert_eq!(
            player.enqueue(gid, track("Song 3")).await,
            Ok(Enqueued::Queued { position: 2 })
        );

        let (current, upcoming) = player.list(gid).await;
        assert_eq!(current.unwrap().title, "Song 1");
        assert_eq!(upcoming, vec![track("Song 2"), track("Song 3")]);
    }

    #[tokio::test]
    async fn skip_advances_exactly_once() {
        let gid = GuildId::new(1);
        let (transport, player, mut rx) = connected_player(gid).await;
        for title in ["Song 1", "Song 2", "Song 3"] {
            player.enqueue(gid, track(title)).await.unwrap();
        }

        let skipped = player.skip(gid).await.unwrap();
        assert_eq!(skipped.title, "Song 1");
        // Nothing moves until the transport reports the end of the track
        assert_eq!(player.current(gid).await.unwrap().title, "Song 1");

        assert_eq!(drain(&player, &mut rx).await, 1);
        assert_eq!(player.current(gid).await.unwrap().title, "Song 2");
        assert_eq!(player.list(gid).await.1, vec![track("Song 3")]);
        assert_eq!(*transport.played.lock().unwrap(), vec!["Song 1", "Song 2"]);
    }

    #[tokio::test]
    async fn skip_when_idle_does_nothing() {
        let gid = GuildId::new(1);
        let (_transport, player, mut rx) = connected_player(gid).await;

        assert!(player.skip(gid).await.is_none());
        assert_eq!(drain(&player, &mut rx).await, 0);
    }

    #[tokio::test]
    async fn stop_clears_and_late_completions_are_ignored() {
        let gid = GuildId::new(1);
        let (transport, player, mut rx) = connected_player(gid).await;
        player.enqueue(gid, track("Song 1")).await.unwrap();
        player.enqueue(gid, track("Song 2")).await.unwrap();

        assert!(player.stop(gid).await);
        assert_eq!(player.list(gid).await, (None, vec![]));

        assert_eq!(drain(&player, &mut rx).await, 0);
        assert_eq!(player.list(gid).await, (None, vec![]));
        assert_eq!(*transport.played.lock().unwrap(), vec!["Song 1"]);

        assert!(!player.stop(gid).await);
    }

    #[tokio::test]
    async fn errored_completion_still_advances() {
        let gid = GuildId::new(1);
        let (_transport, player, _rx) = connected_player(gid).await;
        let Ok(Enqueued::Started(first)) = player.enqueue(gid, track("Song 1")).await else {
            panic!("expected first track to start");
        };
        player.enqueue(gid, track("Song 2")).await.unwrap();

        let next = player
            .on_complete(Completion {
                guild_id: gid,
                playback_id: first.id,
                error: Some("stream reset".to_string()),
            })
            .await;
        assert_eq!(next.unwrap().track.title, "Song 2");
    }

    #[tokio::test]
    async fn natural_end_of_last_track_goes_idle() {
        let gid = GuildId::new(1);
        let (_transport, player, _rx) = connected_player(gid).await;
        let Ok(Enqueued::Started(first)) = player.enqueue(gid, track("Song 1")).await else {
            panic!("expected first track to start");
        };

        let next = player
            .on_complete(Completion {
                guild_id: gid,
                playback_id: first.id,
                error: None,
            })
            .await;
        assert!(next.is_none());
        assert!(player.current(gid).await.is_none());
    }

    #[tokio::test]
    async fn unplayable_tracks_are_passed_over() {
        let gid = GuildId::new(1);
        let (transport, player, mut rx) = connected_player(gid).await;
        transport
            .broken
            .lock()
            .unwrap()
            .insert("Broken".to_string());

        player.enqueue(gid, track("Song 1")).await.unwrap();
        player.enqueue(gid, track("Broken")).await.unwrap();
        player.enqueue(gid, track("Song 3")).await.unwrap();

        player.skip(gid).await;
        drain(&player, &mut rx).await;
        assert_eq!(player.current(gid).await.unwrap().title, "Song 3");
        assert!(player.list(gid).await.1.is_empty());
    }

    #[tokio::test]
    async fn unplayable_first_request_is_reported() {
        let gid = GuildId::new(1);
        let (transport, player, _rx) = connected_player(gid).await;
        transport
            .broken
            .lock()
            .unwrap()
            .insert("Broken".to_string());

        let result = player.enqueue(gid, track("Broken")).await;
        assert!(matches!(result, Err(PlaybackError::StartFailed { .. })));
        assert_eq!(player.list(gid).await, (None, vec![]));
    }

    #[tokio::test]
    async fn leave_disconnects() {
        let gid = GuildId::new(1);
        let (_transport, player, _rx) = connected_player(gid).await;
        player.enqueue(gid, track("Song 1")).await.unwrap();

        player.leave(gid).await.unwrap();
        assert!(!player.is_connected(gid));
        assert!(player.current(gid).await.is_none());
    }
}
