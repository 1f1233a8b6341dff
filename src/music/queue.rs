//! Per-guild playback queue
//!
//! Each guild is either idle or playing exactly one [`Playback`].  The only way out of the playing
//! state is [`Queues::complete`] with the matching id (or [`Queues::clear`]), which is what keeps a
//! duplicated or late completion from advancing the queue a second time.

use super::{Playback, PlaybackId, TrackRequest};
use serenity::all::GuildId;
use std::collections::{HashMap, VecDeque};

/// Result of promoting the next request.
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    Start(Playback),
    Idle,
}

#[derive(Default)]
struct GuildQueue {
    pending: VecDeque<TrackRequest>,
    now_playing: Option<Playback>,
}

#[derive(Default)]
pub struct Queues {
    guilds: HashMap<GuildId, GuildQueue>,
    next_id: u64,
}

impl Queues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request.  Returns the number of requests waiting behind the now-playing slot.
    pub fn enqueue(&mut self, guild_id: GuildId, track: TrackRequest) -> usize {
        let queue = self.guilds.entry(guild_id).or_default();
        queue.pending.push_back(track);
        queue.pending.len()
    }

    /// Promote the front request to now-playing, or go idle if there is none.
    pub fn advance(&mut self, guild_id: GuildId) -> Transition {
        let id = PlaybackId(self.next_id);
        let queue = self.guilds.entry(guild_id).or_default();

        match queue.pending.pop_front() {
            Some(track) => {
                self.next_id += 1;
                let playback = Playback { id, track };
                queue.now_playing = Some(playback.clone());
                Transition::Start(playback)
            }
            None => {
                queue.now_playing = None;
                Transition::Idle
            }
        }
    }

    /// Accept a completion for `id`.  Returns false, and changes nothing, if `id` is not the
    /// guild's current playback.
    pub fn complete(&mut self, guild_id: GuildId, id: PlaybackId) -> bool {
        let Some(queue) = self.guilds.get_mut(&guild_id) else {
            return false;
        };

        match &queue.now_playing {
            Some(playback) if playback.id == id => {
                queue.now_playing = None;
                true
            }
            _ => false,
        }
    }

    pub fn current(&self, guild_id: GuildId) -> Option<&Playback> {
        self.guilds
            .get(&guild_id)
            .and_then(|q| q.now_playing.as_ref())
    }

    pub fn upcoming(&self, guild_id: GuildId) -> Vec<TrackRequest> {
        self.guilds
            .get(&guild_id)
            .map(|q| q.pending.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_playing(&self, guild_id: GuildId) -> bool {
        self.current(guild_id).is_some()
    }

    /// Drop every pending request and the now-playing slot.
    pub fn clear(&mut self, guild_id: GuildId) {
        self.guilds.remove(&guild_id);
    }
}
