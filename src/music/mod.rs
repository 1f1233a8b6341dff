pub mod player;
pub mod queue;
pub mod source;
pub mod transport;

use serenity::all::{GuildId, UserId};

/// A resolved play request, immutable once enqueued.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackRequest {
    /// What the user asked for: a URL or a search string.
    pub source: String,
    /// Locator handed to the audio transport.
    pub stream_url: String,
    pub title: String,
    pub duration_secs: Option<u64>,
    pub thumbnail: Option<String>,
    pub requester: UserId,
}

/// Identifies one start of one track.  A fresh id is issued every time a track is promoted to the
/// now-playing slot, so completions can be matched against the playback they belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlaybackId(pub u64);

#[derive(Clone, Debug, PartialEq)]
pub struct Playback {
    pub id: PlaybackId,
    pub track: TrackRequest,
}

/// Reported by the audio transport when a playback ends, normally or not.
#[derive(Clone, Debug)]
pub struct Completion {
    pub guild_id: GuildId,
    pub playback_id: PlaybackId,
    pub error: Option<String>,
}

/// Format seconds as `m:ss`, or `h:mm:ss` past the hour.
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}
