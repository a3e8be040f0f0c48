//! Playback clock reconciliation
//!
//! A lobby stores the position as of `last_update`; readers extrapolate with
//! wall-clock time while playing.

use crate::types::{Lobby, VideoState};

/// Added to resync reads to cover the time between computing and applying the position
pub const RESYNC_LOOKAHEAD_SECS: f64 = 0.75;

/// Resync reads only look ahead once playback is past this point
pub const RESYNC_MIN_POSITION_SECS: f64 = 3.0;

impl Lobby {
    /// Playback position at `now_ms`. `request_fresh` marks a client-initiated resync.
    pub fn effective_time(&self, now_ms: i64, request_fresh: bool) -> f64 {
        let mut time = self.reference_time;
        if request_fresh && self.playing && self.reference_time > RESYNC_MIN_POSITION_SECS {
            time += RESYNC_LOOKAHEAD_SECS;
        }
        if self.playing {
            time += (now_ms - self.last_update) as f64 / 1000.0;
        }
        time
    }

    pub fn video_state(&self, now_ms: i64, request_fresh: bool) -> VideoState {
        VideoState {
            url: self.media_url.clone(),
            subsurl: self.subtitle_url.clone(),
            play: self.playing,
            time: self.effective_time(now_ms, request_fresh),
        }
    }

    /// Only flips the flag, the clock is resynced by `set_time`
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn set_time(&mut self, seconds: f64, now_ms: i64) {
        self.reference_time = seconds;
        self.last_update = now_ms;
    }

    pub fn set_url(&mut self, url: String, subtitle_url: String, now_ms: i64) {
        self.media_url = url;
        self.subtitle_url = subtitle_url;
        self.reference_time = 0.0;
        self.playing = false;
        self.last_update = now_ms;
    }
}
