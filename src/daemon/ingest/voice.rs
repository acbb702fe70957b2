use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, warn};

/// A user's voice presence as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePresence {
    pub channel: Option<Arc<str>>,
    pub muted: bool,
}

impl VoicePresence {
    pub fn absent() -> Self {
        Self {
            channel: None,
            muted: false,
        }
    }

    /// Muted time does not count towards voice activity, so a muted user in a channel is
    /// treated the same as a user outside any channel.
    fn is_active(&self) -> bool {
        self.channel.is_some() && !self.muted
    }
}

/// Outcome of observing one voice state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceTransition {
    /// A session opened. The instant is the session start.
    Started(DateTime<Utc>),
    /// The open session closed.
    Ended {
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    },
}

/// Pairs raw voice state changes into sessions, one open session at most per
/// (guild, user).
///
/// A session runs while the user is in a channel and un-muted; muting pauses it, so a
/// mute/unmute pair inside one channel visit produces two sessions. Transitions fire only
/// on the edge between the old and new presence. Moving between channels without a mute
/// change keeps the current session open, and repeated identical signals are no-ops.
#[derive(Default)]
pub struct VoiceSessionTracker {
    open: HashMap<(Arc<str>, Arc<str>), DateTime<Utc>>,
}

impl VoiceSessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(
        &mut self,
        guild_id: &Arc<str>,
        user_id: &Arc<str>,
        old: &VoicePresence,
        new: &VoicePresence,
        now: DateTime<Utc>,
    ) -> Option<VoiceTransition> {
        match (old.is_active(), new.is_active()) {
            (false, true) => self.start(guild_id, user_id, now),
            (true, false) => self.end(guild_id, user_id, now),
            _ => None,
        }
    }

    fn start(
        &mut self,
        guild_id: &Arc<str>,
        user_id: &Arc<str>,
        now: DateTime<Utc>,
    ) -> Option<VoiceTransition> {
        let key = (guild_id.clone(), user_id.clone());
        if let Some(previous) = self.open.insert(key, now) {
            // Shouldn't happen with edge-triggered transitions. Restart the session from
            // now rather than double-count the overlap.
            warn!(
                "User {user_id} in guild {guild_id} already had an open session from {previous}, restarting"
            );
        }
        Some(VoiceTransition::Started(now))
    }

    fn end(
        &mut self,
        guild_id: &Arc<str>,
        user_id: &Arc<str>,
        now: DateTime<Utc>,
    ) -> Option<VoiceTransition> {
        let key = (guild_id.clone(), user_id.clone());
        let Some(started_at) = self.open.remove(&key) else {
            // Never fabricate a session for an end we didn't see the start of.
            warn!("No open voice session for user {user_id} in guild {guild_id}, ignoring end");
            return None;
        };

        if now < started_at {
            error!(
                "Voice session for user {user_id} in guild {guild_id} would end at {now} before starting at {started_at}, dropping"
            );
            return None;
        }

        Some(VoiceTransition::Ended {
            started_at,
            ended_at: now,
        })
    }
}
