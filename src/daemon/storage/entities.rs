use std::sync::Arc;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Snapshot of the acting user at the moment an event was observed. Display names and
/// avatars change over time, so every record carries its own copy.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct UserSnapshot {
    pub id: Arc<str>,
    pub display_name: Arc<str>,
    #[serde(default)]
    pub avatar: Option<Arc<str>>,
}

/// Snapshot of the guild the event happened in.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct GuildSnapshot {
    pub id: Arc<str>,
    pub name: Arc<str>,
}

/// What happened. One variant per countable fact, so an impossible action/type
/// combination can't be constructed, let alone stored.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityKind {
    MessageAdded,
    MessageRemoved,
    /// The actor put a reaction on someone's message.
    ReactionAdded,
    ReactionRemoved,
    /// Someone reacted to a message this user authored.
    ReactionReceived,
    ReactionWithdrawn,
    /// An un-muted voice presence began. The record timestamp is the start instant.
    /// Stays unpaired until a matching [ActivityKind::VoiceSessionEnded] is appended.
    VoiceSessionStarted,
    /// A closed voice session. Carries both bounds so duration never requires pairing
    /// records at read time.
    VoiceSessionEnded {
        #[serde(with = "chrono::serde::ts_milliseconds")]
        started_at: DateTime<Utc>,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        ended_at: DateTime<Utc>,
    },
}

impl ActivityKind {
    /// Length of the closed session, if this is one.
    pub fn session_duration(&self) -> Option<Duration> {
        match self {
            ActivityKind::VoiceSessionEnded {
                started_at,
                ended_at,
            } => Some(*ended_at - *started_at),
            _ => None,
        }
    }
}

/// One immutable fact describing a single observed user action. The ledger is
/// append-only: corrections happen by appending new records, never by rewriting old ones.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct ActivityRecordEntity {
    pub user: UserSnapshot,
    pub guild: GuildSnapshot,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ActivityKind,
}

impl ActivityRecordEntity {
    pub fn new(
        user: UserSnapshot,
        guild: GuildSnapshot,
        timestamp: DateTime<Utc>,
        kind: ActivityKind,
    ) -> Self {
        Self {
            user,
            guild,
            timestamp,
            kind,
        }
    }
}
