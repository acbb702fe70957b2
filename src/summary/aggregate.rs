use chrono::Duration;

use crate::daemon::storage::entities::{ActivityKind, ActivityRecordEntity};

/// Read-time projection of a user's records. Never persisted; recomputed on every query
/// so the ledger stays the single source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserActivitySummary {
    pub messages_added: u64,
    pub messages_removed: u64,
    pub reactions_added: u64,
    pub reactions_removed: u64,
    pub reactions_received: u64,
    pub reactions_withdrawn: u64,
    pub voice_time: Duration,
}

impl Default for UserActivitySummary {
    fn default() -> Self {
        Self {
            messages_added: 0,
            messages_removed: 0,
            reactions_added: 0,
            reactions_removed: 0,
            reactions_received: 0,
            reactions_withdrawn: 0,
            voice_time: Duration::zero(),
        }
    }
}

impl UserActivitySummary {
    fn absorb(&mut self, kind: &ActivityKind) {
        match kind {
            ActivityKind::MessageAdded => self.messages_added += 1,
            ActivityKind::MessageRemoved => self.messages_removed += 1,
            ActivityKind::ReactionAdded => self.reactions_added += 1,
            ActivityKind::ReactionRemoved => self.reactions_removed += 1,
            ActivityKind::ReactionReceived => self.reactions_received += 1,
            ActivityKind::ReactionWithdrawn => self.reactions_withdrawn += 1,
            // An open session has no duration yet. It becomes countable once the
            // matching end record lands.
            ActivityKind::VoiceSessionStarted => {}
            ActivityKind::VoiceSessionEnded {
                started_at,
                ended_at,
            } => self.voice_time += *ended_at - *started_at,
        }
    }

    pub fn net_messages(&self) -> i64 {
        self.messages_added as i64 - self.messages_removed as i64
    }

    pub fn net_reactions_added(&self) -> i64 {
        self.reactions_added as i64 - self.reactions_removed as i64
    }

    pub fn net_reactions_received(&self) -> i64 {
        self.reactions_received as i64 - self.reactions_withdrawn as i64
    }
}

/// Folds records into a summary. Every step only increments an independent counter, so
/// the result does not depend on the order the store returned the records in.
///
/// Returns [None] for an empty record set: "we know nothing about this user" is a
/// different answer than "this user has zero of everything".
pub fn summarize<'a>(
    records: impl IntoIterator<Item = &'a ActivityRecordEntity>,
) -> Option<UserActivitySummary> {
    let mut records = records.into_iter().peekable();
    records.peek()?;

    let mut summary = UserActivitySummary::default();
    for record in records {
        summary.absorb(&record.kind);
    }
    Some(summary)
}
