//! Contains logic for turning chat-platform callbacks into a narrow stream of typed
//! events. [discord::DiscordGateway] is the production source; everything downstream of
//! the event channel is platform-agnostic.

pub mod discord;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::daemon::ingest::voice::VoicePresence;

/// Identity of the user an event is about, snapshotted at event time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorRef {
    pub id: Arc<str>,
    pub display_name: Arc<str>,
    pub avatar: Option<Arc<str>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildRef {
    pub id: Arc<str>,
    pub name: Arc<str>,
}

/// One observed platform event, already validated to carry actor and guild identity.
/// Events missing either are dropped at translation, not represented here.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    MessageCreated {
        actor: ActorRef,
        guild: GuildRef,
    },
    MessageDeleted {
        actor: ActorRef,
        guild: GuildRef,
    },
    ReactionAdded {
        actor: ActorRef,
        author: ActorRef,
        guild: GuildRef,
    },
    ReactionRemoved {
        actor: ActorRef,
        author: ActorRef,
        guild: GuildRef,
    },
    VoiceStateChanged {
        actor: ActorRef,
        guild: GuildRef,
        old: VoicePresence,
        new: VoicePresence,
    },
    /// A command arriving over direct message, e.g. `!me`.
    DirectCommand {
        actor: ActorRef,
        text: String,
    },
}

/// Outbound side of the chat platform: sending direct-message replies. Kept separate
/// from the event stream so command handling can be tested with a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Responder: Sync + Send {
    async fn send_direct_messages(&self, user_id: &str, lines: Vec<String>) -> Result<()>;
}
