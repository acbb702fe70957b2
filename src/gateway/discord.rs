use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use twilight_cache_inmemory::{InMemoryCache, ResourceType};
use twilight_gateway::{
    CloseFrame, Event, EventTypeFlags, Intents, Shard, ShardId, StreamExt as _,
};
use twilight_http::Client as HttpClient;
use twilight_model::gateway::payload::incoming::{MessageCreate, MessageDelete, VoiceStateUpdate};
use twilight_model::id::Id;
use twilight_model::id::marker::{GuildMarker, MessageMarker, UserMarker};
use twilight_model::user::User;

use crate::daemon::ingest::voice::VoicePresence;

use super::{ActorRef, GatewayEvent, GuildRef, Responder};

/// Runs a single gateway shard and translates its payloads into [GatewayEvent]s on the
/// channel. The in-memory cache exists to answer what the raw payloads don't carry:
/// deleted-message authors, reaction-target authors, guild names and previous voice
/// states.
pub struct DiscordGateway {
    shard: Shard,
    http: Arc<HttpClient>,
    cache: InMemoryCache,
    sender: mpsc::Sender<GatewayEvent>,
    shutdown: CancellationToken,
}

impl DiscordGateway {
    pub fn new(
        token: String,
        sender: mpsc::Sender<GatewayEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        let intents = Intents::GUILDS
            | Intents::GUILD_MESSAGES
            | Intents::GUILD_MESSAGE_REACTIONS
            | Intents::GUILD_VOICE_STATES
            | Intents::DIRECT_MESSAGES
            | Intents::MESSAGE_CONTENT;

        let shard = Shard::new(ShardId::ONE, token.clone(), intents);
        let http = Arc::new(HttpClient::new(token));
        let cache = InMemoryCache::builder()
            .resource_types(
                ResourceType::GUILD
                    | ResourceType::CHANNEL
                    | ResourceType::MESSAGE
                    | ResourceType::USER
                    | ResourceType::MEMBER
                    | ResourceType::VOICE_STATE,
            )
            .build();

        Self {
            shard,
            http,
            cache,
            sender,
            shutdown,
        }
    }

    /// Outbound handle for DM replies, usable independently of the event loop.
    pub fn responder(&self) -> Box<dyn Responder> {
        Box::new(DiscordResponder {
            http: self.http.clone(),
        })
    }

    /// Executes the shard event loop until the gateway closes or shutdown is requested.
    pub async fn run(mut self) -> Result<()> {
        info!("Shard {} started. Listening for events.", self.shard.id());
        let sender = self.shard.sender();
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = sender.close(CloseFrame::NORMAL);
                    // Keep draining so the close frame actually goes out.
                    while let Some(item) = self.shard.next_event(EventTypeFlags::all()).await {
                        if item.is_err() {
                            break;
                        }
                    }
                    return Ok(());
                }
                item = self.shard.next_event(EventTypeFlags::all()) => {
                    match item {
                        Some(Ok(event)) => self.process(event).await,
                        Some(Err(err)) => {
                            error!("Error receiving gateway event: {err:?}");
                        }
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    async fn process(&mut self, event: Event) {
        // Translation happens before the cache absorbs the event: deletes and voice
        // updates need the state as it was when the event fired.
        let translated = self.translate(&event);
        self.cache.update(&event);

        if let Some(translated) = translated {
            debug!("Forwarding event {:?}", translated);
            if let Err(e) = self.sender.send(translated).await {
                error!("Event channel closed, dropping event: {e}");
            }
        }
    }

    fn translate(&self, event: &Event) -> Option<GatewayEvent> {
        match event {
            Event::Ready(ready) => {
                info!(
                    "Gateway ready as {} (ID={})",
                    ready.user.name, ready.user.id
                );
                None
            }
            Event::MessageCreate(msg) => self.translate_message_create(msg),
            Event::MessageDelete(del) => self.translate_message_delete(del),
            Event::ReactionAdd(reaction) => self
                .translate_reaction(reaction.guild_id, reaction.message_id, reaction.user_id)
                .map(|(actor, author, guild)| GatewayEvent::ReactionAdded {
                    actor,
                    author,
                    guild,
                }),
            Event::ReactionRemove(reaction) => self
                .translate_reaction(reaction.guild_id, reaction.message_id, reaction.user_id)
                .map(|(actor, author, guild)| GatewayEvent::ReactionRemoved {
                    actor,
                    author,
                    guild,
                }),
            Event::VoiceStateUpdate(voice) => self.translate_voice_update(voice),
            _ => {
                trace!("Unhandled event: {event:?}");
                None
            }
        }
    }

    fn translate_message_create(&self, msg: &MessageCreate) -> Option<GatewayEvent> {
        let actor = actor_from_user(&msg.author)?;
        match msg.guild_id {
            Some(guild_id) => Some(GatewayEvent::MessageCreated {
                actor,
                guild: self.guild_ref(guild_id),
            }),
            // Direct messages are the command surface, not countable guild activity.
            None => Some(GatewayEvent::DirectCommand {
                actor,
                text: msg.content.clone(),
            }),
        }
    }

    fn translate_message_delete(&self, del: &MessageDelete) -> Option<GatewayEvent> {
        let guild_id = del.guild_id?;
        let Some(author_id) = self.cache.message(del.id).map(|m| m.author()) else {
            warn!("Deleted message {} not cached, dropping event", del.id);
            return None;
        };
        let Some(actor) = self.cached_actor(author_id) else {
            debug!(
                "Author of deleted message {} not cached or a bot, dropping event",
                del.id
            );
            return None;
        };

        Some(GatewayEvent::MessageDeleted {
            actor,
            guild: self.guild_ref(guild_id),
        })
    }

    fn translate_reaction(
        &self,
        guild_id: Option<Id<GuildMarker>>,
        message_id: Id<MessageMarker>,
        user_id: Id<UserMarker>,
    ) -> Option<(ActorRef, ActorRef, GuildRef)> {
        let guild_id = guild_id?;
        let Some(actor) = self.cached_actor(user_id) else {
            debug!("Reacting user {user_id} not cached or a bot, dropping event");
            return None;
        };
        let Some(author_id) = self.cache.message(message_id).map(|m| m.author()) else {
            warn!("Reacted-to message {message_id} not cached, dropping event");
            return None;
        };
        let author = self.cached_actor(author_id)?;

        Some((actor, author, self.guild_ref(guild_id)))
    }

    fn translate_voice_update(&self, voice: &VoiceStateUpdate) -> Option<GatewayEvent> {
        let guild_id = voice.guild_id?;
        let actor = match voice.member.as_ref() {
            Some(member) => actor_from_user(&member.user),
            None => self.cached_actor(voice.user_id),
        };
        let Some(actor) = actor else {
            debug!(
                "Voice user {} not cached or a bot, dropping event",
                voice.user_id
            );
            return None;
        };

        let old = self
            .cache
            .voice_state(voice.user_id, guild_id)
            .map(|cached| VoicePresence {
                channel: Some(cached.channel_id().to_string().into()),
                muted: cached.self_mute() || cached.mute(),
            })
            .unwrap_or_else(VoicePresence::absent);

        let new = VoicePresence {
            channel: voice.channel_id.map(|id| id.to_string().into()),
            muted: voice.self_mute || voice.mute,
        };

        Some(GatewayEvent::VoiceStateChanged {
            actor,
            guild: self.guild_ref(guild_id),
            old,
            new,
        })
    }

    fn cached_actor(&self, user_id: Id<UserMarker>) -> Option<ActorRef> {
        self.cache
            .user(user_id)
            .and_then(|user| actor_from_user(&user))
    }

    fn guild_ref(&self, guild_id: Id<GuildMarker>) -> GuildRef {
        let name = self
            .cache
            .guild(guild_id)
            .map(|guild| Arc::from(guild.name()))
            .unwrap_or_else(|| guild_id.to_string().into());
        GuildRef {
            id: guild_id.to_string().into(),
            name,
        }
    }
}

/// Bots never produce an actor: all translated events pass through here, so activity
/// from other bots (including this one) is dropped uniformly.
fn actor_from_user(user: &User) -> Option<ActorRef> {
    if user.bot {
        debug!("Ignoring bot user {}", user.name);
        return None;
    }
    Some(ActorRef {
        id: user.id.to_string().into(),
        display_name: user
            .global_name
            .as_deref()
            .unwrap_or(&user.name)
            .into(),
        avatar: user.avatar.map(|hash| hash.to_string().into()),
    })
}

struct DiscordResponder {
    http: Arc<HttpClient>,
}

#[async_trait]
impl Responder for DiscordResponder {
    async fn send_direct_messages(&self, user_id: &str, lines: Vec<String>) -> Result<()> {
        let user_id: Id<UserMarker> = Id::new_checked(
            user_id
                .parse()
                .with_context(|| format!("Invalid user id {user_id}"))?,
        )
        .ok_or_else(|| anyhow!("User id can't be zero"))?;

        let channel = self
            .http
            .create_private_channel(user_id)
            .await?
            .model()
            .await?;

        for line in &lines {
            self.http.create_message(channel.id).content(line).await?;
        }
        Ok(())
    }
}
