pub mod voice;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info, warn};

use crate::{
    daemon::storage::{
        activity_store::ActivityStore,
        entities::{ActivityKind, ActivityRecordEntity, GuildSnapshot, UserSnapshot},
    },
    gateway::{ActorRef, GatewayEvent, GuildRef, Responder},
    summary::{
        format::{NO_INFORMATION, summary_messages},
        query::QueryService,
    },
    utils::clock::Clock,
};

use voice::{VoicePresence, VoiceSessionTracker, VoiceTransition};

/// Represents the write-side event loop. Receives translated platform events one at a
/// time, turns them into activity records and appends them through the store port.
/// Direct-message commands are answered from here as well, since they arrive on the same
/// stream.
///
/// Processing one event at a time is what keeps voice pairing safe: two rapid events for
/// the same user can never race on the open-session state.
pub struct IngestModule<S: ActivityStore> {
    receiver: Receiver<GatewayEvent>,
    store: S,
    queries: QueryService<S>,
    tracker: VoiceSessionTracker,
    responder: Box<dyn Responder>,
    time_provider: Box<dyn Clock>,
}

impl<S: ActivityStore + Clone> IngestModule<S> {
    pub fn new(
        receiver: Receiver<GatewayEvent>,
        store: S,
        responder: Box<dyn Responder>,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            receiver,
            queries: QueryService::new(store.clone()),
            store,
            tracker: VoiceSessionTracker::new(),
            responder,
            time_provider,
        }
    }

    /// Executes the ingest event loop. Returns once the gateway side drops its sender.
    pub async fn run(mut self) -> Result<()> {
        while let Some(event) = self.receiver.recv().await {
            debug!("Processing event {:?}", event);
            match self.handle(event).await {
                Ok(_) => info!("Processed event"),
                Err(e) => {
                    // Individual failures are logged and never stop the loop.
                    error!("Error processing event: {e:?}")
                }
            }
        }
        Ok(())
    }

    async fn handle(&mut self, event: GatewayEvent) -> Result<()> {
        let now = self.time_provider.time();
        let records = match event {
            GatewayEvent::MessageCreated { actor, guild } => {
                vec![build_record(actor, &guild, now, ActivityKind::MessageAdded)]
            }
            GatewayEvent::MessageDeleted { actor, guild } => {
                vec![build_record(actor, &guild, now, ActivityKind::MessageRemoved)]
            }
            GatewayEvent::ReactionAdded {
                actor,
                author,
                guild,
            } => vec![
                build_record(actor, &guild, now, ActivityKind::ReactionAdded),
                build_record(author, &guild, now, ActivityKind::ReactionReceived),
            ],
            GatewayEvent::ReactionRemoved {
                actor,
                author,
                guild,
            } => vec![
                build_record(actor, &guild, now, ActivityKind::ReactionRemoved),
                build_record(author, &guild, now, ActivityKind::ReactionWithdrawn),
            ],
            GatewayEvent::VoiceStateChanged {
                actor,
                guild,
                old,
                new,
            } => self.voice_records(actor, guild, &old, &new, now),
            GatewayEvent::DirectCommand { actor, text } => {
                return self.handle_command(actor, &text).await;
            }
        };

        if !records.is_empty() {
            self.store.append(records).await?;
        }
        Ok(())
    }

    fn voice_records(
        &mut self,
        actor: ActorRef,
        guild: GuildRef,
        old: &VoicePresence,
        new: &VoicePresence,
        now: DateTime<Utc>,
    ) -> Vec<ActivityRecordEntity> {
        match self.tracker.observe(&guild.id, &actor.id, old, new, now) {
            Some(VoiceTransition::Started(at)) => {
                vec![build_record(actor, &guild, at, ActivityKind::VoiceSessionStarted)]
            }
            Some(VoiceTransition::Ended {
                started_at,
                ended_at,
            }) => vec![build_record(
                actor,
                &guild,
                ended_at,
                ActivityKind::VoiceSessionEnded {
                    started_at,
                    ended_at,
                },
            )],
            None => vec![],
        }
    }

    async fn handle_command(&mut self, actor: ActorRef, text: &str) -> Result<()> {
        let text = text.trim();
        let Some(argument) = text.strip_prefix("!me") else {
            debug!("Ignoring direct message without a known command");
            return Ok(());
        };

        let argument = argument.trim();
        let summary = if argument.is_empty() {
            self.queries.full_summary(&actor.id).await
        } else if let Ok(days) = argument.parse::<u32>() {
            let end = self.time_provider.time();
            // Subtracting an absurd day count would leave the representable time range.
            let Some(start) = end.checked_sub_signed(Duration::days(days.into())) else {
                debug!("Ignoring !me with out-of-range day count {days}");
                return Ok(());
            };
            self.queries.range_summary(&actor.id, start, end).await
        } else {
            debug!("Ignoring malformed !me argument {argument:?}");
            return Ok(());
        };

        let lines = match summary {
            Ok(Some(summary)) => summary_messages(&actor.display_name, &summary),
            Ok(None) => vec![NO_INFORMATION.to_string()],
            Err(e) => {
                // A query the user asked for degrades to "no information" instead of
                // surfacing a storage error in chat.
                warn!("Summary query for user {} failed: {e:?}", actor.id);
                vec![NO_INFORMATION.to_string()]
            }
        };

        self.responder.send_direct_messages(&actor.id, lines).await
    }
}

fn build_record(
    actor: ActorRef,
    guild: &GuildRef,
    timestamp: DateTime<Utc>,
    kind: ActivityKind,
) -> ActivityRecordEntity {
    ActivityRecordEntity::new(
        UserSnapshot {
            id: actor.id,
            display_name: actor.display_name,
            avatar: actor.avatar,
        },
        GuildSnapshot {
            id: guild.id.clone(),
            name: guild.name.clone(),
        },
        timestamp,
        kind,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tokio::sync::mpsc;

    use crate::{
        daemon::storage::activity_store::memory::MemoryActivityStore,
        gateway::MockResponder,
        utils::logging::TEST_LOGGING,
    };

    use super::*;

    #[derive(Clone)]
    struct TestClock {
        now: Arc<Mutex<DateTime<Utc>>>,
    }

    impl TestClock {
        fn starting_at(now: DateTime<Utc>) -> Self {
            Self {
                now: Arc::new(Mutex::new(now)),
            }
        }

        fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    impl Clock for TestClock {
        fn time(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn actor(id: &str) -> ActorRef {
        ActorRef {
            id: id.into(),
            display_name: format!("user-{id}").into(),
            avatar: None,
        }
    }

    fn guild() -> GuildRef {
        GuildRef {
            id: "1".into(),
            name: "test guild".into(),
        }
    }

    fn in_channel(muted: bool) -> VoicePresence {
        VoicePresence {
            channel: Some("voice-general".into()),
            muted,
        }
    }

    fn test_module(
        store: MemoryActivityStore,
        responder: MockResponder,
        clock: TestClock,
    ) -> (mpsc::Sender<GatewayEvent>, IngestModule<MemoryActivityStore>) {
        let (sender, receiver) = mpsc::channel(64);
        let module = IngestModule::new(receiver, store, Box::new(responder), Box::new(clock));
        (sender, module)
    }

    #[tokio::test]
    async fn messages_and_me_command_flow_through_the_loop() -> Result<()> {
        *TEST_LOGGING;
        let store = MemoryActivityStore::new();
        let clock = TestClock::starting_at(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap());

        let mut responder = MockResponder::new();
        responder
            .expect_send_direct_messages()
            .withf(|user_id, lines| {
                user_id == "100"
                    && lines.contains(&"Messages sent: 2 (**+**3 | **-**1)".to_string())
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let (sender, module) = test_module(store.clone(), responder, clock);

        for _ in 0..3 {
            sender
                .send(GatewayEvent::MessageCreated {
                    actor: actor("100"),
                    guild: guild(),
                })
                .await?;
        }
        sender
            .send(GatewayEvent::MessageDeleted {
                actor: actor("100"),
                guild: guild(),
            })
            .await?;
        sender
            .send(GatewayEvent::DirectCommand {
                actor: actor("100"),
                text: "!me".into(),
            })
            .await?;
        drop(sender);

        module.run().await?;

        assert_eq!(store.all().len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn mute_toggle_produces_two_sessions_totalling_unmuted_time() -> Result<()> {
        *TEST_LOGGING;
        let store = MemoryActivityStore::new();
        let clock = TestClock::starting_at(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap());
        let (_sender, mut module) = test_module(store.clone(), MockResponder::new(), clock.clone());

        // Join unmuted, mute after 60s, unmute 30s later, leave 60s after that.
        let signals = [
            (VoicePresence::absent(), in_channel(false), 60),
            (in_channel(false), in_channel(true), 30),
            (in_channel(true), in_channel(false), 60),
            (in_channel(false), VoicePresence::absent(), 0),
        ];
        for (old, new, advance_after) in signals {
            module
                .handle(GatewayEvent::VoiceStateChanged {
                    actor: actor("100"),
                    guild: guild(),
                    old,
                    new,
                })
                .await?;
            clock.advance(Duration::seconds(advance_after));
        }

        let records = store.all();
        let counted = records
            .iter()
            .filter_map(|r| r.kind.session_duration())
            .fold(Duration::zero(), |acc, v| acc + v);

        assert_eq!(records.len(), 4);
        assert_eq!(counted, Duration::seconds(120));
        Ok(())
    }

    #[tokio::test]
    async fn unpaired_voice_end_stores_nothing() -> Result<()> {
        *TEST_LOGGING;
        let store = MemoryActivityStore::new();
        let clock = TestClock::starting_at(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap());
        let (_sender, mut module) = test_module(store.clone(), MockResponder::new(), clock);

        module
            .handle(GatewayEvent::VoiceStateChanged {
                actor: actor("100"),
                guild: guild(),
                old: in_channel(false),
                new: VoicePresence::absent(),
            })
            .await?;

        assert!(store.all().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn reactions_write_a_record_for_both_sides() -> Result<()> {
        *TEST_LOGGING;
        let store = MemoryActivityStore::new();
        let clock = TestClock::starting_at(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap());
        let (_sender, mut module) = test_module(store.clone(), MockResponder::new(), clock);

        module
            .handle(GatewayEvent::ReactionAdded {
                actor: actor("100"),
                author: actor("200"),
                guild: guild(),
            })
            .await?;

        let records = store.all();
        assert_eq!(records.len(), 2);
        assert_eq!(&*records[0].user.id, "100");
        assert_eq!(records[0].kind, ActivityKind::ReactionAdded);
        assert_eq!(&*records[1].user.id, "200");
        assert_eq!(records[1].kind, ActivityKind::ReactionReceived);
        Ok(())
    }

    #[tokio::test]
    async fn me_with_days_only_counts_the_trailing_range() -> Result<()> {
        *TEST_LOGGING;
        let store = MemoryActivityStore::new();
        let clock = TestClock::starting_at(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap());

        let mut responder = MockResponder::new();
        responder
            .expect_send_direct_messages()
            .withf(|_, lines| lines.contains(&"Messages sent: 1 (**+**1 | **-**0)".to_string()))
            .times(1)
            .returning(|_, _| Ok(()));

        let (_sender, mut module) = test_module(store.clone(), responder, clock.clone());

        module
            .handle(GatewayEvent::MessageCreated {
                actor: actor("100"),
                guild: guild(),
            })
            .await?;
        clock.advance(Duration::days(10));
        module
            .handle(GatewayEvent::MessageCreated {
                actor: actor("100"),
                guild: guild(),
            })
            .await?;

        module
            .handle(GatewayEvent::DirectCommand {
                actor: actor("100"),
                text: "!me 7".into(),
            })
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn me_with_absurd_day_count_is_ignored() -> Result<()> {
        *TEST_LOGGING;
        let store = MemoryActivityStore::new();
        let clock = TestClock::starting_at(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap());

        // No expectations: any reply would fail the test. The loop must also survive a
        // day count that, taken literally, reaches outside the representable time range.
        let (_sender, mut module) = test_module(store, MockResponder::new(), clock);

        module
            .handle(GatewayEvent::DirectCommand {
                actor: actor("100"),
                text: format!("!me {}", u32::MAX),
            })
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn unknown_user_gets_no_information() -> Result<()> {
        *TEST_LOGGING;
        let store = MemoryActivityStore::new();
        let clock = TestClock::starting_at(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap());

        let mut responder = MockResponder::new();
        responder
            .expect_send_direct_messages()
            .withf(|user_id, lines| user_id == "300" && lines == &vec![NO_INFORMATION.to_string()])
            .times(1)
            .returning(|_, _| Ok(()));

        let (_sender, mut module) = test_module(store, responder, clock);

        module
            .handle(GatewayEvent::DirectCommand {
                actor: actor("300"),
                text: "!me".into(),
            })
            .await?;
        Ok(())
    }
}
