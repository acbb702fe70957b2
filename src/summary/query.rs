use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::daemon::storage::activity_store::ActivityStore;

use super::aggregate::{UserActivitySummary, summarize};

/// Answers summary requests by fetching a user's records through the store port and
/// folding them. Holds no state of its own.
pub struct QueryService<S> {
    store: S,
}

impl<S: ActivityStore> QueryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Summary over the user's whole history. [None] when no records exist.
    pub async fn full_summary(&self, user_id: &str) -> Result<Option<UserActivitySummary>> {
        let records = self.store.records_for_user(user_id).await?;
        Ok(summarize(&records))
    }

    /// Summary over `start..=end`. [None] when no records fall inside the range.
    pub async fn range_summary(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<UserActivitySummary>> {
        let records = self.store.records_between(user_id, start, end).await?;
        Ok(summarize(&records))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Duration, TimeZone};

    use crate::daemon::storage::{
        activity_store::memory::MemoryActivityStore,
        entities::{ActivityKind, ActivityRecordEntity, GuildSnapshot, UserSnapshot},
    };

    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn record(user_id: &str, timestamp: DateTime<Utc>) -> ActivityRecordEntity {
        ActivityRecordEntity::new(
            UserSnapshot {
                id: user_id.into(),
                display_name: user_id.into(),
                avatar: None,
            },
            GuildSnapshot {
                id: "1".into(),
                name: "guild".into(),
            },
            timestamp,
            ActivityKind::MessageAdded,
        )
    }

    #[tokio::test]
    async fn unknown_user_has_no_information() -> Result<()> {
        let queries = QueryService::new(MemoryActivityStore::new());
        assert_eq!(queries.full_summary("100").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn full_summary_sees_only_the_requested_user() -> Result<()> {
        let store = MemoryActivityStore::new();
        store
            .append(vec![
                record("100", at(0)),
                record("100", at(1)),
                record("200", at(2)),
            ])
            .await?;

        let queries = QueryService::new(store);
        let summary = queries.full_summary("100").await?.unwrap();
        assert_eq!(summary.messages_added, 2);
        Ok(())
    }

    #[tokio::test]
    async fn range_summary_includes_both_bounds() -> Result<()> {
        let store = MemoryActivityStore::new();
        store
            .append(vec![
                record("100", at(9)),
                record("100", at(10)),
                record("100", at(20)),
                record("100", at(21)),
            ])
            .await?;

        let queries = QueryService::new(store);
        let summary = queries
            .range_summary("100", at(10), at(20))
            .await?
            .unwrap();
        assert_eq!(summary.messages_added, 2);
        Ok(())
    }

    #[tokio::test]
    async fn empty_range_is_distinct_from_zero_activity() -> Result<()> {
        let store = MemoryActivityStore::new();
        store.append(vec![record("100", at(0))]).await?;

        let queries = QueryService::new(store);
        assert_eq!(queries.range_summary("100", at(100), at(200)).await?, None);
        Ok(())
    }
}
