use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use fs4::tokio::AsyncFileExt;
use futures::{StreamExt, stream};
use tokio::{
    fs::{self, File},
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::utils::time::{date_range, date_to_ledger_name};

use super::entities::ActivityRecordEntity;

/// Port for the activity ledger. Injected into ingestion and query code so tests can
/// substitute an in-memory fake.
pub trait ActivityStore: Sync + Send {
    /// Appends records to the ledger. Records are facts and are never updated afterwards.
    fn append(
        &self,
        records: Vec<ActivityRecordEntity>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// All records ever written for a user, in ledger order.
    fn records_for_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<ActivityRecordEntity>>> + Send;

    /// Records for a user with `start <= timestamp <= end`. Both bounds inclusive.
    fn records_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ActivityRecordEntity>>> + Send;
}

impl<T: Deref + Sync + Send> ActivityStore for T
where
    T::Target: ActivityStore,
{
    fn append(
        &self,
        records: Vec<ActivityRecordEntity>,
    ) -> impl Future<Output = Result<()>> + Send {
        self.deref().append(records)
    }

    fn records_for_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<ActivityRecordEntity>>> + Send {
        self.deref().records_for_user(user_id)
    }

    fn records_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ActivityRecordEntity>>> + Send {
        self.deref().records_between(user_id, start, end)
    }
}

/// The main realization of [ActivityStore]. Records live as one json object per line in
/// a file per UTC day, which keeps appends cheap and lets range queries only touch the
/// days they cover.
#[derive(Clone)]
pub struct LedgerStore {
    ledger_dir: PathBuf,
}

impl LedgerStore {
    pub fn new(ledger_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&ledger_dir)?;

        Ok(Self { ledger_dir })
    }

    fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.ledger_dir.join(date_to_ledger_name(date))
    }

    /// Days that actually have a ledger file, oldest first. Files with unexpected names
    /// are ignored.
    async fn stored_days(&self) -> Result<Vec<NaiveDate>> {
        let mut days = vec![];
        let mut entries = fs::read_dir(&self.ledger_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Ok(date) = NaiveDate::parse_from_str(&name.to_string_lossy(), "%Y-%m-%d") {
                days.push(date);
            }
        }
        days.sort();
        Ok(days)
    }

    async fn read_day(&self, path: &Path) -> Result<Vec<ActivityRecordEntity>> {
        async fn extract(
            path: &Path,
        ) -> std::result::Result<Vec<ActivityRecordEntity>, std::io::Error> {
            debug!("Extracting {path:?}");
            let file = File::open(path).await?;
            file.lock_shared()?;
            let buffer = BufReader::new(file);
            let mut lines = buffer.lines();
            let mut records = vec![];
            while let Ok(Some(v)) = lines.next_line().await {
                match serde_json::from_str::<ActivityRecordEntity>(&v) {
                    Ok(v) => records.push(v),
                    Err(e) => {
                        // ignore illegal values. Might happen after shutdowns
                        warn!(
                            "During parsing in path {:?} found illegal json string {}:  {e}",
                            path, &v
                        )
                    }
                }
            }

            lines.into_inner().into_inner().unlock_async().await?;

            Ok(records)
        }

        match extract(path).await {
            Ok(s) => Ok(s),
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    Ok(vec![])
                } else {
                    Err(e)?
                }
            }
        }
    }

    /// Reads the given days and collects records matching `filter`. Files are read a few
    /// at a time to keep queries over long date ranges reasonably fast.
    async fn collect_days(
        &self,
        days: Vec<NaiveDate>,
        filter: impl Fn(&ActivityRecordEntity) -> bool,
    ) -> Result<Vec<ActivityRecordEntity>> {
        let reads = stream::iter(days)
            .map(|day| {
                let path = self.day_path(day);
                async move { self.read_day(&path).await }
            })
            .buffered(4)
            .collect::<Vec<_>>()
            .await;

        let mut result = vec![];
        for day in reads {
            result.extend(day?.into_iter().filter(&filter));
        }
        Ok(result)
    }

    async fn append_day(&self, date: NaiveDate, records: &[ActivityRecordEntity]) -> Result<()> {
        let file = File::options()
            .append(true)
            .create(true)
            .open(self.day_path(date))
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = Self::append_with_file(file.try_clone().await?, records).await;
        file.unlock_async().await?;
        result
    }

    async fn append_with_file(mut file: File, records: &[ActivityRecordEntity]) -> Result<()> {
        let mut buffer = Vec::<u8>::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }
}

impl ActivityStore for LedgerStore {
    async fn append(&self, records: Vec<ActivityRecordEntity>) -> Result<()> {
        // A batch is tiny (at most two records) but may straddle midnight, so group by
        // the day each record belongs to.
        let mut remaining = records.as_slice();
        while let Some(first) = remaining.first() {
            let date = first.timestamp.date_naive();
            let split = remaining
                .iter()
                .position(|r| r.timestamp.date_naive() != date)
                .unwrap_or(remaining.len());
            self.append_day(date, &remaining[..split]).await?;
            remaining = &remaining[split..];
        }
        Ok(())
    }

    async fn records_for_user(&self, user_id: &str) -> Result<Vec<ActivityRecordEntity>> {
        let days = self.stored_days().await?;
        self.collect_days(days, |r| &*r.user.id == user_id).await
    }

    async fn records_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityRecordEntity>> {
        let days = date_range(start.date_naive(), end.date_naive()).collect();
        self.collect_days(days, |r| {
            &*r.user.id == user_id && r.timestamp >= start && r.timestamp <= end
        })
        .await
    }
}
