use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Duration, Local, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};
use now::DateTimeNow;

use crate::{
    daemon::storage::activity_store::LedgerStore,
    summary::{
        format::{NO_INFORMATION, summary_messages},
        query::QueryService,
    },
    utils::{dir::create_application_default_path, time::next_day_start},
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

const DEFAULT_RANGE_DAYS: i64 = 7;

#[derive(Debug, Parser)]
pub struct SummaryCommand {
    #[arg(long, short, help = "Id of the user to summarize")]
    user: String,
    #[arg(
        long = "start",
        short,
        help = "Start of the range. Examples are \"yesterday\", \"1 hour ago\", \"15/03/2025\", \"12:00 16/03/2025\", \"12 AM 16/03/2025\""
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "End of the range. Examples are \"yesterday\", \"1 hour ago\", \"15/03/2025\", \"12:00 16/03/2025\", \"12 AM 16/03/2025\""
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(
        long = "days",
        default_value_t = false,
        help = "Take inputs as whole days. For example if start and end are both 15/03/2025 this option allows to cover the whole day"
    )]
    treat_as_days: bool,
}

/// Command to process `summary`. Summarizes a user's recorded activity directly from the
/// local ledger, without going through the bot. Without a range the whole history is
/// summarized.
pub async fn process_summary_command(
    SummaryCommand {
        user,
        start_date,
        end_date,
        date_style,
        treat_as_days,
    }: SummaryCommand,
) -> Result<()> {
    let store = LedgerStore::new(create_application_default_path()?.join("activity"))?;
    let queries = QueryService::new(store);

    let summary = match parse_range(start_date, end_date, date_style, treat_as_days)? {
        None => queries.full_summary(&user).await?,
        Some((start, end)) => queries.range_summary(&user, start, end).await?,
    };

    match summary {
        Some(summary) => {
            for line in summary_messages(&user, &summary) {
                println!("{}", line.replace("**", ""));
            }
        }
        None => println!("{NO_INFORMATION}"),
    }
    Ok(())
}

/// Turns the optional date arguments into an inclusive utc range. [None] means no range
/// was requested at all.
fn parse_range(
    start_date: Option<String>,
    end_date: Option<String>,
    date_style: DateStyle,
    treat_as_days: bool,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
    if start_date.is_none() && end_date.is_none() {
        return Ok(None);
    }

    let now = Local::now();
    let dialect: chrono_english::Dialect = date_style.into();

    let mut end = match end_date.map(|s| parse_date_string(&s, now, dialect)) {
        Some(Ok(v)) => v.with_timezone(&Local),
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate end date {e}"),
                )
                .into());
        }
        None => now,
    };
    let mut start = match start_date.map(|s| parse_date_string(&s, now, dialect)) {
        Some(Ok(v)) => v.with_timezone(&Local),
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate start date {e}"),
                )
                .into());
        }
        None => end - Duration::days(DEFAULT_RANGE_DAYS),
    };

    if treat_as_days {
        start = start.beginning_of_day();
        // Inclusive range, so stop just short of the next day.
        end = next_day_start(end) - Duration::milliseconds(1);
    }

    Ok(Some((
        start.with_timezone(&Utc),
        end.with_timezone(&Utc),
    )))
}
