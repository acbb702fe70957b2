use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};

/// This is the standard way of naming a day's ledger file in guildwatch.
pub fn date_to_ledger_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Returns start of the next day.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> DateTime<Tz> {
    (date + Duration::days(1)).with_time(NaiveTime::MIN).unwrap()
}

/// Iterates dates between start (inclusive) and end (inclusive).
pub fn date_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors(Some(start), move |current| {
        current.succ_opt().filter(|next| *next <= end)
    })
    .take_while(move |current| *current <= end)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::date_range;

    #[test]
    fn date_range_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let days = date_range(start, end).collect::<Vec<_>>();
        assert_eq!(
            days,
            vec![start, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(), end]
        );
    }

    #[test]
    fn date_range_single_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(date_range(day, day).count(), 1);
    }
}
