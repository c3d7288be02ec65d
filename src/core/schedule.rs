use crate::domain::model::{LocalDay, TimeOfDay, TimeWindow};
use crate::utils::error::{DispatchError, Result};
use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// Local calendar day `days_ahead` days after `now`.
pub fn target_date<Tz: TimeZone>(now: &DateTime<Tz>, days_ahead: u32) -> Result<NaiveDate> {
    now.date_naive()
        .checked_add_days(Days::new(u64::from(days_ahead)))
        .ok_or_else(|| DispatchError::InvalidConfigValueError {
            field: "creation.days_ahead".to_string(),
            value: days_ahead.to_string(),
            reason: "Target date is out of range".to_string(),
        })
}

/// Local midnight of `date` shifted by `time`, converted to UTC.
///
/// Offsets past 24h roll over into the next day.
pub fn at_time_of_day<Tz: TimeZone>(
    timezone: &Tz,
    date: NaiveDate,
    time: TimeOfDay,
) -> Result<DateTime<Utc>> {
    let local = date.and_time(NaiveTime::MIN) + Duration::seconds(i64::from(time.seconds()));

    timezone
        .from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| DispatchError::InvalidConfigValueError {
            field: "time_of_day".to_string(),
            value: format!("{} {}", date, time),
            reason: "Local time does not exist in the configured timezone".to_string(),
        })
}

/// Local calendar day containing `now`, bounded in UTC.
pub fn local_day<Tz: TimeZone>(timezone: &Tz, now: DateTime<Utc>) -> Result<LocalDay> {
    let date = now.with_timezone(timezone).date_naive();
    Ok(LocalDay {
        now,
        start: at_time_of_day(timezone, date, TimeOfDay::from_seconds(0))?,
        end: at_time_of_day(timezone, date, TimeOfDay::from_hm(24, 0))?,
    })
}

pub fn window<Tz: TimeZone>(
    timezone: &Tz,
    date: NaiveDate,
    from: TimeOfDay,
    to: TimeOfDay,
) -> Result<TimeWindow> {
    Ok(TimeWindow {
        start: at_time_of_day(timezone, date, from)?,
        end: at_time_of_day(timezone, date, to)?,
    })
}

/// Czech short date as used in order identifiers, e.g. `6. 10. 2022`.
pub fn czech_short_date(date: NaiveDate) -> String {
    format!("{}. {}. {}", date.day(), date.month(), date.year())
}

/// `<first>-<second>-<date>`, lower-cased and without spaces.
pub fn order_identifier(first: &str, second: &str, date: NaiveDate) -> String {
    format!("{}-{}-{}", first, second, czech_short_date(date))
        .to_lowercase()
        .replace(' ', "")
}
