//! Local-calendar boundaries in the deployment timezone.
//!
//! Every day/month boundary the gateway computes goes through here so that
//! "today" and "this month" mean the same thing to the planner, the
//! normalizer and the roll-up.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, TimeZone,
    Utc,
};
use chrono_tz::Tz;

/// Calendar date of `instant` as seen in `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// First instant of `date` in `tz`.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    local_naive_to_utc(date.and_time(chrono::NaiveTime::MIN), tz)
}

/// Same instant as [`local_midnight`], carrying the local offset.
pub fn local_midnight_fixed(date: NaiveDate, tz: Tz) -> DateTime<FixedOffset> {
    let utc = local_midnight(date, tz);
    utc.with_timezone(&tz).fixed_offset()
}

pub fn start_of_local_day(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    local_midnight(local_date(now, tz), tz)
}

pub fn start_of_local_month(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let date = local_date(now, tz);
    local_midnight(first_of_month(date), tz)
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the month `months` before the month containing `date`.
pub fn months_back(date: NaiveDate, months: u32) -> NaiveDate {
    let total = date.year() * 12 + date.month0() as i32 - months as i32;
    let year = total.div_euclid(12);
    let month0 = total.rem_euclid(12) as u32;
    NaiveDate::from_ymd_opt(year, month0 + 1, 1).unwrap_or_else(|| first_of_month(date))
}

/// Resolve a local wall-clock time to UTC.
///
/// Ambiguous times take the earlier instant. Times inside a DST gap (some
/// zones, America/Sao_Paulo among them, skipped midnight) resolve to the
/// first valid local instant after the requested one.
pub fn local_naive_to_utc(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            for step_minutes in 1..=(24 * 60) {
                let probe = naive + Duration::minutes(step_minutes);
                match tz.from_local_datetime(&probe) {
                    LocalResult::Single(dt) => return dt.with_timezone(&Utc),
                    LocalResult::Ambiguous(dt, _) => return dt.with_timezone(&Utc),
                    LocalResult::None => continue,
                }
            }
            naive.and_utc()
        }
    }
}
