//! Daily → monthly roll-up, computed in-process.
//!
//! Grouping happens on local calendar dates, so the result does not depend
//! on how the backend aligns its own calendar windows.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use chrono_tz::Tz;

use crate::calendar;

/// One day's energy total; `day` is a local calendar date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyTotal {
    pub day: NaiveDate,
    pub kwh: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyTotal {
    pub year: i32,
    pub month: u32,
    pub kwh: f64,
    /// First local instant of the month.
    pub starts_at: DateTime<FixedOffset>,
}

/// Sum daily totals per local month and keep the `limit` most recent
/// months, oldest first. Null totals count as zero.
pub fn rollup_monthly(daily: &[DailyTotal], limit: usize, tz: Tz) -> Vec<MonthlyTotal> {
    let mut months: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for d in daily {
        *months.entry((d.day.year(), d.day.month())).or_default() += d.kwh.unwrap_or(0.0);
    }

    let mut recent: Vec<MonthlyTotal> = months
        .into_iter()
        .rev()
        .take(limit)
        .filter_map(|((year, month), kwh)| {
            let first = NaiveDate::from_ymd_opt(year, month, 1)?;
            Some(MonthlyTotal {
                year,
                month,
                kwh,
                starts_at: calendar::local_midnight_fixed(first, tz),
            })
        })
        .collect();
    recent.reverse();
    recent
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAO_PAULO: Tz = chrono_tz::America::Sao_Paulo;

    fn day(y: i32, m: u32, d: u32, kwh: Option<f64>) -> DailyTotal {
        DailyTotal {
            day: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            kwh,
        }
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(rollup_monthly(&[], 6, SAO_PAULO).is_empty());
    }

    #[test]
    fn single_month_sums_all_days() {
        let daily = [
            day(2025, 1, 3, Some(1.25)),
            day(2025, 1, 4, Some(2.5)),
            day(2025, 1, 31, Some(4.0)),
        ];
        let months = rollup_monthly(&daily, 6, SAO_PAULO);
        assert_eq!(months.len(), 1);
        assert_eq!((months[0].year, months[0].month), (2025, 1));
        assert_eq!(months[0].kwh, 7.75);
        assert_eq!(months[0].starts_at.to_rfc3339(), "2025-01-01T00:00:00-03:00");
    }

    #[test]
    fn adjacent_days_across_month_boundary_split() {
        let daily = [day(2025, 1, 31, Some(3.0)), day(2025, 2, 1, Some(5.0))];
        let months = rollup_monthly(&daily, 6, SAO_PAULO);
        assert_eq!(months.len(), 2);
        assert_eq!((months[0].month, months[0].kwh), (1, 3.0));
        assert_eq!((months[1].month, months[1].kwh), (2, 5.0));
    }

    #[test]
    fn nulls_count_as_zero() {
        let daily = [day(2025, 2, 1, None), day(2025, 2, 2, Some(1.5))];
        let months = rollup_monthly(&daily, 6, SAO_PAULO);
        assert_eq!(months[0].kwh, 1.5);

        let only_null = rollup_monthly(&[day(2025, 3, 1, None)], 6, SAO_PAULO);
        assert_eq!(only_null.len(), 1);
        assert_eq!(only_null[0].kwh, 0.0);
    }

    #[test]
    fn keeps_most_recent_months_ascending() {
        let daily: Vec<_> = (1..=12)
            .map(|m| day(2024, m, 15, Some(m as f64)))
            .chain([day(2025, 1, 2, Some(100.0))])
            .collect();
        let months = rollup_monthly(&daily, 3, SAO_PAULO);
        let keys: Vec<_> = months.iter().map(|m| (m.year, m.month)).collect();
        assert_eq!(keys, vec![(2024, 11), (2024, 12), (2025, 1)]);
        assert_eq!(months[2].kwh, 100.0);
    }

    #[test]
    fn input_order_does_not_matter() {
        let a = [day(2025, 2, 1, Some(1.0)), day(2025, 1, 5, Some(2.0)), day(2025, 2, 9, Some(3.0))];
        let mut b = a;
        b.reverse();
        assert_eq!(rollup_monthly(&a, 6, SAO_PAULO), rollup_monthly(&b, 6, SAO_PAULO));
    }
}
