use crate::schema::{Granularity, NumberFormat, WeekIndexing};
use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as u64;
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

/// Zero-based period offset of `current` relative to `start`.
///
/// Day offsets are plain calendar-day differences and go negative before `start`.
/// Week offsets depend on `week_indexing`:
/// - `Legacy52`: `(week(current) - week(start)) + 52 * (iso_year(current) - iso_year(start))`,
///   so week 53 of a 53-week ISO year and the following week share an index
/// - `IsoCalendar`: whole weeks between the Mondays of both ISO weeks
pub fn period_index(
    start: NaiveDate,
    current: NaiveDate,
    granularity: Granularity,
    week_indexing: WeekIndexing,
) -> i64 {
    match granularity {
        Granularity::Day => (current - start).num_days(),
        Granularity::Week => match week_indexing {
            WeekIndexing::Legacy52 => {
                let start_week = start.iso_week();
                let current_week = current.iso_week();
                let week_diff = current_week.week() as i64 - start_week.week() as i64;
                let year_diff = (current_week.year() - start_week.year()) as i64;
                week_diff + year_diff * 52
            }
            WeekIndexing::IsoCalendar => {
                (week_start(current) - week_start(start)).num_days() / 7
            }
        },
    }
}

/// Ordered period-start dates between `start` and `end`.
///
/// Weekly ranges run from the Monday of `start`'s ISO week to the Monday of `end`'s,
/// both inclusive. An inverted range yields no dates.
pub fn generate_date_range(
    start: NaiveDate,
    end: NaiveDate,
    granularity: Granularity,
) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    if start > end {
        return dates;
    }

    let (mut current, last, step) = match granularity {
        Granularity::Day => (start, end, Days::new(1)),
        Granularity::Week => (week_start(start), week_start(end), Days::new(7)),
    };

    while current <= last {
        dates.push(current);
        current = match current.checked_add_days(step) {
            Some(next) => next,
            None => break,
        };
    }

    dates
}

/// Rounds half-to-even on the exact decimal value of `value`.
///
/// `2.345` is stored slightly above the tie and becomes `2.35`; `0.125` is an
/// exact tie and becomes `0.12`.
pub fn round_to_format(value: f64, format: NumberFormat) -> f64 {
    let places = format.decimal_places();

    let Some(exact) = Decimal::from_f64_retain(value) else {
        return if places == 0 {
            value.round_ties_even()
        } else {
            value
        };
    };

    let rounded = exact.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven);
    rounded.mantissa() as f64 / 10f64.powi(rounded.scale() as i32)
}

/// Scales a raw formula result by an account weight given in percent.
pub fn apply_weight(raw: f64, weight: f64) -> f64 {
    raw * weight / 100.0
}

/// January 1st and December 31st of `today`'s year.
pub fn default_date_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let year = today.year();
    let first = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(today);
    let last = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(today);
    (first, last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_period_index() {
        let start = date(2024, 1, 1);
        assert_eq!(
            period_index(start, start, Granularity::Day, WeekIndexing::Legacy52),
            0
        );
        for n in [1u64, 30, 59, 366, 1000] {
            let current = start.checked_add_days(Days::new(n)).unwrap();
            assert_eq!(
                period_index(start, current, Granularity::Day, WeekIndexing::Legacy52),
                n as i64
            );
        }
        assert_eq!(
            period_index(start, date(2023, 12, 29), Granularity::Day, WeekIndexing::Legacy52),
            -3
        );
    }

    #[test]
    fn test_weekly_period_index_steps_by_one() {
        let start = date(2024, 1, 3);
        let mut current = date(2024, 1, 5);
        while current < date(2024, 12, 20) {
            let next = current.checked_add_days(Days::new(7)).unwrap();
            let this_idx =
                period_index(start, current, Granularity::Week, WeekIndexing::Legacy52);
            let next_idx = period_index(start, next, Granularity::Week, WeekIndexing::Legacy52);
            assert_eq!(this_idx, next_idx - 1, "at {}", current);
            current = next;
        }
    }

    #[test]
    fn test_weekly_period_index_within_same_week() {
        let start = date(2024, 1, 3);
        assert_eq!(
            period_index(start, date(2024, 1, 1), Granularity::Week, WeekIndexing::Legacy52),
            0
        );
        assert_eq!(
            period_index(start, date(2024, 1, 8), Granularity::Week, WeekIndexing::Legacy52),
            1
        );
    }

    #[test]
    fn test_legacy_week_index_repeats_after_53_week_year() {
        // ISO 2020 has 53 weeks; 2021-01-04 is week 1 of 2021.
        let start = date(2020, 12, 21); // week 52 of 2020
        let week_53 = date(2020, 12, 28);
        let next_year = date(2021, 1, 4);

        assert_eq!(
            period_index(start, week_53, Granularity::Week, WeekIndexing::Legacy52),
            1
        );
        assert_eq!(
            period_index(start, next_year, Granularity::Week, WeekIndexing::Legacy52),
            1
        );
        assert_eq!(
            period_index(start, next_year, Granularity::Week, WeekIndexing::IsoCalendar),
            2
        );
    }

    #[test]
    fn test_legacy_and_iso_agree_across_52_week_year() {
        let start = date(2023, 12, 18);
        let current = date(2024, 1, 15);
        assert_eq!(
            period_index(start, current, Granularity::Week, WeekIndexing::Legacy52),
            4
        );
        assert_eq!(
            period_index(start, current, Granularity::Week, WeekIndexing::IsoCalendar),
            4
        );
    }

    #[test]
    fn test_daily_range() {
        let d = date(2024, 2, 27);
        assert_eq!(generate_date_range(d, d, Granularity::Day), vec![d]);

        let range = generate_date_range(d, date(2024, 3, 2), Granularity::Day);
        assert_eq!(range.len(), 5);
        assert_eq!(range[2], date(2024, 2, 29));
        assert_eq!(range[4], date(2024, 3, 2));
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let start = date(2024, 3, 2);
        let end = date(2024, 3, 1);
        assert!(generate_date_range(start, end, Granularity::Day).is_empty());
        assert!(generate_date_range(start, end, Granularity::Week).is_empty());
    }

    #[test]
    fn test_weekly_range_is_monday_aligned() {
        let range = generate_date_range(date(2024, 1, 3), date(2024, 2, 14), Granularity::Week);
        assert_eq!(range.first(), Some(&date(2024, 1, 1)));
        assert_eq!(range.last(), Some(&date(2024, 2, 12)));
        assert_eq!(range.len(), 7);
        assert!(range.iter().all(|d| d.weekday() == Weekday::Mon));
    }

    #[test]
    fn test_weekly_range_starts_before_start_date() {
        // Sunday start belongs to the week beginning the previous Monday.
        let range = generate_date_range(date(2024, 1, 7), date(2024, 1, 8), Granularity::Week);
        assert_eq!(range, vec![date(2024, 1, 1), date(2024, 1, 8)]);
    }

    #[test]
    fn test_rounding_is_pinned() {
        assert_eq!(round_to_format(2.345, NumberFormat::Decimal), 2.35);
        assert_eq!(round_to_format(0.125, NumberFormat::Decimal), 0.12);
        assert_eq!(round_to_format(0.375, NumberFormat::Decimal), 0.38);
        assert_eq!(round_to_format(2.5, NumberFormat::Integer), 2.0);
        assert_eq!(round_to_format(3.5, NumberFormat::Integer), 4.0);
        assert_eq!(round_to_format(-2.5, NumberFormat::Integer), -2.0);
        assert_eq!(round_to_format(10.4, NumberFormat::Integer), 10.0);
        assert_eq!(round_to_format(1.0 / 3.0, NumberFormat::Decimal), 0.33);
    }

    #[test]
    fn test_apply_weight() {
        assert_eq!(apply_weight(200.0, 50.0), 100.0);
        assert_eq!(apply_weight(200.0, 0.0), 0.0);
    }

    #[test]
    fn test_default_date_range() {
        let (first, last) = default_date_range(date(2026, 10, 15));
        assert_eq!(first, date(2026, 1, 1));
        assert_eq!(last, date(2026, 12, 31));
    }
}
