use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::FirmflowError;

/// Compute the next due date for a recurrence rule from a base date.
///
/// Grammar: `frequency[:qualifier]` with frequency one of `daily`, `weekly`,
/// `monthly`, `quarterly`, `annually`.
///
/// - `daily` / `weekly`: base + 1 / 7 days.
/// - `monthly`: one calendar month forward, day-of-month clamped.
/// - `monthly:<d>`: next occurrence of day `d` strictly after base, clamped
///   to the last valid day of the month (day 31 in February resolves to the
///   28th or 29th).
/// - `monthly:last_day` / `monthly:last_biz_day`: last calendar / business
///   day of the next month.
/// - `quarterly:last_biz_day`: last business day of the next quarter-end
///   month; every other quarterly form adds a flat 90 days.
/// - `annually`: base + 365 days. Deliberately not leap-aware; the
///   monthly/quarterly paths clamp, this one approximates.
///
/// Anything else is an error; a rule is never guessed.
pub fn next_due(rule: &str, base: NaiveDate) -> Result<NaiveDate, FirmflowError> {
    let (frequency, qualifier) = match rule.split_once(':') {
        Some((f, q)) => (f, Some(q)),
        None => (rule, None),
    };

    match (frequency, qualifier) {
        ("daily", None) => Ok(base + Duration::days(1)),
        ("weekly", None) => Ok(base + Duration::days(7)),
        ("monthly", None) => Ok(add_months_clamped(base, 1, base.day())),
        ("monthly", Some("last_day")) => Ok(last_day_of_month(next_month(base))),
        ("monthly", Some("last_biz_day")) => Ok(last_business_day(next_month(base))),
        ("monthly", Some(q)) => match q.parse::<u32>() {
            Ok(day) if (1..=31).contains(&day) => Ok(next_day_of_month(base, day)),
            _ => Err(FirmflowError::unknown_recurrence_rule(rule)),
        },
        ("quarterly", Some("last_biz_day")) => Ok(last_business_day(next_quarter_end(base))),
        ("quarterly", None) => Ok(base + Duration::days(90)),
        ("quarterly", Some(q)) if q.parse::<u32>().is_ok() => Ok(base + Duration::days(90)),
        ("annually", None) => Ok(base + Duration::days(365)),
        _ => Err(FirmflowError::unknown_recurrence_rule(rule)),
    }
}

/// Next occurrence of day-of-month `day` strictly after `base`, with
/// end-of-month clamping.
fn next_day_of_month(base: NaiveDate, day: u32) -> NaiveDate {
    let this_month = clamp_to_month(base.year(), base.month(), day);
    if this_month > base {
        this_month
    } else {
        let (year, month) = next_month(base);
        clamp_to_month(year, month, day)
    }
}

fn add_months_clamped(base: NaiveDate, months: u32, day: u32) -> NaiveDate {
    let mut year = base.year();
    let mut month = base.month() + months;
    while month > 12 {
        month -= 12;
        year += 1;
    }
    clamp_to_month(year, month, day)
}

fn next_month(base: NaiveDate) -> (i32, u32) {
    if base.month() == 12 {
        (base.year() + 1, 1)
    } else {
        (base.year(), base.month() + 1)
    }
}

/// Calendar month containing the end of the next quarter after `base`.
fn next_quarter_end(base: NaiveDate) -> (i32, u32) {
    // Quarter-end months: 3, 6, 9, 12. Strictly after the base month.
    let mut year = base.year();
    let mut month = base.month();
    loop {
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
        if month % 3 == 0 {
            return (year, month);
        }
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_y, next_m) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_y, next_m, 1).unwrap();
    (first_of_next - Duration::days(1)).day()
}

fn clamp_to_month(year: i32, month: u32, day: u32) -> NaiveDate {
    let day = day.min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn last_day_of_month((year, month): (i32, u32)) -> NaiveDate {
    clamp_to_month(year, month, 31)
}

/// Walk backward from the last calendar day past Saturday and Sunday.
fn last_business_day(month: (i32, u32)) -> NaiveDate {
    let mut date = last_day_of_month(month);
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date -= Duration::days(1);
    }
    date
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn daily_and_weekly() {
        assert_eq!(next_due("daily", d(2024, 1, 31)).unwrap(), d(2024, 2, 1));
        assert_eq!(next_due("weekly", d(2024, 12, 30)).unwrap(), d(2025, 1, 6));
    }

    #[test]
    fn monthly_bare_clamps_end_of_month() {
        assert_eq!(next_due("monthly", d(2024, 1, 31)).unwrap(), d(2024, 2, 29));
        assert_eq!(next_due("monthly", d(2023, 1, 31)).unwrap(), d(2023, 2, 28));
        assert_eq!(next_due("monthly", d(2024, 12, 15)).unwrap(), d(2025, 1, 15));
    }

    #[test]
    fn monthly_numeric_clamps_to_leap_february() {
        assert_eq!(next_due("monthly:31", d(2024, 2, 1)).unwrap(), d(2024, 2, 29));
        assert_eq!(next_due("monthly:31", d(2023, 2, 1)).unwrap(), d(2023, 2, 28));
    }

    #[test]
    fn monthly_numeric_rolls_over_when_day_has_passed() {
        assert_eq!(next_due("monthly:15", d(2024, 3, 15)).unwrap(), d(2024, 4, 15));
        assert_eq!(next_due("monthly:15", d(2024, 3, 20)).unwrap(), d(2024, 4, 15));
        assert_eq!(next_due("monthly:15", d(2024, 3, 1)).unwrap(), d(2024, 3, 15));
        assert_eq!(next_due("monthly:31", d(2024, 12, 31)).unwrap(), d(2025, 1, 31));
    }

    #[test]
    fn monthly_last_day() {
        assert_eq!(next_due("monthly:last_day", d(2024, 1, 10)).unwrap(), d(2024, 2, 29));
        assert_eq!(next_due("monthly:last_day", d(2024, 11, 30)).unwrap(), d(2024, 12, 31));
    }

    #[test]
    fn monthly_last_biz_day_skips_weekend() {
        // 2024-06-30 is a Sunday; last business day is Friday the 28th
        assert_eq!(
            next_due("monthly:last_biz_day", d(2024, 5, 15)).unwrap(),
            d(2024, 6, 28)
        );
        // 2024-07-31 is a Wednesday
        assert_eq!(
            next_due("monthly:last_biz_day", d(2024, 6, 1)).unwrap(),
            d(2024, 7, 31)
        );
    }

    #[test]
    fn quarterly_last_biz_day_targets_quarter_end() {
        // from January the next quarter-end month is March; 2024-03-31 is a
        // Sunday, so the 29th
        assert_eq!(
            next_due("quarterly:last_biz_day", d(2024, 1, 15)).unwrap(),
            d(2024, 3, 29)
        );
        // from March the next quarter-end month is June
        assert_eq!(
            next_due("quarterly:last_biz_day", d(2024, 3, 31)).unwrap(),
            d(2024, 6, 28)
        );
    }

    #[test]
    fn quarterly_flat_90_days() {
        assert_eq!(next_due("quarterly", d(2024, 1, 1)).unwrap(), d(2024, 3, 31));
        assert_eq!(next_due("quarterly:15", d(2024, 1, 1)).unwrap(), d(2024, 3, 31));
    }

    #[test]
    fn annually_flat_365_days() {
        // leap year: 365 days from Jan 1 lands on Dec 31, not Jan 1
        assert_eq!(next_due("annually", d(2024, 1, 1)).unwrap(), d(2024, 12, 31));
        assert_eq!(next_due("annually", d(2023, 3, 1)).unwrap(), d(2024, 2, 29));
    }

    #[test]
    fn unknown_rules_are_rejected() {
        for rule in ["fortnightly", "monthly:0", "monthly:32", "monthly:often",
                     "daily:3", "weekly:mon", "annually:1", "", ":", "quarterly:often"] {
            let err = next_due(rule, d(2024, 1, 1)).unwrap_err();
            assert_eq!(err.code, crate::error::ErrorCode::UnknownRecurrenceRule, "{rule}");
        }
    }
}
