use crate::domain::models::CHALLENGE_DAYS;
use chrono::{Duration, NaiveDate};

// Day 0 of the original challenge window: Feb 18, 2026.
pub const DEFAULT_CHALLENGE_START: &str = "2026-02-18";

pub fn challenge_dates(start: NaiveDate) -> Vec<NaiveDate> {
    (0..CHALLENGE_DAYS)
        .map(|day| start + Duration::days(i64::from(day)))
        .collect()
}

pub fn day_label(start: NaiveDate, day: u8) -> NaiveDate {
    start + Duration::days(i64::from(day))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_start() -> NaiveDate {
        NaiveDate::parse_from_str(DEFAULT_CHALLENGE_START, "%Y-%m-%d").expect("valid fixed date")
    }

    #[test]
    fn window_has_thirty_consecutive_dates() {
        let dates = challenge_dates(sample_start());
        assert_eq!(dates.len(), usize::from(CHALLENGE_DAYS));
        assert_eq!(dates[0], sample_start());
        for pair in dates.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::days(1));
        }
    }

    #[test]
    fn window_is_deterministic() {
        assert_eq!(
            challenge_dates(sample_start()),
            challenge_dates(sample_start())
        );
    }

    #[test]
    fn day_label_matches_window_position() {
        let dates = challenge_dates(sample_start());
        assert_eq!(day_label(sample_start(), 0), dates[0]);
        assert_eq!(day_label(sample_start(), 29), dates[29]);
    }

    #[test]
    fn window_crosses_month_boundary() {
        let dates = challenge_dates(sample_start());
        let last = NaiveDate::from_ymd_opt(2026, 3, 19).expect("valid fixed date");
        assert_eq!(dates[29], last);
    }
}
