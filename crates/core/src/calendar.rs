//! Week/date bucketing and the injectable time source.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Label format used for weeks and dates in document keys (`06-01-2024`).
pub const DATE_LABEL_FORMAT: &str = "%d-%m-%Y";

/// Current-time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall-clock time.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant (tests, replays).
#[derive(Debug, Copy, Clone)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Midnight UTC of `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A seven-day forecasting bucket identified by its first day.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Week {
    start: NaiveDate,
}

impl Week {
    pub fn starting(start: NaiveDate) -> Self {
        Self { start }
    }

    /// The week containing `date` when weeks begin on `first_day`.
    pub fn containing(date: NaiveDate, first_day: Weekday) -> Self {
        let offset = (7 + date.weekday().num_days_from_monday()
            - first_day.num_days_from_monday())
            % 7;
        Self {
            start: date - Duration::days(i64::from(offset)),
        }
    }

    /// Parse a `dd-mm-yyyy` label.
    pub fn parse(label: &str) -> DomainResult<Self> {
        NaiveDate::parse_from_str(label.trim(), DATE_LABEL_FORMAT)
            .map(Self::starting)
            .map_err(|e| DomainError::validation(format!("invalid week '{label}': {e}")))
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.start + Duration::days(6)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end()
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let start = self.start;
        (0..7).map(move |d| start + Duration::days(d))
    }

    pub fn label(&self) -> String {
        self.start.format(DATE_LABEL_FORMAT).to_string()
    }
}

impl core::fmt::Display for Week {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.start.format(DATE_LABEL_FORMAT))
    }
}

/// `dd-mm-yyyy` label for a single day.
pub fn date_label(date: NaiveDate) -> String {
    date.format(DATE_LABEL_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parse_uses_day_month_year() {
        let week = Week::parse("06-01-2024").unwrap();
        assert_eq!(week.start(), d(2024, 1, 6));
        assert_eq!(week.label(), "06-01-2024");
        assert!(week.contains(d(2024, 1, 8)));
        assert!(!week.contains(d(2024, 1, 13)));
    }

    #[test]
    fn containing_rewinds_to_first_day() {
        // 8 Jan 2024 is a Monday.
        assert_eq!(Week::containing(d(2024, 1, 8), Weekday::Mon).start(), d(2024, 1, 8));
        assert_eq!(Week::containing(d(2024, 1, 8), Weekday::Sat).start(), d(2024, 1, 6));
        assert_eq!(Week::containing(d(2024, 1, 14), Weekday::Mon).start(), d(2024, 1, 8));
    }

    #[test]
    fn week_has_seven_days() {
        let week = Week::starting(d(2024, 1, 6));
        let days: Vec<_> = week.days().collect();
        assert_eq!(days.len(), 7);
        assert_eq!(days[6], week.end());
    }

    #[test]
    fn fixed_clock_reports_its_date() {
        let clock = FixedClock::on(d(2024, 1, 8));
        assert_eq!(clock.today(), d(2024, 1, 8));
    }
}
