use std::cmp::Ordering;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::models::EventRecord;

/// The groups meet on the Space Coast; "today" and "this month" follow its clock.
pub const SITE_TIMEZONE: Tz = chrono_tz::America::New_York;

/// Calendar date in [`SITE_TIMEZONE`] at `now`, whatever the host's zone.
pub fn site_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&SITE_TIMEZONE).date_naive()
}

/// Sort position of an event's start.
///
/// Parseable timestamps come first, ordered by instant. Values that do not
/// parse follow, ordered as text. Events without a start sort last.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum StartKey<'a> {
    Instant(DateTime<FixedOffset>),
    Unparsed(&'a str),
    Absent,
}

pub fn start_key(datetime: Option<&str>) -> StartKey<'_> {
    match datetime {
        None => StartKey::Absent,
        Some(raw) => match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(instant) => StartKey::Instant(instant),
            Err(_) => StartKey::Unparsed(raw),
        },
    }
}

pub fn compare_start(a: Option<&str>, b: Option<&str>) -> Ordering {
    start_key(a).cmp(&start_key(b))
}

/// Stable ascending sort on `datetime`; ties keep collection order.
pub fn sort_chronologically(mut events: Vec<EventRecord>) -> Vec<EventRecord> {
    events.sort_by(|a, b| compare_start(a.datetime.as_deref(), b.datetime.as_deref()));
    events
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid month {0:?}: expected YYYY-MM or MM")]
pub struct InvalidMonth(pub String);

/// Calendar month an event's local start date must fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthFilter {
    pub year: i32,
    pub month: u32,
}

impl MonthFilter {
    /// Accepts `YYYY-MM`, or `MM` for a month of `current_year`.
    pub fn parse(text: &str, current_year: i32) -> Result<Self, InvalidMonth> {
        let invalid = || InvalidMonth(text.to_string());
        let trimmed = text.trim();
        let (year, month) = match trimmed.split_once('-') {
            Some((year, month)) => (year.parse::<i32>().map_err(|_| invalid())?, month),
            None => (current_year, trimmed),
        };
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn matches(&self, event: &EventRecord) -> bool {
        event
            .start()
            .map_or(false, |start| start.year() == self.year && start.month() == self.month)
    }

    pub fn month_name(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|first| first.format("%B").to_string())
            .unwrap_or_default()
    }
}

pub fn filter_by_month(events: Vec<EventRecord>, filter: &MonthFilter) -> Vec<EventRecord> {
    events.into_iter().filter(|event| filter.matches(event)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(title: &str, datetime: Option<&str>) -> EventRecord {
        EventRecord {
            title: title.to_string(),
            url: format!("https://www.meetup.com/space-coast-devs/events/{title}/"),
            date: String::new(),
            time: String::new(),
            group_url: "https://www.meetup.com/space-coast-devs/".to_string(),
            meetup_name: "space-coast-devs".to_string(),
            description: None,
            datetime: datetime.map(str::to_string),
        }
    }

    fn titles(events: &[EventRecord]) -> Vec<&str> {
        events.iter().map(|e| e.title.as_str()).collect()
    }

    #[test]
    fn site_date_follows_eastern_time_across_the_month_boundary() {
        // 8:30 PM EDT on May 31.
        let now = DateTime::parse_from_rfc3339("2024-06-01T00:30:00Z")
            .expect("timestamp")
            .with_timezone(&Utc);
        let today = site_date(now);
        assert_eq!(today, NaiveDate::from_ymd_opt(2024, 5, 31).expect("date"));

        let month = MonthFilter::containing(today);
        assert_eq!(month, MonthFilter { year: 2024, month: 5 });
        assert_eq!(month.month_name(), "May");
        assert_eq!(MonthFilter::parse("12", today.year()).expect("month").year, 2024);
    }

    #[test]
    fn site_date_at_new_year_keeps_the_old_year() {
        // 11:30 PM EST on Dec 31.
        let now = DateTime::parse_from_rfc3339("2025-01-01T04:30:00Z")
            .expect("timestamp")
            .with_timezone(&Utc);
        let today = site_date(now);
        assert_eq!(today, NaiveDate::from_ymd_opt(2024, 12, 31).expect("date"));
        assert_eq!(MonthFilter::parse("03", today.year()).expect("month").year, 2024);
    }

    #[test]
    fn sorts_ascending_and_keeps_ties_in_input_order() {
        let sorted = sort_chronologically(vec![
            event("june", Some("2024-06-01T18:00:00-04:00")),
            event("may-a", Some("2024-05-01T18:00:00-04:00")),
            event("may-b", Some("2024-05-01T18:00:00-04:00")),
        ]);
        assert_eq!(titles(&sorted), vec!["may-a", "may-b", "june"]);
    }

    #[test]
    fn absent_datetimes_sort_last_in_input_order() {
        let sorted = sort_chronologically(vec![
            event("none-1", None),
            event("june", Some("2024-06-01T18:00:00-04:00")),
            event("none-2", None),
            event("may", Some("2024-05-01T18:00:00-04:00")),
        ]);
        assert_eq!(titles(&sorted), vec!["may", "june", "none-1", "none-2"]);
    }

    #[test]
    fn compares_instants_across_offsets() {
        // 22:00Z is earlier than 19:00-04:00 (23:00Z) though it sorts later as text.
        let sorted = sort_chronologically(vec![
            event("eastern", Some("2024-05-01T19:00:00-04:00")),
            event("utc", Some("2024-05-01T22:00:00Z")),
        ]);
        assert_eq!(titles(&sorted), vec!["utc", "eastern"]);
    }

    #[test]
    fn unparseable_values_sit_between_timestamps_and_absent() {
        let sorted = sort_chronologically(vec![
            event("none", None),
            event("text-b", Some("soon")),
            event("dated", Some("2024-05-01T18:00:00-04:00")),
            event("text-a", Some("later")),
        ]);
        assert_eq!(titles(&sorted), vec!["dated", "text-a", "text-b", "none"]);
        assert_eq!(compare_start(None, None), Ordering::Equal);
        assert_eq!(compare_start(Some("x"), None), Ordering::Less);
    }

    #[test]
    fn parses_month_arguments() {
        assert_eq!(
            MonthFilter::parse("2025-08", 2024),
            Ok(MonthFilter { year: 2025, month: 8 })
        );
        assert_eq!(
            MonthFilter::parse("12", 2024),
            Ok(MonthFilter { year: 2024, month: 12 })
        );
        assert!(MonthFilter::parse("2025-13", 2024).is_err());
        assert!(MonthFilter::parse("august", 2024).is_err());
        assert!(MonthFilter::parse("", 2024).is_err());
    }

    #[test]
    fn month_filter_uses_the_event_local_date() {
        let filter = MonthFilter { year: 2024, month: 5 };
        let kept = filter_by_month(
            vec![
                event("late-may", Some("2024-05-31T21:00:00-04:00")),
                event("june", Some("2024-06-01T18:00:00-04:00")),
                event("undated", None),
                event("may", Some("2024-05-02T18:00:00-04:00")),
            ],
            &filter,
        );
        assert_eq!(titles(&kept), vec!["late-may", "may"]);
        assert_eq!(filter.month_name(), "May");
    }
}
