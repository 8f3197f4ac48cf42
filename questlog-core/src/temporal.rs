//! Session calendar: classify `played_at` relative to an explicit `now`.
//!
//! Every function takes `now` as a parameter. [`Calendar`] goes one step
//! further and pre-computes the week and month spans for a single instant,
//! so classifying many sessions in one request can never straddle a
//! midnight or month boundary halfway through.
//!
//! All calendar arithmetic is UTC. Spans are inclusive at both ends: the
//! end of a span is the last representable nanosecond before the next one
//! begins.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::config::WeekStart;
use crate::entity::Session;

// ---------------------------------------------------------------------------
// Spans
// ---------------------------------------------------------------------------

/// A closed interval of time, `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSpan {
    /// First instant in the span.
    pub start: DateTime<Utc>,
    /// Last instant in the span.
    pub end: DateTime<Utc>,
}

impl TimeSpan {
    /// Whether `t` lies within the span, boundaries included.
    #[must_use]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }

    /// Span from the start of `first` up to (not including) the start of `next`.
    fn between_days(first: NaiveDate, next: NaiveDate) -> Self {
        let start = day_start(first);
        Self {
            start,
            end: day_start(next) - Duration::nanoseconds(1),
        }
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

/// The calendar week containing `now`.
#[must_use]
pub fn week_span(now: DateTime<Utc>, week_start: WeekStart) -> TimeSpan {
    let today = now.date_naive();
    let offset = match week_start {
        WeekStart::Monday => today.weekday().num_days_from_monday(),
        WeekStart::Sunday => today.weekday().num_days_from_sunday(),
    };
    let first = today - Duration::days(i64::from(offset));
    TimeSpan::between_days(first, first + Duration::days(7))
}

/// The calendar month containing `now`.
#[must_use]
pub fn month_span(now: DateTime<Utc>) -> TimeSpan {
    let first = first_of_month(now.date_naive());
    let next = first.checked_add_months(Months::new(1)).unwrap_or(NaiveDate::MAX);
    TimeSpan::between_days(first, next)
}

/// The calendar month before the one containing `now`.
#[must_use]
pub fn previous_month_span(now: DateTime<Utc>) -> TimeSpan {
    let this_month = first_of_month(now.date_naive());
    let first = this_month.checked_sub_months(Months::new(1)).unwrap_or(NaiveDate::MIN);
    TimeSpan::between_days(first, this_month)
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// Strictly before `now`.
#[must_use]
pub fn is_past(played_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    played_at < now
}

/// Strictly after `now`. A session at exactly `now` is neither past nor upcoming.
#[must_use]
pub fn is_upcoming(played_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    played_at > now
}

/// Same UTC calendar date as `now`.
#[must_use]
pub fn is_today(played_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    played_at.date_naive() == now.date_naive()
}

/// Within `now`'s calendar week, both boundaries inclusive.
#[must_use]
pub fn is_this_week(played_at: DateTime<Utc>, now: DateTime<Utc>, week_start: WeekStart) -> bool {
    week_span(now, week_start).contains(played_at)
}

// ---------------------------------------------------------------------------
// Calendar snapshot
// ---------------------------------------------------------------------------

/// Where a timestamp falls relative to one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Timing {
    /// Before now.
    pub past: bool,
    /// After now.
    pub upcoming: bool,
    /// Same calendar date as now.
    pub today: bool,
    /// Same calendar week as now.
    pub this_week: bool,
    /// Same calendar month as now.
    pub this_month: bool,
    /// The calendar month before now's.
    pub last_month: bool,
}

/// Week and month spans frozen at a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    now: DateTime<Utc>,
    week: TimeSpan,
    month: TimeSpan,
    last_month: TimeSpan,
}

impl Calendar {
    /// Freeze the calendar at `now`.
    #[must_use]
    pub fn at(now: DateTime<Utc>, week_start: WeekStart) -> Self {
        Self {
            now,
            week: week_span(now, week_start),
            month: month_span(now),
            last_month: previous_month_span(now),
        }
    }

    /// The instant this calendar was frozen at.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Current week.
    #[must_use]
    pub fn week(&self) -> TimeSpan {
        self.week
    }

    /// Current month.
    #[must_use]
    pub fn month(&self) -> TimeSpan {
        self.month
    }

    /// Previous month.
    #[must_use]
    pub fn last_month(&self) -> TimeSpan {
        self.last_month
    }

    /// Classify a timestamp against the frozen instant.
    #[must_use]
    pub fn classify(&self, played_at: DateTime<Utc>) -> Timing {
        Timing {
            past: is_past(played_at, self.now),
            upcoming: is_upcoming(played_at, self.now),
            today: is_today(played_at, self.now),
            this_week: self.week.contains(played_at),
            this_month: self.month.contains(played_at),
            last_month: self.last_month.contains(played_at),
        }
    }

    /// Sessions played before now, in input order.
    #[must_use]
    pub fn past<'a>(&self, sessions: &'a [Session]) -> Vec<&'a Session> {
        sessions.iter().filter(|s| is_past(s.played_at, self.now)).collect()
    }

    /// Sessions scheduled after now, in input order.
    #[must_use]
    pub fn upcoming<'a>(&self, sessions: &'a [Session]) -> Vec<&'a Session> {
        sessions.iter().filter(|s| is_upcoming(s.played_at, self.now)).collect()
    }

    /// Sessions in the current calendar month, in input order.
    #[must_use]
    pub fn this_month<'a>(&self, sessions: &'a [Session]) -> Vec<&'a Session> {
        sessions.iter().filter(|s| self.month.contains(s.played_at)).collect()
    }

    /// Sessions in the previous calendar month, in input order.
    #[must_use]
    pub fn in_last_month<'a>(&self, sessions: &'a [Session]) -> Vec<&'a Session> {
        sessions.iter().filter(|s| self.last_month.contains(s.played_at)).collect()
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Ascending by `played_at`, ties broken by ascending session id.
#[must_use]
pub fn chronological_order(a: &Session, b: &Session) -> Ordering {
    a.played_at.cmp(&b.played_at).then_with(|| a.id.cmp(&b.id))
}

/// Sort oldest first. Equal timestamps fall back to id order.
pub fn chronological(sessions: &mut [Session]) {
    sessions.sort_by(chronological_order);
}

/// Sort newest first; the exact reverse of [`chronological`].
pub fn recent(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| chronological_order(b, a));
}

/// The session with the latest `played_at`, if any.
#[must_use]
pub fn last_session(sessions: &[Session]) -> Option<&Session> {
    sessions.iter().max_by(|a, b| chronological_order(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CampaignId, SessionId};
    use chrono::{TimeZone, Weekday};
    use uuid::Uuid;

    /// Wednesday 2025-06-11 18:30:00 UTC.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 11, 18, 30, 0).single().expect("valid")
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).single().expect("valid")
    }

    fn session(played_at: DateTime<Utc>) -> Session {
        Session {
            id: SessionId::new(),
            campaign_id: CampaignId::new(),
            played_at,
            notes: None,
            created_at: played_at,
            updated_at: played_at,
        }
    }

    #[test]
    fn past_and_upcoming_are_strict() {
        let t = now();
        assert!(is_past(t - Duration::seconds(1), t));
        assert!(!is_upcoming(t - Duration::seconds(1), t));
        assert!(is_upcoming(t + Duration::seconds(1), t));
        assert!(!is_past(t + Duration::seconds(1), t));
        assert!(!is_past(t, t));
        assert!(!is_upcoming(t, t));
    }

    #[test]
    fn today_is_calendar_date_not_24h_window() {
        let t = now();
        assert!(is_today(at(2025, 6, 11, 0, 0, 0), t));
        assert!(is_today(at(2025, 6, 11, 23, 59, 59), t));
        // Less than 24h before now, but yesterday.
        assert!(!is_today(at(2025, 6, 10, 23, 0, 0), t));
    }

    #[test]
    fn monday_week_spans_monday_to_sunday() {
        let span = week_span(now(), WeekStart::Monday);
        assert_eq!(span.start, at(2025, 6, 9, 0, 0, 0));
        assert_eq!(span.start.weekday(), Weekday::Mon);
        assert_eq!(span.end, at(2025, 6, 16, 0, 0, 0) - Duration::nanoseconds(1));
    }

    #[test]
    fn sunday_week_spans_sunday_to_saturday() {
        let span = week_span(now(), WeekStart::Sunday);
        assert_eq!(span.start, at(2025, 6, 8, 0, 0, 0));
        assert_eq!(span.end.weekday(), Weekday::Sat);
    }

    #[test]
    fn week_boundaries_are_inclusive() {
        let span = week_span(now(), WeekStart::Monday);
        assert!(is_this_week(span.start, now(), WeekStart::Monday));
        assert!(is_this_week(span.end, now(), WeekStart::Monday));
        assert!(!is_this_week(span.start - Duration::nanoseconds(1), now(), WeekStart::Monday));
        assert!(!is_this_week(now() - Duration::weeks(2), now(), WeekStart::Monday));
    }

    #[test]
    fn month_spans() {
        let month = month_span(now());
        assert_eq!(month.start, at(2025, 6, 1, 0, 0, 0));
        assert!(month.contains(at(2025, 6, 30, 23, 59, 59)));
        assert!(!month.contains(at(2025, 7, 1, 0, 0, 0)));

        let last = previous_month_span(now());
        assert_eq!(last.start, at(2025, 5, 1, 0, 0, 0));
        assert!(last.contains(at(2025, 5, 31, 23, 59, 59)));
        assert!(!last.contains(month.start));
    }

    #[test]
    fn previous_month_wraps_year() {
        let last = previous_month_span(at(2025, 1, 15, 12, 0, 0));
        assert_eq!(last.start, at(2024, 12, 1, 0, 0, 0));
        assert_eq!(last.end, at(2025, 1, 1, 0, 0, 0) - Duration::nanoseconds(1));
    }

    #[test]
    fn calendar_classifies_against_one_instant() {
        let cal = Calendar::at(now(), WeekStart::Monday);
        let timing = cal.classify(now());
        assert_eq!(
            timing,
            Timing {
                past: false,
                upcoming: false,
                today: true,
                this_week: true,
                this_month: true,
                last_month: false,
            }
        );
        assert!(cal.classify(at(2025, 5, 20, 9, 0, 0)).last_month);
    }

    #[test]
    fn calendar_set_views() {
        let sessions = vec![
            session(now() - Duration::days(8)),
            session(now() - Duration::days(2)),
            session(now() + Duration::days(2)),
        ];
        let cal = Calendar::at(now(), WeekStart::Monday);
        let past: Vec<_> = cal.past(&sessions).into_iter().map(|s| s.id).collect();
        assert_eq!(past, [sessions[0].id, sessions[1].id]);
        let upcoming: Vec<_> = cal.upcoming(&sessions).into_iter().map(|s| s.id).collect();
        assert_eq!(upcoming, [sessions[2].id]);
        // 2025-06-03 and 2025-06-09 and 2025-06-13 are all in June.
        assert_eq!(cal.this_month(&sessions).len(), 3);
        assert!(cal.in_last_month(&sessions).is_empty());
    }

    #[test]
    fn ordering_breaks_ties_by_id() {
        let t = now();
        let mut a = session(t);
        let mut b = session(t);
        a.id = SessionId(Uuid::from_u128(1));
        b.id = SessionId(Uuid::from_u128(2));
        let c = session(t - Duration::hours(1));

        let mut sessions = vec![b.clone(), c.clone(), a.clone()];
        chronological(&mut sessions);
        assert_eq!(sessions, [c.clone(), a.clone(), b.clone()]);

        recent(&mut sessions);
        assert_eq!(sessions, [b.clone(), a, c]);

        assert_eq!(last_session(&sessions), Some(&b));
    }

    #[test]
    fn last_session_of_empty_is_none() {
        assert!(last_session(&[]).is_none());
    }
}
