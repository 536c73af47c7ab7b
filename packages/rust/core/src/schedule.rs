//! Resolved event descriptor and the record of defaults applied to build it.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// A fully specified calendar event, ready for a calendar consumer.
///
/// Built only by the resolver, which guarantees `end >= start`. All-day
/// events span `[midnight(start_date), midnight(end_date + 1))`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSchedule {
    title: String,
    description: String,
    location: String,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    all_day: bool,
    confidence: f64,
}

impl ResolvedSchedule {
    pub(crate) fn new(
        title: String,
        description: String,
        location: String,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        all_day: bool,
        confidence: f64,
    ) -> Self {
        debug_assert!(end >= start, "resolver produced an inverted interval");
        Self {
            title,
            description,
            location,
            start,
            end,
            all_day,
            confidence,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Start instant, carrying the local offset it was resolved in.
    pub fn start(&self) -> DateTime<FixedOffset> {
        self.start
    }

    /// End instant (exclusive for all-day events).
    pub fn end(&self) -> DateTime<FixedOffset> {
        self.end
    }

    pub fn all_day(&self) -> bool {
        self.all_day
    }

    /// Confidence as reported by the model, or 0.0 when it gave none.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }
}

/// A default or repair the resolver applied to a payload field.
///
/// These are informational: none of them is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// `start_date` absent or unparseable; used the reference date.
    StartDateDefaulted,
    /// `end_date` absent or unparseable; used the start date.
    EndDateDefaulted,
    /// `end_date` was before `start_date`; clamped to the start date.
    EndDateClamped,
    /// No time given anywhere, so the event became all-day despite the model.
    AllDayForced,
    /// `start_time` absent or unparseable; used 13:00.
    StartTimeDefaulted,
    /// `end_time` absent or unparseable; used start time plus one hour.
    EndTimeDerived,
    /// End clock time was before the start on the same day; moved to the next day.
    EndRolledOver,
    TitleDefaulted,
    DescriptionDefaulted,
    LocationDefaulted,
    ConfidenceDefaulted,
}

impl Fallback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartDateDefaulted => "start_date_defaulted",
            Self::EndDateDefaulted => "end_date_defaulted",
            Self::EndDateClamped => "end_date_clamped",
            Self::AllDayForced => "all_day_forced",
            Self::StartTimeDefaulted => "start_time_defaulted",
            Self::EndTimeDerived => "end_time_derived",
            Self::EndRolledOver => "end_rolled_over",
            Self::TitleDefaulted => "title_defaulted",
            Self::DescriptionDefaulted => "description_defaulted",
            Self::LocationDefaulted => "location_defaulted",
            Self::ConfidenceDefaulted => "confidence_defaulted",
        }
    }
}

impl std::fmt::Display for Fallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the resolver: the schedule plus every default applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub schedule: ResolvedSchedule,
    pub fallbacks: Vec<Fallback>,
}
