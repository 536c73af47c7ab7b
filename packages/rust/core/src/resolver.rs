//! Turns an untrusted extraction payload into a concrete schedule.
//!
//! Resolution never fails. Every missing or malformed field has a fallback:
//!
//! 1. `start_date` → reference date; `end_date` → resolved start date.
//! 2. Times that are absent or unparseable count as not given.
//! 3. With no raw time string at all, the event is all-day regardless of the
//!    model's `all_day` claim. Otherwise the model's claim stands.
//! 4. All-day: `[midnight(start), midnight(end + 1 day))`. Timed: start time
//!    defaults to 13:00, end time to start + 1 hour.
//! 5. Blank text fields get placeholders; description falls back to the
//!    first 500 characters of the user's text.
//!
//! An end that would precede the start is repaired (see [`Fallback::EndDateClamped`]
//! and [`Fallback::EndRolledOver`]), so `end >= start` always holds.

use chrono::{
    DateTime, Days, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeDelta, TimeZone, Timelike,
};
use tracing::debug;

use texcal_shared::ExtractionPayload;

use crate::clock::Reference;
use crate::schedule::{Fallback, Resolution, ResolvedSchedule};

/// Title used when the model gives none.
pub const UNTITLED: &str = "Untitled";

/// Location used when the model gives none.
pub const NO_LOCATION: &str = "No location";

/// How much of the user's text becomes the fallback description.
pub const DESCRIPTION_FALLBACK_CHARS: usize = 500;

/// Start hour for timed events with no parseable start time.
const DEFAULT_START_HOUR: u32 = 13;

/// Length in hours of a timed event with no parseable end time.
const DEFAULT_DURATION_HOURS: i64 = 1;

/// Resolve a payload against a reference date and zone.
///
/// `raw_text` is the user's original text, used only for the description
/// fallback. Pure: the same inputs always give the same output.
pub fn resolve<Tz: TimeZone>(
    payload: &ExtractionPayload,
    raw_text: &str,
    reference: &Reference<Tz>,
) -> Resolution {
    let mut fallbacks = Vec::new();
    let zone = &reference.zone;

    // --- Dates ---
    let start_date = parse_date(payload.start_date.as_deref()).unwrap_or_else(|| {
        fallbacks.push(Fallback::StartDateDefaulted);
        reference.date
    });
    let mut end_date = parse_date(payload.end_date.as_deref()).unwrap_or_else(|| {
        fallbacks.push(Fallback::EndDateDefaulted);
        start_date
    });
    if end_date < start_date {
        fallbacks.push(Fallback::EndDateClamped);
        end_date = start_date;
    }

    // --- All-day inference (raw strings, before parsing) ---
    let has_time_info = !is_blank(payload.start_time.as_deref())
        || !is_blank(payload.end_time.as_deref());
    let all_day = if has_time_info {
        payload.all_day
    } else {
        if !payload.all_day {
            fallbacks.push(Fallback::AllDayForced);
        }
        true
    };

    // --- Instants ---
    let (start, end) = if all_day {
        let next_day = end_date.checked_add_days(Days::new(1)).unwrap_or(end_date);
        (
            localize(zone, start_date.and_time(NaiveTime::MIN)),
            localize(zone, next_day.and_time(NaiveTime::MIN)),
        )
    } else {
        let start_time = parse_time(payload.start_time.as_deref()).unwrap_or_else(|| {
            fallbacks.push(Fallback::StartTimeDefaulted);
            default_start_time()
        });
        let end_time = parse_time(payload.end_time.as_deref()).unwrap_or_else(|| {
            fallbacks.push(Fallback::EndTimeDerived);
            start_time
                .overflowing_add_signed(TimeDelta::hours(DEFAULT_DURATION_HOURS))
                .0
        });

        let start = localize(zone, start_date.and_time(start_time));
        let mut end = localize(zone, end_date.and_time(end_time));
        if end < start {
            // Only reachable when end_date == start_date after clamping.
            fallbacks.push(Fallback::EndRolledOver);
            let next_day = end_date.checked_add_days(Days::new(1)).unwrap_or(end_date);
            end = localize(zone, next_day.and_time(end_time));
        }
        (start, end)
    };

    // --- Text fields ---
    let title = non_blank(&payload.title).unwrap_or_else(|| {
        fallbacks.push(Fallback::TitleDefaulted);
        UNTITLED.to_string()
    });
    let description = non_blank(&payload.description).unwrap_or_else(|| {
        fallbacks.push(Fallback::DescriptionDefaulted);
        raw_text.chars().take(DESCRIPTION_FALLBACK_CHARS).collect()
    });
    let location = non_blank(&payload.location).unwrap_or_else(|| {
        fallbacks.push(Fallback::LocationDefaulted);
        NO_LOCATION.to_string()
    });

    let confidence = payload.confidence.unwrap_or_else(|| {
        fallbacks.push(Fallback::ConfidenceDefaulted);
        0.0
    });

    debug!(
        %start_date,
        %end_date,
        all_day,
        confidence,
        fallbacks = fallbacks.len(),
        "resolved schedule"
    );

    Resolution {
        schedule: ResolvedSchedule::new(
            title,
            description,
            location,
            to_fixed(&start),
            to_fixed(&end),
            all_day,
            confidence,
        ),
        fallbacks,
    }
}

// ---------------------------------------------------------------------------
// Field parsing
// ---------------------------------------------------------------------------

fn is_blank(raw: Option<&str>) -> bool {
    raw.is_none_or(|s| s.trim().is_empty())
}

fn non_blank(raw: &Option<String>) -> Option<String> {
    raw.as_ref().filter(|s| !s.trim().is_empty()).cloned()
}

/// ISO calendar date, exactly `YYYY-MM-DD`.
fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?;
    let shaped = raw.len() == 10
        && raw.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// 24-hour clock time, exactly `HH:MM` or `HH:MM:SS`. Leap seconds are refused.
fn parse_time(raw: Option<&str>) -> Option<NaiveTime> {
    let raw = raw?;
    let format = match raw.len() {
        5 => "%H:%M",
        8 => "%H:%M:%S",
        _ => return None,
    };
    let shaped = raw.bytes().enumerate().all(|(i, b)| match i % 3 {
        2 => b == b':',
        _ => b.is_ascii_digit(),
    });
    if !shaped {
        return None;
    }
    NaiveTime::parse_from_str(raw, format)
        .ok()
        .filter(|t| t.nanosecond() < 1_000_000_000)
}

fn default_start_time() -> NaiveTime {
    NaiveTime::from_hms_opt(DEFAULT_START_HOUR, 0, 0).unwrap_or(NaiveTime::MIN)
}

// ---------------------------------------------------------------------------
// Zone handling
// ---------------------------------------------------------------------------

/// Place a local date-time in `zone`.
///
/// A time repeated by a DST fold takes the earlier instant. A time skipped by
/// a DST gap is read with the offset in force before the gap, which lands it
/// the length of the gap later on the wall clock (02:30 → 03:30).
fn localize<Tz: TimeZone>(zone: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    match zone.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let day_before = local.checked_sub_signed(TimeDelta::days(1)).unwrap_or(local);
            let before = zone.offset_from_utc_datetime(&day_before).fix();
            let utc = local
                .checked_sub_signed(TimeDelta::seconds(i64::from(before.local_minus_utc())))
                .unwrap_or(local);
            zone.from_utc_datetime(&utc)
        }
    }
}

fn to_fixed<Tz: TimeZone>(dt: &DateTime<Tz>) -> DateTime<FixedOffset> {
    dt.with_timezone(&dt.offset().fix())
}
