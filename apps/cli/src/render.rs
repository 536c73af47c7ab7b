//! Output formats for an extraction: text, JSON, and iCalendar.

use chrono::{DateTime, FixedOffset, Utc};
use ical::generator::Emitter;
use ical::parser::ical::component::{IcalCalendar, IcalEvent};
use ical::property::Property;
use texcal_core::{Extraction, GateDecision, REJECTION_MESSAGE, ResolvedSchedule};

/// Output format for `extract` and `resolve`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
    Ics,
}

/// Render an extraction for stdout. Returns `None` when a rejected
/// extraction has nothing to print in this format.
pub(crate) fn render(
    extraction: &Extraction,
    format: OutputFormat,
) -> color_eyre::eyre::Result<Option<String>> {
    Ok(match (format, &extraction.decision) {
        (OutputFormat::Json, _) => Some(serde_json::to_string_pretty(extraction)? + "\n"),
        (OutputFormat::Text, _) => Some(render_text(extraction)),
        (OutputFormat::Ics, GateDecision::Accepted { schedule }) => Some(render_ics(
            schedule,
            Utc::now(),
            &uuid::Uuid::now_v7().to_string(),
        )),
        (OutputFormat::Ics, GateDecision::Rejected { .. }) => None,
    })
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

fn render_text(extraction: &Extraction) -> String {
    let schedule = match &extraction.decision {
        GateDecision::Accepted { schedule } => schedule,
        GateDecision::Rejected { confidence } => {
            return format!("{REJECTION_MESSAGE} (confidence {confidence:.2})\n");
        }
    };

    let mut out = String::new();
    out.push_str(&format!("  Title:       {}\n", schedule.title()));
    out.push_str(&format!("  When:        {}\n", when(schedule)));
    out.push_str(&format!("  Where:       {}\n", schedule.location()));
    out.push_str(&format!("  Description: {}\n", schedule.description()));
    out.push_str(&format!("  Confidence:  {:.2}\n", schedule.confidence()));
    if !extraction.fallbacks.is_empty() {
        let names: Vec<&str> = extraction.fallbacks.iter().map(|f| f.as_str()).collect();
        out.push_str(&format!("  Defaults:    {}\n", names.join(", ")));
    }
    out
}

fn when(schedule: &ResolvedSchedule) -> String {
    let start = schedule.start();
    let end = schedule.end();

    if schedule.all_day() {
        // The end is exclusive; show the last covered day.
        let first = start.date_naive();
        let last = (end - chrono::TimeDelta::days(1)).date_naive().max(first);
        if first == last {
            format!("{} (all day)", first.format("%a %Y-%m-%d"))
        } else {
            format!(
                "{} – {} (all day)",
                first.format("%a %Y-%m-%d"),
                last.format("%a %Y-%m-%d")
            )
        }
    } else if start.date_naive() == end.date_naive() {
        format!(
            "{}–{} {}",
            start.format("%a %Y-%m-%d %H:%M"),
            end.format("%H:%M"),
            start.format("%:z")
        )
    } else {
        format!(
            "{} – {} {}",
            start.format("%a %Y-%m-%d %H:%M"),
            end.format("%a %Y-%m-%d %H:%M"),
            start.format("%:z")
        )
    }
}

// ---------------------------------------------------------------------------
// iCalendar (RFC 5545)
// ---------------------------------------------------------------------------

/// Render an accepted schedule as a single-event `VCALENDAR`.
///
/// All-day events use `VALUE=DATE` with the exclusive end date; timed
/// events are written in UTC. Line folding is left to the `ical` emitter.
pub(crate) fn render_ics(schedule: &ResolvedSchedule, stamp: DateTime<Utc>, uid: &str) -> String {
    let mut event = IcalEvent::new();
    event.properties = vec![
        property("UID", format!("{uid}@texcal")),
        property("DTSTAMP", stamp.format(UTC_FORMAT).to_string()),
    ];

    if schedule.all_day() {
        event.properties.push(date_property("DTSTART", schedule.start()));
        event.properties.push(date_property("DTEND", schedule.end()));
    } else {
        let utc = |dt: DateTime<FixedOffset>| {
            dt.with_timezone(&Utc).format(UTC_FORMAT).to_string()
        };
        event.properties.push(property("DTSTART", utc(schedule.start())));
        event.properties.push(property("DTEND", utc(schedule.end())));
    }

    event.properties.extend([
        property("SUMMARY", escape_text(schedule.title())),
        property("DESCRIPTION", escape_text(schedule.description())),
        property("LOCATION", escape_text(schedule.location())),
    ]);

    let mut calendar = IcalCalendar::new();
    calendar.properties = vec![
        property("VERSION", "2.0".to_string()),
        property(
            "PRODID",
            format!("-//TexCal//texcal {}//EN", env!("CARGO_PKG_VERSION")),
        ),
    ];
    calendar.events.push(event);
    calendar.generate()
}

const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

fn property(name: &str, value: String) -> Property {
    Property {
        name: name.to_string(),
        params: None,
        value: Some(value),
    }
}

fn date_property(name: &str, dt: DateTime<FixedOffset>) -> Property {
    Property {
        name: name.to_string(),
        params: Some(vec![("VALUE".to_string(), vec!["DATE".to_string()])]),
        value: Some(dt.date_naive().format("%Y%m%d").to_string()),
    }
}

/// Escape a TEXT value (RFC 5545 §3.3.11). The emitter writes values as given.
fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}
