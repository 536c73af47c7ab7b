//! Temporal resolution and gating for TexCal.
//!
//! Takes the loosely structured output of a language model and turns it into
//! one fully specified calendar event, or a rejection:
//! - [`prompt`] — instruction text embedding the reference date
//! - [`resolver`] — field parsing, defaulting, all-day inference
//! - [`gate`] — fixed confidence threshold
//! - [`pipeline`] — the sequential service tying them to a gateway

pub mod clock;
pub mod gate;
pub mod pipeline;
pub mod prompt;
pub mod resolver;
pub mod schedule;

pub use clock::{Clock, FixedClock, Reference, SystemClock};
pub use gate::{GateDecision, MIN_CONFIDENCE, REJECTION_MESSAGE};
pub use pipeline::{Extraction, ExtractionPipeline, ProgressReporter, SilentProgress};
pub use schedule::{Fallback, Resolution, ResolvedSchedule};
