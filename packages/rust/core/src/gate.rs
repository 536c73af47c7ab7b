//! Fixed-threshold accept/reject decision on a resolved schedule.

use serde::Serialize;

use crate::schedule::ResolvedSchedule;

/// Lowest confidence at which a schedule is accepted.
pub const MIN_CONFIDENCE: f64 = 0.4;

/// User-facing message for a rejected schedule.
pub const REJECTION_MESSAGE: &str = "could not determine a clear schedule";

/// Outcome of the confidence gate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GateDecision {
    /// Clear enough to hand to a calendar.
    Accepted { schedule: ResolvedSchedule },
    /// Too uncertain; nothing should be created.
    Rejected { confidence: f64 },
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// The accepted schedule, if any.
    pub fn accepted(&self) -> Option<&ResolvedSchedule> {
        match self {
            Self::Accepted { schedule } => Some(schedule),
            Self::Rejected { .. } => None,
        }
    }
}

/// Accept iff `confidence >= MIN_CONFIDENCE`. A NaN confidence is rejected.
pub fn gate(schedule: ResolvedSchedule) -> GateDecision {
    let confidence = schedule.confidence();
    if confidence >= MIN_CONFIDENCE {
        GateDecision::Accepted { schedule }
    } else {
        GateDecision::Rejected { confidence }
    }
}
