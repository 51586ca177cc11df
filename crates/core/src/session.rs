//! Session state — the in-memory conversation context for one user's
//! in-progress dialogue.
//!
//! A session exists only for the duration of a dialogue. It is created on a
//! start event, cleared on completion, abandonment, or error, and there is
//! exactly one per user: a new start event silently discards any in-flight
//! session for that user. That discard is a documented transition, not an
//! accident — tests assert it deliberately.

use crate::measurement::UserId;
use serde::{Deserialize, Serialize};

/// Where a session currently is in the dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// No dialogue in progress.
    Idle,

    /// Collecting the legacy questionnaire; index into the fixed field list.
    AwaitingFixedField(usize),

    /// Collecting custom measurements; index into the registry's ordered list.
    AwaitingMeasurement(usize),

    /// Measurement-creation sub-dialogue: waiting for the new name.
    AwaitingMeasurementName,

    /// Measurement-creation sub-dialogue: waiting for the ceiling (or "text").
    AwaitingMeasurementMax { name: String },
}

/// Why an answer was rejected. A rejection is a normal turn: the machine
/// re-emits the same prompt and records nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotANumber,
    OutOfRange { min: i64, max: i64 },
}

impl Rejection {
    /// The notice prefixed to the re-emitted prompt.
    pub fn notice(&self) -> String {
        match self {
            Self::NotANumber => "That must be a number.".into(),
            Self::OutOfRange { min, max } => {
                format!("That must be between {min} and {max}.")
            }
        }
    }
}

/// Parse and range-check a numeric answer.
pub fn validate_numeric(text: &str, min: i64, max: i64) -> Result<i64, Rejection> {
    let value: i64 = text.trim().parse().map_err(|_| Rejection::NotANumber)?;
    if value < min || value > max {
        return Err(Rejection::OutOfRange { min, max });
    }
    Ok(value)
}

/// One user's conversation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,

    pub stage: Stage,

    /// Collected `(name, raw answer)` pairs, insertion order = answer order.
    /// Kept as a Vec rather than a map so reconciliation can iterate in
    /// answer order.
    pub answers: Vec<(String, String)>,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            stage: Stage::Idle,
            answers: Vec::new(),
        }
    }

    /// Record a validated answer under a measurement name.
    pub fn record(&mut self, name: impl Into<String>, raw: impl Into<String>) {
        self.answers.push((name.into(), raw.into()));
    }

    /// Discard all collected state and return to Idle.
    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.answers.clear();
    }

    /// The cursor into the measurement list, if in a collection stage.
    pub fn cursor(&self) -> Option<usize> {
        match self.stage {
            Stage::AwaitingFixedField(i) | Stage::AwaitingMeasurement(i) => Some(i),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_in_range() {
        assert_eq!(validate_numeric("7", 0, 10), Ok(7));
        assert_eq!(validate_numeric("0", 0, 10), Ok(0));
        assert_eq!(validate_numeric("10", 0, 10), Ok(10));
        assert_eq!(validate_numeric(" 3 ", 0, 10), Ok(3));
    }

    #[test]
    fn validate_rejects_non_numbers() {
        assert_eq!(validate_numeric("seven", 0, 10), Err(Rejection::NotANumber));
        assert_eq!(validate_numeric("", 0, 10), Err(Rejection::NotANumber));
        assert_eq!(validate_numeric("7.5", 0, 10), Err(Rejection::NotANumber));
    }

    #[test]
    fn validate_rejects_out_of_range() {
        assert_eq!(
            validate_numeric("15", 0, 10),
            Err(Rejection::OutOfRange { min: 0, max: 10 })
        );
        assert_eq!(
            validate_numeric("-1", 0, 10),
            Err(Rejection::OutOfRange { min: 0, max: 10 })
        );
    }

    #[test]
    fn reset_clears_answers_and_stage() {
        let mut s = Session::new("u1".into());
        s.stage = Stage::AwaitingFixedField(3);
        s.record("fatigue", "5");
        s.record("mood", "7");
        s.reset();
        assert!(s.is_idle());
        assert!(s.answers.is_empty());
    }

    #[test]
    fn cursor_only_in_collection_stages() {
        let mut s = Session::new("u1".into());
        assert_eq!(s.cursor(), None);
        s.stage = Stage::AwaitingMeasurement(2);
        assert_eq!(s.cursor(), Some(2));
        s.stage = Stage::AwaitingMeasurementName;
        assert_eq!(s.cursor(), None);
    }

    #[test]
    fn rejection_notices_mention_bounds() {
        let notice = Rejection::OutOfRange { min: 0, max: 10 }.notice();
        assert!(notice.contains('0'));
        assert!(notice.contains("10"));
    }
}
