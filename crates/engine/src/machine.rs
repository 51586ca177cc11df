//! The conversation state machine.
//!
//! Drives one user through an ordered sequence of prompts, holding
//! accumulated answers, validating each answer against its measurement's
//! constraints, and deciding the next prompt or completion.
//!
//! The machine is transport-agnostic and performs no I/O: the plan (the
//! ordered step list) is captured at session start, every answer event
//! returns a [`Turn`] describing what to show next, and the caller performs
//! the ledger write when a session completes. Sessions live only in memory;
//! exactly one per user, and a new start silently discards any in-flight
//! session for that user.

use std::collections::HashMap;
use tallygram_core::error::SessionError;
use tallygram_core::measurement::{
    FixedField, Measurement, MeasurementKind, UserId, MAX_CEILING, MAX_NAME_LEN, MIN_CEILING,
};
use tallygram_core::session::{validate_numeric, Session, Stage};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Prompt opening the measurement-creation sub-dialogue.
pub const NAME_PROMPT: &str = "What should the new measurement be called?";

/// Prompt asking for a new measurement's ceiling.
pub fn ceiling_prompt(name: &str) -> String {
    format!("Numeric ceiling for {name} (1-100), or 'text' for free text?")
}

/// One step of a tracking dialogue — a fixed field or a custom measurement,
/// flattened to what validation needs.
#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub prompt: String,
    pub kind: MeasurementKind,
    pub min: i64,
    pub max: i64,
}

impl From<&FixedField> for Step {
    fn from(f: &FixedField) -> Self {
        Self {
            name: f.name.clone(),
            prompt: f.prompt.clone(),
            kind: f.kind,
            min: 0,
            max: f.max,
        }
    }
}

impl From<&Measurement> for Step {
    fn from(m: &Measurement) -> Self {
        Self {
            name: m.name.clone(),
            prompt: m.prompt(),
            kind: m.kind,
            min: m.min,
            max: m.max,
        }
    }
}

/// The outcome of one machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// Show this prompt and wait for the next answer.
    Prompt(String),

    /// The answer was rejected; re-emit the same prompt with a notice.
    /// No state changed and nothing was recorded.
    Rejected { notice: String, prompt: String },

    /// The dialogue finished; the session is already cleared. The caller
    /// assembles and appends the record.
    Completed { answers: Vec<(String, String)> },

    /// Sub-dialogue: the name was accepted, now ask for the ceiling.
    CeilingPrompt { name: String },

    /// Sub-dialogue finished; the session is already cleared. The caller
    /// persists the definition and extends the ledger header.
    Defined {
        name: String,
        kind: MeasurementKind,
        max: i64,
    },
}

struct Entry {
    session: Session,
    plan: Vec<Step>,
}

/// Per-user dialogue state machine.
///
/// Events for one user arrive sequentially (transport guarantee), so a
/// single async mutex over the session map is enough; sessions of distinct
/// users never share state.
pub struct TrackerMachine {
    sessions: Mutex<HashMap<String, Entry>>,
}

impl TrackerMachine {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Start a tracking dialogue, discarding any in-flight session for this
    /// user. `plan` must be non-empty (the caller guards binding existence
    /// and registry non-emptiness before starting).
    pub async fn start(&self, user_id: &UserId, plan: Vec<Step>, dynamic: bool) -> Turn {
        debug_assert!(!plan.is_empty());
        let mut session = Session::new(user_id.clone());
        session.stage = if dynamic {
            Stage::AwaitingMeasurement(0)
        } else {
            Stage::AwaitingFixedField(0)
        };

        let first_prompt = plan[0].prompt.clone();
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&user_id.0) {
            info!(user_id = %user_id, "Discarding in-flight session on restart");
        }
        sessions.insert(user_id.0.clone(), Entry { session, plan });
        Turn::Prompt(first_prompt)
    }

    /// Start the measurement-creation sub-dialogue, discarding any in-flight
    /// session for this user.
    pub async fn begin_define(&self, user_id: &UserId) -> Turn {
        let mut session = Session::new(user_id.clone());
        session.stage = Stage::AwaitingMeasurementName;

        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&user_id.0) {
            info!(user_id = %user_id, "Discarding in-flight session on restart");
        }
        sessions.insert(
            user_id.0.clone(),
            Entry {
                session,
                plan: Vec::new(),
            },
        );
        Turn::Prompt(NAME_PROMPT.into())
    }

    /// Feed a user answer into the machine.
    pub async fn answer(&self, user_id: &UserId, text: &str) -> Result<Turn, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions
            .get_mut(&user_id.0)
            .ok_or_else(|| SessionError::NotInSession(user_id.0.clone()))?;

        let turn = match entry.session.stage.clone() {
            Stage::AwaitingFixedField(i) | Stage::AwaitingMeasurement(i) => {
                Self::collection_turn(entry, i, text)
            }
            Stage::AwaitingMeasurementName => Self::name_turn(entry, text),
            Stage::AwaitingMeasurementMax { name } => Self::ceiling_turn(&name, text),
            Stage::Idle => {
                // Idle sessions are never stored; defensive only.
                return Err(SessionError::NotInSession(user_id.0.clone()));
            }
        };

        // Terminal turns clear the session, success or not downstream.
        if matches!(turn, Turn::Completed { .. } | Turn::Defined { .. }) {
            sessions.remove(&user_id.0);
        }

        Ok(turn)
    }

    fn collection_turn(entry: &mut Entry, index: usize, text: &str) -> Turn {
        let step = &entry.plan[index];

        if step.kind == MeasurementKind::Numeric {
            if let Err(rejection) = validate_numeric(text, step.min, step.max) {
                debug!(step = %step.name, "Answer rejected, re-prompting");
                return Turn::Rejected {
                    notice: rejection.notice(),
                    prompt: step.prompt.clone(),
                };
            }
        }
        // Answers are recorded verbatim; only validation trims.

        let name = step.name.clone();
        entry.session.record(name, text);

        let next = index + 1;
        if next < entry.plan.len() {
            entry.session.stage = match entry.session.stage {
                Stage::AwaitingMeasurement(_) => Stage::AwaitingMeasurement(next),
                _ => Stage::AwaitingFixedField(next),
            };
            Turn::Prompt(entry.plan[next].prompt.clone())
        } else {
            Turn::Completed {
                answers: std::mem::take(&mut entry.session.answers),
            }
        }
    }

    fn name_turn(entry: &mut Entry, text: &str) -> Turn {
        let name = text.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Turn::Rejected {
                notice: format!("The name must be 1 to {MAX_NAME_LEN} characters."),
                prompt: NAME_PROMPT.into(),
            };
        }
        entry.session.stage = Stage::AwaitingMeasurementMax { name: name.into() };
        Turn::CeilingPrompt { name: name.into() }
    }

    fn ceiling_turn(name: &str, text: &str) -> Turn {
        let text = text.trim();
        if text.eq_ignore_ascii_case("text") {
            return Turn::Defined {
                name: name.to_string(),
                kind: MeasurementKind::Text,
                max: 0,
            };
        }
        match validate_numeric(text, MIN_CEILING, MAX_CEILING) {
            Ok(max) => Turn::Defined {
                name: name.to_string(),
                kind: MeasurementKind::Numeric,
                max,
            },
            Err(_) => Turn::Rejected {
                notice: format!(
                    "Reply with a ceiling between {MIN_CEILING} and {MAX_CEILING}, or 'text'."
                ),
                prompt: ceiling_prompt(name),
            },
        }
    }

    /// Whether the user has a dialogue in progress.
    pub async fn is_active(&self, user_id: &UserId) -> bool {
        self.sessions.lock().await.contains_key(&user_id.0)
    }

    /// A copy of the user's session, if any (tests and diagnostics).
    pub async fn snapshot(&self, user_id: &UserId) -> Option<Session> {
        self.sessions
            .lock()
            .await
            .get(&user_id.0)
            .map(|e| e.session.clone())
    }

    /// Discard the user's session, if any.
    pub async fn clear(&self, user_id: &UserId) {
        self.sessions.lock().await.remove(&user_id.0);
    }
}

impl Default for TrackerMachine {
    fn default() -> Self {
        Self::new()
    }
}
