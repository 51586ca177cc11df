//! Measurement definitions — the user-configured fields a tracking dialogue
//! collects, plus the fixed legacy field set.
//!
//! A measurement is either `Numeric` (integer in `[0, max]`) or `Text`
//! (free text, recorded as-is). The list order is creation order and fixes both
//! the prompt order and the default column order in the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a measurement name.
pub const MAX_NAME_LEN: usize = 50;

/// The lowest allowed numeric ceiling.
pub const MIN_CEILING: i64 = 1;

/// The highest allowed numeric ceiling.
pub const MAX_CEILING: i64 = 100;

/// Opaque stable user identity, as delivered by the chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The kind of value a measurement collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    /// Integer answer, validated against `[0, max]`.
    Numeric,
    /// Free-text answer, accepted unconditionally.
    Text,
}

impl MeasurementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "numeric" => Some(Self::Numeric),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// A user-defined measurement.
///
/// `min` is fixed at 0 in the current schema; it is stored explicitly so a
/// future lower bound does not require a migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    /// Store-assigned row id, unique per user.
    pub id: i64,

    /// User-visible label, non-empty, at most [`MAX_NAME_LEN`] chars.
    pub name: String,

    pub kind: MeasurementKind,

    /// Lower bound for Numeric answers. Always 0.
    pub min: i64,

    /// Upper bound for Numeric answers, in `[1, 100]`. Ignored for Text.
    pub max: i64,

    pub created_at: DateTime<Utc>,
}

impl Measurement {
    /// The prompt shown when this measurement is being collected.
    pub fn prompt(&self) -> String {
        match self.kind {
            MeasurementKind::Numeric => format!("{} ({}-{})?", self.name, self.min, self.max),
            MeasurementKind::Text => format!("{}?", self.name),
        }
    }
}

/// One of the seven legacy fields collected when no custom measurements
/// are in play: fatigue, mood, sleep, physical_load, mental_load,
/// symptoms, notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedField {
    /// Column name used when assembling the row.
    pub name: String,

    /// Question text shown to the user.
    pub prompt: String,

    pub kind: MeasurementKind,

    /// Upper bound for Numeric fields.
    pub max: i64,
}

impl FixedField {
    pub fn numeric(name: &str, prompt: &str, max: i64) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            kind: MeasurementKind::Numeric,
            max,
        }
    }

    pub fn text(name: &str, prompt: &str) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            kind: MeasurementKind::Text,
            max: 0,
        }
    }
}

/// The legacy seven-field questionnaire, in prompt order.
pub fn legacy_fields() -> Vec<FixedField> {
    vec![
        FixedField::numeric("fatigue", "Fatigue (0-10)?", 10),
        FixedField::numeric("mood", "Mood (0-10)?", 10),
        FixedField::text("sleep", "How did you sleep?"),
        FixedField::numeric("physical_load", "Physical load (0-10)?", 10),
        FixedField::numeric("mental_load", "Mental load (0-10)?", 10),
        FixedField::text("symptoms", "Any symptoms?"),
        FixedField::text("notes", "Notes or comments?"),
    ]
}
