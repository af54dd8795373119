//! # Reading
//!
//! The outcome of querying one source in one cycle. A reading is either the
//! validated payload of the source or the human-readable cause of its failure,
//! never both. On the wire a failure is recognisable by its `error` key alone,
//! so consumers never have to infer a failure from missing fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::aggregator::error::SourceError;

/// Validated payload fields of a successful reading.
pub type Fields = Map<String, Value>;

/// Single-shot result of one source for one cycle.
///
/// `Failure` is declared first so untagged deserialization only picks it when the
/// object carries an `error` key; validated success payloads never do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    /// The source failed; `error` carries the cause.
    Failure {
        /// Human-readable cause, e.g. `HTTP 503: Sensor Read Error`.
        error: String,
    },
    /// The source answered with a payload matching its schema.
    Success(Fields),
}

impl Reading {
    /// A failure reading with the given cause.
    pub fn failure(error: impl Into<String>) -> Self {
        Reading::Failure { error: error.into() }
    }

    /// `true` when the source produced a valid payload.
    pub fn is_success(&self) -> bool {
        matches!(self, Reading::Success(_))
    }

    /// Payload fields, `None` for a failure.
    pub fn fields(&self) -> Option<&Fields> {
        match self {
            Reading::Success(fields) => Some(fields),
            Reading::Failure { .. } => None,
        }
    }

    /// Failure cause, `None` for a success.
    pub fn error(&self) -> Option<&str> {
        match self {
            Reading::Failure { error } => Some(error),
            Reading::Success(_) => None,
        }
    }

    /// One-word console rendering used by the per-cycle status report.
    ///
    /// Vision readings render as `label (score)`, sensor readings as `value unit`.
    pub fn summary(&self) -> String {
        let Some(fields) = self.fields() else {
            return "OFFLINE".to_string();
        };

        if let (Some(label), Some(score)) = (
            fields.get("label").and_then(Value::as_str),
            fields.get("score").and_then(Value::as_f64),
        ) {
            return format!("{} ({:.2})", label, score);
        }

        match (fields.get("value"), fields.get("unit").and_then(Value::as_str)) {
            (Some(value), Some(unit)) => format!("{} {}", value, unit),
            (Some(value), None) => value.to_string(),
            _ => "ok".to_string(),
        }
    }
}

impl From<Result<Fields, SourceError>> for Reading {
    fn from(result: Result<Fields, SourceError>) -> Self {
        match result {
            Ok(fields) => Reading::Success(fields),
            Err(e) => Reading::Failure { error: e.to_string() },
        }
    }
}
