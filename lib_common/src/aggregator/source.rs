//! # Sources
//!
//! Static description of the upstream services polled each cycle and the fixed
//! schema each of them must honour. Payloads are validated here, at the edge, so
//! everything downstream of the source client only ever sees well-formed fields
//! or a typed failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::aggregator::error::{SourceError, SourceSpecError};
use crate::aggregator::reading::Fields;

/// Snapshot keys a source name may not shadow.
pub const RESERVED_NAMES: [&str; 3] = ["timestamp", "time_str", "cycle"];

/// Label the vision worker reports before its first inference.
const FOG_INITIALIZING_LABEL: &str = "Initializing...";

/// The kinds of upstream the aggregator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Camera inference worker scoring frames for fog.
    Fog,
    /// PM2.5 particulate sensor behind the hardware bridge.
    Particulate,
    /// Temperature sensor behind the hardware bridge.
    Temperature,
}

impl SourceKind {
    /// Path of the endpoint, relative to the service base URL.
    pub fn path(self) -> &'static str {
        match self {
            SourceKind::Fog => "api/fog",
            SourceKind::Particulate => "api/pm25",
            SourceKind::Temperature => "api/temp",
        }
    }

    /// Key under which readings of this kind are published.
    pub fn default_name(self) -> &'static str {
        match self {
            SourceKind::Fog => "fog",
            SourceKind::Particulate => "pm25",
            SourceKind::Temperature => "temp",
        }
    }

    /// Checks a decoded 2xx body against the schema of this kind.
    pub fn validate(self, body: Value) -> Result<Fields, SourceError> {
        let validated = match self {
            SourceKind::Fog => validate_fog(body)?,
            SourceKind::Particulate => validate_sensor::<i64>(body, "PM2.5", |v| {
                if *v < 0 {
                    Err(format!("negative particulate value {}", v))
                } else {
                    Ok(())
                }
            })?,
            SourceKind::Temperature => validate_sensor::<f64>(body, "Temperature", |v| {
                if v.is_finite() {
                    Ok(())
                } else {
                    Err("temperature is not a finite number".to_string())
                }
            })?,
        };

        match validated {
            Value::Object(fields) => Ok(fields),
            other => Err(SourceError::Schema(format!("expected an object, got {}", other))),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FogPayload {
    score: f64,
    label: String,
    timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SensorPayload<T> {
    sensor: String,
    value: T,
    unit: String,
    status: String,
}

fn schema_error(e: serde_json::Error) -> SourceError {
    SourceError::Schema(e.to_string())
}

fn validate_fog(body: Value) -> Result<Value, SourceError> {
    if body.get("label").and_then(Value::as_str) == Some(FOG_INITIALIZING_LABEL) {
        return Err(SourceError::Initializing);
    }

    let payload: FogPayload = serde_json::from_value(body).map_err(schema_error)?;
    if !(0.0..=1.0).contains(&payload.score) {
        return Err(SourceError::Schema(format!("fog score {} outside 0..1", payload.score)));
    }
    if payload.label != "Foggy" && payload.label != "Non-Foggy" {
        return Err(SourceError::Schema(format!("unknown fog label '{}'", payload.label)));
    }

    serde_json::to_value(payload).map_err(schema_error)
}

fn validate_sensor<T>(
    body: Value,
    sensor: &str,
    check: impl Fn(&T) -> Result<(), String>,
) -> Result<Value, SourceError>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let payload: SensorPayload<T> = serde_json::from_value(body).map_err(schema_error)?;
    if payload.sensor != sensor {
        return Err(SourceError::Schema(format!(
            "expected sensor '{}', got '{}'",
            sensor, payload.sensor
        )));
    }
    if payload.status != "success" {
        return Err(SourceError::Schema(format!("sensor status '{}'", payload.status)));
    }
    check(&payload.value).map_err(SourceError::Schema)?;

    serde_json::to_value(payload).map_err(schema_error)
}

/// One configured upstream endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpec {
    name: String,
    kind: SourceKind,
    endpoint: Url,
    timeout: Duration,
}

impl SourceSpec {
    /// Builds a source published under the default name of `kind`.
    ///
    /// `base_url` is the root of the service (`http://localhost:8085`); the kind's
    /// path is appended to it.
    pub fn new(kind: SourceKind, base_url: &str, timeout: Duration) -> Result<Self, SourceSpecError> {
        Self::named(kind.default_name(), kind, base_url, timeout)
    }

    /// Builds a source published under an explicit name.
    pub fn named(
        name: &str,
        kind: SourceKind,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, SourceSpecError> {
        if name.trim().is_empty() {
            return Err(SourceSpecError::EmptyName);
        }
        if RESERVED_NAMES.contains(&name) {
            return Err(SourceSpecError::ReservedName(name.to_string()));
        }

        let invalid = |reason: String| SourceSpecError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };
        let mut base = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("not a base url".to_string()));
        }
        // Url::join replaces the last segment unless the path ends with a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join(kind.path()).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            kind,
            endpoint,
            timeout,
        })
    }

    /// The three sources of the weather station: vision worker plus the two
    /// sensors exposed by the hardware bridge.
    pub fn station(fog_url: &str, sensor_url: &str, timeout: Duration) -> Result<Vec<Self>, SourceSpecError> {
        Ok(vec![
            Self::new(SourceKind::Fog, fog_url, timeout)?,
            Self::new(SourceKind::Particulate, sensor_url, timeout)?,
            Self::new(SourceKind::Temperature, sensor_url, timeout)?,
        ])
    }

    /// Key of this source in every snapshot.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema the payload is checked against.
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Absolute URL fetched every cycle.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Budget for one fetch, connect to last body byte.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
