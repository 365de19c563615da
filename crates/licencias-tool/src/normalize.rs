//! Response normalization.
//!
//! Raw rows come back keyed by field id, mixed with bookkeeping keys, in
//! whatever order the API produced. A [`NormalizedRecord`] always reads the
//! same way:
//!
//! 1. `Empleado`
//! 2. `Fecha de inicio`, `Fecha Finalización`, `Reincorporación`
//! 3. every other non-system field, in arrival order, named through the
//!    catalog
//!
//! A known field missing from the row is simply absent (never `null`), and
//! system keys never survive.

use crate::catalog;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Used when the response has no recognizable `status`.
pub const INVALID_RESPONSE_MESSAGE: &str = "Respuesta inválida de la API";
/// Used when the API reports failure without an `error` text.
pub const UNKNOWN_UPSTREAM_ERROR: &str = "Error desconocido al consultar la API";

const SUCCESS_STATUS: &str = "success";

/// One leave entry, keyed by display name, in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedRecord(Map<String, Value>);

impl NormalizedRecord {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of interpreting one raw API response.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    /// `status == "success"`: the rows, normalized.
    Records(Vec<NormalizedRecord>),
    /// The API answered but reported a failure (or the shape was unusable).
    Upstream(String),
}

impl NormalizeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, NormalizeOutcome::Records(_))
    }

    pub fn record_count(&self) -> usize {
        match self {
            NormalizeOutcome::Records(records) => records.len(),
            NormalizeOutcome::Upstream(_) => 0,
        }
    }
}

/// Classify a raw response and normalize its rows.
pub fn normalize(raw: &Value) -> NormalizeOutcome {
    let Some(body) = raw.as_object().filter(|o| !o.is_empty()) else {
        return NormalizeOutcome::Upstream(INVALID_RESPONSE_MESSAGE.to_string());
    };
    let Some(status) = body.get("status") else {
        return NormalizeOutcome::Upstream(INVALID_RESPONSE_MESSAGE.to_string());
    };

    if status.as_str() != Some(SUCCESS_STATUS) {
        let message = match body.get("error") {
            None | Some(Value::Null) => UNKNOWN_UPSTREAM_ERROR.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        return NormalizeOutcome::Upstream(message);
    }

    let records = match body.get("data") {
        Some(Value::Array(rows)) => rows
            .iter()
            .map(|row| match row {
                Value::Object(fields) => normalize_record(fields),
                _ => NormalizedRecord::default(),
            })
            .collect(),
        _ => Vec::new(),
    };

    NormalizeOutcome::Records(records)
}

/// Reorder and rename a single raw row.
pub fn normalize_record(raw: &Map<String, Value>) -> NormalizedRecord {
    let mut out = Map::new();

    for id in catalog::PRIORITY_FIELDS {
        if let Some(value) = raw.get(id) {
            out.insert(catalog::lookup(id).into_owned(), value.clone());
        }
    }

    for (key, value) in raw {
        if catalog::is_system_key(key) || catalog::is_priority_field(key) {
            continue;
        }
        out.insert(catalog::lookup(key).into_owned(), value.clone());
    }

    NormalizedRecord(out)
}

impl Serialize for NormalizeOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            NormalizeOutcome::Records(records) => map.serialize_entry("registros", records)?,
            NormalizeOutcome::Upstream(error) => map.serialize_entry("error", error)?,
        }
        map.end()
    }
}
