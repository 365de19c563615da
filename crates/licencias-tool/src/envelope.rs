//! Result envelopes handed back to the tool-calling layer.
//!
//! Wire shape:
//!
//! ```json
//! { "resultado": { "registros": [ ... ] },
//!   "metadata":  { "success": true, "entity_id": 43, ... } }
//!
//! { "resultado": { "error": "..." },
//!   "metadata":  { "success": false, "error": "...", "timestamp": "..." } }
//! ```

use crate::error::ToolError;
use crate::normalize::{NormalizeOutcome, NormalizedRecord};
use crate::query::QuerySpec;
use chrono::{DateTime, Local};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Metadata for a call that reached the API and got JSON back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedCall {
    /// True only when the API itself reported `status == "success"`.
    pub success: bool,
    pub entity_id: u32,
    pub reports_id: Option<u32>,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Local>,
    pub limit: u32,
    pub select_fields: String,
    pub record_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Configuration,
    InvalidQuery,
    Transport,
    Decode,
}

/// Metadata for a call that never produced a usable response.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedCall {
    pub kind: FailureKind,
    pub error: String,
    pub timestamp: DateTime<Local>,
    /// Leading part of a non-JSON body, for diagnostics.
    pub response_text: Option<String>,
}

impl Serialize for FailedCall {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("success", &false)?;
        map.serialize_entry("error_kind", &self.kind)?;
        map.serialize_entry("error", &self.error)?;
        map.serialize_entry("timestamp", &self.timestamp)?;
        if let Some(text) = &self.response_text {
            map.serialize_entry("response_text", text)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CallMetadata {
    Completed(CompletedCall),
    Failed(FailedCall),
}

impl CallMetadata {
    pub fn success(&self) -> bool {
        match self {
            CallMetadata::Completed(call) => call.success,
            CallMetadata::Failed(_) => false,
        }
    }
}

/// Normalized data plus call metadata: the tool's only output type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope {
    #[serde(rename = "resultado")]
    pub outcome: NormalizeOutcome,
    pub metadata: CallMetadata,
}

impl ResultEnvelope {
    /// Envelope for configuration, query, transport and decode failures.
    pub fn failure(error: &ToolError) -> Self {
        let (kind, response_text) = match error {
            ToolError::Configuration { .. } | ToolError::HttpClient(_) => {
                (FailureKind::Configuration, None)
            }
            ToolError::InvalidQuery(_) => (FailureKind::InvalidQuery, None),
            ToolError::Transport(_) => (FailureKind::Transport, None),
            ToolError::Decode {
                body_preview,
                truncated,
            } => {
                let text = if *truncated {
                    format!("{body_preview}...")
                } else {
                    body_preview.clone()
                };
                (FailureKind::Decode, Some(text))
            }
        };

        Self {
            outcome: NormalizeOutcome::Upstream(error.to_string()),
            metadata: CallMetadata::Failed(FailedCall {
                kind,
                error: error.diagnostic(),
                timestamp: Local::now(),
                response_text,
            }),
        }
    }

    pub fn success(&self) -> bool {
        self.metadata.success()
    }

    pub fn records(&self) -> &[NormalizedRecord] {
        match &self.outcome {
            NormalizeOutcome::Records(records) => records,
            NormalizeOutcome::Upstream(_) => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            NormalizeOutcome::Records(_) => None,
            NormalizeOutcome::Upstream(error) => Some(error),
        }
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Milliseconds, rounded to nearest.
pub fn round_millis(elapsed: Duration) -> u64 {
    ((elapsed.as_micros() + 500) / 1000) as u64
}

/// Stamp a normalized outcome with the metadata of the call that produced it.
pub fn build_envelope(
    outcome: NormalizeOutcome,
    spec: &QuerySpec,
    elapsed: Duration,
) -> ResultEnvelope {
    let metadata = CallMetadata::Completed(CompletedCall {
        success: outcome.is_success(),
        entity_id: spec.entity_id(),
        reports_id: spec.report_id(),
        response_time_ms: round_millis(elapsed),
        timestamp: Local::now(),
        limit: spec.limit(),
        select_fields: spec.select_fields_param(),
        record_count: outcome.record_count(),
    });

    ResultEnvelope { outcome, metadata }
}
