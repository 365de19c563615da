//! The query pipeline behind the `consulta_licencias_encargados` tool.

use crate::client::{ApiClient, RecordSource};
use crate::config::RukovoditelConfig;
use crate::contract::ToolArgs;
use crate::envelope::{build_envelope, ResultEnvelope};
use crate::error::ToolError;
use crate::normalize::normalize;
use crate::query::{self, Credentials, QuerySpec};
use std::sync::Arc;
use std::time::Instant;

/// Query builder → API client → normalizer → envelope, as one call.
///
/// Never fails: every error comes back as an envelope with `success=false`.
#[derive(Clone)]
pub struct LeaveRecordsTool {
    source: Arc<dyn RecordSource>,
    credentials: Credentials,
}

impl LeaveRecordsTool {
    pub fn new(source: Arc<dyn RecordSource>, credentials: Credentials) -> Self {
        Self {
            source,
            credentials,
        }
    }

    /// Tool backed by the real HTTP client.
    pub fn from_config(config: &RukovoditelConfig) -> Result<Self, ToolError> {
        let client = ApiClient::new(config)?;
        Ok(Self::new(Arc::new(client), config.credentials.clone()))
    }

    /// Run the pipeline for a validated query.
    pub async fn run(&self, spec: &QuerySpec) -> ResultEnvelope {
        let params = match query::build(spec, &self.credentials) {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(error = %e.diagnostic(), "records query not sent");
                return ResultEnvelope::failure(&e);
            }
        };

        let started = Instant::now();
        let raw = match self.source.execute(&params).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "records API call failed");
                return ResultEnvelope::failure(&e);
            }
        };
        let elapsed = started.elapsed();

        let envelope = build_envelope(normalize(&raw), spec, elapsed);
        match envelope.error() {
            None => tracing::info!(
                entity_id = spec.entity_id(),
                records = envelope.records().len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "records API call completed"
            ),
            Some(error) => tracing::warn!(
                entity_id = spec.entity_id(),
                error,
                "records API reported a failure"
            ),
        }
        envelope
    }

    /// Run the pipeline from model-supplied tool arguments.
    pub async fn run_args(&self, args: ToolArgs) -> ResultEnvelope {
        match args.into_spec() {
            Ok(spec) => self.run(&spec).await,
            Err(e) => ResultEnvelope::failure(&e),
        }
    }

    /// Run the pipeline from the raw JSON argument string of a tool call.
    pub async fn invoke_json(&self, raw_args: &str) -> ResultEnvelope {
        match ToolArgs::from_json(raw_args) {
            Ok(args) => self.run_args(args).await,
            Err(e) => {
                tracing::warn!(error = %e, "tool arguments rejected");
                ResultEnvelope::failure(&e)
            }
        }
    }
}
