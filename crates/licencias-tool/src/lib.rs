//! Licencias Tool: leave-record queries against a Rukovoditel REST endpoint
//!
//! This crate is the tool half of the leave-records agent. It turns a typed
//! query into one outbound API call and reshapes the tabular answer into a
//! stable record format the LLM (and any UI) can consume.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        LEAVE RECORDS TOOL                            │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │  ┌───────────┐    ┌───────────┐    ┌───────────┐    ┌────────────┐   │
//! │  │ QuerySpec │───►│   Query   │───►│    API    │───►│ Normalizer │   │
//! │  │ (ToolArgs)│    │  Builder  │    │  Client   │    │            │   │
//! │  └───────────┘    └───────────┘    └───────────┘    └─────┬──────┘   │
//! │                        │                │                 │          │
//! │                   credentials      transport /       ┌────▼─────┐    │
//! │                     checks         decode errors ───►│ Envelope │    │
//! │                        └────────────────────────────►│ Builder  │    │
//! │                                                      └──────────┘    │
//! │                                                                      │
//! │            Field Catalog: shared, read-only id → name table          │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every failure in the pipeline ends up as a [`ResultEnvelope`] with
//! `success = false`: the envelope is always a valid tool result.

pub mod catalog;
pub mod client;
pub mod config;
pub mod contract;
pub mod envelope;
pub mod error;
pub mod normalize;
pub mod query;
pub mod tool;

pub use client::{ApiClient, RecordSource};
pub use config::RukovoditelConfig;
pub use contract::{ToolArgs, TOOL_DESCRIPTION, TOOL_NAME};
pub use envelope::{
    build_envelope, CallMetadata, CompletedCall, FailedCall, FailureKind, ResultEnvelope,
};
pub use error::ToolError;
pub use normalize::{normalize, normalize_record, NormalizeOutcome, NormalizedRecord};
pub use query::{build, Credentials, QuerySpec, WireParams};
pub use tool::LeaveRecordsTool;
