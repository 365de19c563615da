//! Licencias Agent: answers questions about employee leave through an LLM
//!
//! The agent exposes exactly one tool, `consulta_licencias_encargados`, to a
//! tool-calling chat model. Each turn is:
//!
//! 1. system instruction + question + tool contract → model
//! 2. if the model asks for the tool, run it once and hand back the envelope
//! 3. ask the model (tools disabled) for the final answer
//!
//! The whole turn is bounded by a deadline and always yields an
//! [`AgentAnswer`], never an error.

pub mod agent;
pub mod llm;

pub use agent::{Agent, AgentAnswer, AgentConfig, AgentError, TurnState, TIMEOUT_MESSAGE};
pub use llm::providers::{ConfigError, GroqClient, LlmConfig};
pub use llm::{
    ChatModel, ChatRequest, ChatResponse, FinishReason, LlmError, Message, ToolCall, ToolChoice,
    ToolSpec,
};
