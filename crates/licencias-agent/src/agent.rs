//! Turn orchestration: one question in, one [`AgentAnswer`] out.
//!
//! ```text
//!   Idle ──► AwaitingToolDecision ──┬─(text)────────────────► Answered
//!                                   │
//!                                   └─(tool call)─► Answering ─► Answered
//!
//!   any error ──► Failed          deadline ──► Failed (timeout message)
//! ```

use crate::llm::providers::{GroqClient, LlmConfig};
use crate::llm::{ChatModel, ChatRequest, LlmError, Message, ToolCall, ToolChoice, ToolSpec};
use licencias_tool::contract::{self, ToolArgs};
use licencias_tool::{LeaveRecordsTool, ToolError, TOOL_DESCRIPTION, TOOL_NAME};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(60);

pub const SYSTEM_PROMPT: &str = "Eres un asistente que responde en español sobre licencias, \
permisos y ausencias de los encargados registrados en el sistema de gestión. \
Cuando la pregunta requiera datos concretos (quién está de licencia, fechas de inicio, \
finalización o reincorporación), utiliza la herramienta consulta_licencias_encargados \
para obtener datos actualizados y basa tu respuesta únicamente en su resultado. \
Si la herramienta informa un error, explícalo brevemente al usuario. \
Si la pregunta no trata sobre licencias o personal, indica amablemente que solo puedes \
ayudar con consultas sobre licencias de encargados. \
Responde siempre de manera clara y concisa.";

pub const TIMEOUT_MESSAGE: &str = "Lo siento, la consulta tardó demasiado en responder. \
Por favor, intenta nuevamente con una pregunta más específica.";

/// Used when the model finishes without any text.
pub const EMPTY_ANSWER_MESSAGE: &str = "No pude generar una respuesta para tu consulta.";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub turn_timeout: Duration,
    pub system_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            turn_timeout: DEFAULT_TURN_TIMEOUT,
            system_prompt: SYSTEM_PROMPT.to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl AgentConfig {
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }
}

/// What the caller gets back for every turn, success or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentAnswer {
    pub response: String,
    pub tool_used: bool,
    /// JSON-encoded envelope of the tool call, when the tool ran.
    pub tool_result: Option<String>,
}

impl AgentAnswer {
    pub fn failure(error: &AgentError) -> Self {
        Self {
            response: format!("Lo siento, ocurrió un error: {error}"),
            tool_used: false,
            tool_result: None,
        }
    }

    pub fn timed_out() -> Self {
        Self {
            response: TIMEOUT_MESSAGE.to_string(),
            tool_used: false,
            tool_result: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingToolDecision,
    Answering,
    Answered,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("{0}")]
    Llm(#[from] LlmError),
    #[error("argumentos de herramienta inválidos: {0}")]
    ToolArguments(ToolError),
    #[error("herramienta desconocida: {0}")]
    UnknownTool(String),
    #[error("no se pudo serializar el resultado de la herramienta: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("la tarea del agente terminó inesperadamente: {0}")]
    Worker(String),
    #[error("tiempo de espera agotado tras {0:?}")]
    Timeout(Duration),
}

struct AgentInner {
    model: Arc<dyn ChatModel>,
    tool: LeaveRecordsTool,
    config: AgentConfig,
    tool_spec: ToolSpec,
}

/// The leave-records agent. Cheap to clone; holds no per-turn state.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    pub fn new(model: Arc<dyn ChatModel>, tool: LeaveRecordsTool, config: AgentConfig) -> Self {
        let tool_spec = ToolSpec {
            name: TOOL_NAME.to_string(),
            description: TOOL_DESCRIPTION.to_string(),
            parameters: contract::args_schema(),
        };
        Self {
            inner: Arc::new(AgentInner {
                model,
                tool,
                config,
                tool_spec,
            }),
        }
    }

    /// Agent backed by the Groq chat completions API.
    pub fn groq(
        llm: LlmConfig,
        tool: LeaveRecordsTool,
        config: AgentConfig,
    ) -> Result<Self, LlmError> {
        let config = AgentConfig {
            temperature: config.temperature.or(llm.temperature),
            max_tokens: config.max_tokens.or(llm.max_tokens),
            ..config
        };
        let model = GroqClient::new(llm)?;
        Ok(Self::new(Arc::new(model), tool, config))
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    pub fn model_name(&self) -> &str {
        self.inner.model.model_name()
    }

    /// Answer one question. Never fails: errors and timeouts come back as
    /// failure answers.
    pub async fn run(&self, prompt: &str) -> AgentAnswer {
        match self.try_run(prompt).await {
            Ok(answer) => answer,
            Err(AgentError::Timeout(limit)) => {
                tracing::warn!(timeout_ms = limit.as_millis() as u64, "agent turn timed out");
                transition(TurnState::Failed);
                AgentAnswer::timed_out()
            }
            Err(e) => {
                tracing::warn!(error = %e, "agent turn failed");
                transition(TurnState::Failed);
                AgentAnswer::failure(&e)
            }
        }
    }

    /// Like [`Agent::run`] but surfaces the error.
    ///
    /// The turn runs on its own task. When the deadline passes the handle is
    /// dropped, which detaches the task: its result is discarded.
    pub async fn try_run(&self, prompt: &str) -> Result<AgentAnswer, AgentError> {
        let inner = Arc::clone(&self.inner);
        let prompt = prompt.to_string();
        let limit = inner.config.turn_timeout;

        let handle = tokio::spawn(async move { inner.run_turn(&prompt).await });

        match tokio::time::timeout(limit, handle).await {
            Err(_) => Err(AgentError::Timeout(limit)),
            Ok(Err(join_error)) => Err(AgentError::Worker(join_error.to_string())),
            Ok(Ok(result)) => result,
        }
    }
}

fn transition(state: TurnState) {
    tracing::debug!(?state, "turn state");
}

impl AgentInner {
    async fn run_turn(&self, prompt: &str) -> Result<AgentAnswer, AgentError> {
        transition(TurnState::Idle);
        let mut messages = vec![
            Message::system(self.config.system_prompt.clone()),
            Message::user(prompt),
        ];

        transition(TurnState::AwaitingToolDecision);
        let request = ChatRequest::new(messages.clone())
            .with_tools(vec![self.tool_spec.clone()], ToolChoice::Auto)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);
        let first = self.model.complete(&request).await?;

        let Some(call) = first.tool_calls.first().cloned() else {
            transition(TurnState::Answered);
            return Ok(AgentAnswer {
                response: first.content.unwrap_or_else(|| EMPTY_ANSWER_MESSAGE.to_string()),
                tool_used: false,
                tool_result: None,
            });
        };

        if first.tool_calls.len() > 1 {
            tracing::warn!(
                requested = first.tool_calls.len(),
                "model requested several tool calls; only the first runs"
            );
        }

        let tool_result = self.invoke(&call).await?;

        transition(TurnState::Answering);
        messages.push(Message::Assistant {
            content: first.content.clone(),
            tool_calls: vec![call.clone()],
        });
        messages.push(Message::Tool {
            call_id: call.id.clone(),
            content: tool_result.clone(),
        });

        // Same tool list so the model can read the history, but no more calls.
        let request = ChatRequest::new(messages)
            .with_tools(vec![self.tool_spec.clone()], ToolChoice::None)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);
        let last = self.model.complete(&request).await?;

        transition(TurnState::Answered);
        Ok(AgentAnswer {
            response: last.content.unwrap_or_else(|| EMPTY_ANSWER_MESSAGE.to_string()),
            tool_used: true,
            tool_result: Some(tool_result),
        })
    }

    /// Execute one tool call and return the serialized envelope.
    async fn invoke(&self, call: &ToolCall) -> Result<String, AgentError> {
        if call.name != TOOL_NAME {
            return Err(AgentError::UnknownTool(call.name.clone()));
        }
        let args = ToolArgs::from_json(&call.arguments).map_err(AgentError::ToolArguments)?;
        tracing::debug!(?args, "invoking records tool");

        let envelope = self.tool.run_args(args).await;
        Ok(envelope.to_json_string()?)
    }
}
