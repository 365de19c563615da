//! Orchestrator tests with a scripted chat model
//!
//! Covers:
//! 1. Direct answers (no tool)
//! 2. The single-tool-call protocol and what the model sees on step 2
//! 3. Tool failures still returned to the model
//! 4. Deadline expiry and LLM errors as failure answers

use async_trait::async_trait;
use licencias_agent::*;
use licencias_tool::{Credentials, LeaveRecordsTool, RecordSource, ToolError, WireParams};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Doubles
// ============================================================================

/// Replays scripted replies in order and records every request.
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
    delay: Duration,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<ChatResponse, LlmError>>) -> Arc<Self> {
        Self::slow(replies, Duration::ZERO)
    }

    fn slow(replies: Vec<Result<ChatResponse, LlmError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            delay,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("script exhausted".into())))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct FixedSource {
    answer: Value,
    calls: AtomicUsize,
}

#[async_trait]
impl RecordSource for FixedSource {
    async fn execute(&self, _params: &WireParams) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}

fn source(answer: Value) -> Arc<FixedSource> {
    Arc::new(FixedSource {
        answer,
        calls: AtomicUsize::new(0),
    })
}

fn tool_over(source: Arc<FixedSource>) -> LeaveRecordsTool {
    LeaveRecordsTool::new(source, Credentials::new("k", "u", "p"))
}

fn call(arguments: &str) -> ToolCall {
    ToolCall {
        id: "call_1".into(),
        name: licencias_tool::TOOL_NAME.into(),
        arguments: arguments.into(),
    }
}

fn agent(model: Arc<ScriptedModel>, tool: LeaveRecordsTool) -> Agent {
    Agent::new(model, tool, AgentConfig::default())
}

// ============================================================================
// Protocol
// ============================================================================

#[tokio::test]
async fn answers_directly_without_tool() {
    let records = source(json!({"status": "success", "data": []}));
    let model = ScriptedModel::new(vec![Ok(ChatResponse::text("Solo respondo sobre licencias."))]);
    let agent = agent(model.clone(), tool_over(records.clone()));

    let answer = agent.run("¿Cuál es la capital de Francia?").await;

    assert_eq!(answer.response, "Solo respondo sobre licencias.");
    assert!(!answer.tool_used);
    assert!(answer.tool_result.is_none());
    assert_eq!(records.calls.load(Ordering::SeqCst), 0);

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].tool_choice, ToolChoice::Auto);
    assert_eq!(requests[0].tools[0].name, "consulta_licencias_encargados");
    assert_eq!(requests[0].messages[0].role(), "system");
    assert_eq!(
        requests[0].messages[1],
        Message::user("¿Cuál es la capital de Francia?")
    );
}

#[tokio::test]
async fn runs_tool_once_and_finalizes_without_tools() {
    let records = source(json!({
        "status": "success",
        "data": [{"912": "Ana Gil", "651": "2023-01-01", "665": "2023-01-10", "id": 7}]
    }));
    let model = ScriptedModel::new(vec![
        Ok(ChatResponse::tool_call(call(r#"{"limit": 5}"#))),
        Ok(ChatResponse::text("Ana Gil estuvo de licencia del 1 al 10 de enero.")),
    ]);
    let agent = agent(model.clone(), tool_over(records.clone()));

    let answer = agent.run("¿Quién estuvo de licencia en enero?").await;

    assert!(answer.tool_used);
    assert_eq!(answer.response, "Ana Gil estuvo de licencia del 1 al 10 de enero.");
    assert_eq!(records.calls.load(Ordering::SeqCst), 1);

    let envelope: Value = serde_json::from_str(answer.tool_result.as_deref().unwrap()).unwrap();
    assert_eq!(envelope["metadata"]["success"], json!(true));
    assert_eq!(envelope["metadata"]["limit"], json!(5));
    assert_eq!(
        envelope["resultado"]["registros"][0],
        json!({
            "Empleado": "Ana Gil",
            "Fecha de inicio": "2023-01-01",
            "Fecha Finalización": "2023-01-10"
        })
    );

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    let second = &requests[1];
    assert_eq!(second.tool_choice, ToolChoice::None);
    assert_eq!(second.messages.len(), 4);
    assert_eq!(second.messages[2].role(), "assistant");
    match &second.messages[3] {
        Message::Tool { call_id, content } => {
            assert_eq!(call_id, "call_1");
            assert_eq!(content, answer.tool_result.as_ref().unwrap());
        }
        other => panic!("expected tool message, got {other:?}"),
    }
}

#[tokio::test]
async fn configured_token_cap_reaches_both_steps() {
    let records = source(json!({"status": "success", "data": []}));
    let model = ScriptedModel::new(vec![
        Ok(ChatResponse::tool_call(call("{}"))),
        Ok(ChatResponse::text("No hay licencias registradas.")),
    ]);
    let config = AgentConfig {
        max_tokens: Some(300),
        ..AgentConfig::default()
    };
    let agent = Agent::new(model.clone(), tool_over(records), config);

    agent.run("licencias").await;

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.max_tokens == Some(300)));
}

#[tokio::test]
async fn only_first_tool_call_is_executed() {
    let records = source(json!({"status": "success", "data": []}));
    let mut first = ChatResponse::tool_call(call("{}"));
    first.tool_calls.push(ToolCall {
        id: "call_2".into(),
        ..call(r#"{"limit": 1}"#)
    });
    let model = ScriptedModel::new(vec![Ok(first), Ok(ChatResponse::text("No hay registros."))]);
    let agent = agent(model, tool_over(records.clone()));

    let answer = agent.run("licencias").await;

    assert!(answer.tool_used);
    assert_eq!(records.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn tool_failure_envelope_still_counts_as_tool_used() {
    let records = source(json!({"status": "error", "error": "Usuario bloqueado"}));
    let model = ScriptedModel::new(vec![
        Ok(ChatResponse::tool_call(call(""))),
        Ok(ChatResponse::text("La API respondió: Usuario bloqueado.")),
    ]);
    let agent = agent(model, tool_over(records));

    let answer = agent.run("¿Quién está de licencia?").await;

    assert!(answer.tool_used);
    let envelope: Value = serde_json::from_str(answer.tool_result.as_deref().unwrap()).unwrap();
    assert_eq!(envelope["metadata"]["success"], json!(false));
    assert_eq!(envelope["resultado"], json!({"error": "Usuario bloqueado"}));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn unparsable_tool_arguments_fail_the_turn() {
    let records = source(json!({"status": "success", "data": []}));
    let model = ScriptedModel::new(vec![Ok(ChatResponse::tool_call(call("{limit: ")))]);
    let agent = agent(model, tool_over(records.clone()));

    let answer = agent.run("licencias").await;

    assert!(!answer.tool_used);
    assert!(answer.response.starts_with("Lo siento, ocurrió un error: "));
    assert_eq!(records.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_tool_fails_the_turn() {
    let records = source(json!({"status": "success", "data": []}));
    let model = ScriptedModel::new(vec![Ok(ChatResponse::tool_call(ToolCall {
        name: "buscar_web".into(),
        ..call("{}")
    }))]);
    let agent = agent(model, tool_over(records));

    let answer = agent.run("licencias").await;

    assert_eq!(
        answer.response,
        "Lo siento, ocurrió un error: herramienta desconocida: buscar_web"
    );
    assert!(!answer.tool_used);
}

#[tokio::test]
async fn llm_error_becomes_failure_answer() {
    let records = source(json!({"status": "success", "data": []}));
    let model = ScriptedModel::new(vec![Err(LlmError::Api("503: overloaded".into()))]);
    let agent = agent(model, tool_over(records));

    let answer = agent.run("licencias").await;

    assert_eq!(
        answer.response,
        "Lo siento, ocurrió un error: API error: 503: overloaded"
    );
    assert!(!answer.tool_used);
    assert!(answer.tool_result.is_none());
}

#[tokio::test]
async fn slow_turn_yields_timeout_message() {
    let records = source(json!({"status": "success", "data": []}));
    let model = ScriptedModel::slow(
        vec![
            Ok(ChatResponse::tool_call(call("{}"))),
            Ok(ChatResponse::text("demasiado tarde")),
        ],
        Duration::from_millis(300),
    );
    let config = AgentConfig::default().with_turn_timeout(Duration::from_millis(100));
    let agent = Agent::new(model, tool_over(records), config);

    let answer = agent.run("¿Quién está de licencia?").await;

    assert_eq!(answer.response, TIMEOUT_MESSAGE);
    assert!(!answer.tool_used);
    assert!(answer.tool_result.is_none());

    let err = agent.try_run("otra vez").await.unwrap_err();
    assert!(matches!(err, AgentError::Timeout(_)));
}

#[tokio::test]
async fn concurrent_turns_share_one_agent() {
    let records = source(json!({"status": "success", "data": []}));
    let model = ScriptedModel::new(vec![
        Ok(ChatResponse::text("uno")),
        Ok(ChatResponse::text("dos")),
    ]);
    let agent = agent(model, tool_over(records));

    let (a, b) = tokio::join!(agent.run("a"), agent.run("b"));

    let mut answers = vec![a.response, b.response];
    answers.sort();
    assert_eq!(answers, vec!["dos", "uno"]);
}
