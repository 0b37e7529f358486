//! The agent loop implementation.

use std::sync::Arc;
use std::time::Duration;

use coscientist_core::client::{ModelClient, Turn, TurnOptions};
use coscientist_core::error::{Error, ToolError};
use coscientist_core::message::{Message, ToolCallRequest, Transcript};
use coscientist_core::tool::ToolRegistry;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Fixed orchestration instructions seeded into every transcript.
const SYSTEM_PROMPT: &str = "You are the orchestrator agent. Use tools when needed. \
     When you call tools, keep arguments minimal and valid. \
     Reply with a final answer once you have enough information.";

/// The terminal result of one agent run.
///
/// Budget exhaustion is a normal outcome, not an error, but it is
/// structurally distinct from an answer so callers can never mistake the
/// fallback for a genuine result.
#[derive(Debug)]
pub enum RunOutcome {
    /// The model produced a final answer.
    Answer {
        text: String,
        steps: u32,
        transcript: Transcript,
    },

    /// `max_steps` model turns completed without a terminal result.
    BudgetExhausted { steps: u32, transcript: Transcript },
}

impl RunOutcome {
    /// The final answer text, if the run produced one.
    pub fn answer(&self) -> Option<&str> {
        match self {
            RunOutcome::Answer { text, .. } => Some(text),
            RunOutcome::BudgetExhausted { .. } => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RunOutcome::BudgetExhausted { .. })
    }

    /// The full transcript, whichever way the run ended.
    pub fn transcript(&self) -> &Transcript {
        match self {
            RunOutcome::Answer { transcript, .. } => transcript,
            RunOutcome::BudgetExhausted { transcript, .. } => transcript,
        }
    }
}

/// The core agent loop orchestrating model turns and tool execution.
///
/// One `AgentLoop` is wired at startup and shared across runs; each call to
/// [`AgentLoop::run`] owns its own transcript and step counter, so runs are
/// fully independent. The returned future holds every in-flight model/tool
/// call, so dropping it cancels the run with no orphaned background work.
pub struct AgentLoop {
    client: Arc<dyn ModelClient>,

    tools: Arc<ToolRegistry>,

    /// Maximum model-turn iterations per run
    max_steps: u32,

    /// Sampling options passed to every turn
    options: TurnOptions,

    /// Timeout for one tool dispatch
    tool_timeout: Duration,

    /// Cap on concurrent tool dispatches within one turn
    tool_concurrency: usize,
}

impl AgentLoop {
    pub fn new(client: Arc<dyn ModelClient>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            client,
            tools,
            max_steps: 8,
            options: TurnOptions::default(),
            tool_timeout: Duration::from_secs(120),
            tool_concurrency: 4,
        }
    }

    /// Build a loop from the loaded app config.
    pub fn from_config(
        client: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        config: &coscientist_config::AgentConfig,
    ) -> Self {
        Self::new(client, tools)
            .with_max_steps(config.max_steps)
            .with_options(TurnOptions {
                temperature: config.temperature,
                max_tokens: Some(config.max_tokens),
                ..TurnOptions::default()
            })
            .with_tool_timeout(Duration::from_secs(config.tool_timeout_secs))
            .with_tool_concurrency(config.tool_concurrency)
    }

    /// Set the step budget. Must be positive; config validation enforces it.
    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_options(mut self, options: TurnOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_tool_concurrency(mut self, cap: usize) -> Self {
        self.tool_concurrency = cap.max(1);
        self
    }

    /// Run one task to termination.
    ///
    /// Per-run overrides come in through [`AgentLoop::run_with`]; this uses
    /// the wired defaults.
    pub async fn run(&self, task: &str) -> Result<RunOutcome, Error> {
        self.run_with(task, None, None).await
    }

    /// Run one task with optional per-run overrides for the step budget and
    /// sampling temperature.
    pub async fn run_with(
        &self,
        task: &str,
        max_steps: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<RunOutcome, Error> {
        let run_id = Uuid::new_v4();
        let max_steps = max_steps.unwrap_or(self.max_steps).max(1);
        let mut options = self.options.clone();
        if let Some(t) = temperature {
            options.temperature = t;
        }

        let mut transcript = Transcript::seeded(SYSTEM_PROMPT, task);
        let catalog = self.tools.definitions();
        let limiter = Arc::new(Semaphore::new(self.tool_concurrency));

        info!(%run_id, max_steps, tools = catalog.len(), "Starting agent run");

        for step in 1..=max_steps {
            debug!(%run_id, step, transcript_len = transcript.len(), "Requesting model turn");

            // A failure here has no transcript-writable recipient; it is
            // terminal for the run (the client already spent its retries).
            let turn = self
                .client
                .next_turn(transcript.messages(), &catalog, &options)
                .await?;

            match turn {
                Turn::Final { text } => {
                    transcript.push(Message::assistant(&text));
                    info!(%run_id, steps = step, "Run terminated with final answer");
                    return Ok(RunOutcome::Answer {
                        text,
                        steps: step,
                        transcript,
                    });
                }

                Turn::Empty => {
                    // Degenerate turn: no calls, no text. Recording it and
                    // counting the step keeps a stuck model from looping
                    // forever.
                    warn!(%run_id, step, "Degenerate model turn (no text, no tool calls)");
                    transcript.push(Message::assistant(""));
                }

                Turn::ToolCalls { text, calls } => {
                    debug!(%run_id, step, calls = calls.len(), "Dispatching tool calls");
                    transcript.push(Message::assistant_with_calls(
                        text.unwrap_or_default(),
                        calls.clone(),
                    ));

                    // Dispatches run concurrently under the cap; join_all
                    // keeps result order = request order, so the transcript
                    // stays deterministic even when execution finishes out
                    // of order. A failed call never cancels its siblings.
                    let payloads = join_all(
                        calls
                            .iter()
                            .map(|call| self.dispatch_one(call, limiter.clone())),
                    )
                    .await;

                    for (call, payload) in calls.iter().zip(payloads) {
                        transcript.push(Message::tool_result(&call.id, payload));
                    }
                }
            }
        }

        info!(%run_id, steps = max_steps, "Step budget exhausted without a final answer");
        Ok(RunOutcome::BudgetExhausted {
            steps: max_steps,
            transcript,
        })
    }

    /// Dispatch one tool call and render the result as a tool-message
    /// payload.
    ///
    /// Transport and protocol failures come back as an error-shaped JSON
    /// payload the model can see and react to; only the model-turn path
    /// aborts the run.
    async fn dispatch_one(&self, call: &ToolCallRequest, limiter: Arc<Semaphore>) -> String {
        // The semaphore lives for the whole run and is never closed; a
        // failed acquire is rendered like any other dispatch failure rather
        // than panicking the run.
        let _permit = match limiter.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Dispatch limiter unavailable");
                return serde_json::json!({
                    "error": format!("Tool execution failed: {} — dispatch limiter unavailable", call.name)
                })
                .to_string();
            }
        };

        let dispatched = tokio::time::timeout(
            self.tool_timeout,
            self.tools.dispatch(&call.name, &call.arguments),
        )
        .await;

        let result = match dispatched {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool_name: call.name.clone(),
                timeout_secs: self.tool_timeout.as_secs(),
            }),
        };

        match result {
            Ok(value) => value.to_string(),
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool dispatch failed");
                serde_json::json!({ "error": e.to_string() }).to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use coscientist_core::client::ToolDefinition;
    use coscientist_core::error::ClientError;
    use coscientist_core::message::Role;
    use coscientist_core::tool::Tool;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A model client that replays a script of turns, then repeats the last
    /// one forever. Counts how many turns were requested.
    struct ScriptedClient {
        script: Mutex<Vec<Turn>>,
        calls: AtomicU32,
    }

    impl ScriptedClient {
        fn new(turns: Vec<Turn>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(turns),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn next_turn(
            &self,
            _transcript: &[Message],
            _tools: &[ToolDefinition],
            _options: &TurnOptions,
        ) -> Result<Turn, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                Ok(script.remove(0))
            } else {
                Ok(script[0].clone())
            }
        }
    }

    /// Passthrough tool: returns its arguments unchanged.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input arguments"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }
        async fn execute(
            &self,
            arguments: serde_json::Value,
        ) -> Result<serde_json::Value, ToolError> {
            Ok(arguments)
        }
    }

    /// A tool that sleeps before answering, for ordering tests.
    struct DelayTool {
        name: &'static str,
        delay: Duration,
    }

    #[async_trait]
    impl Tool for DelayTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "Answers after a delay"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
        ) -> Result<serde_json::Value, ToolError> {
            tokio::time::sleep(self.delay).await;
            Ok(serde_json::json!({ "tool": self.name }))
        }
    }

    fn call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    fn registry_with_echo() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn scenario_a_tool_call_then_final() {
        let client = ScriptedClient::new(vec![
            Turn::ToolCalls {
                text: None,
                calls: vec![call("call_1", "echo", r#"{"x":1}"#)],
            },
            Turn::Final { text: "done".into() },
        ]);
        let agent = AgentLoop::new(client.clone(), registry_with_echo());

        let outcome = agent.run("compute x").await.unwrap();
        assert_eq!(outcome.answer(), Some("done"));

        // system, user, assistant-with-call, tool, assistant-final
        let messages = outcome.transcript().messages();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].tool_calls.len(), 1);
        assert_eq!(messages[3].role, Role::Tool);
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(messages[4].role, Role::Assistant);
        assert_eq!(messages[4].content, "done");
    }

    #[tokio::test]
    async fn echo_payload_roundtrips() {
        let client = ScriptedClient::new(vec![
            Turn::ToolCalls {
                text: None,
                calls: vec![call("call_1", "echo", r#"{"doc_id":"d1"}"#)],
            },
            Turn::Final { text: "ok".into() },
        ]);
        let agent = AgentLoop::new(client, registry_with_echo());

        let outcome = agent.run("echo it").await.unwrap();
        let tool_msg = &outcome.transcript().messages()[3];
        let payload: serde_json::Value = serde_json::from_str(&tool_msg.content).unwrap();
        assert_eq!(payload, serde_json::json!({"doc_id": "d1"}));
    }

    #[tokio::test]
    async fn scenario_b_unknown_tool_is_not_fatal() {
        let client = ScriptedClient::new(vec![
            Turn::ToolCalls {
                text: None,
                calls: vec![call("call_1", "ghost", "{}")],
            },
            Turn::Final { text: "recovered".into() },
        ]);
        let agent = AgentLoop::new(client.clone(), registry_with_echo());

        let outcome = agent.run("use ghost").await.unwrap();
        assert_eq!(outcome.answer(), Some("recovered"));
        assert_eq!(client.calls(), 2);

        let tool_msg = &outcome.transcript().messages()[3];
        let payload: serde_json::Value = serde_json::from_str(&tool_msg.content).unwrap();
        assert!(payload["error"].as_str().unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn scenario_c_budget_of_one_stops_after_one_model_call() {
        let client = ScriptedClient::new(vec![Turn::ToolCalls {
            text: None,
            calls: vec![call("call_1", "echo", "{}")],
        }]);
        let agent = AgentLoop::new(client.clone(), registry_with_echo()).with_max_steps(1);

        let outcome = agent.run("loop forever").await.unwrap();
        assert!(outcome.is_exhausted());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn budget_exhausted_after_exactly_n_model_calls() {
        for n in [2u32, 5] {
            let client = ScriptedClient::new(vec![Turn::ToolCalls {
                text: None,
                calls: vec![call("call_1", "echo", "{}")],
            }]);
            let agent = AgentLoop::new(client.clone(), registry_with_echo()).with_max_steps(n);

            let outcome = agent.run("loop forever").await.unwrap();
            match outcome {
                RunOutcome::BudgetExhausted { steps, .. } => assert_eq!(steps, n),
                other => panic!("expected BudgetExhausted, got {other:?}"),
            }
            assert_eq!(client.calls(), n);
        }
    }

    #[tokio::test]
    async fn scenario_d_tool_messages_keep_request_order() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Box::new(DelayTool {
                name: "slow_a",
                delay: Duration::from_millis(80),
            }))
            .unwrap();
        registry
            .register(Box::new(DelayTool {
                name: "fast_b",
                delay: Duration::from_millis(1),
            }))
            .unwrap();

        let client = ScriptedClient::new(vec![
            Turn::ToolCalls {
                text: None,
                calls: vec![call("call_a", "slow_a", "{}"), call("call_b", "fast_b", "{}")],
            },
            Turn::Final { text: "done".into() },
        ]);
        let agent = AgentLoop::new(client, Arc::new(registry));

        let outcome = agent.run("race").await.unwrap();
        let messages = outcome.transcript().messages();
        // A finished after B, but its tool message still comes first.
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_a"));
        assert_eq!(messages[4].tool_call_id.as_deref(), Some("call_b"));
    }

    #[tokio::test]
    async fn concurrency_cap_of_one_serializes_dispatch_and_answers_all() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Box::new(DelayTool {
                name: "slow_a",
                delay: Duration::from_millis(20),
            }))
            .unwrap();
        registry
            .register(Box::new(DelayTool {
                name: "fast_b",
                delay: Duration::from_millis(1),
            }))
            .unwrap();

        let client = ScriptedClient::new(vec![
            Turn::ToolCalls {
                text: None,
                calls: vec![
                    call("call_a", "slow_a", "{}"),
                    call("call_b", "fast_b", "{}"),
                    call("call_c", "slow_a", "{}"),
                ],
            },
            Turn::Final { text: "done".into() },
        ]);
        // Every dispatch goes through the limiter one at a time; all three
        // must still produce a tool message, in request order.
        let agent = AgentLoop::new(client, Arc::new(registry)).with_tool_concurrency(1);

        let outcome = agent.run("queued").await.unwrap();
        assert_eq!(outcome.answer(), Some("done"));
        let messages = outcome.transcript().messages();
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_a"));
        assert_eq!(messages[4].tool_call_id.as_deref(), Some("call_b"));
        assert_eq!(messages[5].tool_call_id.as_deref(), Some("call_c"));
        for msg in &messages[3..6] {
            assert!(!msg.content.contains("error"), "no dispatch should fail: {}", msg.content);
        }
    }

    #[tokio::test]
    async fn degenerate_turns_consume_budget() {
        let client = ScriptedClient::new(vec![Turn::Empty]);
        let agent = AgentLoop::new(client.clone(), registry_with_echo()).with_max_steps(3);

        let outcome = agent.run("say nothing").await.unwrap();
        assert!(outcome.is_exhausted());
        assert_eq!(client.calls(), 3);

        // Each degenerate turn is still recorded.
        let assistants = outcome
            .transcript()
            .messages()
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count();
        assert_eq!(assistants, 3);
    }

    #[tokio::test]
    async fn tool_timeout_becomes_error_payload() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Box::new(DelayTool {
                name: "glacial",
                delay: Duration::from_secs(10),
            }))
            .unwrap();

        let client = ScriptedClient::new(vec![
            Turn::ToolCalls {
                text: None,
                calls: vec![call("call_1", "glacial", "{}")],
            },
            Turn::Final { text: "moved on".into() },
        ]);
        let agent = AgentLoop::new(client, Arc::new(registry))
            .with_tool_timeout(Duration::from_millis(20));

        let outcome = agent.run("slow tool").await.unwrap();
        assert_eq!(outcome.answer(), Some("moved on"));

        let tool_msg = &outcome.transcript().messages()[3];
        assert!(tool_msg.content.contains("timed out"));
    }

    #[tokio::test]
    async fn model_client_failure_is_terminal() {
        struct FailingClient;

        #[async_trait]
        impl ModelClient for FailingClient {
            fn name(&self) -> &str {
                "failing"
            }
            async fn next_turn(
                &self,
                _transcript: &[Message],
                _tools: &[ToolDefinition],
                _options: &TurnOptions,
            ) -> Result<Turn, ClientError> {
                Err(ClientError::Network("connection refused".into()))
            }
        }

        let agent = AgentLoop::new(Arc::new(FailingClient), registry_with_echo());
        let err = agent.run("anything").await.unwrap_err();
        assert!(matches!(err, Error::Client(_)));
    }

    #[tokio::test]
    async fn per_run_override_tightens_budget() {
        let client = ScriptedClient::new(vec![Turn::ToolCalls {
            text: None,
            calls: vec![call("call_1", "echo", "{}")],
        }]);
        let agent = AgentLoop::new(client.clone(), registry_with_echo()).with_max_steps(8);

        let outcome = agent.run_with("loop", Some(2), None).await.unwrap();
        assert!(outcome.is_exhausted());
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn partial_text_on_tool_turn_is_preserved_not_final() {
        let client = ScriptedClient::new(vec![
            Turn::ToolCalls {
                text: Some("let me check".into()),
                calls: vec![call("call_1", "echo", "{}")],
            },
            Turn::Final { text: "answer".into() },
        ]);
        let agent = AgentLoop::new(client, registry_with_echo());

        let outcome = agent.run("check something").await.unwrap();
        assert_eq!(outcome.answer(), Some("answer"));
        assert_eq!(outcome.transcript().messages()[2].content, "let me check");
    }
}
