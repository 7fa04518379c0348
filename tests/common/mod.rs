//! Shared test helpers and scripted mock provider.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use tandem::agent::{Agent, AgentConfig};
use tandem::error::TandemError;
use tandem::provider::{ConverseRequest, EventStream, ModelProvider};
use tandem::tools::{AgentTool, InMemoryToolRegistry, ToolParameters};
use tandem::types::*;

/// A mock provider that replays scripted outcomes in order.
///
/// Once a script runs dry the fallback response (if any) is returned for
/// every further call; otherwise a plain "Mock response" text.
#[derive(Default)]
pub struct MockProvider {
    responses: Mutex<VecDeque<Result<ModelResponse, TandemError>>>,
    streams: Mutex<VecDeque<Result<Vec<Result<StreamEvent, TandemError>>, TandemError>>>,
    fallback: Mutex<Option<ModelResponse>>,
    requests: Mutex<Vec<ConverseRequest>>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a text response.
    pub fn queue_response(&self, text: &str) {
        self.queue(Ok(text_response(text)));
    }

    /// Queue a single tool call response.
    pub fn queue_tool_call(&self, id: &str, name: &str, input: serde_json::Value) {
        self.queue(Ok(tool_call_response(id, name, input)));
    }

    pub fn queue_error(&self, error: TandemError) {
        self.queue(Err(error));
    }

    pub fn queue(&self, outcome: Result<ModelResponse, TandemError>) {
        self.responses.lock().unwrap().push_back(outcome);
    }

    /// Response returned once the script is exhausted.
    pub fn always(&self, response: ModelResponse) {
        *self.fallback.lock().unwrap() = Some(response);
    }

    /// Queue a stream of events for `stream_converse`.
    pub fn queue_stream(&self, events: Vec<StreamEvent>) {
        self.streams
            .lock()
            .unwrap()
            .push_back(Ok(events.into_iter().map(Ok).collect()));
    }

    /// Queue a stream that yields `events` and then fails with `error`.
    pub fn queue_broken_stream(&self, events: Vec<StreamEvent>, error: TandemError) {
        let mut items: Vec<_> = events.into_iter().map(Ok).collect();
        items.push(Err(error));
        self.streams.lock().unwrap().push_back(Ok(items));
    }

    /// Queue a failure to open a stream.
    pub fn queue_stream_error(&self, error: TandemError) {
        self.streams.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ConverseRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, request: &ConverseRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn converse(&self, request: &ConverseRequest) -> Result<ModelResponse, TandemError> {
        self.record(request);
        if let Some(outcome) = self.responses.lock().unwrap().pop_front() {
            return outcome;
        }
        Ok(self
            .fallback
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| text_response("Mock response")))
    }

    async fn stream_converse(&self, request: &ConverseRequest) -> Result<EventStream, TandemError> {
        self.record(request);
        let items = match self.streams.lock().unwrap().pop_front() {
            Some(script) => script?,
            None => text_events("Mock streamed response")
                .into_iter()
                .map(Ok)
                .collect(),
        };

        let stream = async_stream::stream! {
            for item in items {
                yield item;
            }
        };
        Ok(Box::pin(stream))
    }
}

pub fn usage(input: u32, output: u32) -> Usage {
    Usage {
        input_tokens: input,
        output_tokens: output,
        total_tokens: input + output,
        ..Default::default()
    }
}

pub fn text_response(text: &str) -> ModelResponse {
    ModelResponse {
        usage: usage(10, 20),
        ..ModelResponse::from_text(text)
    }
}

pub fn tool_call_response(id: &str, name: &str, input: serde_json::Value) -> ModelResponse {
    let input = input.as_object().cloned().unwrap_or_default();
    ModelResponse {
        usage: usage(10, 5),
        ..ModelResponse::from_tool_calls(vec![ToolCall::new(id, name, input)])
    }
}

/// Protocol events for a text-only message streamed in five-character chunks.
pub fn text_events(text: &str) -> Vec<StreamEvent> {
    let mut events = vec![
        message_start(),
        StreamEvent::ContentBlockStart {
            index: 0,
            content_block: ContentBlock::text(""),
        },
    ];
    for chunk in text.chars().collect::<Vec<_>>().chunks(5) {
        events.push(StreamEvent::ContentBlockDelta {
            index: 0,
            delta: BlockDelta::TextDelta {
                text: chunk.iter().collect(),
            },
        });
    }
    events.extend([
        StreamEvent::ContentBlockStop { index: 0 },
        message_delta(StopReason::EndTurn),
        StreamEvent::MessageStop,
    ]);
    events
}

/// Protocol events for a message carrying one tool call whose input
/// arrives as two JSON fragments.
pub fn tool_call_events(id: &str, name: &str, input: serde_json::Value) -> Vec<StreamEvent> {
    let raw = input.to_string();
    let (head, tail) = raw.split_at(raw.len() / 2);
    vec![
        message_start(),
        StreamEvent::ContentBlockStart {
            index: 0,
            content_block: ContentBlock::ToolUse(ToolCall::new(id, name, Default::default())),
        },
        StreamEvent::ContentBlockDelta {
            index: 0,
            delta: BlockDelta::InputJsonDelta {
                partial_json: head.to_string(),
            },
        },
        StreamEvent::ContentBlockDelta {
            index: 0,
            delta: BlockDelta::InputJsonDelta {
                partial_json: tail.to_string(),
            },
        },
        StreamEvent::ContentBlockStop { index: 0 },
        message_delta(StopReason::ToolUse),
        StreamEvent::MessageStop,
    ]
}

fn message_start() -> StreamEvent {
    StreamEvent::MessageStart {
        message: MessageStart {
            id: Some("msg_mock".to_string()),
            model: Some("mock-model".to_string()),
            usage: usage(10, 1),
        },
    }
}

fn message_delta(stop_reason: StopReason) -> StreamEvent {
    StreamEvent::MessageDelta {
        delta: MessageDelta {
            stop_reason: Some(stop_reason),
        },
        usage: Some(Usage {
            output_tokens: 20,
            ..Default::default()
        }),
    }
}

/// Registry with an `add` tool (integers `a` and `b`, `b` defaults to 1)
/// and a `fail` tool that always errors.
pub fn math_registry() -> Arc<InMemoryToolRegistry> {
    let add = AgentTool::new(
        "add",
        "Add two integers",
        ToolParameters::object()
            .integer("a", "first operand", true)
            .integer("b", "second operand", false)
            .build(),
        |args, _ctx| async move {
            let a = args.get_i64("a")?;
            let b = args.get_i64("b")?;
            Ok(json!(a + b))
        },
    )
    .with_defaults(json!({ "b": 1 }).as_object().cloned().unwrap_or_default());

    let fail = AgentTool::new(
        "fail",
        "Always fails",
        ToolParameters::empty(),
        |_args, _ctx| async move {
            Err(TandemError::ToolExecution {
                tool_name: "fail".to_string(),
                message: "boom".to_string(),
            })
        },
    );

    Arc::new(InMemoryToolRegistry::new().with_tool(add).with_tool(fail))
}

pub fn agent_with(provider: Arc<MockProvider>) -> Agent {
    Agent::new(AgentConfig::builder().client(provider).model("mock-model").build())
}
