use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use arbor_types::{CoreMessage, ErrorInfo, StreamEvent, TokenUsage};

use crate::sse::{parse_chunk_stream, ChatCompletionChunk};
use crate::traits::{ChatRequest, EventStream, ModelClient};

/// Streaming client for OpenAI-compatible chat-completions endpoints.
///
/// One `stream` call runs the whole turn: each generation step is one HTTP
/// request; when the model finishes a step with tool calls, the registered
/// tools run and their results are appended to the transcript before the
/// next step, up to `max_steps`.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Initial wire transcript. `system` only applies in prompt mode; a
    /// full transcript carries its own system message.
    fn initial_transcript(request: &ChatRequest) -> Vec<Value> {
        if request.messages.is_empty() {
            let mut transcript = Vec::new();
            if let Some(system) = &request.system {
                transcript.push(json!({ "role": "system", "content": system }));
            }
            if let Some(prompt) = &request.prompt {
                transcript.push(json!({ "role": "user", "content": prompt }));
            }
            transcript
        } else {
            request.messages.iter().map(wire_message).collect()
        }
    }

    async fn open_stream(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .context("Chat request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("Provider returned {}: {}", status, detail));
        }
        Ok(response)
    }
}

fn wire_message(message: &CoreMessage) -> Value {
    json!({ "role": message.role.as_str(), "content": message.content })
}

fn build_request_body(
    model: &str,
    request: &ChatRequest,
    transcript: &[Value],
    stream: bool,
) -> Value {
    let mut body = json!({
        "model": model,
        "messages": transcript,
        "temperature": request.options.temperature,
        "stream": stream,
    });

    if stream {
        body["stream_options"] = json!({ "include_usage": true });
    }

    if let Some(tools) = &request.options.tools {
        if !tools.is_empty() {
            let defs: Vec<Value> = tools
                .definitions()
                .iter()
                .map(|d| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": d.name,
                            "description": d.description,
                            "parameters": d.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(defs);
            body["tool_choice"] = json!("auto");
        }
    }

    body
}

/// A tool call assembled from streamed fragments.
#[derive(Debug, Clone)]
struct AssembledCall {
    id: String,
    name: String,
    args: Value,
    raw_args: String,
}

/// Per-step accumulation of one chat-completions stream.
#[derive(Default)]
struct StepAccumulator {
    text: String,
    finish_reason: Option<String>,
    usage: Option<TokenUsage>,
    // keyed by tool-call index; (id, name, argument fragments)
    calls: BTreeMap<u32, (Option<String>, Option<String>, String)>,
}

impl StepAccumulator {
    /// Fold one chunk, returning the delta events to forward downstream.
    fn absorb(&mut self, chunk: &ChatCompletionChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(usage) = chunk.usage {
            self.usage = Some(usage.into());
        }

        let Some(choice) = chunk.choices.first() else {
            return events;
        };

        if let Some(reasoning) = &choice.delta.reasoning_content {
            if !reasoning.is_empty() {
                events.push(StreamEvent::ReasoningDelta {
                    text: reasoning.clone(),
                });
            }
        }

        if let Some(content) = &choice.delta.content {
            if !content.is_empty() {
                self.text.push_str(content);
                events.push(StreamEvent::TextDelta {
                    text: content.clone(),
                });
            }
        }

        if let Some(tool_calls) = &choice.delta.tool_calls {
            for tc in tool_calls {
                let entry = self
                    .calls
                    .entry(tc.index)
                    .or_insert((None, None, String::new()));
                if let Some(id) = &tc.id {
                    entry.0 = Some(id.clone());
                }
                if let Some(function) = &tc.function {
                    if let Some(name) = &function.name {
                        entry.1 = Some(name.clone());
                    }
                    if let Some(args) = &function.arguments {
                        entry.2.push_str(args);
                    }
                }
            }
        }

        if let Some(reason) = &choice.finish_reason {
            self.finish_reason = Some(reason.clone());
        }

        events
    }

    fn assembled_calls(&self) -> Vec<AssembledCall> {
        self.calls
            .values()
            .filter_map(|(id, name, raw_args)| {
                let (id, name) = (id.clone()?, name.clone()?);
                let args = if raw_args.is_empty() {
                    json!({})
                } else {
                    serde_json::from_str(raw_args)
                        .unwrap_or_else(|_| Value::String(raw_args.clone()))
                };
                Some(AssembledCall {
                    id,
                    name,
                    args,
                    raw_args: raw_args.clone(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatibleClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream(&self, request: ChatRequest) -> Result<EventStream> {
        let mut transcript = Self::initial_transcript(&request);
        if transcript.is_empty() {
            return Err(anyhow!("Chat request has neither messages nor a prompt"));
        }

        let http = self.http.clone();
        let endpoint = self.endpoint();
        let api_key = self.api_key.clone();
        let model = self.model.clone();
        let max_steps = request.options.max_steps.max(1);
        let tools = request.options.tools.clone();
        let body_request = request.clone();

        let stream = async_stream::stream! {
            // One logical assistant message per turn, however many steps.
            let message_id = format!("msg_{}", uuid::Uuid::new_v4());

            for step in 0..max_steps {
                let body = build_request_body(&model, &body_request, &transcript, true);

                let response = match http
                    .post(&endpoint)
                    .bearer_auth(&api_key)
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(r) if r.status().is_success() => r,
                    Ok(r) => {
                        let status = r.status();
                        let detail = r.text().await.unwrap_or_default();
                        yield Ok(StreamEvent::Error {
                            error: ErrorInfo::new(
                                "Error",
                                format!("Provider returned {}: {}", status, detail),
                            ),
                        });
                        return;
                    }
                    Err(e) => {
                        yield Ok(StreamEvent::Error {
                            error: ErrorInfo::new("Error", format!("Chat request failed: {}", e)),
                        });
                        return;
                    }
                };

                // The step begins once the provider has accepted the
                // request; consumers arm their turn deadline against this.
                yield Ok(StreamEvent::StepStart {
                    message_id: message_id.clone(),
                });

                let mut chunks = parse_chunk_stream(response);
                let mut acc = StepAccumulator::default();

                while let Some(chunk_result) = chunks.next().await {
                    match chunk_result {
                        Ok(chunk) => {
                            for event in acc.absorb(&chunk) {
                                yield Ok(event);
                            }
                        }
                        Err(e) => {
                            yield Ok(StreamEvent::Error {
                                error: ErrorInfo::new("Error", e.to_string()),
                            });
                            return;
                        }
                    }
                }

                let calls = acc.assembled_calls();
                for call in &calls {
                    yield Ok(StreamEvent::ToolCall {
                        tool_name: call.name.clone(),
                        tool_call_id: call.id.clone(),
                        args: call.args.clone(),
                    });
                }

                yield Ok(StreamEvent::StepFinish {
                    usage: acc.usage.unwrap_or_default(),
                    timestamp: chrono::Utc::now().timestamp_millis(),
                });

                let wants_tools = acc.finish_reason.as_deref() == Some("tool_calls");
                let last_step = step + 1 >= max_steps;

                let registry = match tools.as_ref() {
                    Some(registry) if wants_tools && !calls.is_empty() && !last_step => registry,
                    _ => {
                        if wants_tools && last_step {
                            tracing::warn!(max_steps, "tool loop hit step limit");
                        }
                        yield Ok(StreamEvent::Finish {
                            finish_reason: acc.finish_reason.clone(),
                        });
                        return;
                    }
                };

                // Run the requested tools and extend the transcript for the
                // next step. Tool failures become error-shaped results, not
                // stream errors.
                transcript.push(json!({
                    "role": "assistant",
                    "content": acc.text,
                    "tool_calls": calls.iter().map(|c| json!({
                        "id": c.id,
                        "type": "function",
                        "function": { "name": c.name, "arguments": c.raw_args },
                    })).collect::<Vec<_>>(),
                }));

                for call in &calls {
                    let result = match registry.execute(&call.name, call.args.clone()).await {
                        Ok(value) => value,
                        Err(e) => {
                            tracing::warn!(tool = %call.name, error = %e, "tool execution failed");
                            json!({ "error": e.to_string() })
                        }
                    };

                    transcript.push(json!({
                        "role": "tool",
                        "tool_call_id": call.id,
                        "content": result.to_string(),
                    }));

                    yield Ok(StreamEvent::ToolResult {
                        tool_call_id: call.id.clone(),
                        result,
                    });
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn generate(&self, request: ChatRequest) -> Result<String> {
        let transcript = Self::initial_transcript(&request);
        if transcript.is_empty() {
            return Err(anyhow!("Chat request has neither messages nor a prompt"));
        }

        let body = build_request_body(&self.model, &request, &transcript, false);
        let response = self.open_stream(&body).await?;
        let payload: Value = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Completion response carried no content"))
    }
}
