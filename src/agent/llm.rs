//! LLM-backed selector over an OpenAI-compatible chat-completions API
//!
//! The catalog is presented as function-calling tools; prior step records go
//! into the conversation as a scratchpad so the model can chain operations
//! (resolve a person, then fetch their summary). One decision per call: the
//! first tool call wins, plain text means respond-and-stop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use super::selector::{ContextSnapshot, Decision, Selector, SelectorError, StepRecord};
use crate::ops::{OpDefinition, OpName};

const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

const SYSTEM_PROMPT: &str = "You are an HR attendance assistant. Decide which \
operation answers the user's request and call it as a tool, or answer in \
plain text when no operation applies. Employee ids are 24-character hex \
strings; never invent one - resolve people via search_by_email or \
search_by_id first and reuse the id a previous step surfaced. Call at most \
one tool at a time and stop once the request is answered.";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec>,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ToolSpec {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: FunctionSpec,
}

#[derive(Debug, Serialize)]
struct FunctionSpec {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    /// JSON-encoded argument object.
    arguments: String,
}

/// Selector backed by a chat-completions endpoint.
pub struct LlmSelector {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl LlmSelector {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.into(),
            api_key,
            model: DEFAULT_MODEL.into(),
        }
    }

    /// Point at a different OpenAI-compatible endpoint.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn convert_catalog(catalog: &[OpDefinition]) -> Vec<ToolSpec> {
        catalog
            .iter()
            .map(|def| ToolSpec {
                tool_type: "function",
                function: FunctionSpec {
                    name: def.name.as_str().to_string(),
                    description: def.description.to_string(),
                    parameters: def.parameters.clone(),
                },
            })
            .collect()
    }

    fn build_messages(
        &self,
        utterance: &str,
        context: &ContextSnapshot,
        prior_steps: &[StepRecord],
    ) -> Vec<Message> {
        let mut messages = vec![Message {
            role: "system",
            content: SYSTEM_PROMPT.to_string(),
        }];

        if let Some(id) = &context.resolved_employee {
            messages.push(Message {
                role: "system",
                content: format!("The user is linked to employee id {id}."),
            });
        }

        for (role, content) in &context.recent_turns {
            messages.push(Message {
                role: if role == "assistant" { "assistant" } else { "user" },
                content: content.clone(),
            });
        }

        messages.push(Message {
            role: "user",
            content: utterance.to_string(),
        });

        // Scratchpad: what already ran this turn and what came back.
        for step in prior_steps {
            messages.push(Message {
                role: "assistant",
                content: format!("Called {} with {}", step.op, step.args),
            });
            messages.push(Message {
                role: "user",
                content: format!("[result] {}", step.summary),
            });
        }

        messages
    }

    fn decision_from(&self, message: ResponseMessage) -> Decision {
        for call in message.tool_calls {
            let Some(op) = OpName::parse(&call.function.name) else {
                warn!(tool = %call.function.name, "model called an unknown operation");
                continue;
            };
            let args: Value = match serde_json::from_str(&call.function.arguments) {
                Ok(Value::Object(map)) => Value::Object(map),
                Ok(_) | Err(_) => json!({}),
            };
            return Decision::Invoke { op, args };
        }
        Decision::Respond {
            text: message.content.filter(|c| !c.trim().is_empty()),
        }
    }
}

#[async_trait]
impl Selector for LlmSelector {
    async fn select(
        &self,
        utterance: &str,
        context: &ContextSnapshot,
        catalog: &[OpDefinition],
        prior_steps: &[StepRecord],
    ) -> Result<Decision, SelectorError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: self.build_messages(utterance, context, prior_steps),
            tools: Self::convert_catalog(catalog),
            temperature: 0.1,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SelectorError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SelectorError::Backend(format!("API error {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SelectorError::Backend(format!("bad response: {e}")))?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| SelectorError::Backend("empty choices".into()))?;

        Ok(self.decision_from(message))
    }
}
