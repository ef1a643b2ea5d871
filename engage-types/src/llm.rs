//! The provider-agnostic LLM message/tool shapes.
//!
//! The orchestrator speaks `{role, content, tool_call_id?, tool_calls?,
//! name?}` — the same shape regardless of which LLM backend is behind the
//! `LlmClient` trait (`engage-core`). This module is pure data so
//! `engage-context`, `engage-planner`, and `engage-specgen` can all build
//! and inspect message threads without depending on the client trait
//! itself.

use serde::{Deserialize, Serialize};

/// Role of a message in the LLM thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System/identity-establishing message.
    System,
    /// A human (or human-presenting) turn.
    User,
    /// A model turn.
    Assistant,
    /// A tool result fed back to the model.
    Tool,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this invocation, echoed back in the tool-result message.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Arguments as raw JSON (schema validated by the caller, not here).
    pub arguments: serde_json::Value,
}

/// JSON-Schema description of a tool offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input.
    pub input_schema: serde_json::Value,
}

/// One message in the LLM thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role.
    pub role: Role,
    /// Text content. Empty for pure tool-call assistant messages.
    pub content: String,
    /// Present on `Tool` messages: the `ToolCall.id` this result answers.
    #[serde(default)]
    pub tool_call_id: Option<String>,
    /// Present on `Assistant` messages that invoke tools.
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Present on `User` messages authored by a named human rather than the
    /// bot, so the model can address them by name.
    #[serde(default)]
    pub name: Option<String>,
}

impl Message {
    /// A plain system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
            name: None,
        }
    }

    /// A plain user message, optionally attributed to a named human.
    pub fn user(content: impl Into<String>, name: Option<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
            name,
        }
    }

    /// An assistant message (plain text, no tool calls).
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
            name: None,
        }
    }

    /// An assistant message that invokes one or more tools.
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_call_id: None,
            tool_calls: Some(tool_calls),
            name: None,
        }
    }

    /// A tool-result message answering a specific tool call.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
            name: None,
        }
    }
}

/// Token usage for a single LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
}

/// One LLM turn: the model's reply, any tool calls it made, and usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmTurn {
    /// Final text content, if the model produced any alongside/instead of
    /// tool calls.
    pub content: Option<String>,
    /// Tool calls requested this turn. Empty means the model is done.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Token usage for this call.
    #[serde(default)]
    pub tokens: TokenUsage,
}
