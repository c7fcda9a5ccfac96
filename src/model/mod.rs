//! Conversational model session boundary.
//!
//! The pipeline talks to the speech-to-speech model through [`ModelSession`]
//! and receives [`ModelEvent`]s back: synthesized audio frames and tool
//! invocations. The concrete session lives behind the trait so the pipeline
//! and controller are testable without a live model connection.

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::frames::AudioFrame;

pub const TOOL_RECORD_USER_CONTACT: &str = "record_user_contact";
pub const TOOL_END_CONVERSATION: &str = "end_conversation";

/// Errors at the model boundary.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model session closed")]
    SessionClosed,
    #[error("model transport error: {0}")]
    Transport(String),
}

/// A tool invocation emitted by the model.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: Value,
    pub tool_call_id: String,
}

/// The outcome handed back to the model for a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
}

impl ToolResult {
    pub fn new(request: &ToolCallRequest, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: request.tool_call_id.clone(),
            content: content.into(),
        }
    }
}

/// Something the model produced for the pipeline to act on.
#[derive(Debug, Clone)]
pub enum ModelEvent {
    /// A 30 ms chunk of synthesized bot speech.
    BotAudio(AudioFrame),
    /// The model wants a tool executed.
    ToolCall(ToolCallRequest),
    /// Final transcript text for a completed utterance.
    Transcript { user: bool, text: String },
}

/// Declaration of one callable tool, in the wire shape the model expects.
#[derive(Debug, Clone)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// The tools the agent exposes on every session.
pub fn tool_declarations() -> Vec<ToolDeclaration> {
    vec![
        ToolDeclaration {
            name: TOOL_RECORD_USER_CONTACT,
            description: "Record the caller's contact information so the team can follow up.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "email": {
                        "type": "string",
                        "description": "The caller's email address"
                    },
                    "phone_number": {
                        "type": "string",
                        "description": "The caller's phone number, if provided"
                    },
                    "notes": {
                        "type": "string",
                        "description": "Summary of what the caller wants"
                    }
                },
                "required": ["email", "notes"]
            }),
        },
        ToolDeclaration {
            name: TOOL_END_CONVERSATION,
            description: "End the conversation once the caller has said goodbye.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "end": {
                        "type": "boolean",
                        "description": "Set true to end the conversation"
                    }
                },
                "required": ["end"]
            }),
        },
    ]
}

/// Live connection to the conversational model.
#[async_trait]
pub trait ModelSession: Send + Sync {
    /// Install the system instruction and tool declarations before the
    /// conversation starts. Called once per session.
    async fn configure(
        &self,
        system_instruction: &str,
        tools: &[ToolDeclaration],
    ) -> Result<(), ModelError>;

    /// Forward a user audio frame to the model.
    async fn send_audio(&self, frame: AudioFrame) -> Result<(), ModelError>;

    /// Hand a tool result back so the model can continue the turn.
    async fn send_tool_result(&self, result: ToolResult) -> Result<(), ModelError>;

    /// Inject a text instruction (greeting trigger, farewell prompt).
    async fn send_context(&self, text: &str) -> Result<(), ModelError>;
}

/// Session stand-in that logs instead of talking to a model.
///
/// Used by the dry-run binary and integration tests.
#[derive(Debug, Default)]
pub struct TracingModelSession;

#[async_trait]
impl ModelSession for TracingModelSession {
    async fn configure(
        &self,
        system_instruction: &str,
        tools: &[ToolDeclaration],
    ) -> Result<(), ModelError> {
        let names: Vec<&str> = tools.iter().map(|t| t.name).collect();
        info!(?names, chars = system_instruction.len(), "model <- session setup");
        Ok(())
    }

    async fn send_audio(&self, frame: AudioFrame) -> Result<(), ModelError> {
        debug!(samples = frame.num_samples(), source = %frame.source, "model <- audio");
        Ok(())
    }

    async fn send_tool_result(&self, result: ToolResult) -> Result<(), ModelError> {
        info!(
            tool_call_id = %result.tool_call_id,
            content = %result.content,
            "model <- tool result"
        );
        Ok(())
    }

    async fn send_context(&self, text: &str) -> Result<(), ModelError> {
        info!(text, "model <- context");
        Ok(())
    }
}
