//! Conversation controller: tool dispatch and lifecycle.
//!
//! All control inputs — model tool calls, room lifecycle events, the grace
//! timer — are serialized onto one command channel, so session mutation and
//! persistence never interleave. The controller is the only writer of the
//! conversation record.
//!
//! Termination discipline: the transcript flush always happens before the
//! termination broadcast for the same session, and the flush write is
//! guarded by a latch so racing end paths (model-requested end vs. the
//! participant leaving) produce at most one store update.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::pipeline::TerminationHandle;
use super::session::{ContactRecord, ConversationSession, SessionStatus, TranscriptMessage};
use crate::model::{
    tool_declarations, ModelSession, ToolCallRequest, ToolResult, TOOL_END_CONVERSATION,
    TOOL_RECORD_USER_CONTACT,
};
use crate::persistence::{ConversationPatch, ConversationStore};
use crate::transport::RoomTransport;

/// Delay between the farewell and pipeline termination, giving the last
/// synthesized audio time to play out.
pub const GRACE_DELAY: Duration = Duration::from_secs(3);

/// Instruction sent to the model when the conversation is ending.
const FAREWELL_CONTEXT: &str =
    "The caller is done. Say a brief, warm goodbye and nothing else.";

/// Control inputs, serialized onto the controller's queue.
#[derive(Debug)]
pub enum ControllerCommand {
    /// The model invoked a tool.
    ToolCall(ToolCallRequest),
    /// A finished utterance to append to the transcript.
    Transcript(TranscriptMessage),
    /// The first remote participant joined; start the conversation.
    FirstParticipantJoined { participant_id: String },
    /// A remote participant left the room.
    ParticipantLeft {
        participant_id: String,
        reason: Option<String>,
    },
    /// The client finished its own setup.
    ClientReady,
    /// The post-farewell grace delay ran out.
    GraceElapsed,
}

/// Tools the controller knows how to execute.
enum ToolKind {
    RecordUserContact,
    EndConversation,
}

impl ToolKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            TOOL_RECORD_USER_CONTACT => Some(Self::RecordUserContact),
            TOOL_END_CONVERSATION => Some(Self::EndConversation),
            _ => None,
        }
    }
}

fn parse_contact(arguments: &Value) -> Result<ContactRecord, String> {
    let email = arguments
        .get("email")
        .and_then(Value::as_str)
        .ok_or("missing required field: email")?;
    let notes = arguments
        .get("notes")
        .and_then(Value::as_str)
        .ok_or("missing required field: notes")?;
    let phone_number = arguments
        .get("phone_number")
        .and_then(Value::as_str)
        .map(str::to_owned);
    Ok(ContactRecord {
        email: email.to_owned(),
        phone_number,
        notes: notes.to_owned(),
    })
}

/// Owns the session for one room and drives its lifecycle.
pub struct ConversationController {
    session: ConversationSession,
    store: Arc<dyn ConversationStore>,
    model: Arc<dyn ModelSession>,
    transport: Arc<dyn RoomTransport>,
    termination: TerminationHandle,
    commands: mpsc::Receiver<ControllerCommand>,
    command_tx: mpsc::Sender<ControllerCommand>,
    greeting: String,
    system_prompt: String,
    grace_delay: Duration,
    flushed: bool,
}

impl ConversationController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        room_url: impl Into<String>,
        store: Arc<dyn ConversationStore>,
        model: Arc<dyn ModelSession>,
        transport: Arc<dyn RoomTransport>,
        termination: TerminationHandle,
        commands: mpsc::Receiver<ControllerCommand>,
        command_tx: mpsc::Sender<ControllerCommand>,
        greeting: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            session: ConversationSession::new(room_url),
            store,
            model,
            transport,
            termination,
            commands,
            command_tx,
            greeting: greeting.into(),
            system_prompt: system_prompt.into(),
            grace_delay: GRACE_DELAY,
            flushed: false,
        }
    }

    /// Shorten the grace delay, for tests.
    pub fn with_grace_delay(mut self, grace_delay: Duration) -> Self {
        self.grace_delay = grace_delay;
        self
    }

    /// Process commands until the conversation ends or termination is
    /// requested externally. Consumes the controller.
    pub async fn run(mut self) {
        // Install the system instruction and tool schema before any audio
        // or tool traffic can flow.
        if let Err(e) = self
            .model
            .configure(&self.system_prompt, &tool_declarations())
            .await
        {
            warn!(error = %e, "failed to configure model session");
        }

        let mut termination = self.termination.subscribe();
        loop {
            tokio::select! {
                // Wrap `wait_for` so its non-`Send` borrow guard is dropped
                // before the branch body awaits.
                _ = async { let _ = termination.wait_for(|stopped| *stopped).await; } => {
                    // External shutdown: persist what we have, then stop.
                    info!(room = %self.session.room_url, "termination observed, flushing");
                    self.flush().await;
                    self.session.status = SessionStatus::Ended;
                    break;
                }
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    if self.handle(command).await {
                        break;
                    }
                }
            }
        }
        info!(room = %self.session.room_url, "conversation controller stopped");
    }

    /// Handle one command; returns `true` when the conversation is over.
    async fn handle(&mut self, command: ControllerCommand) -> bool {
        match command {
            ControllerCommand::ToolCall(request) => {
                self.handle_tool_call(request).await;
                false
            }
            ControllerCommand::Transcript(message) => {
                self.session.push_message(message);
                false
            }
            ControllerCommand::FirstParticipantJoined { participant_id } => {
                info!(participant_id, "first participant joined");
                if let Err(e) = self.model.send_context(&self.greeting).await {
                    warn!(error = %e, "failed to seed greeting context");
                }
                false
            }
            ControllerCommand::ClientReady => {
                debug!("client ready");
                if let Err(e) = self.transport.set_bot_ready().await {
                    warn!(error = %e, "failed to acknowledge client readiness");
                }
                false
            }
            ControllerCommand::ParticipantLeft {
                participant_id,
                reason,
            } => {
                info!(participant_id, ?reason, "participant left, ending conversation");
                self.flush().await;
                self.session.status = SessionStatus::Ended;
                self.termination.terminate();
                true
            }
            ControllerCommand::GraceElapsed => {
                if self.session.status != SessionStatus::Ending {
                    // Preempted by a participant-left in the meantime.
                    debug!("grace elapsed after conversation already ended");
                    return true;
                }
                self.session.status = SessionStatus::Ended;
                self.termination.terminate();
                true
            }
        }
    }

    async fn handle_tool_call(&mut self, request: ToolCallRequest) {
        let Some(kind) = ToolKind::from_name(&request.name) else {
            warn!(tool = %request.name, "model invoked unknown tool");
            self.reply(&request, format!("Unknown tool: {}", request.name))
                .await;
            return;
        };

        match kind {
            ToolKind::RecordUserContact => self.record_user_contact(request).await,
            ToolKind::EndConversation => self.end_conversation(request).await,
        }
    }

    /// `record_user_contact`: store the caller's details on the conversation
    /// record. Always answers the model with a textual result, even on
    /// failure, so the dialogue can continue.
    async fn record_user_contact(&mut self, request: ToolCallRequest) {
        let contact = match parse_contact(&request.arguments) {
            Ok(contact) => contact,
            Err(e) => {
                warn!(error = %e, "malformed contact arguments");
                self.reply(&request, format!("Error recording contact information: {e}"))
                    .await;
                return;
            }
        };

        info!(email = %contact.email, "recording contact information");
        self.session.record_contact(contact.clone());

        let text = match self.store.find_by_room(&self.session.room_url).await {
            Ok(Some(row)) => {
                match self
                    .store
                    .update(row.id, ConversationPatch::contact(contact))
                    .await
                {
                    Ok(()) => "Contact information recorded successfully".to_owned(),
                    Err(e) => {
                        error!(error = %e, "contact update failed");
                        format!("Error recording contact information: {e}")
                    }
                }
            }
            Ok(None) => "No active conversation found for this room".to_owned(),
            Err(e) => {
                error!(error = %e, "conversation lookup failed");
                format!("Error recording contact information: {e}")
            }
        };
        self.reply(&request, text).await;
    }

    /// `end_conversation`: farewell, flush, then terminate after the grace
    /// delay. `end: false` leaves the conversation open.
    async fn end_conversation(&mut self, request: ToolCallRequest) {
        let end = request
            .arguments
            .get("end")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if !end {
            debug!("end_conversation called with end=false");
            self.reply(&request, "Conversation remains active".to_string())
                .await;
            return;
        }

        if self.session.status != SessionStatus::Active {
            debug!(status = ?self.session.status, "end_conversation while not active");
            self.reply(&request, "Conversation is already ending".to_string())
                .await;
            return;
        }

        info!(room = %self.session.room_url, "ending conversation");
        self.session.status = SessionStatus::Ending;
        self.reply(&request, "Conversation ending".to_string()).await;

        if let Err(e) = self.model.send_context(FAREWELL_CONTEXT).await {
            warn!(error = %e, "failed to request farewell");
        }

        self.flush().await;

        // The timer fires back into the command queue so a participant-left
        // arriving during the grace period still wins.
        let tx = self.command_tx.clone();
        let grace = self.grace_delay;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = tx.send(ControllerCommand::GraceElapsed).await;
        });
    }

    /// Persist the final transcript and status. Latched: only the first
    /// successful flush writes; a failed flush leaves the latch unset so a
    /// later end path gets one retry.
    async fn flush(&mut self) {
        if self.flushed {
            debug!(room = %self.session.room_url, "flush skipped, already persisted");
            return;
        }

        let row = match self.store.find_by_room(&self.session.room_url).await {
            Ok(Some(row)) => row,
            Ok(None) => {
                warn!(room = %self.session.room_url, "no conversation record to flush");
                self.flushed = true;
                return;
            }
            Err(e) => {
                error!(error = %e, "conversation lookup failed during flush");
                return;
            }
        };

        let patch = ConversationPatch::closing(
            self.session.transcript.clone(),
            self.session.contact.clone(),
        );
        match self.store.update(row.id, patch).await {
            Ok(()) => {
                info!(room = %self.session.room_url, id = row.id, "transcript flushed");
                self.flushed = true;
            }
            Err(e) => {
                error!(error = %e, "transcript flush failed");
            }
        }
    }

    async fn reply(&self, request: &ToolCallRequest, content: String) {
        let result = ToolResult::new(request, content);
        if let Err(e) = self.model.send_tool_result(result).await {
            warn!(error = %e, tool = %request.name, "failed to deliver tool result");
        }
    }
}
