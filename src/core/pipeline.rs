//! Media pipeline composition root.
//!
//! Wires the per-source audio stages (analyzer → turn tracker, plus the
//! animation driver on the bot side), the model event router, and the
//! conversation controller into a set of tokio tasks connected by bounded
//! channels. Each stage owns its state and processes one item at a time.
//!
//! Termination is a one-shot watch broadcast: every stage waits on it, and
//! repeated requests are no-ops. Subscribers created after the broadcast
//! still observe it.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::animation::{AnimationDriver, SpriteSet};
use super::controller::{ControllerCommand, ConversationController};
use super::frames::{AudioFrame, FrameSource};
use super::turn::{TurnStateTracker, TurnTrackerConfig};
use super::vad::{build_analyzer, VadEngineKind, VadError, VoiceActivityAnalyzer};
use crate::model::{ModelEvent, ModelSession};
use crate::persistence::ConversationStore;
use crate::transport::{OutgoingFrame, RoomEvent, RoomTransport};

const AUDIO_CHANNEL_CAPACITY: usize = 32;
const CONTROL_CHANNEL_CAPACITY: usize = 16;

/// One-shot, non-cancelable termination broadcast.
#[derive(Clone)]
pub struct TerminationHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl TerminationHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::channel(false).0),
        }
    }

    /// Request termination. The first call broadcasts; later calls are
    /// no-ops.
    pub fn terminate(&self) {
        let first = self.tx.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        });
        if first {
            info!("pipeline termination requested");
        } else {
            debug!("pipeline termination already requested");
        }
    }

    pub fn is_terminated(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for TerminationHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait until termination is broadcast (or the pipeline is gone).
async fn terminated(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stopped| *stopped).await;
}

/// Static wiring for one room's pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub room_url: String,
    pub sample_rate: u32,
    pub vad_engine: VadEngineKind,
    pub stop_secs: f32,
    pub greeting: String,
    pub system_prompt: String,
}

/// Sender half of the pipeline: where external inputs are fed in.
pub struct PipelineHandle {
    termination: TerminationHandle,
    user_audio: mpsc::Sender<AudioFrame>,
    model_events: mpsc::Sender<ModelEvent>,
    room_events: mpsc::Sender<RoomEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    pub fn terminate(&self) {
        self.termination.terminate();
    }

    pub fn termination(&self) -> TerminationHandle {
        self.termination.clone()
    }

    pub fn user_audio(&self) -> mpsc::Sender<AudioFrame> {
        self.user_audio.clone()
    }

    pub fn model_events(&self) -> mpsc::Sender<ModelEvent> {
        self.model_events.clone()
    }

    pub fn room_events(&self) -> mpsc::Sender<RoomEvent> {
        self.room_events.clone()
    }

    /// Wait for every stage to finish.
    pub async fn join(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Builds and spawns the stage tasks for one room.
pub struct MediaPipeline {
    config: PipelineConfig,
    transport: Arc<dyn RoomTransport>,
    model: Arc<dyn ModelSession>,
    store: Arc<dyn ConversationStore>,
    sprites: SpriteSet,
}

impl MediaPipeline {
    pub fn new(
        config: PipelineConfig,
        transport: Arc<dyn RoomTransport>,
        model: Arc<dyn ModelSession>,
        store: Arc<dyn ConversationStore>,
        sprites: SpriteSet,
    ) -> Self {
        Self {
            config,
            transport,
            model,
            store,
            sprites,
        }
    }

    /// Spawn all stages and hand back the input senders.
    ///
    /// Fails only if the configured VAD engine cannot be constructed for
    /// the configured sample rate.
    pub fn spawn(self) -> Result<PipelineHandle, VadError> {
        let termination = TerminationHandle::new();
        let tracker_config = TurnTrackerConfig::default().with_stop_secs(self.config.stop_secs);

        let (user_tx, user_rx) = mpsc::channel::<AudioFrame>(AUDIO_CHANNEL_CAPACITY);
        let (bot_tx, bot_rx) = mpsc::channel::<AudioFrame>(AUDIO_CHANNEL_CAPACITY);
        let (model_tx, model_rx) = mpsc::channel::<ModelEvent>(AUDIO_CHANNEL_CAPACITY);
        let (room_tx, room_rx) = mpsc::channel::<RoomEvent>(CONTROL_CHANNEL_CAPACITY);
        let (command_tx, command_rx) = mpsc::channel::<ControllerCommand>(CONTROL_CHANNEL_CAPACITY);

        let user_analyzer = build_analyzer(self.config.vad_engine, self.config.sample_rate)?;
        let bot_analyzer = build_analyzer(self.config.vad_engine, self.config.sample_rate)?;

        info!(
            room = %self.config.room_url,
            engine = %self.config.vad_engine,
            sample_rate = self.config.sample_rate,
            "starting media pipeline"
        );

        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(user_stage(
            user_rx,
            user_analyzer,
            TurnStateTracker::new(FrameSource::User, tracker_config),
            Arc::clone(&self.model),
            termination.subscribe(),
        )));

        tasks.push(tokio::spawn(bot_stage(
            bot_rx,
            bot_analyzer,
            TurnStateTracker::new(FrameSource::Bot, tracker_config),
            AnimationDriver::new(self.sprites),
            Arc::clone(&self.transport),
            termination.subscribe(),
        )));

        tasks.push(tokio::spawn(model_router(
            model_rx,
            bot_tx,
            command_tx.clone(),
            Arc::clone(&self.transport),
            termination.subscribe(),
        )));

        tasks.push(tokio::spawn(room_router(
            room_rx,
            command_tx.clone(),
            termination.subscribe(),
        )));

        let controller = ConversationController::new(
            self.config.room_url,
            self.store,
            self.model,
            Arc::clone(&self.transport),
            termination.clone(),
            command_rx,
            command_tx,
            self.config.greeting,
            self.config.system_prompt,
        );
        tasks.push(tokio::spawn(controller.run()));

        Ok(PipelineHandle {
            termination,
            user_audio: user_tx,
            model_events: model_tx,
            room_events: room_tx,
            tasks,
        })
    }
}

/// User audio: forward to the model, then classify for turn tracking.
///
/// The model does its own turn taking over the raw audio, so user-side
/// transition events have no downstream consumer here; the tracker's log
/// lines are the intended output (local speaking diagnostics).
async fn user_stage(
    mut frames: mpsc::Receiver<AudioFrame>,
    mut analyzer: Box<dyn VoiceActivityAnalyzer>,
    mut tracker: TurnStateTracker,
    model: Arc<dyn ModelSession>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = terminated(&mut stop) => break,
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = model.send_audio(frame.clone()).await {
                    warn!(error = %e, "dropping user frame, model unavailable");
                }
                match analyzer.classify(&frame) {
                    // Tracker transitions are logged by the tracker itself.
                    Ok(decision) => {
                        tracker.process(&decision);
                    }
                    Err(e) => warn!(error = %e, "user frame rejected by analyzer"),
                }
            }
        }
    }
    debug!("user audio stage stopped");
}

/// Bot audio: classify, track turns, and drive the avatar animation.
async fn bot_stage(
    mut frames: mpsc::Receiver<AudioFrame>,
    mut analyzer: Box<dyn VoiceActivityAnalyzer>,
    mut tracker: TurnStateTracker,
    mut driver: AnimationDriver,
    transport: Arc<dyn RoomTransport>,
    mut stop: watch::Receiver<bool>,
) {
    // Show the listening frame before any audio arrives.
    if let Err(e) = transport
        .send_frame(OutgoingFrame::Animation(driver.initial_command()))
        .await
    {
        debug!(error = %e, "initial animation frame dropped");
    }

    loop {
        tokio::select! {
            _ = terminated(&mut stop) => break,
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                let decision = match analyzer.classify(&frame) {
                    Ok(decision) => decision,
                    Err(e) => {
                        warn!(error = %e, "bot frame rejected by analyzer");
                        continue;
                    }
                };
                if let Some(event) = tracker.process(&decision) {
                    if let Some(command) = driver.on_turn_event(&event) {
                        if let Err(e) = transport
                            .send_frame(OutgoingFrame::Animation(command))
                            .await
                        {
                            debug!(error = %e, "animation command dropped");
                        }
                    }
                }
            }
        }
    }
    debug!("bot audio stage stopped");
}

/// Route model events: audio to the bot stage and the room, tool calls and
/// transcripts to the controller.
async fn model_router(
    mut events: mpsc::Receiver<ModelEvent>,
    bot_audio: mpsc::Sender<AudioFrame>,
    commands: mpsc::Sender<ControllerCommand>,
    transport: Arc<dyn RoomTransport>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = terminated(&mut stop) => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    ModelEvent::BotAudio(frame) => {
                        if let Err(e) = transport
                            .send_frame(OutgoingFrame::Audio(frame.clone()))
                            .await
                        {
                            warn!(error = %e, "bot audio frame dropped");
                        }
                        if bot_audio.send(frame).await.is_err() {
                            break;
                        }
                    }
                    ModelEvent::ToolCall(request) => {
                        if commands
                            .send(ControllerCommand::ToolCall(request))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    ModelEvent::Transcript { user, text } => {
                        let message = if user {
                            super::session::TranscriptMessage::user(text)
                        } else {
                            super::session::TranscriptMessage::assistant(text)
                        };
                        if commands
                            .send(ControllerCommand::Transcript(message))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                }
            }
        }
    }
    debug!("model event router stopped");
}

/// Map room lifecycle events onto controller commands.
async fn room_router(
    mut events: mpsc::Receiver<RoomEvent>,
    commands: mpsc::Sender<ControllerCommand>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = terminated(&mut stop) => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                let command = match event {
                    RoomEvent::FirstParticipantJoined { participant_id } => {
                        ControllerCommand::FirstParticipantJoined { participant_id }
                    }
                    RoomEvent::ParticipantLeft {
                        participant_id,
                        reason,
                    } => ControllerCommand::ParticipantLeft {
                        participant_id,
                        reason,
                    },
                    RoomEvent::ClientReady => ControllerCommand::ClientReady,
                };
                if commands.send(command).await.is_err() {
                    break;
                }
            }
        }
    }
    debug!("room event router stopped");
}
