//! Room transport boundary.
//!
//! The pipeline publishes media into the room and observes participant
//! lifecycle through [`RoomTransport`]. The trait keeps the media plumbing
//! swappable: the production transport wraps a real room connection, while
//! tests and the dry-run binary use [`TracingRoomTransport`].

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::animation::AnimationCommand;
use crate::core::frames::AudioFrame;

/// Errors publishing into or reading from the room.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("room disconnected")]
    Disconnected,
    #[error("publish failed: {0}")]
    Publish(String),
}

/// Participant lifecycle events observed from the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// The first remote participant joined; the conversation can start.
    FirstParticipantJoined { participant_id: String },
    /// A remote participant left the room.
    ParticipantLeft {
        participant_id: String,
        reason: Option<String>,
    },
    /// The client signalled it finished its own setup.
    ClientReady,
}

/// Media flowing out to the room.
#[derive(Debug, Clone)]
pub enum OutgoingFrame {
    Audio(AudioFrame),
    Animation(AnimationCommand),
}

/// Connection to the conference room.
#[async_trait]
pub trait RoomTransport: Send + Sync {
    /// Publish one outgoing media frame.
    async fn send_frame(&self, frame: OutgoingFrame) -> Result<(), TransportError>;

    /// Announce that the bot finished setup and is listening.
    async fn set_bot_ready(&self) -> Result<(), TransportError>;
}

/// Transport stand-in that logs every frame instead of publishing it.
#[derive(Debug, Default)]
pub struct TracingRoomTransport;

#[async_trait]
impl RoomTransport for TracingRoomTransport {
    async fn send_frame(&self, frame: OutgoingFrame) -> Result<(), TransportError> {
        match frame {
            OutgoingFrame::Audio(audio) => {
                debug!(samples = audio.num_samples(), source = %audio.source, "room <- audio");
            }
            OutgoingFrame::Animation(AnimationCommand::Static(image)) => {
                debug!(name = %image.name, "room <- static frame");
            }
            OutgoingFrame::Animation(AnimationCommand::Animate(sprite)) => {
                debug!(frames = sprite.len(), "room <- sprite animation");
            }
        }
        Ok(())
    }

    async fn set_bot_ready(&self) -> Result<(), TransportError> {
        info!("room <- bot ready");
        Ok(())
    }
}
