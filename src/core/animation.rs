//! Avatar animation driven by the bot's speaking state.
//!
//! The driver listens to the bot-source turn tracker only. While the bot is
//! talking the transport cycles a forward-then-reverse sprite sequence;
//! while it is listening a single static frame is shown. The driver latches
//! its state so repeated events of the same kind never produce duplicate
//! transitions.

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use super::frames::{ImageFrame, SpriteFrame};
use super::turn::TurnEvent;

/// Number of source images in the talking animation.
pub const SPRITE_IMAGE_COUNT: usize = 25;

/// Discrete visual state of the avatar. Exactly one is active at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimationState {
    #[default]
    Idle,
    Talking,
}

/// One outstanding animation command for the transport.
#[derive(Debug, Clone)]
pub enum AnimationCommand {
    /// Show a single static frame.
    Static(ImageFrame),
    /// Cycle a sprite sequence until replaced.
    Animate(SpriteFrame),
}

/// Errors loading the sprite asset set.
#[derive(Debug, Error)]
pub enum SpriteError {
    #[error("failed to read sprite {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sprite {0} is empty")]
    Empty(String),
    #[error("sprite set has no images")]
    NoImages,
}

/// The avatar's image assets, loaded once at startup.
///
/// Holds the 25 source images plus the derived talking sequence (forward
/// then reversed, 50 frames) so a smooth loop needs no runtime mirroring.
#[derive(Debug, Clone)]
pub struct SpriteSet {
    quiet: ImageFrame,
    talking: SpriteFrame,
}

impl SpriteSet {
    /// Load `robot01.png` .. `robot25.png` from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, SpriteError> {
        let mut images = Vec::with_capacity(SPRITE_IMAGE_COUNT * 2);
        for i in 1..=SPRITE_IMAGE_COUNT {
            let name = format!("robot{i:02}.png");
            let bytes = std::fs::read(dir.join(&name)).map_err(|source| SpriteError::Read {
                name: name.clone(),
                source,
            })?;
            if bytes.is_empty() {
                return Err(SpriteError::Empty(name));
            }
            images.push(ImageFrame {
                data: bytes.into(),
                name,
            });
        }
        info!(count = images.len(), dir = %dir.display(), "loaded avatar sprites");
        Self::from_images(images)
    }

    /// Build the set from preloaded images (forward order). At least one
    /// image is required: the first doubles as the static listening frame.
    pub fn from_images(mut images: Vec<ImageFrame>) -> Result<Self, SpriteError> {
        let Some(first) = images.first() else {
            return Err(SpriteError::NoImages);
        };
        let quiet = first.clone();
        let mut reversed: Vec<ImageFrame> = images.iter().rev().cloned().collect();
        images.append(&mut reversed);
        Ok(Self {
            quiet,
            talking: SpriteFrame { images },
        })
    }

    /// Static frame shown while the bot is listening.
    pub fn quiet_frame(&self) -> ImageFrame {
        self.quiet.clone()
    }

    /// Looping sequence shown while the bot is talking.
    pub fn talking_frame(&self) -> SpriteFrame {
        self.talking.clone()
    }
}

/// Latching Idle/Talking driver over bot turn events.
pub struct AnimationDriver {
    state: AnimationState,
    sprites: SpriteSet,
}

impl AnimationDriver {
    pub fn new(sprites: SpriteSet) -> Self {
        Self {
            state: AnimationState::Idle,
            sprites,
        }
    }

    /// Command to queue before any event arrives: the static listening frame.
    pub fn initial_command(&self) -> AnimationCommand {
        AnimationCommand::Static(self.sprites.quiet_frame())
    }

    /// Apply a bot turn event, returning at most one animation command.
    ///
    /// Returns `None` when the event matches the current state, so two
    /// consecutive identical-state transitions are impossible.
    pub fn on_turn_event(&mut self, event: &TurnEvent) -> Option<AnimationCommand> {
        match (event, self.state) {
            (TurnEvent::SpeakingStarted { .. }, AnimationState::Idle) => {
                self.state = AnimationState::Talking;
                debug!("avatar: talking");
                Some(AnimationCommand::Animate(self.sprites.talking_frame()))
            }
            (TurnEvent::SpeakingStopped { .. }, AnimationState::Talking) => {
                self.state = AnimationState::Idle;
                debug!("avatar: idle");
                Some(AnimationCommand::Static(self.sprites.quiet_frame()))
            }
            _ => None,
        }
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }
}
