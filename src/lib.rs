//! Voice avatar agent: a real-time conversational bot that joins a room,
//! listens for speech, animates an avatar in sync with its own voice, and
//! persists the conversation when the call ends.
//!
//! The crate is organized around trait boundaries: [`transport::RoomTransport`]
//! for the room, [`model::ModelSession`] for the speech-to-speech model, and
//! [`persistence::ConversationStore`] for the conversation record. The core
//! machinery in [`core`] is independent of any concrete backend.

pub mod config;
pub mod core;
pub mod model;
pub mod persistence;
pub mod transport;
