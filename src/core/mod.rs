//! Core conversation machinery: frames, voice activity detection, turn
//! tracking, animation, and the controller/pipeline that tie them together.

pub mod animation;
pub mod controller;
pub mod frames;
pub mod pipeline;
pub mod session;
pub mod turn;
pub mod vad;
