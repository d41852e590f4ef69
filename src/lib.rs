//! On-demand media casting bridge.
//!
//! Turns local media files into cast-ready HTTP streams: videos and audio
//! are transcoded on the fly by an ffmpeg child process and served from a
//! single-session ephemeral-port server, images are rotated and re-encoded
//! in-process, and a fixed-port remote-control server drives playback.

pub mod config;
pub mod error;
pub mod probe;
pub mod remote;
pub mod stream;
pub mod tools;

pub use error::{Error, Result};
