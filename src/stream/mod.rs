//! Media streaming: descriptors, ffmpeg argument construction, the
//! transcoder runner, image rendering, and the per-session HTTP server.

pub mod descriptor;
pub mod filters;
pub mod image;
pub mod runner;
pub mod server;

pub use descriptor::{EqualizerGains, MediaKind, Rotation, StreamDescriptor};
pub use server::{SessionServer, STREAM_PATH};
