//! Unified error type for castbridge.
//!
//! All modules funnel their failures into [`Error`], which carries enough
//! context for HTTP handlers to derive a status code via [`Error::http_status`].

/// Unified error type covering all failure modes in castbridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested media source could not be found.
    #[error("Source not found: {path}")]
    NotFound {
        /// The path or URL that was looked up.
        path: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Binding a network listener failed.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// The address that could not be bound.
        addr: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Decoding or encoding an image failed.
    #[error("Image error: {source}")]
    Image {
        /// The underlying image error.
        #[from]
        source: image::ImageError,
    },

    /// Configuration could not be loaded or parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Tool { .. } => 502,
            Error::Probe(_) => 422,
            Error::Io { .. }
            | Error::Bind { .. }
            | Error::Image { .. }
            | Error::Config(_)
            | Error::Internal(_) => 500,
        }
    }
}

/// Result type alias using the castbridge [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
