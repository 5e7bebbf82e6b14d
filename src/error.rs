//! Crate-level error types.
//!
//! Each subsystem that can fail in more than one interesting way gets its own
//! enum; [`TutorError`] wraps them so callers at the CLI layer can propagate
//! everything with `?`.

use thiserror::Error;

/// Errors raised by the streaming chat connection.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The socket is not (or no longer) open.
    #[error("chat connection is not open")]
    NotConnected,
    /// A turn was submitted while the previous one is still waiting for its
    /// first fragment.
    #[error("please wait for the assistant to finish its response")]
    Busy,
    /// An empty question was submitted.
    #[error("cannot send an empty message")]
    EmptyMessage,
    /// Handshake or frame-level WebSocket failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Errors raised by a single definition fetch attempt.
///
/// These never reach the user directly: once retries are exhausted the lookup
/// resolves to an absent definition instead.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The server replied with a non-2xx status code.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },
    /// Connection, timeout, or body decoding failure.
    #[error("request to {url} failed: {detail}")]
    Transport { url: String, detail: String },
}

/// Top-level error for the crate.
#[derive(Debug, Error)]
pub enum TutorError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// A lesson file could not be fetched or read. The whole library load
    /// fails; there is no partial-content fallback.
    #[error("failed to load lesson {filename}: {detail}")]
    LessonLoad { filename: String, detail: String },

    #[error("no lesson with id '{0}'")]
    UnknownLesson(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("preference store error: {0}")]
    Prefs(String),

    #[error("speech engine error: {0}")]
    Speech(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TutorError>;
