use std::path::PathBuf;
use thiserror::Error;

use crate::stack::CallId;

/// Signaling or media transport failure scoped to a single call.
///
/// Terminates that call's session; never affects other calls.
#[derive(Debug, Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// Playback or recording could not be set up or is unavailable.
///
/// Always logged and skipped; the call itself continues.
#[derive(Debug, Error)]
pub enum MediaResourceError {
    #[error("call is not active, media unavailable")]
    NotActive,
    #[error("failed to create media resource: {0}")]
    Resource(String),
}

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("recording not found: {}", .0.display())]
    MissingRecording(PathBuf),
    #[error("transcription engine failed: {0}")]
    Engine(String),
}

/// The external stack handed us a call id that is still registered.
///
/// Indicates a stack-contract breach; asserted in debug builds,
/// logged and ignored in release builds.
#[derive(Debug, Error)]
#[error("session already registered for call {call}")]
pub struct DuplicateSessionError {
    pub call: CallId,
}
