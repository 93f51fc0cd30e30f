use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use super::TranscriptionEngine;
use crate::error::TranscriptionError;

/// Transcription engine shelling out to a whisper.cpp binary.
///
/// Recordings are handed to the binary as recorded; whisper.cpp reads WAV
/// input directly, so no resampling layer sits in between. The transcript
/// is written to a temp `.txt` file, read back, and removed.
pub struct WhisperCppEngine {
    binary: PathBuf,
    model: PathBuf,
}

impl WhisperCppEngine {
    pub fn new(binary: impl Into<PathBuf>, model: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl TranscriptionEngine for WhisperCppEngine {
    async fn transcribe(&self, recording: &Path) -> Result<String, TranscriptionError> {
        if !recording.exists() {
            return Err(TranscriptionError::MissingRecording(recording.to_path_buf()));
        }

        // whisper.cpp appends ".txt" to the -of base name.
        let out_base = std::env::temp_dir().join(format!("transcript-{}", Uuid::new_v4()));

        debug!(
            binary = %self.binary.display(),
            recording = %recording.display(),
            "invoking whisper.cpp"
        );

        let output = Command::new(&self.binary)
            .arg("-m")
            .arg(&self.model)
            .arg("-f")
            .arg(recording)
            .arg("-otxt")
            .arg("-of")
            .arg(&out_base)
            .output()
            .await
            .map_err(|e| TranscriptionError::Engine(format!("failed to run whisper.cpp: {e}")))?;

        if !output.status.success() {
            return Err(TranscriptionError::Engine(format!(
                "whisper.cpp exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let transcript_path = out_base.with_extension("txt");
        let text = tokio::fs::read_to_string(&transcript_path)
            .await
            .map_err(|e| TranscriptionError::Engine(format!("transcript not readable: {e}")))?;

        if let Err(e) = tokio::fs::remove_file(&transcript_path).await {
            warn!(path = %transcript_path.display(), error = %e, "failed to remove temp transcript");
        }

        Ok(text.trim().to_string())
    }
}
