use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use tracing::info;

use super::{CallId, MediaHandle, RecorderHandle, TelephonyStack};
use crate::error::{MediaResourceError, TransportError};

/// Logging stand-in for a real SIP backend.
///
/// Lets the daemon run without signaling or media support: every operation
/// succeeds, hands out fresh ids, and logs what a real stack would have
/// done. No events are ever delivered and no recording files are produced.
#[derive(Debug, Default)]
pub struct NullStack {
    next_call: AtomicI64,
    next_handle: AtomicU64,
}

impl NullStack {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TelephonyStack for NullStack {
    fn make_call(&self, address: &str) -> Result<CallId, TransportError> {
        let call = CallId(self.next_call.fetch_add(1, Ordering::SeqCst));
        info!(%call, address, "null stack: make_call");
        Ok(call)
    }

    fn answer(&self, call: CallId, status_code: u16) -> Result<(), TransportError> {
        info!(%call, status_code, "null stack: answer");
        Ok(())
    }

    fn hangup(&self, call: CallId) -> Result<(), TransportError> {
        info!(%call, "null stack: hangup");
        Ok(())
    }

    fn attach_audio(&self, call: CallId) -> Result<MediaHandle, MediaResourceError> {
        let media = MediaHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        info!(%call, media = media.0, "null stack: attach_audio");
        Ok(media)
    }

    fn start_playback(&self, media: MediaHandle, file: &Path) -> Result<(), MediaResourceError> {
        info!(media = media.0, file = %file.display(), "null stack: start_playback");
        Ok(())
    }

    fn stop_playback(&self, media: MediaHandle) -> Result<(), MediaResourceError> {
        info!(media = media.0, "null stack: stop_playback");
        Ok(())
    }

    fn start_recording(
        &self,
        media: MediaHandle,
        file: &Path,
    ) -> Result<RecorderHandle, MediaResourceError> {
        let recorder = RecorderHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        info!(
            media = media.0,
            recorder = recorder.0,
            file = %file.display(),
            "null stack: start_recording"
        );
        Ok(recorder)
    }

    fn stop_recording(&self, recorder: RecorderHandle) -> Result<(), MediaResourceError> {
        info!(recorder = recorder.0, "null stack: stop_recording");
        Ok(())
    }

    fn send_instant_message(&self, address: &str, text: &str) -> Result<(), TransportError> {
        info!(address, chars = text.len(), "null stack: send_instant_message");
        Ok(())
    }
}
