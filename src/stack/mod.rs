//! Capability interface to the external telephony stack.
//!
//! The engine never touches SIP signaling or RTP itself; it drives the
//! stack through [`TelephonyStack`] and receives delivery callbacks through
//! [`StackEventSink`]. The stack owns its own event-delivery thread and
//! guarantees serialized delivery per call.

mod null;

pub use null::NullStack;

use std::fmt;
use std::path::Path;

use crate::error::{MediaResourceError, TransportError};

/// Opaque stack-assigned call identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(pub i64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Live audio path of an active call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaHandle(pub u64);

/// Handle to an in-progress recording attached to a media path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderHandle(pub u64);

/// Call progress as reported by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackCallState {
    /// The call was answered (remote answer for outbound, local for inbound).
    Answered,
    /// The call ended: hangup by either party, reject, or cancel.
    Disconnected,
    /// Signaling or media transport failed; terminal like a disconnect.
    Failed,
}

/// Operations this engine invokes on the external stack.
pub trait TelephonyStack: Send + Sync {
    fn make_call(&self, address: &str) -> Result<CallId, TransportError>;

    fn answer(&self, call: CallId, status_code: u16) -> Result<(), TransportError>;

    fn hangup(&self, call: CallId) -> Result<(), TransportError>;

    fn attach_audio(&self, call: CallId) -> Result<MediaHandle, MediaResourceError>;

    fn start_playback(&self, media: MediaHandle, file: &Path) -> Result<(), MediaResourceError>;

    fn stop_playback(&self, media: MediaHandle) -> Result<(), MediaResourceError>;

    fn start_recording(
        &self,
        media: MediaHandle,
        file: &Path,
    ) -> Result<RecorderHandle, MediaResourceError>;

    /// Stops and finalizes the recording; the file is closed when this returns.
    fn stop_recording(&self, recorder: RecorderHandle) -> Result<(), MediaResourceError>;

    fn send_instant_message(&self, address: &str, text: &str) -> Result<(), TransportError>;
}

/// Delivery callbacks the stack invokes on this engine.
///
/// Called synchronously from the stack's delivery thread; implementations
/// must return promptly, since events for any one call are serialized
/// behind the running callback.
pub trait StackEventSink: Send + Sync {
    fn on_incoming_call(&self, call: CallId, remote: &str);

    fn on_call_state_changed(&self, call: CallId, state: StackCallState);

    fn on_dtmf_digit(&self, call: CallId, digit: char);

    fn on_instant_message(&self, from: &str, body: &str);

    fn on_registration_state(&self, code: u16, reason: &str);
}
