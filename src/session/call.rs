use std::path::PathBuf;

use crate::stack::{MediaHandle, RecorderHandle};

/// Lifecycle of one call.
///
/// `Initiating` is outbound-only, `Ringing` inbound-only; both converge on
/// `Active` and end in `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Initiating,
    Ringing,
    Active,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Per-call state: media resource handles, recording paths, and the DTMF
/// digit buffer.
///
/// Owned by the [`SessionRegistry`](super::SessionRegistry) while the call
/// is live; mutated only from the thread delivering that call's signaling
/// events. Media handles exist only while the state is `Active`.
#[derive(Debug)]
pub struct CallSession {
    direction: Direction,
    state: CallState,
    remote: String,
    pub media: Option<MediaHandle>,
    pub recorder: Option<RecorderHandle>,
    pub recording_path: Option<PathBuf>,
    pub playback_path: Option<PathBuf>,
    digits: Vec<char>,
}

impl CallSession {
    /// New inbound session, ringing until answered or rejected.
    pub fn inbound(remote: impl Into<String>) -> Self {
        Self::new(Direction::Inbound, CallState::Ringing, remote.into())
    }

    /// New outbound session, initiating until the remote answers.
    pub fn outbound(remote: impl Into<String>) -> Self {
        Self::new(Direction::Outbound, CallState::Initiating, remote.into())
    }

    fn new(direction: Direction, state: CallState, remote: String) -> Self {
        Self {
            direction,
            state,
            remote,
            media: None,
            recorder: None,
            recording_path: None,
            playback_path: None,
            digits: Vec::new(),
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn is_active(&self) -> bool {
        self.state == CallState::Active
    }

    /// Answer transition. Returns false (and changes nothing) unless the
    /// session is still pending in `Initiating` or `Ringing`.
    pub fn connect(&mut self) -> bool {
        match self.state {
            CallState::Initiating | CallState::Ringing => {
                self.state = CallState::Active;
                true
            }
            CallState::Active | CallState::Disconnected => false,
        }
    }

    /// Terminal transition; valid from every state.
    pub fn disconnect(&mut self) {
        self.state = CallState::Disconnected;
    }

    pub fn push_digit(&mut self, digit: char) {
        self.digits.push(digit);
    }

    pub fn digits(&self) -> &[char] {
        &self.digits
    }

    pub fn reset_digits(&mut self) {
        self.digits.clear();
    }
}
