//! Outward event surface: a fixed-shape registry of named handler slots.
//!
//! One slot per event kind, last registration wins, no handler chaining.
//! Handlers run synchronously on the thread delivering the event, so they
//! must return promptly; a handler error is caught and logged here and
//! never propagates back into the stack's control flow.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::error;

use crate::stack::CallId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    IncomingCall,
    CallConnected,
    CallEnded,
    IncomingMessage,
    DtmfReceived,
    RegistrationState,
}

#[derive(Debug, Clone)]
pub enum ServiceEvent {
    IncomingCall {
        call: CallId,
        remote: String,
    },
    CallConnected {
        call: CallId,
        remote: String,
    },
    /// Fired exactly once per call, after cleanup. Carries the finalized
    /// recording path when recording was enabled and produced audio.
    CallEnded {
        call: CallId,
        remote: String,
        recording: Option<PathBuf>,
    },
    IncomingMessage {
        from: String,
        body: String,
    },
    DtmfReceived {
        call: CallId,
        digit: char,
    },
    RegistrationState {
        code: u16,
        reason: String,
    },
}

impl ServiceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServiceEvent::IncomingCall { .. } => EventKind::IncomingCall,
            ServiceEvent::CallConnected { .. } => EventKind::CallConnected,
            ServiceEvent::CallEnded { .. } => EventKind::CallEnded,
            ServiceEvent::IncomingMessage { .. } => EventKind::IncomingMessage,
            ServiceEvent::DtmfReceived { .. } => EventKind::DtmfReceived,
            ServiceEvent::RegistrationState { .. } => EventKind::RegistrationState,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(&ServiceEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct Slots {
    incoming_call: Option<EventHandler>,
    call_connected: Option<EventHandler>,
    call_ended: Option<EventHandler>,
    incoming_message: Option<EventHandler>,
    dtmf_received: Option<EventHandler>,
    registration_state: Option<EventHandler>,
}

impl Slots {
    fn slot(&mut self, kind: EventKind) -> &mut Option<EventHandler> {
        match kind {
            EventKind::IncomingCall => &mut self.incoming_call,
            EventKind::CallConnected => &mut self.call_connected,
            EventKind::CallEnded => &mut self.call_ended,
            EventKind::IncomingMessage => &mut self.incoming_message,
            EventKind::DtmfReceived => &mut self.dtmf_received,
            EventKind::RegistrationState => &mut self.registration_state,
        }
    }
}

#[derive(Default)]
pub struct EventDispatcher {
    slots: Mutex<Slots>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the handler for `kind`, replacing any previous one.
    pub fn set_handler(&self, kind: EventKind, handler: EventHandler) {
        *self.lock().slot(kind) = Some(handler);
    }

    /// Invoke the handler for the event's kind, if one is installed.
    ///
    /// The handler runs outside the slot guard, so it may re-register
    /// handlers or call back into the service.
    pub fn emit(&self, event: &ServiceEvent) {
        let kind = event.kind();
        let handler = self.lock().slot(kind).clone();
        if let Some(handler) = handler {
            if let Err(e) = handler(event) {
                error!(?kind, error = %e, "event handler failed");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
