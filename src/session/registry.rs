use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::CallSession;
use crate::error::DuplicateSessionError;
use crate::stack::CallId;

/// Concurrency-safe map of live calls, keyed by stack-assigned id.
///
/// This is the only cross-thread contention point between the stack's
/// delivery thread(s) and service shutdown; every access goes through a
/// single guard. Sessions never escape the guard by reference — callers
/// read or mutate inside a closure, or take full ownership via `remove`.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: Mutex<HashMap<CallId, CallSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session. At most one session may exist per call id;
    /// a duplicate registration is refused and reported.
    pub fn register(&self, call: CallId, session: CallSession) -> Result<(), DuplicateSessionError> {
        let mut sessions = self.lock();
        if sessions.contains_key(&call) {
            return Err(DuplicateSessionError { call });
        }
        sessions.insert(call, session);
        Ok(())
    }

    /// Run `f` against the session for `call`, if present.
    pub fn with_session<R>(&self, call: CallId, f: impl FnOnce(&mut CallSession) -> R) -> Option<R> {
        self.lock().get_mut(&call).map(f)
    }

    /// Remove and return the session for `call`. Idempotent: a second
    /// removal observes the id as absent and returns `None`.
    pub fn remove(&self, call: CallId) -> Option<CallSession> {
        self.lock().remove(&call)
    }

    /// Ids of all currently live sessions, for bulk operations.
    pub fn snapshot(&self) -> Vec<CallId> {
        self.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CallId, CallSession>> {
        // A poisoned guard only means a delivery thread panicked mid-access;
        // the map itself stays usable for the remaining calls.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
