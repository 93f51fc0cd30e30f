//! Call session lifecycle
//!
//! One [`CallSession`] per live call, owned by the [`SessionRegistry`]
//! from registration until disconnect cleanup removes it. The registry is
//! the single cross-thread contention point between the stack's delivery
//! threads and service shutdown.

mod call;
mod registry;

pub use call::{CallSession, CallState, Direction};
pub use registry::SessionRegistry;
