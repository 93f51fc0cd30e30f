pub mod address;
pub mod config;
pub mod dtmf;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod service;
pub mod session;
pub mod stack;

pub use address::{normalize, registrar_domain};
pub use config::Config;
pub use dtmf::{MenuAction, MenuNode, MenuOutcome};
pub use error::{DuplicateSessionError, MediaResourceError, TranscriptionError, TransportError};
pub use events::{EventDispatcher, EventHandler, EventKind, ServiceEvent};
pub use pipeline::{
    IdeaSink, JobMetadata, LogIdeaSink, TranscriptionEngine, TranscriptionJob,
    TranscriptionPipeline, WhisperCppEngine,
};
pub use service::VoipService;
pub use session::{CallSession, CallState, Direction, SessionRegistry};
pub use stack::{
    CallId, MediaHandle, NullStack, RecorderHandle, StackCallState, StackEventSink, TelephonyStack,
};
