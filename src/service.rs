//! VoIP service orchestration
//!
//! Wires the session registry, DTMF menu, event dispatcher, and
//! transcription pipeline to the external telephony stack. The stack calls
//! into [`VoipService`] through its [`StackEventSink`] impl from its own
//! delivery thread; the transcription pipeline runs on tokio workers. The
//! registry is the only state shared between the two.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::address::{normalize, registrar_domain};
use crate::config::Config;
use crate::dtmf::{self, MenuNode, MenuOutcome};
use crate::events::{EventDispatcher, EventHandler, EventKind, ServiceEvent};
use crate::pipeline::{IdeaSink, JobMetadata, TranscriptionEngine, TranscriptionJob, TranscriptionPipeline};
use crate::session::{CallSession, SessionRegistry};
use crate::stack::{CallId, StackCallState, StackEventSink, TelephonyStack};

/// SIP status used when answering a ringing call.
const ANSWER_OK: u16 = 200;

/// How long shutdown waits for the stack to deliver disconnects for the
/// calls it hung up.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How long shutdown waits for each pipeline worker to finish its
/// in-flight job.
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct VoipService {
    config: Config,
    domain: String,
    stack: Arc<dyn TelephonyStack>,
    registry: SessionRegistry,
    dispatcher: EventDispatcher,
    pipeline: TranscriptionPipeline,
    menu: MenuNode,
}

impl VoipService {
    /// Build the service and start its transcription workers.
    ///
    /// Must be called from within a tokio runtime. The config has already
    /// been validated at startup.
    pub fn new(
        config: Config,
        stack: Arc<dyn TelephonyStack>,
        engine: Arc<dyn TranscriptionEngine>,
        sink: Arc<dyn IdeaSink>,
        menu: MenuNode,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.audio.recordings_path)
            .context("failed to create recordings directory")?;

        let domain = registrar_domain(&config.sip.registrar);
        let pipeline = TranscriptionPipeline::start(
            engine,
            sink,
            config.transcription.workers,
            config.transcription.queue_capacity,
        );

        info!(domain, workers = config.transcription.workers, "voip service ready");

        Ok(Self {
            config,
            domain,
            stack,
            registry: SessionRegistry::new(),
            dispatcher: EventDispatcher::new(),
            pipeline,
            menu,
        })
    }

    /// Install the handler for an outward event kind (last registration wins).
    pub fn on_event(&self, kind: EventKind, handler: EventHandler) {
        self.dispatcher.set_handler(kind, handler);
    }

    pub fn active_calls(&self) -> usize {
        self.registry.len()
    }

    /// Place an outbound call to a phone number or SIP address.
    pub fn place_call(&self, number: &str) -> Result<CallId> {
        let address = normalize(number, &self.domain);
        let call = self
            .stack
            .make_call(&address)
            .with_context(|| format!("failed to call {address}"))?;

        info!(%call, address, "outbound call initiated");
        self.track(call, CallSession::outbound(address));
        Ok(call)
    }

    /// Answer a ringing inbound call. The state transition happens when the
    /// stack confirms with an answered event, not here.
    pub fn answer(&self, call: CallId) -> Result<()> {
        self.stack
            .answer(call, ANSWER_OK)
            .with_context(|| format!("failed to answer call {call}"))
    }

    pub fn hangup(&self, call: CallId) -> Result<()> {
        self.stack
            .hangup(call)
            .with_context(|| format!("failed to hang up call {call}"))
    }

    /// Send an instant message to a phone number or SIP address.
    pub fn send_message(&self, number: &str, text: &str) -> Result<()> {
        let address = normalize(number, &self.domain);
        self.stack
            .send_instant_message(&address, text)
            .with_context(|| format!("failed to message {address}"))
    }

    /// Play an audio file to an active call.
    ///
    /// Outside the active window media is unavailable; that is a normal
    /// race with the signaling layer, so this logs and skips instead of
    /// failing.
    pub fn play_audio(&self, call: CallId, file: &Path) {
        let media = self
            .registry
            .with_session(call, |s| if s.is_active() { s.media } else { None })
            .flatten();

        let Some(media) = media else {
            info!(%call, file = %file.display(), "playback skipped: call not active");
            return;
        };

        if let Err(e) = self.stack.start_playback(media, file) {
            warn!(%call, error = %e, "playback failed to start");
            return;
        }
        self.registry
            .with_session(call, |s| s.playback_path = Some(file.to_path_buf()));
    }

    /// Hang up every live call and stop the transcription pipeline.
    ///
    /// Individual hangup failures are logged and never abort the loop, and
    /// every wait is bounded, so shutdown always completes.
    pub async fn shutdown(&self) {
        let calls = self.registry.snapshot();
        info!(calls = calls.len(), "shutting down voip service");

        for call in calls {
            if let Err(e) = self.stack.hangup(call) {
                warn!(%call, error = %e, "hangup failed during shutdown");
            }
        }

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        while !self.registry.is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        let remaining = self.registry.len();
        if remaining > 0 {
            warn!(remaining, "sessions still registered after shutdown grace period");
        }

        self.pipeline.shutdown(WORKER_JOIN_TIMEOUT).await;
        info!("voip service stopped");
    }

    fn track(&self, call: CallId, session: CallSession) {
        if let Err(e) = self.registry.register(call, session) {
            // Stack-contract breach: ids must not be reused while live.
            debug_assert!(false, "{e}");
            warn!(%call, error = %e, "ignoring duplicate session registration");
        }
    }

    /// Set up media for a call that just went active: attach the audio
    /// path, start the greeting if configured, start recording if enabled.
    /// Any step that fails is skipped; the call itself continues.
    fn activate_media(&self, call: CallId) {
        let media = match self.stack.attach_audio(call) {
            Ok(media) => media,
            Err(e) => {
                warn!(%call, error = %e, "could not attach audio, call continues without media");
                return;
            }
        };
        self.registry.with_session(call, |s| s.media = Some(media));

        if let Some(greeting) = &self.config.audio.greeting_path {
            self.play_audio(call, Path::new(greeting));
        }

        if self.config.audio.record {
            let path = self.recording_path(call);
            match self.stack.start_recording(media, &path) {
                Ok(recorder) => {
                    info!(%call, recording = %path.display(), "recording started");
                    self.registry.with_session(call, |s| {
                        s.recorder = Some(recorder);
                        s.recording_path = Some(path);
                    });
                }
                Err(e) => warn!(%call, error = %e, "recording failed to start"),
            }
        }
    }

    /// Disconnect cleanup. Runs exactly once per call: a duplicate
    /// disconnect observes the registry entry as already removed and
    /// returns without re-releasing media or re-enqueuing a job.
    fn finish_call(&self, call: CallId) {
        let Some(mut session) = self.registry.remove(call) else {
            debug!(%call, "duplicate disconnect ignored");
            return;
        };
        session.disconnect();

        // Stop playback before the recorder so trailing audio is captured.
        if let (Some(media), Some(_)) = (session.media, session.playback_path.take()) {
            if let Err(e) = self.stack.stop_playback(media) {
                warn!(%call, error = %e, "failed to stop playback");
            }
        }
        if let Some(recorder) = session.recorder.take() {
            if let Err(e) = self.stack.stop_recording(recorder) {
                warn!(%call, error = %e, "failed to stop recording");
            }
        }
        session.media = None;

        let recording = session
            .recording_path
            .take()
            .filter(|path| wav_has_audio(path));
        let remote = session.remote().to_string();

        info!(%call, remote, recorded = recording.is_some(), "call ended");
        self.dispatcher.emit(&ServiceEvent::CallEnded {
            call,
            remote: remote.clone(),
            recording: recording.clone(),
        });

        if let Some(path) = recording {
            self.pipeline.enqueue(TranscriptionJob::new(
                path,
                JobMetadata {
                    source_type: "voip_call".to_string(),
                    remote,
                },
            ));
        }
    }

    fn recording_path(&self, call: CallId) -> PathBuf {
        Path::new(&self.config.audio.recordings_path).join(format!(
            "recording-{}-{}.wav",
            Utc::now().timestamp_millis(),
            call
        ))
    }
}

impl StackEventSink for VoipService {
    fn on_incoming_call(&self, call: CallId, remote: &str) {
        info!(%call, remote, "incoming call");
        self.track(call, CallSession::inbound(remote));
        self.dispatcher.emit(&ServiceEvent::IncomingCall {
            call,
            remote: remote.to_string(),
        });
    }

    fn on_call_state_changed(&self, call: CallId, state: StackCallState) {
        match state {
            StackCallState::Answered => {
                let connected = self
                    .registry
                    .with_session(call, |s| s.connect().then(|| s.remote().to_string()));
                match connected {
                    Some(Some(remote)) => {
                        info!(%call, remote, "call connected");
                        self.activate_media(call);
                        self.dispatcher
                            .emit(&ServiceEvent::CallConnected { call, remote });
                    }
                    Some(None) => debug!(%call, "answer event for non-pending session ignored"),
                    None => debug!(%call, "answer event for unknown call ignored"),
                }
            }
            StackCallState::Disconnected => self.finish_call(call),
            StackCallState::Failed => {
                warn!(%call, "transport failure, terminating call");
                self.finish_call(call);
            }
        }
    }

    fn on_dtmf_digit(&self, call: CallId, digit: char) {
        let digits = self.registry.with_session(call, |s| {
            s.push_digit(digit);
            s.digits().to_vec()
        });
        let Some(digits) = digits else {
            debug!(%call, %digit, "dtmf for unknown call ignored");
            return;
        };

        // The action is cloned out and fired after the registry guard is
        // released; it may call back into the service.
        match dtmf::resolve(&self.menu, &digits) {
            MenuOutcome::Descend => {}
            MenuOutcome::Fire(action) => {
                self.registry.with_session(call, |s| s.reset_digits());
                action(call);
            }
            MenuOutcome::Invalid => {
                warn!(%call, sequence = ?digits, "invalid menu selection");
                self.registry.with_session(call, |s| s.reset_digits());
            }
        }

        self.dispatcher
            .emit(&ServiceEvent::DtmfReceived { call, digit });
    }

    fn on_instant_message(&self, from: &str, body: &str) {
        info!(from, chars = body.len(), "incoming message");
        self.dispatcher.emit(&ServiceEvent::IncomingMessage {
            from: from.to_string(),
            body: body.to_string(),
        });
    }

    fn on_registration_state(&self, code: u16, reason: &str) {
        if code == 200 {
            info!("registered with SIP server");
        } else {
            warn!(code, reason, "registration update");
        }
        self.dispatcher.emit(&ServiceEvent::RegistrationState {
            code,
            reason: reason.to_string(),
        });
    }
}

/// A finalized recording only counts if it holds samples; a missing or
/// header-only file produces no transcription job.
fn wav_has_audio(path: &Path) -> bool {
    match hound::WavReader::open(path) {
        Ok(reader) => reader.len() > 0,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "recording unreadable, skipping");
            false
        }
    }
}
