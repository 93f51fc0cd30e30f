// End-to-end lifecycle tests driving the service the way the external
// stack would: the test acts as the delivery thread and calls straight
// into the StackEventSink impl.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use voip_capture::{
    CallId, Config, EventKind, IdeaSink, JobMetadata, MediaHandle, MediaResourceError, MenuNode,
    RecorderHandle, ServiceEvent, StackCallState, StackEventSink, TelephonyStack,
    TranscriptionEngine, TranscriptionError, TransportError, VoipService,
};

/// Scripted stand-in for the SIP stack. Recording files are real WAVs so
/// the finalization check sees actual audio data.
#[derive(Default)]
struct MockStack {
    next_handle: AtomicU64,
    write_audio: bool,
    failing_hangups: Mutex<HashSet<CallId>>,
    hangups: Mutex<Vec<CallId>>,
    recordings_started: AtomicUsize,
}

impl MockStack {
    fn new(write_audio: bool) -> Self {
        Self {
            write_audio,
            ..Self::default()
        }
    }

    fn fail_hangup(&self, call: CallId) {
        self.failing_hangups.lock().unwrap().insert(call);
    }

    fn hangups(&self) -> Vec<CallId> {
        self.hangups.lock().unwrap().clone()
    }
}

impl TelephonyStack for MockStack {
    fn make_call(&self, _address: &str) -> Result<CallId, TransportError> {
        Ok(CallId(self.next_handle.fetch_add(1, Ordering::SeqCst) as i64))
    }

    fn answer(&self, _call: CallId, _status_code: u16) -> Result<(), TransportError> {
        Ok(())
    }

    fn hangup(&self, call: CallId) -> Result<(), TransportError> {
        self.hangups.lock().unwrap().push(call);
        if self.failing_hangups.lock().unwrap().contains(&call) {
            return Err(TransportError("simulated hangup failure".into()));
        }
        Ok(())
    }

    fn attach_audio(&self, _call: CallId) -> Result<MediaHandle, MediaResourceError> {
        Ok(MediaHandle(self.next_handle.fetch_add(1, Ordering::SeqCst)))
    }

    fn start_playback(&self, _media: MediaHandle, _file: &Path) -> Result<(), MediaResourceError> {
        Ok(())
    }

    fn stop_playback(&self, _media: MediaHandle) -> Result<(), MediaResourceError> {
        Ok(())
    }

    fn start_recording(
        &self,
        _media: MediaHandle,
        file: &Path,
    ) -> Result<RecorderHandle, MediaResourceError> {
        self.recordings_started.fetch_add(1, Ordering::SeqCst);

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(file, spec)
            .map_err(|e| MediaResourceError::Resource(e.to_string()))?;
        if self.write_audio {
            for _ in 0..160 {
                writer
                    .write_sample(420i16)
                    .map_err(|e| MediaResourceError::Resource(e.to_string()))?;
            }
        }
        writer
            .finalize()
            .map_err(|e| MediaResourceError::Resource(e.to_string()))?;

        Ok(RecorderHandle(self.next_handle.fetch_add(1, Ordering::SeqCst)))
    }

    fn stop_recording(&self, _recorder: RecorderHandle) -> Result<(), MediaResourceError> {
        Ok(())
    }

    fn send_instant_message(&self, _address: &str, _text: &str) -> Result<(), TransportError> {
        Ok(())
    }
}

struct StubEngine {
    transcriptions: AtomicUsize,
}

#[async_trait]
impl TranscriptionEngine for StubEngine {
    async fn transcribe(&self, recording: &Path) -> Result<String, TranscriptionError> {
        if !recording.exists() {
            return Err(TranscriptionError::MissingRecording(recording.to_path_buf()));
        }
        self.transcriptions.fetch_add(1, Ordering::SeqCst);
        Ok("an idea worth keeping".to_string())
    }
}

#[derive(Default)]
struct CollectingSink {
    submissions: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl IdeaSink for CollectingSink {
    async fn submit(&self, text: &str, metadata: &JobMetadata) -> Result<()> {
        self.submissions
            .lock()
            .unwrap()
            .push((text.to_string(), metadata.remote.clone()));
        Ok(())
    }
}

struct Fixture {
    service: Arc<VoipService>,
    stack: Arc<MockStack>,
    engine: Arc<StubEngine>,
    sink: Arc<CollectingSink>,
    _recordings: tempfile::TempDir,
}

fn fixture(write_audio: bool) -> Result<Fixture> {
    let recordings = tempfile::tempdir()?;
    let config = test_config(recordings.path());
    let stack = Arc::new(MockStack::new(write_audio));
    let engine = Arc::new(StubEngine {
        transcriptions: AtomicUsize::new(0),
    });
    let sink = Arc::new(CollectingSink::default());

    let service = Arc::new(VoipService::new(
        config,
        Arc::clone(&stack) as Arc<dyn TelephonyStack>,
        Arc::clone(&engine) as Arc<dyn TranscriptionEngine>,
        Arc::clone(&sink) as Arc<dyn IdeaSink>,
        MenuNode::new(),
    )?);

    Ok(Fixture {
        service,
        stack,
        engine,
        sink,
        _recordings: recordings,
    })
}

fn test_config(recordings: &Path) -> Config {
    let raw = format!(
        r#"
        [sip]
        registrar = "sip:provider.example.com"
        id_uri = "sip:account@provider.example.com"
        username = "account"
        password = "secret"

        [audio]
        recordings_path = "{}"

        [transcription]
        whisper_binary = "/nonexistent/whisper"
        whisper_model = "/nonexistent/model.bin"
        workers = 1
        "#,
        recordings.display()
    );
    config::Config::builder()
        .add_source(config::File::from_str(&raw, config::FileFormat::Toml))
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap()
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn answered_call_records_and_transcribes_once() -> Result<()> {
    let fx = fixture(true)?;
    let call = CallId(1);
    let remote = "sip:caller@provider.example.com";

    let ended = Arc::new(Mutex::new(Vec::new()));
    let ended_log = Arc::clone(&ended);
    fx.service.on_event(
        EventKind::CallEnded,
        Arc::new(move |event| {
            if let ServiceEvent::CallEnded { recording, .. } = event {
                ended_log.lock().unwrap().push(recording.clone());
            }
            Ok(())
        }),
    );

    fx.service.on_incoming_call(call, remote);
    fx.service
        .on_call_state_changed(call, StackCallState::Answered);
    assert_eq!(fx.service.active_calls(), 1);

    // Hangup plus a duplicate disconnect racing in from the stack.
    fx.service
        .on_call_state_changed(call, StackCallState::Disconnected);
    fx.service
        .on_call_state_changed(call, StackCallState::Disconnected);

    assert_eq!(fx.service.active_calls(), 0);

    let sink = Arc::clone(&fx.sink);
    wait_until("transcript to reach the sink", move || {
        !sink.submissions.lock().unwrap().is_empty()
    })
    .await;

    // Cleanup ran exactly once: one call_ended, one transcription, one
    // downstream submission.
    let ended = ended.lock().unwrap();
    assert_eq!(ended.len(), 1);
    assert!(ended[0].is_some(), "recording path should be carried");
    assert_eq!(fx.engine.transcriptions.load(Ordering::SeqCst), 1);

    let submissions = fx.sink.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0, "an idea worth keeping");
    assert_eq!(submissions[0].1, remote);
    Ok(())
}

#[tokio::test]
async fn rejected_ringing_call_produces_no_recording_job() -> Result<()> {
    let fx = fixture(true)?;
    let call = CallId(4);

    let ended_recordings = Arc::new(Mutex::new(Vec::new()));
    let ended_log = Arc::clone(&ended_recordings);
    fx.service.on_event(
        EventKind::CallEnded,
        Arc::new(move |event| {
            if let ServiceEvent::CallEnded { recording, .. } = event {
                ended_log.lock().unwrap().push(recording.clone());
            }
            Ok(())
        }),
    );

    fx.service
        .on_incoming_call(call, "sip:caller@provider.example.com");
    // Rejected while still ringing: straight to disconnected.
    fx.service
        .on_call_state_changed(call, StackCallState::Disconnected);

    assert_eq!(fx.service.active_calls(), 0);
    assert_eq!(fx.stack.recordings_started.load(Ordering::SeqCst), 0);

    let ended = ended_recordings.lock().unwrap();
    assert_eq!(ended.len(), 1);
    assert!(ended[0].is_none(), "no recording was ever started");

    // Give the pipeline a beat; nothing should arrive.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(fx.sink.submissions.lock().unwrap().is_empty());
    assert_eq!(fx.engine.transcriptions.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn empty_recording_is_not_enqueued() -> Result<()> {
    let fx = fixture(false)?; // header-only WAV files
    let call = CallId(9);

    fx.service
        .on_incoming_call(call, "sip:caller@provider.example.com");
    fx.service
        .on_call_state_changed(call, StackCallState::Answered);
    fx.service
        .on_call_state_changed(call, StackCallState::Disconnected);

    assert_eq!(fx.stack.recordings_started.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fx.engine.transcriptions.load(Ordering::SeqCst), 0);
    assert!(fx.sink.submissions.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn media_operations_outside_active_are_skipped() -> Result<()> {
    let fx = fixture(true)?;
    let call = CallId(2);

    fx.service
        .on_incoming_call(call, "sip:caller@provider.example.com");

    // Still ringing: playback must be a logged no-op, not an error.
    fx.service.play_audio(call, Path::new("greeting.wav"));

    // And for a call that never existed at all.
    fx.service.play_audio(CallId(999), Path::new("greeting.wav"));

    assert_eq!(fx.service.active_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn shutdown_hangs_up_every_call_despite_failures() -> Result<()> {
    let fx = fixture(true)?;
    let first = CallId(10);
    let second = CallId(11);

    fx.service
        .on_incoming_call(first, "sip:one@provider.example.com");
    fx.service
        .on_call_state_changed(first, StackCallState::Answered);
    fx.service
        .on_incoming_call(second, "sip:two@provider.example.com");
    fx.service
        .on_call_state_changed(second, StackCallState::Answered);

    fx.stack.fail_hangup(first);

    let service = Arc::clone(&fx.service);
    let shutdown = tokio::spawn(async move { service.shutdown().await });

    // Wait for shutdown to issue both hangups, then let the stack confirm
    // the teardowns it was asked for.
    let stack = Arc::clone(&fx.stack);
    wait_until("both hangup attempts", move || stack.hangups().len() == 2).await;
    fx.service
        .on_call_state_changed(first, StackCallState::Disconnected);
    fx.service
        .on_call_state_changed(second, StackCallState::Disconnected);

    tokio::time::timeout(Duration::from_secs(10), shutdown)
        .await
        .expect("shutdown must complete within its bounded waits")?;

    let hangups = fx.stack.hangups();
    assert!(hangups.contains(&first), "failing hangup was still attempted");
    assert!(hangups.contains(&second), "second hangup proceeds after a failure");
    assert_eq!(fx.service.active_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn transport_failure_terminates_only_that_call() -> Result<()> {
    let fx = fixture(true)?;
    let failing = CallId(20);
    let healthy = CallId(21);

    fx.service
        .on_incoming_call(failing, "sip:one@provider.example.com");
    fx.service
        .on_call_state_changed(failing, StackCallState::Answered);
    fx.service
        .on_incoming_call(healthy, "sip:two@provider.example.com");
    fx.service
        .on_call_state_changed(healthy, StackCallState::Answered);

    fx.service
        .on_call_state_changed(failing, StackCallState::Failed);

    assert_eq!(fx.service.active_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn dtmf_menu_fires_action_and_resets() -> Result<()> {
    let recordings = tempfile::tempdir()?;
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let menu = MenuNode::new().child(
        '9',
        MenuNode::new().child(
            '1',
            MenuNode::action(Arc::new(move |_call| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        ),
    );

    let stack = Arc::new(MockStack::new(true));
    let service = Arc::new(VoipService::new(
        test_config(recordings.path()),
        stack as Arc<dyn TelephonyStack>,
        Arc::new(StubEngine {
            transcriptions: AtomicUsize::new(0),
        }),
        Arc::new(CollectingSink::default()),
        menu,
    )?);

    let call = CallId(30);
    service.on_incoming_call(call, "sip:caller@provider.example.com");
    service.on_call_state_changed(call, StackCallState::Answered);

    // 9,1 fires once.
    service.on_dtmf_digit(call, '9');
    service.on_dtmf_digit(call, '1');
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // Buffer was reset: 9,2 is invalid and fires nothing...
    service.on_dtmf_digit(call, '9');
    service.on_dtmf_digit(call, '2');
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // ...and the invalid selection also reset, so 9,1 works again.
    service.on_dtmf_digit(call, '9');
    service.on_dtmf_digit(call, '1');
    assert_eq!(fired.load(Ordering::SeqCst), 2);
    Ok(())
}
