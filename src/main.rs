use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voip_capture::{
    Config, EventKind, LogIdeaSink, MenuNode, NullStack, ServiceEvent, TelephonyStack,
    VoipService, WhisperCppEngine,
};

#[derive(Debug, Parser)]
#[command(name = "voip-capture", about = "Call capture and transcription daemon")]
struct Args {
    /// Config file (without extension), resolved by the config crate.
    #[arg(long, default_value = "config/voip-capture")]
    config: String,

    /// Place an outbound call to this number on startup.
    #[arg(long)]
    call: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("voip-capture v{}", env!("CARGO_PKG_VERSION"));
    info!("registrar: {}", cfg.sip.registrar);
    info!("recordings: {}", cfg.audio.recordings_path);

    let engine = Arc::new(WhisperCppEngine::new(
        &cfg.transcription.whisper_binary,
        &cfg.transcription.whisper_model,
    ));

    // No SIP backend is linked yet; the null stack logs every operation so
    // the wiring can be exercised end to end.
    let stack = Arc::new(NullStack::new());

    // Keypad menu: 9 then 1 hangs up the call.
    let hangup_stack: Arc<dyn TelephonyStack> = stack.clone();
    let menu = MenuNode::new().child(
        '9',
        MenuNode::new().child(
            '1',
            MenuNode::action(Arc::new(move |call| {
                if let Err(e) = hangup_stack.hangup(call) {
                    tracing::warn!(%call, error = %e, "menu hangup failed");
                }
            })),
        ),
    );

    let service = Arc::new(VoipService::new(
        cfg,
        stack,
        engine,
        Arc::new(LogIdeaSink),
        menu,
    )?);

    let answering = Arc::clone(&service);
    service.on_event(
        EventKind::IncomingCall,
        Arc::new(move |event| {
            if let ServiceEvent::IncomingCall { call, remote } = event {
                info!(%call, remote, "answering");
                answering.answer(*call)?;
            }
            Ok(())
        }),
    );

    if let Some(number) = &args.call {
        let call = service.place_call(number)?;
        info!(%call, number, "dialed");
    }

    info!("voip service running, press ctrl-c to exit");
    tokio::signal::ctrl_c().await?;

    service.shutdown().await;
    Ok(())
}
