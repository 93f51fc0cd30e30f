use anyhow::{bail, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub sip: SipConfig,
    pub audio: AudioConfig,
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SipConfig {
    /// Registrar endpoint, e.g. "sip:provider.example.com". Its host
    /// component doubles as the domain for normalized dial strings.
    pub registrar: String,
    /// Local identity, e.g. "sip:account@provider.example.com".
    pub id_uri: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_realm")]
    pub realm: String,
    #[serde(default = "default_sip_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub recordings_path: String,
    /// Played to the remote party when a call goes active, if set.
    #[serde(default)]
    pub greeting_path: Option<String>,
    /// Record active calls for transcription.
    #[serde(default = "default_true")]
    pub record: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionConfig {
    pub whisper_binary: String,
    pub whisper_model: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_realm() -> String {
    "*".to_string()
}

fn default_sip_port() -> u16 {
    5060
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    1
}

fn default_queue_capacity() -> usize {
    64
}

impl Config {
    /// Load from a config file, with `VOIP_`-prefixed environment variables
    /// overriding individual keys (e.g. `VOIP_SIP__PASSWORD`).
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("VOIP").separator("__"))
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validated once at startup; components receive the config as a value
    /// and never re-check it.
    pub fn validate(&self) -> Result<()> {
        if self.sip.registrar.trim().is_empty() {
            bail!("sip.registrar must not be empty");
        }
        if self.sip.id_uri.trim().is_empty() {
            bail!("sip.id_uri must not be empty");
        }
        if self.audio.recordings_path.trim().is_empty() {
            bail!("audio.recordings_path must not be empty");
        }
        if self.transcription.workers == 0 {
            bail!("transcription.workers must be at least 1");
        }
        Ok(())
    }
}
