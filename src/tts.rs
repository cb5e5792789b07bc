use crate::api::elevenlabs::ElevenLabsNarrator;
use crate::config::Config;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::process::Command;

pub const VOICE_TEST_TEXT: &str =
    "This is a test. My captions will stay consistent and clear.";

/// Short names offered by the voice picker.
pub const VOICE_ALIASES: &[(&str, &str)] = &[
    ("ava", "en-US-AvaNeural"),
    ("andrew", "en-US-AndrewNeural"),
    ("emma", "en-US-EmmaNeural"),
    ("brian", "en-US-BrianNeural"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsEngine {
    #[default]
    Edge,
    #[serde(rename = "elevenlabs")]
    ElevenLabs,
}

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("narration timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("ElevenLabs key missing")]
    MissingApiKey,
    #[error("TTS HTTP {0}")]
    Http(u16),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("no audio written to {0}")]
    NoOutput(PathBuf),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Speech synthesis into an audio file.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn synthesize(&self, text: &str, out: &Path) -> Result<(), TtsError>;
}

/// Runs one synthesis to completion within `limit` and checks that audio landed on disk.
/// Returns the file size.
pub async fn narrate(
    narrator: &dyn Narrator,
    text: &str,
    out: &Path,
    limit: Duration,
) -> Result<u64, TtsError> {
    let _ = fs::remove_file(out).await;
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    tokio::time::timeout(limit, narrator.synthesize(text, out))
        .await
        .map_err(|_| TtsError::Timeout(limit))??;

    match fs::metadata(out).await {
        Ok(meta) if meta.len() > 0 => Ok(meta.len()),
        _ => Err(TtsError::NoOutput(out.to_path_buf())),
    }
}

/// `1.2` becomes `+20%`, `0.5` becomes `-50%`.
pub fn format_rate(speed: f32) -> String {
    let pct = ((speed - 1.0) * 100.0).round() as i32;
    format!("{pct:+}%")
}

pub fn resolve_voice(voice: &str) -> String {
    let lower = voice.trim().to_ascii_lowercase();
    VOICE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| voice.trim().to_string())
}

/// Microsoft Edge neural voices through the `edge-tts` command line tool.
pub struct EdgeTts {
    program: String,
    voice: String,
    rate: String,
}

impl EdgeTts {
    pub fn new(voice: &str, speed: f32) -> Self {
        Self {
            program: "edge-tts".to_string(),
            voice: resolve_voice(voice),
            rate: format_rate(speed),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self, text: &str, out: &Path) -> Vec<String> {
        vec![
            "--voice".to_string(),
            self.voice.clone(),
            // `=` keeps a negative rate from being read as a flag.
            format!("--rate={}", self.rate),
            "--text".to_string(),
            text.to_string(),
            "--write-media".to_string(),
            out.display().to_string(),
        ]
    }
}

#[async_trait]
impl Narrator for EdgeTts {
    async fn synthesize(&self, text: &str, out: &Path) -> Result<(), TtsError> {
        let output = Command::new(&self.program)
            .args(self.args(text, out))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TtsError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TtsError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: stderr.trim().chars().take(400).collect(),
            });
        }
        Ok(())
    }
}

pub fn build_narrator(cfg: &Config, client: Client) -> Result<Box<dyn Narrator>> {
    Ok(match cfg.tts_engine {
        TtsEngine::Edge => Box::new(EdgeTts::new(&cfg.voice, cfg.speed)),
        TtsEngine::ElevenLabs => {
            cfg.require_elevenlabs_key()?;
            Box::new(ElevenLabsNarrator::new(client, cfg))
        }
    })
}
