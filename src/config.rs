use crate::caption::CaptionStyle;
use crate::compositor::FallbackPolicy;
use crate::logw;
use crate::sequencer::ConcatMode;
use crate::tts::TtsEngine;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const GEMINI_KEY_ENV: &str = "GEMINI_KEY";
pub const PEXELS_KEY_ENV: &str = "PEXELS_KEY";
pub const ELEVENLABS_KEY_ENV: &str = "ELEVENLABS_API_KEY";

pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 1.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "gemini_api_key")]
    pub gemini_key: String,
    #[serde(rename = "pexels_api_key")]
    pub pexels_key: String,
    #[serde(rename = "elevenlabs_api_key")]
    pub elevenlabs_key: String,
    pub eleven_voice_id: String,
    pub eleven_model_id: String,

    pub tts_engine: TtsEngine,
    pub voice: String,
    pub speed: f32,

    /// Candidate script models, tried in order.
    pub models: Vec<String>,
    pub seconds_per_scene: u32,
    pub fallback_keyword: String,

    pub video: VideoConfig,
    pub caption: CaptionStyle,
    pub bgm: BgmConfig,
    pub fallback_policy: FallbackPolicy,
    pub concat_mode: ConcatMode,

    pub search_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub tts_timeout_secs: u64,

    pub work_dir: PathBuf,
    pub output_dir: PathBuf,
    pub keep_temp: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub preset: String,
    /// Downloads at or below this size are treated as missing.
    pub min_clip_bytes: u64,
    /// Scene length used when narration is missing too.
    pub fallback_duration: f64,
    pub fallback_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BgmConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub file: Option<PathBuf>,
    /// Fraction of the narration level.
    pub volume: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_key: String::new(),
            pexels_key: String::new(),
            elevenlabs_key: String::new(),
            eleven_voice_id: "JBFqnCBsd6RMkjVDRZzb".to_string(),
            eleven_model_id: "eleven_multilingual_v2".to_string(),
            tts_engine: TtsEngine::Edge,
            voice: "en-US-AvaNeural".to_string(),
            speed: 1.0,
            models: vec![
                "gemini-flash-latest".to_string(),
                "gemini-2.0-flash".to_string(),
                "gemini-pro".to_string(),
            ],
            seconds_per_scene: 4,
            fallback_keyword: "abstract background".to_string(),
            video: VideoConfig::default(),
            caption: CaptionStyle::default(),
            bgm: BgmConfig::default(),
            fallback_policy: FallbackPolicy::Degrade,
            concat_mode: ConcatMode::Reencode,
            search_timeout_secs: 5,
            download_timeout_secs: 120,
            tts_timeout_secs: 60,
            work_dir: PathBuf::from("work"),
            output_dir: PathBuf::from("output"),
            keep_temp: false,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 540,
            height: 960,
            fps: 24,
            preset: "ultrafast".to_string(),
            min_clip_bytes: 1000,
            fallback_duration: 5.0,
            fallback_color: "black".to_string(),
        }
    }
}

impl Default for BgmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("backgroundmusic"),
            file: None,
            volume: 0.1,
        }
    }
}

/// Secrets given on the command line; these win over the config file.
#[derive(Debug, Clone, Default)]
pub struct KeyOverrides {
    pub gemini: Option<String>,
    pub pexels: Option<String>,
    pub elevenlabs: Option<String>,
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
        config.set_speed(config.speed);
        config.validate()?;
        Ok(config)
    }

    /// Missing file means defaults; a present but broken file is an error.
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if fs::metadata(&path).await.is_err() {
            return Ok(Self::default());
        }
        Self::load(path).await
    }

    pub fn validate(&self) -> Result<()> {
        if self.video.width == 0 || self.video.height == 0 {
            anyhow::bail!("config: video width/height must be positive");
        }
        if self.video.width % 2 != 0 || self.video.height % 2 != 0 {
            anyhow::bail!("config: video width/height must be even for yuv420p");
        }
        if self.video.fps == 0 {
            anyhow::bail!("config: video fps must be positive");
        }
        if self.seconds_per_scene == 0 {
            anyhow::bail!("config: seconds_per_scene must be positive");
        }
        if self.models.is_empty() {
            anyhow::bail!("config: models list is empty");
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: KeyOverrides) {
        self.apply_overrides_with(overrides, |name| std::env::var(name).ok());
    }

    pub(crate) fn apply_overrides_with<F>(&mut self, overrides: KeyOverrides, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.gemini_key = resolve_secret(overrides.gemini, &self.gemini_key, env(GEMINI_KEY_ENV));
        self.pexels_key = resolve_secret(overrides.pexels, &self.pexels_key, env(PEXELS_KEY_ENV));
        self.elevenlabs_key = resolve_secret(
            overrides.elevenlabs,
            &self.elevenlabs_key,
            env(ELEVENLABS_KEY_ENV),
        );
    }

    pub fn set_speed(&mut self, speed: f32) {
        let clamped = speed.clamp(MIN_SPEED, MAX_SPEED);
        if (clamped - speed).abs() > f32::EPSILON {
            logw(format!("Speed {speed} out of range; using {clamped}"));
        }
        self.speed = clamped;
    }

    pub fn require_gemini_key(&self) -> Result<&str> {
        if self.gemini_key.is_empty() {
            anyhow::bail!("Gemini key missing (--gemini-key, gemini_api_key or {GEMINI_KEY_ENV})");
        }
        Ok(&self.gemini_key)
    }

    pub fn require_elevenlabs_key(&self) -> Result<&str> {
        if self.elevenlabs_key.is_empty() {
            anyhow::bail!(
                "ElevenLabs key missing (--elevenlabs-key, elevenlabs_api_key or {ELEVENLABS_KEY_ENV})"
            );
        }
        Ok(&self.elevenlabs_key)
    }
}

fn resolve_secret(flag: Option<String>, file_value: &str, env_value: Option<String>) -> String {
    let non_empty = |v: &String| !v.trim().is_empty();
    if let Some(v) = flag.filter(non_empty) {
        return v.trim().to_string();
    }
    if !file_value.trim().is_empty() {
        return file_value.trim().to_string();
    }
    env_value
        .filter(non_empty)
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}
