use crate::config::Config;
use crate::logw;
use crate::tts::{Narrator, TtsError};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

const ELEVENLABS_BASE: &str = "https://api.elevenlabs.io";
const MIN_SPEED: f32 = 0.7;
const MAX_SPEED: f32 = 1.2;

pub struct ElevenLabsNarrator {
    client: Client,
    api_key: String,
    voice_id: String,
    model_id: String,
    speed: f32,
    base_url: String,
}

impl ElevenLabsNarrator {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_key: cfg.elevenlabs_key.clone(),
            voice_id: cfg.eleven_voice_id.clone(),
            model_id: cfg.eleven_model_id.clone(),
            speed: cfg.speed,
            base_url: ELEVENLABS_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": { "speed": clamp_speed(self.speed) },
        })
    }
}

/// The service only accepts a narrow speed band.
fn clamp_speed(speed: f32) -> f32 {
    speed.clamp(MIN_SPEED, MAX_SPEED)
}

#[async_trait]
impl Narrator for ElevenLabsNarrator {
    async fn synthesize(&self, text: &str, out: &Path) -> Result<(), TtsError> {
        if self.api_key.is_empty() {
            return Err(TtsError::MissingApiKey);
        }

        let url = format!(
            "{}/v1/text-to-speech/{}?output_format=mp3_44100_128",
            self.base_url.trim_end_matches('/'),
            self.voice_id
        );

        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("xi-api-key", &self.api_key)
            .json(&self.body(text))
            .timeout(Duration::from_secs(300))
            .send()
            .await?;

        if !resp.status().is_success() {
            logw(format!("ElevenLabs TTS failed HTTP {}", resp.status().as_u16()));
            return Err(TtsError::Http(resp.status().as_u16()));
        }

        let bytes = resp.bytes().await?;
        fs::write(out, &bytes).await?;
        Ok(())
    }
}
