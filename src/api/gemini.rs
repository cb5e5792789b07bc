use crate::api::ScriptWriter;
use crate::config::Config;
use crate::scene::{MIN_SCENES, Scene, Script, ScriptShapeError};
use crate::{logi, logok, logw};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com";
const MAX_BODY_SNIPPET: usize = 400;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Gemini key missing")]
    MissingApiKey,
    #[error("all script models failed: {}", summarize(.0))]
    AllModelsFailed(Vec<ModelFailure>),
}

#[derive(Debug)]
pub struct ModelFailure {
    pub model: String,
    pub reason: AttemptError,
}

#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("response blocked: {0}")]
    Refused(String),
    #[error("response had no text")]
    EmptyResponse,
    #[error("response is not a scene array: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Shape(#[from] ScriptShapeError),
}

fn summarize(failures: &[ModelFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.model, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    models: Vec<String>,
    seconds_per_scene: u32,
    base_url: String,
}

impl GeminiClient {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_key: cfg.gemini_key.clone(),
            models: cfg.models.clone(),
            seconds_per_scene: cfg.seconds_per_scene,
            base_url: GEMINI_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn attempt(&self, model: &str, topic: &str, prompt: &str) -> Result<Script, AttemptError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        );
        let body = json!({
            "contents": [
                {"role": "user", "parts": [{"text": prompt}]}
            ],
        });

        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .timeout(Duration::from_secs(120))
            .send()
            .await?;

        let status = resp.status();
        let raw = resp.text().await?;
        if !status.is_success() {
            return Err(AttemptError::Http {
                status: status.as_u16(),
                body: raw.chars().take(MAX_BODY_SNIPPET).collect(),
            });
        }

        let text = extract_response_text(&raw)?;
        let scenes = parse_scenes(&text)?;
        Ok(Script::new(topic, scenes)?)
    }
}

#[async_trait]
impl ScriptWriter for GeminiClient {
    async fn write_script(&self, topic: &str, duration_secs: u32) -> Result<Script, ScriptError> {
        if self.api_key.is_empty() {
            return Err(ScriptError::MissingApiKey);
        }

        let count = target_scene_count(duration_secs, self.seconds_per_scene);
        let prompt = build_prompt(topic, duration_secs, count);
        let mut failures = Vec::new();

        for model in &self.models {
            logi(format!("Requesting script from {} ({} scenes target)...", model, count));
            match self.attempt(model, topic, &prompt).await {
                Ok(script) => {
                    logok(format!("Script received from {}: {} scenes", model, script.len()));
                    return Ok(script);
                }
                Err(reason) => {
                    logw(format!("Script model {} failed: {}", model, reason));
                    failures.push(ModelFailure {
                        model: model.clone(),
                        reason,
                    });
                }
            }
        }

        Err(ScriptError::AllModelsFailed(failures))
    }
}

/// Duration divided by the per-scene divisor, never below the minimum script length.
pub fn target_scene_count(duration_secs: u32, seconds_per_scene: u32) -> usize {
    let per = seconds_per_scene.max(1);
    ((duration_secs / per) as usize).max(MIN_SCENES)
}

pub fn build_prompt(topic: &str, duration_secs: u32, count: usize) -> String {
    format!(
        "You write scripts for vertical short-form videos.\n\
         Topic: \"{topic}\"\n\
         Target duration: {duration_secs} seconds.\n\
         Write exactly {count} sentences.\n\n\
         Rules:\n\
         1. Language: English.\n\
         2. At most 12 words per sentence.\n\
         3. Clear, engaging narration.\n\
         4. For each sentence give one English search keyword for stock footage.\n\
         5. Reply with ONLY a raw JSON array, no prose, in this shape:\n\
         [\n  {{\"text\": \"Coffee originated in Ethiopia.\", \"keyword\": \"Ethiopia\"}},\n  \
         {{\"text\": \"Goats discovered the beans first.\", \"keyword\": \"Goat\"}}\n]\n"
    )
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(default, rename = "blockReason")]
    block_reason: Option<String>,
}

fn extract_response_text(raw: &str) -> Result<String, AttemptError> {
    let resp: GenerateResponse = serde_json::from_str(raw)?;
    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AttemptError::Refused(reason));
    }

    let candidate = resp.candidates.into_iter().next().ok_or(AttemptError::EmptyResponse)?;
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match candidate.finish_reason {
            Some(reason) if reason != "STOP" => Err(AttemptError::Refused(reason)),
            _ => Err(AttemptError::EmptyResponse),
        };
    }
    Ok(text)
}

/// Drops Markdown fences and any chatter around the outermost JSON array.
pub fn strip_code_fences(text: &str) -> String {
    let clean = text.replace("```json", "").replace("```", "");
    let clean = clean.trim();
    if clean.starts_with('[') {
        return clean.to_string();
    }
    match array_regex().ok().and_then(|re| re.find(clean)) {
        Some(m) => m.as_str().to_string(),
        None => clean.to_string(),
    }
}

fn array_regex() -> anyhow::Result<&'static Regex> {
    static ARRAY_RE: OnceCell<Regex> = OnceCell::new();
    ARRAY_RE.get_or_try_init(|| Ok(Regex::new(r"(?s)\[.*\]")?))
}

/// Every object must carry both `text` and `keyword`.
pub fn parse_scenes(text: &str) -> Result<Vec<Scene>, AttemptError> {
    let cleaned = strip_code_fences(text);
    Ok(serde_json::from_str::<Vec<Scene>>(&cleaned)?)
}
