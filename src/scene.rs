use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

pub const MIN_SCENES: usize = 3;

/// One narration sentence plus the stock-footage search term for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub text: String,
    pub keyword: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptShapeError {
    #[error("script has {0} scenes, need at least {MIN_SCENES}")]
    TooFewScenes(usize),
    #[error("scene {0} has empty text")]
    EmptyText(usize),
}

/// Ordered, validated scenes for one video. Built once by the generate step and
/// handed to the render step by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Script {
    topic: String,
    scenes: Vec<Scene>,
}

#[derive(Deserialize)]
struct ScriptFile {
    #[serde(default)]
    topic: String,
    scenes: Vec<Scene>,
}

impl Script {
    pub fn new(topic: impl Into<String>, scenes: Vec<Scene>) -> Result<Self, ScriptShapeError> {
        if scenes.len() < MIN_SCENES {
            return Err(ScriptShapeError::TooFewScenes(scenes.len()));
        }
        let scenes = scenes
            .into_iter()
            .enumerate()
            .map(|(idx, scene)| {
                let text = scene.text.trim().to_string();
                if text.is_empty() {
                    return Err(ScriptShapeError::EmptyText(idx + 1));
                }
                Ok(Scene {
                    text,
                    keyword: scene.keyword.trim().to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            topic: topic.into(),
            scenes,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// `N. [keyword] text` lines, as shown before rendering.
    pub fn preview(&self) -> String {
        self.scenes
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. [{}] {}", i + 1, s.keyword, s.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .await
            .with_context(|| format!("write script: {}", path.display()))?;
        Ok(())
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("read script: {}", path.display()))?;
        let file: ScriptFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse script JSON: {}", path.display()))?;
        Ok(Script::new(file.topic, file.scenes)?)
    }
}

/// Keeps ASCII alphanumerics only, for use as a filename fragment.
pub fn sanitize_keyword(keyword: &str) -> String {
    keyword
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Lowercase dash-separated slug for output names.
pub fn slugify(input: &str) -> String {
    let mut out = String::new();
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out.truncate(40);
    out
}
