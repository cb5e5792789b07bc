use crate::config::VideoConfig;
use crate::ffmpeg::{MediaBackend, MediaError};
use crate::logw;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// What to do with a scene whose composition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Drop the scene from the video.
    Skip,
    /// Re-render it as black frame, silence and no caption.
    #[default]
    Degrade,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VisualSource {
    Footage { path: PathBuf, duration: f64 },
    SolidColor { color: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    Narration { path: PathBuf, duration: f64 },
    Silence,
}

/// How footage length is matched to the scene length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    Loop,
    Trim,
}

pub fn reconcile(visual_secs: f64, target_secs: f64) -> Fit {
    if visual_secs < target_secs {
        Fit::Loop
    } else {
        Fit::Trim
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FootageIssue {
    #[error("no footage downloaded")]
    Missing,
    #[error("footage too small ({0} bytes)")]
    TooSmall(u64),
    #[error("footage unreadable: {0}")]
    Unreadable(String),
}

/// Footage when the file exists, is big enough and probes; otherwise a solid clip and
/// the reason it was substituted.
pub async fn choose_visual(
    media: &dyn MediaBackend,
    footage: Option<&Path>,
    video: &VideoConfig,
) -> (VisualSource, Option<FootageIssue>) {
    match inspect_footage(media, footage, video.min_clip_bytes).await {
        Ok((path, duration)) => (VisualSource::Footage { path, duration }, None),
        Err(issue) => (
            VisualSource::SolidColor {
                color: video.fallback_color.clone(),
            },
            Some(issue),
        ),
    }
}

async fn inspect_footage(
    media: &dyn MediaBackend,
    footage: Option<&Path>,
    min_bytes: u64,
) -> Result<(PathBuf, f64), FootageIssue> {
    let path = footage.ok_or(FootageIssue::Missing)?;
    let meta = fs::metadata(path).await.map_err(|_| FootageIssue::Missing)?;
    if !meta.is_file() {
        return Err(FootageIssue::Missing);
    }
    if meta.len() <= min_bytes {
        return Err(FootageIssue::TooSmall(meta.len()));
    }
    let duration = media
        .probe_duration(path)
        .await
        .map_err(|e| FootageIssue::Unreadable(e.to_string()))?;
    Ok((path.to_path_buf(), duration))
}

/// Everything needed to render one finished scene clip.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneJob {
    pub index: usize,
    pub visual: VisualSource,
    pub audio: AudioSource,
    pub caption: Option<PathBuf>,
    /// Narration length, or the configured fallback when there is none.
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub preset: String,
    pub fallback_color: String,
    pub out: PathBuf,
}

impl SceneJob {
    pub fn new(
        index: usize,
        visual: VisualSource,
        audio: AudioSource,
        caption: Option<PathBuf>,
        video: &VideoConfig,
        out: PathBuf,
    ) -> Self {
        let duration = match &audio {
            AudioSource::Narration { duration, .. } => *duration,
            AudioSource::Silence => video.fallback_duration,
        };
        Self {
            index,
            visual,
            audio,
            caption,
            duration,
            width: video.width,
            height: video.height,
            fps: video.fps,
            preset: video.preset.clone(),
            fallback_color: video.fallback_color.clone(),
            out,
        }
    }

    /// `None` for generated backgrounds, which are made at the right length.
    pub fn fit(&self) -> Option<Fit> {
        match &self.visual {
            VisualSource::Footage { duration, .. } => Some(reconcile(*duration, self.duration)),
            VisualSource::SolidColor { .. } => None,
        }
    }

    pub fn needs_loop(&self) -> bool {
        self.fit() == Some(Fit::Loop)
    }

    /// Same slot and length, with every input replaced by a generated one.
    pub fn degraded(&self) -> Self {
        Self {
            visual: VisualSource::SolidColor {
                color: self.fallback_color.clone(),
            },
            audio: AudioSource::Silence,
            caption: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Composed {
    AsPlanned,
    /// The planned render failed and the degraded one was used.
    Degraded(String),
}

pub async fn compose(
    media: &dyn MediaBackend,
    job: &SceneJob,
    policy: FallbackPolicy,
) -> Result<Composed, MediaError> {
    let err = match media.compose_scene(job).await {
        Ok(()) => return Ok(Composed::AsPlanned),
        Err(err) => err,
    };

    match policy {
        FallbackPolicy::Skip => Err(err),
        FallbackPolicy::Degrade => {
            logw(format!(
                "Scene {} render failed ({}); retrying as plain black scene",
                job.index + 1,
                err
            ));
            let _ = fs::remove_file(&job.out).await;
            media.compose_scene(&job.degraded()).await?;
            Ok(Composed::Degraded(err.to_string()))
        }
    }
}
