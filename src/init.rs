use crate::config::Config;
use crate::ffmpeg;
use crate::{logi, logw};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs;

fn required_dirs(cfg: &Config) -> Vec<PathBuf> {
    let mut dirs = vec![cfg.work_dir.clone(), cfg.output_dir.clone()];
    if cfg.bgm.enabled {
        dirs.push(cfg.bgm.dir.clone());
    }
    dirs
}

pub async fn ensure_directories(cfg: &Config) -> Result<()> {
    for dir in required_dirs(cfg) {
        if fs::metadata(&dir).await.is_err() {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

/// Warns for each missing media tool; returns whether both were found.
pub async fn check_ffmpeg() -> bool {
    let mut ok = true;
    for program in ["ffmpeg", "ffprobe"] {
        if !ffmpeg::check_available(program).await {
            logw(format!("{program} not found in PATH. Please install FFmpeg."));
            ok = false;
        }
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_configured_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config {
            work_dir: dir.path().join("w"),
            output_dir: dir.path().join("nested/out"),
            ..Config::default()
        };
        cfg.bgm.dir = dir.path().join("music");

        ensure_directories(&cfg).await.unwrap();
        assert!(cfg.work_dir.is_dir());
        assert!(cfg.output_dir.is_dir());
        assert!(cfg.bgm.dir.is_dir());

        // Second run is a no-op.
        ensure_directories(&cfg).await.unwrap();
    }

    #[tokio::test]
    async fn music_dir_skipped_when_bgm_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config {
            work_dir: dir.path().join("w"),
            output_dir: dir.path().join("o"),
            ..Config::default()
        };
        cfg.bgm.enabled = false;
        cfg.bgm.dir = dir.path().join("music");

        ensure_directories(&cfg).await.unwrap();
        assert!(!cfg.bgm.dir.exists());
    }
}
