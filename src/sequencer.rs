use crate::config::{BgmConfig, Config};
use crate::ffmpeg::{BgmMix, MediaBackend};
use crate::scene::slugify;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const MUSIC_EXTS: &[&str] = &["mp3", "m4a"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcatMode {
    /// Re-encode while joining; tolerates clips with mismatched encodings.
    #[default]
    Reencode,
    /// Stream copy; only safe when every clip shares one encoding.
    Copy,
}

/// One concat-demuxer entry, relative to the list file when possible.
pub fn concat_line(clip: &Path, list_dir: &Path) -> String {
    let rel = pathdiff::diff_paths(clip, list_dir).unwrap_or_else(|| clip.to_path_buf());
    let escaped = rel.display().to_string().replace('\'', "'\\''");
    format!("file '{}'\n", escaped)
}

pub async fn write_concat_list(clips: &[PathBuf], list_txt: &Path) -> Result<()> {
    let list_dir = list_txt.parent().unwrap_or(Path::new(""));
    let mut listf = fs::File::create(list_txt)
        .await
        .with_context(|| format!("create concat list: {}", list_txt.display()))?;
    for clip in clips {
        listf.write_all(concat_line(clip, list_dir).as_bytes()).await?;
    }
    listf.flush().await?;
    Ok(())
}

pub async fn list_music(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    match fs::metadata(dir).await {
        Err(_) => return Ok(out),
        Ok(meta) if !meta.is_dir() => anyhow::bail!("{} is not a directory", dir.display()),
        Ok(_) => {}
    }
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("read music dir: {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_music = path
            .extension()
            .and_then(OsStr::to_str)
            .map(|ext| MUSIC_EXTS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_music && path.is_file() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// The configured track if set, otherwise a random one from the music folder.
pub async fn pick_bgm<R: Rng + ?Sized>(cfg: &BgmConfig, rng: &mut R) -> Result<Option<PathBuf>> {
    if !cfg.enabled {
        return Ok(None);
    }
    if let Some(file) = &cfg.file {
        if fs::metadata(file).await.map(|m| m.is_file()).unwrap_or(false) {
            return Ok(Some(file.clone()));
        }
        logw(format!("Configured BGM {} not found; picking from {}", file.display(), cfg.dir.display()));
    }
    let songs = list_music(&cfg.dir).await?;
    Ok(songs.choose(rng).cloned())
}

pub fn output_name(topic: &str, stamp: &str, suffix: u16) -> String {
    let slug = slugify(topic);
    if slug.is_empty() {
        format!("final_{}_{:04}.mp4", stamp, suffix)
    } else {
        format!("final_{}_{}_{:04}.mp4", slug, stamp, suffix)
    }
}

async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).await.is_err() {
        fs::copy(from, to)
            .await
            .with_context(|| format!("copy {} -> {}", from.display(), to.display()))?;
        let _ = fs::remove_file(from).await;
    }
    Ok(())
}

/// Joins scene clips in order, layers background music and writes the final file.
pub async fn sequence<R: Rng + ?Sized>(
    media: &dyn MediaBackend,
    cfg: &Config,
    clips: &[PathBuf],
    out_final: &Path,
    rng: &mut R,
) -> Result<PathBuf> {
    if clips.is_empty() {
        anyhow::bail!("no scene clips to join");
    }
    if let Some(parent) = out_final.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let list_txt = cfg.work_dir.join("concat_list.txt");
    write_concat_list(clips, &list_txt).await?;

    let joined = cfg.work_dir.join("joined.mp4");
    logi(format!("Concatenating {} scenes -> {}", clips.len(), joined.display()));
    media
        .concat(&list_txt, cfg.concat_mode, cfg.video.fps, &cfg.video.preset, &joined)
        .await
        .context("concat failed")?;
    logok(format!("Concat OK: {}", joined.display()));

    let bgm = pick_bgm(&cfg.bgm, rng).await.unwrap_or_else(|err| {
        logw(format!("Could not read background music ({:#}); skipping it.", err));
        None
    });
    match bgm {
        None => {
            if cfg.bgm.enabled {
                logw("No background music found; output will be narration-only.");
            }
            move_file(&joined, out_final).await?;
        }
        Some(song) => {
            logi(format!("Mixing narration + {} -> {}", song.display(), out_final.display()));
            let mix = BgmMix {
                volume: cfg.bgm.volume,
            };
            match media.mix_bgm(&joined, &song, mix, out_final).await {
                Ok(()) => {
                    let _ = fs::remove_file(&joined).await;
                }
                Err(err) => {
                    logw(format!("Mix failed ({}); output narration-only.", err));
                    move_file(&joined, out_final).await?;
                }
            }
        }
    }

    logok(format!("Wrote output: {}", out_final.display()));
    Ok(out_final.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::SceneJob;
    use crate::ffmpeg::MediaError;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn concat_lines_are_relative_and_quoted() {
        let base = Path::new("/tmp/work");
        assert_eq!(
            concat_line(Path::new("/tmp/work/scene_0.mp4"), base),
            "file 'scene_0.mp4'\n"
        );
        assert_eq!(
            concat_line(Path::new("/tmp/work/it's.mp4"), base),
            "file 'it'\\''s.mp4'\n"
        );
    }

    #[test]
    fn output_names_carry_topic_and_suffix() {
        assert_eq!(
            output_name("Life of Einstein", "20260101-120000", 42),
            "final_life-of-einstein_20260101-120000_0042.mp4"
        );
        assert_eq!(output_name("!!!", "s", 1234), "final_s_1234.mp4");
    }

    #[tokio::test]
    async fn music_listing_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.mp3", "b.M4A", "c.wav", "notes.txt"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }
        let songs = list_music(dir.path()).await.unwrap();
        let names: Vec<_> = songs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.mp3", "b.M4A"]);
        assert!(list_music(&dir.path().join("missing")).await.unwrap().is_empty());
    }

    /// Concat writes a marker file; mixing must not be reached.
    struct JoinOnly;

    #[async_trait]
    impl MediaBackend for JoinOnly {
        async fn probe_duration(&self, _: &Path) -> Result<f64, MediaError> {
            Ok(1.0)
        }

        async fn compose_scene(&self, _: &SceneJob) -> Result<(), MediaError> {
            Ok(())
        }

        async fn concat(&self, _: &Path, _: ConcatMode, _: u32, _: &str, out: &Path) -> Result<(), MediaError> {
            tokio::fs::write(out, b"joined").await?;
            Ok(())
        }

        async fn mix_bgm(&self, _: &Path, _: &Path, _: BgmMix, _: &Path) -> Result<(), MediaError> {
            panic!("no music should be mixed");
        }
    }

    #[tokio::test]
    async fn unreadable_music_folder_falls_back_to_narration_only() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        tokio::fs::create_dir_all(&work).await.unwrap();
        let not_a_dir = dir.path().join("music");
        tokio::fs::write(&not_a_dir, b"x").await.unwrap();
        assert!(list_music(&not_a_dir).await.is_err());

        let mut cfg = Config {
            work_dir: work.clone(),
            ..Config::default()
        };
        cfg.bgm.dir = not_a_dir;

        let clip = work.join("scene_0.mp4");
        tokio::fs::write(&clip, b"clip").await.unwrap();
        let out = dir.path().join("out/final.mp4");
        let mut rng = StdRng::seed_from_u64(3);

        let written = sequence(&JoinOnly, &cfg, &[clip], &out, &mut rng).await.unwrap();
        assert_eq!(written, out);
        assert_eq!(tokio::fs::read(&out).await.unwrap(), b"joined");
    }

    #[tokio::test]
    async fn bgm_choice_respects_config() {
        let dir = tempfile::tempdir().unwrap();
        let song = dir.path().join("song.mp3");
        tokio::fs::write(&song, b"x").await.unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let cfg = BgmConfig {
            dir: dir.path().to_path_buf(),
            ..BgmConfig::default()
        };
        assert_eq!(pick_bgm(&cfg, &mut rng).await.unwrap(), Some(song.clone()));

        let off = BgmConfig {
            enabled: false,
            ..cfg.clone()
        };
        assert_eq!(pick_bgm(&off, &mut rng).await.unwrap(), None);

        let empty = BgmConfig {
            dir: dir.path().join("none"),
            file: Some(dir.path().join("gone.mp3")),
            ..BgmConfig::default()
        };
        assert_eq!(pick_bgm(&empty, &mut rng).await.unwrap(), None);
    }
}
