use crate::compositor::{AudioSource, SceneJob, VisualSource};
use crate::sequencer::ConcatMode;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

const AUDIO_RATE: &str = "44100";
const AUDIO_BITRATE: &str = "192k";
/// amix divides every input by the input count.
const AMIX_INPUTS: f32 = 2.0;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} failed ({status}): {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("invalid duration for {0}")]
    BadDuration(PathBuf),
    #[error("{0} was not written")]
    MissingOutput(PathBuf),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Background music layered under the narration track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BgmMix {
    /// Fraction of the narration level.
    pub volume: f32,
}

/// Local media operations the render step needs.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError>;
    async fn compose_scene(&self, job: &SceneJob) -> Result<(), MediaError>;
    async fn concat(
        &self,
        list_txt: &Path,
        mode: ConcatMode,
        fps: u32,
        preset: &str,
        out: &Path,
    ) -> Result<(), MediaError>;
    async fn mix_bgm(
        &self,
        video_in: &Path,
        bgm_in: &Path,
        mix: BgmMix,
        out: &Path,
    ) -> Result<(), MediaError>;
}

pub struct Ffmpeg {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl Ffmpeg {
    pub fn new() -> Self {
        Self::default()
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>, MediaError> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Failed {
                program: program.to_string(),
                status: output.status,
                stderr: stderr.trim().chars().take(600).collect(),
            });
        }
        Ok(output.stdout)
    }

    async fn run_to(&self, args: Vec<String>, out: &Path) -> Result<(), MediaError> {
        self.run(&self.ffmpeg, &args).await?;
        if !out.exists() {
            return Err(MediaError::MissingOutput(out.to_path_buf()));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaBackend for Ffmpeg {
    async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.display().to_string(),
        ];
        let stdout = self.run(&self.ffprobe, &args).await?;
        parse_duration(&String::from_utf8_lossy(&stdout))
            .ok_or_else(|| MediaError::BadDuration(path.to_path_buf()))
    }

    async fn compose_scene(&self, job: &SceneJob) -> Result<(), MediaError> {
        self.run_to(scene_args(job), &job.out).await
    }

    async fn concat(
        &self,
        list_txt: &Path,
        mode: ConcatMode,
        fps: u32,
        preset: &str,
        out: &Path,
    ) -> Result<(), MediaError> {
        self.run_to(concat_args(list_txt, mode, fps, preset, out), out).await
    }

    async fn mix_bgm(
        &self,
        video_in: &Path,
        bgm_in: &Path,
        mix: BgmMix,
        out: &Path,
    ) -> Result<(), MediaError> {
        self.run_to(mix_args(video_in, bgm_in, mix, out), out).await
    }
}

/// ffprobe prints `N/A` for streams without a container duration.
pub fn parse_duration(text: &str) -> Option<f64> {
    let duration = text.trim().parse::<f64>().ok()?;
    (duration.is_finite() && duration > 0.1).then_some(duration)
}

fn base_args() -> Vec<String> {
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ]
}

fn push_all(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

pub fn scene_args(job: &SceneJob) -> Vec<String> {
    let (w, h, fps) = (job.width, job.height, job.fps);
    let mut args = base_args();

    match &job.visual {
        VisualSource::Footage { path, .. } => {
            if job.needs_loop() {
                push_all(&mut args, &["-stream_loop", "-1"]);
            }
            args.push("-i".to_string());
            args.push(path.display().to_string());
        }
        VisualSource::SolidColor { color } => {
            push_all(&mut args, &["-f", "lavfi", "-i"]);
            args.push(format!(
                "color=c={}:s={}x{}:r={}:d={:.3}",
                color, w, h, fps, job.duration
            ));
        }
    }

    match &job.audio {
        AudioSource::Narration { path, .. } => {
            args.push("-i".to_string());
            args.push(path.display().to_string());
        }
        AudioSource::Silence => {
            push_all(&mut args, &["-f", "lavfi", "-i"]);
            args.push(format!("anullsrc=r={}:cl=stereo", AUDIO_RATE));
        }
    }

    let fit = format!(
        "[0:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1,fps={fps}[bg]"
    );
    let filter = match &job.caption {
        Some(png) => {
            push_all(&mut args, &["-loop", "1", "-i"]);
            args.push(png.display().to_string());
            format!("{fit};[bg][2:v]overlay=0:0:format=auto,format=yuv420p[v]")
        }
        None => format!("{fit};[bg]format=yuv420p[v]"),
    };

    push_all(&mut args, &["-filter_complex"]);
    args.push(filter);
    push_all(&mut args, &["-map", "[v]", "-map", "1:a", "-t"]);
    args.push(format!("{:.3}", job.duration));
    push_all(&mut args, &["-c:v", "libx264", "-preset"]);
    args.push(job.preset.clone());
    push_all(&mut args, &["-pix_fmt", "yuv420p", "-r"]);
    args.push(fps.to_string());
    push_all(
        &mut args,
        &["-c:a", "aac", "-b:a", AUDIO_BITRATE, "-ar", AUDIO_RATE, "-ac", "2"],
    );
    args.push(job.out.display().to_string());
    args
}

pub fn concat_args(list_txt: &Path, mode: ConcatMode, fps: u32, preset: &str, out: &Path) -> Vec<String> {
    let mut args = base_args();
    push_all(&mut args, &["-f", "concat", "-safe", "0", "-i"]);
    args.push(list_txt.display().to_string());
    match mode {
        ConcatMode::Reencode => {
            push_all(&mut args, &["-c:v", "libx264", "-pix_fmt", "yuv420p", "-preset"]);
            args.push(preset.to_string());
            args.push("-r".to_string());
            args.push(fps.to_string());
            push_all(&mut args, &["-c:a", "aac", "-b:a", AUDIO_BITRATE]);
        }
        ConcatMode::Copy => push_all(&mut args, &["-c", "copy"]),
    }
    push_all(&mut args, &["-movflags", "+faststart"]);
    args.push(out.display().to_string());
    args
}

pub fn mix_args(video_in: &Path, bgm_in: &Path, mix: BgmMix, out: &Path) -> Vec<String> {
    let mut args = base_args();
    args.push("-i".to_string());
    args.push(video_in.display().to_string());
    push_all(&mut args, &["-stream_loop", "-1", "-i"]);
    args.push(bgm_in.display().to_string());
    args.push("-filter_complex".to_string());
    args.push(format!(
        "[0:a]volume={:.3}[a0];[1:a]volume={:.3}[a1];[a0][a1]amix=inputs=2:duration=first:dropout_transition=2[a]",
        AMIX_INPUTS,
        AMIX_INPUTS * mix.volume.max(0.0)
    ));
    push_all(
        &mut args,
        &[
            "-map", "0:v", "-map", "[a]", "-c:v", "copy", "-c:a", "aac", "-b:a", AUDIO_BITRATE,
            "-movflags", "+faststart",
        ],
    );
    args.push(out.display().to_string());
    args
}

pub async fn check_available(program: &str) -> bool {
    match Command::new(program).arg("-version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VideoConfig;

    fn job(visual: VisualSource, audio: AudioSource, caption: Option<PathBuf>) -> SceneJob {
        SceneJob::new(
            0,
            visual,
            audio,
            caption,
            &VideoConfig::default(),
            PathBuf::from("work/scene_0.mp4"),
        )
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn duration_parsing_rejects_junk() {
        assert_eq!(parse_duration("12.480000\n"), Some(12.48));
        assert_eq!(parse_duration("N/A"), None);
        assert_eq!(parse_duration("0.05"), None);
    }

    #[test]
    fn short_footage_is_looped_and_cut_to_narration() {
        let args = scene_args(&job(
            VisualSource::Footage {
                path: PathBuf::from("v.mp4"),
                duration: 2.0,
            },
            AudioSource::Narration {
                path: PathBuf::from("a.mp3"),
                duration: 4.25,
            },
            Some(PathBuf::from("c.png")),
        ));
        assert_eq!(value_after(&args, "-stream_loop"), Some("-1"));
        assert_eq!(value_after(&args, "-t"), Some("4.250"));
        assert_eq!(value_after(&args, "-preset"), Some("ultrafast"));
        let filter = value_after(&args, "-filter_complex").unwrap();
        assert!(filter.contains("scale=540:960"));
        assert!(filter.contains("[bg][2:v]overlay"));
        assert_eq!(args.last().map(String::as_str), Some("work/scene_0.mp4"));
    }

    #[test]
    fn long_footage_is_only_trimmed() {
        let args = scene_args(&job(
            VisualSource::Footage {
                path: PathBuf::from("v.mp4"),
                duration: 20.0,
            },
            AudioSource::Narration {
                path: PathBuf::from("a.mp3"),
                duration: 3.0,
            },
            None,
        ));
        assert!(!args.iter().any(|a| a == "-stream_loop"));
        assert_eq!(value_after(&args, "-t"), Some("3.000"));
        assert!(!value_after(&args, "-filter_complex").unwrap().contains("overlay"));
    }

    #[test]
    fn fallback_scene_uses_lavfi_sources() {
        let args = scene_args(&job(
            VisualSource::SolidColor {
                color: "black".to_string(),
            },
            AudioSource::Silence,
            None,
        ));
        assert!(args.iter().any(|a| a == "color=c=black:s=540x960:r=24:d=5.000"));
        assert!(args.iter().any(|a| a.starts_with("anullsrc=")));
        assert_eq!(value_after(&args, "-t"), Some("5.000"));
    }

    #[test]
    fn concat_modes() {
        let list = Path::new("work/list.txt");
        let out = Path::new("work/joined.mp4");
        let copy = concat_args(list, ConcatMode::Copy, 24, "ultrafast", out);
        assert_eq!(value_after(&copy, "-c"), Some("copy"));
        let enc = concat_args(list, ConcatMode::Reencode, 24, "ultrafast", out);
        assert_eq!(value_after(&enc, "-c:v"), Some("libx264"));
        assert_eq!(value_after(&enc, "-r"), Some("24"));
    }

    #[test]
    fn bgm_level_is_relative_to_narration() {
        let args = mix_args(
            Path::new("in.mp4"),
            Path::new("song.mp3"),
            BgmMix { volume: 0.1 },
            Path::new("out.mp4"),
        );
        let filter = value_after(&args, "-filter_complex").unwrap();
        assert!(filter.starts_with("[0:a]volume=2.000[a0];[1:a]volume=0.200[a1]"));
        assert!(filter.contains("duration=first"));
        assert_eq!(value_after(&args, "-stream_loop"), Some("-1"));
        assert_eq!(value_after(&args, "-c:v"), Some("copy"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let ff = Ffmpeg {
            ffmpeg: "no-such-ffmpeg".to_string(),
            ffprobe: "no-such-ffprobe".to_string(),
        };
        let err = ff.probe_duration(Path::new("a.mp3")).await.unwrap_err();
        assert!(matches!(err, MediaError::Spawn { .. }));
        assert!(!check_available("no-such-ffmpeg").await);
    }
}
