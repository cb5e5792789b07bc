use crate::api::{FetchError, FootageSource, GeminiClient, PexelsClient, ScriptWriter};
use crate::caption::CaptionRenderer;
use crate::compositor::{self, AudioSource, Composed, FootageIssue, SceneJob};
use crate::config::Config;
use crate::ffmpeg::{Ffmpeg, MediaBackend};
use crate::scene::{Scene, Script, sanitize_keyword};
use crate::sequencer;
use crate::tts::{self, Narrator};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use walkdir::WalkDir;

const USER_AGENT: &str = concat!("topic-shorts/", env!("CARGO_PKG_VERSION"));

fn now_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Why a rendered scene differs from the plan.
#[derive(Debug, Clone, PartialEq)]
pub enum Degradation {
    /// Footage came from the generic keyword instead of the scene keyword.
    GenericFootage,
    Footage(FootageIssue),
    Narration(String),
    Caption(String),
    PlainRender(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneStatus {
    Rendered,
    Degraded(Vec<Degradation>),
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct SceneReport {
    pub index: usize,
    pub status: SceneStatus,
    pub clip: Option<PathBuf>,
    pub duration: f64,
}

#[derive(Debug, Clone)]
pub struct RenderReport {
    pub output: PathBuf,
    pub scenes: Vec<SceneReport>,
}

impl RenderReport {
    pub fn rendered(&self) -> usize {
        self.scenes.iter().filter(|s| s.clip.is_some()).count()
    }

    pub fn degraded(&self) -> usize {
        self.scenes
            .iter()
            .filter(|s| matches!(s.status, SceneStatus::Degraded(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.scenes
            .iter()
            .filter(|s| matches!(s.status, SceneStatus::Skipped(_)))
            .count()
    }

    /// Sum of the planned lengths of every scene that made it into the video.
    pub fn total_duration(&self) -> f64 {
        self.scenes
            .iter()
            .filter(|s| s.clip.is_some())
            .map(|s| s.duration)
            .sum()
    }
}

/// Stage implementations used by the render step.
pub struct Stages<'a> {
    pub footage: &'a dyn FootageSource,
    pub narrator: &'a dyn Narrator,
    pub media: &'a dyn MediaBackend,
    pub captions: &'a CaptionRenderer,
}

async fn ensure_dir(path: &Path) -> Result<()> {
    if !fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false) {
        fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create dir {}", path.display()))?;
    }
    Ok(())
}

const SCENE_FILE_PREFIXES: &[&str] = &["v_", "a_", "c_", "scene_"];
const SCENE_FILE_EXTS: &[&str] = &[".mp4", ".mp3", ".png", ".part"];
const JOIN_FILES: &[&str] = &["concat_list.txt", "joined.mp4"];

/// Intermediate files a render leaves in the work dir.
fn is_work_file(name: &str) -> bool {
    JOIN_FILES.contains(&name)
        || (SCENE_FILE_PREFIXES.iter().any(|p| name.starts_with(p))
            && SCENE_FILE_EXTS.iter().any(|e| name.ends_with(e)))
}

/// Deletes render intermediates directly inside `dir`. `keep` and unrelated files stay.
pub async fn remove_work_files(dir: &Path, keep: &Path) -> Result<usize> {
    if !fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Ok(0);
    }
    let keep = fs::canonicalize(keep).await.ok();

    let mut removed = 0;
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_work_file(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        if keep.is_some() && fs::canonicalize(path).await.ok() == keep {
            continue;
        }
        if fs::remove_file(path).await.is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")
}

pub async fn generate_script(writer: &dyn ScriptWriter, topic: &str, duration_secs: u32) -> Result<Script> {
    let topic = topic.trim();
    if topic.is_empty() {
        anyhow::bail!("topic is empty");
    }
    let script = writer
        .write_script(topic, duration_secs)
        .await
        .with_context(|| format!("script generation failed for '{}'", topic))?;
    Ok(script)
}

/// Footage for one scene: scene keyword first, then the generic keyword.
async fn fetch_footage(
    source: &dyn FootageSource,
    cfg: &Config,
    index: usize,
    scene: &Scene,
    degradations: &mut Vec<Degradation>,
) -> Option<PathBuf> {
    let kw_slug = sanitize_keyword(&scene.keyword);
    let mut attempts = Vec::new();
    if !kw_slug.is_empty() {
        attempts.push((scene.keyword.as_str(), kw_slug));
    }
    let fallback_slug = sanitize_keyword(&cfg.fallback_keyword);
    let fallback_slug = if fallback_slug.is_empty() {
        "scene".to_string()
    } else {
        fallback_slug
    };
    attempts.push((cfg.fallback_keyword.as_str(), fallback_slug));

    for (n, (keyword, slug)) in attempts.iter().enumerate() {
        let dest = cfg.work_dir.join(format!("v_{}_{}.mp4", index, slug));
        match source.fetch(keyword, &dest).await {
            Ok(outcome) => {
                logi(format!("Footage for scene {} ({}): {:?}", index + 1, keyword, outcome));
                if n + 1 == attempts.len() {
                    degradations.push(Degradation::GenericFootage);
                }
                return Some(dest);
            }
            Err(FetchError::MissingApiKey) => {
                logw(format!("Scene {}: Pexels key missing; using solid background", index + 1));
                return None;
            }
            Err(err) => logw(format!("Scene {}: footage search '{}' failed: {}", index + 1, keyword, err)),
        }
    }
    None
}

async fn narrate_scene(
    stages: &Stages<'_>,
    cfg: &Config,
    index: usize,
    scene: &Scene,
    degradations: &mut Vec<Degradation>,
) -> AudioSource {
    let path = cfg.work_dir.join(format!("a_{}.mp3", index));
    let limit = Duration::from_secs(cfg.tts_timeout_secs);
    let result = match tts::narrate(stages.narrator, &scene.text, &path, limit).await {
        Ok(_) => stages
            .media
            .probe_duration(&path)
            .await
            .map_err(|e| e.to_string()),
        Err(err) => Err(err.to_string()),
    };

    match result {
        Ok(duration) => AudioSource::Narration { path, duration },
        Err(reason) => {
            logw(format!("Scene {}: narration unavailable ({}); scene will be silent", index + 1, reason));
            degradations.push(Degradation::Narration(reason));
            AudioSource::Silence
        }
    }
}

async fn render_scene(stages: &Stages<'_>, cfg: &Config, index: usize, scene: &Scene) -> SceneReport {
    let mut degradations = Vec::new();

    let footage = fetch_footage(stages.footage, cfg, index, scene, &mut degradations).await;
    let audio = narrate_scene(stages, cfg, index, scene, &mut degradations).await;

    let caption_path = cfg.work_dir.join(format!("c_{}.png", index));
    let caption = match stages.captions.render_to_file(
        &scene.text,
        cfg.video.width,
        cfg.video.height,
        &caption_path,
    ) {
        Ok(()) => Some(caption_path),
        Err(err) => {
            logw(format!("Scene {}: caption failed ({}); rendering without it", index + 1, err));
            degradations.push(Degradation::Caption(err.to_string()));
            None
        }
    };

    let (visual, issue) = compositor::choose_visual(stages.media, footage.as_deref(), &cfg.video).await;
    if let Some(issue) = issue {
        logw(format!("Scene {}: {}; using solid background", index + 1, issue));
        degradations.retain(|d| *d != Degradation::GenericFootage);
        degradations.push(Degradation::Footage(issue));
    }

    let out = cfg.work_dir.join(format!("scene_{}.mp4", index));
    let job = SceneJob::new(index, visual, audio, caption, &cfg.video, out.clone());
    let duration = job.duration;

    match compositor::compose(stages.media, &job, cfg.fallback_policy).await {
        Ok(composed) => {
            if let Composed::Degraded(reason) = composed {
                degradations.push(Degradation::PlainRender(reason));
            }
            let status = if degradations.is_empty() {
                SceneStatus::Rendered
            } else {
                SceneStatus::Degraded(degradations)
            };
            SceneReport {
                index,
                status,
                clip: Some(out),
                duration,
            }
        }
        Err(err) => {
            logw(format!("Scene {} skipped: {}", index + 1, err));
            SceneReport {
                index,
                status: SceneStatus::Skipped(err.to_string()),
                clip: None,
                duration,
            }
        }
    }
}

/// Renders every scene in order, then joins them into `out_final`.
pub async fn render_script(
    stages: &Stages<'_>,
    cfg: &Config,
    script: &Script,
    out_final: &Path,
) -> Result<RenderReport> {
    ensure_dir(&cfg.work_dir).await?;

    let total = script.len();
    let mut scenes = Vec::with_capacity(total);
    for (index, scene) in script.scenes().iter().enumerate() {
        logi(format!("Processing scene {}/{}: {}", index + 1, total, scene.text));
        let report = render_scene(stages, cfg, index, scene).await;
        match &report.status {
            SceneStatus::Rendered => logok(format!("Scene {} OK ({:.2}s)", index + 1, report.duration)),
            SceneStatus::Degraded(d) => logw(format!(
                "Scene {} rendered with {} fallback(s) ({:.2}s)",
                index + 1,
                d.len(),
                report.duration
            )),
            SceneStatus::Skipped(_) => {}
        }
        scenes.push(report);
    }

    let clips: Vec<PathBuf> = scenes.iter().filter_map(|s| s.clip.clone()).collect();
    if clips.is_empty() {
        anyhow::bail!("no scenes could be rendered");
    }
    if clips.len() < total {
        logw(format!("{} of {} scenes were dropped", total - clips.len(), total));
    }

    let mut rng = rand::rngs::StdRng::seed_from_u64(now_seed());
    let output = sequencer::sequence(stages.media, cfg, &clips, out_final, &mut rng).await?;

    if !cfg.keep_temp {
        let removed = remove_work_files(&cfg.work_dir, &output).await?;
        logi(format!("Removed {} work files from {}", removed, cfg.work_dir.display()));
    }

    Ok(RenderReport { output, scenes })
}

/// Default output location for a topic.
pub fn default_output_path(cfg: &Config, topic: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
    let suffix = rand::thread_rng().gen_range(1000..=9999);
    cfg.output_dir.join(sequencer::output_name(topic, &stamp, suffix))
}

pub async fn run_generate(cfg: &Config, topic: &str, duration_secs: u32) -> Result<Script> {
    cfg.require_gemini_key()?;
    let writer = GeminiClient::new(http_client()?, cfg);
    generate_script(&writer, topic, duration_secs).await
}

pub async fn run_render(cfg: &Config, script: &Script, out_final: Option<PathBuf>) -> Result<RenderReport> {
    let client = http_client()?;
    if cfg.pexels_key.is_empty() {
        logw("Pexels key missing; every scene will use a solid background.");
    }
    let footage = PexelsClient::new(client.clone(), cfg);
    let narrator = tts::build_narrator(cfg, client)?;
    let media = Ffmpeg::new();
    let captions = CaptionRenderer::new(cfg.caption.clone());

    let stages = Stages {
        footage: &footage,
        narrator: narrator.as_ref(),
        media: &media,
        captions: &captions,
    };

    let out_final = out_final.unwrap_or_else(|| default_output_path(cfg, script.topic()));
    render_script(&stages, cfg, script, &out_final).await
}

pub async fn run_voice_test(cfg: &Config, out: &Path) -> Result<u64> {
    let narrator = tts::build_narrator(cfg, http_client()?)?;
    let limit = Duration::from_secs(cfg.tts_timeout_secs);
    let bytes = tts::narrate(narrator.as_ref(), tts::VOICE_TEST_TEXT, out, limit)
        .await
        .context("voice test failed")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FetchOutcome;
    use crate::caption::{CaptionFont, CaptionStyle};
    use crate::compositor::{FallbackPolicy, VisualSource};
    use crate::ffmpeg::{BgmMix, MediaError};
    use crate::sequencer::ConcatMode;
    use crate::tts::TtsError;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    const FOOTAGE_SECS: f64 = 2.4;

    /// Files carry their own duration as text, padded past the size threshold.
    fn media_bytes(duration: f64) -> Vec<u8> {
        let mut bytes = format!("{duration:.3}").into_bytes();
        bytes.resize(2048, b' ');
        bytes
    }

    fn words_secs(text: &str) -> f64 {
        text.split_whitespace().count() as f64 * 0.5
    }

    struct FakeFootage {
        available: bool,
        requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FootageSource for FakeFootage {
        async fn fetch(&self, keyword: &str, dest: &Path) -> Result<FetchOutcome, FetchError> {
            self.requests.lock().unwrap().push(keyword.to_string());
            if !self.available {
                return Err(FetchError::NoResults(keyword.to_string()));
            }
            tokio::fs::write(dest, media_bytes(FOOTAGE_SECS)).await?;
            Ok(FetchOutcome::Downloaded { bytes: 2048 })
        }
    }

    struct FakeNarrator {
        broken: bool,
    }

    #[async_trait]
    impl Narrator for FakeNarrator {
        async fn synthesize(&self, text: &str, out: &Path) -> Result<(), TtsError> {
            if self.broken {
                return Err(TtsError::Http(503));
            }
            tokio::fs::write(out, media_bytes(words_secs(text))).await?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeMedia {
        failing_scenes: HashSet<usize>,
        jobs: Mutex<Vec<SceneJob>>,
    }

    #[async_trait]
    impl MediaBackend for FakeMedia {
        async fn probe_duration(&self, path: &Path) -> Result<f64, MediaError> {
            let text = tokio::fs::read_to_string(path).await?;
            crate::ffmpeg::parse_duration(&text).ok_or_else(|| MediaError::BadDuration(path.to_path_buf()))
        }

        async fn compose_scene(&self, job: &SceneJob) -> Result<(), MediaError> {
            self.jobs.lock().unwrap().push(job.clone());
            let planned = job.audio != AudioSource::Silence;
            if planned && self.failing_scenes.contains(&job.index) {
                return Err(MediaError::MissingOutput(job.out.clone()));
            }
            tokio::fs::write(&job.out, media_bytes(job.duration)).await?;
            Ok(())
        }

        async fn concat(
            &self,
            list_txt: &Path,
            _mode: ConcatMode,
            _fps: u32,
            _preset: &str,
            out: &Path,
        ) -> Result<(), MediaError> {
            let list = tokio::fs::read_to_string(list_txt).await?;
            let dir = list_txt.parent().unwrap();
            let mut total = 0.0;
            for line in list.lines() {
                let name = line.trim_start_matches("file '").trim_end_matches('\'');
                total += self.probe_duration(&dir.join(name)).await?;
            }
            tokio::fs::write(out, media_bytes(total)).await?;
            Ok(())
        }

        async fn mix_bgm(&self, video_in: &Path, _bgm: &Path, _mix: BgmMix, out: &Path) -> Result<(), MediaError> {
            tokio::fs::copy(video_in, out).await?;
            Ok(())
        }
    }

    fn test_config(root: &Path, policy: FallbackPolicy) -> Config {
        let mut cfg = Config {
            work_dir: root.join("work"),
            output_dir: root.join("out"),
            fallback_policy: policy,
            ..Config::default()
        };
        cfg.bgm.dir = root.join("music");
        cfg
    }

    fn coffee_script() -> Script {
        let lines = [
            ("Coffee originated in Ethiopia.", "Ethiopia"),
            ("Goats discovered the beans first.", "Goat"),
            ("Monks brewed them to stay awake.", "monk"),
            ("Coffee houses spread across Arabia.", "Arabia"),
            ("Today billions drink it daily.", "coffee cup"),
        ];
        let scenes = lines
            .iter()
            .map(|(text, keyword)| Scene {
                text: text.to_string(),
                keyword: keyword.to_string(),
            })
            .collect();
        Script::new("Coffee", scenes).unwrap()
    }

    async fn render(
        root: &Path,
        cfg: &Config,
        footage: &FakeFootage,
        narrator: &FakeNarrator,
        media: &FakeMedia,
    ) -> Result<RenderReport> {
        let captions = CaptionRenderer::with_font(CaptionFont::Bitmap, CaptionStyle::default());
        let stages = Stages {
            footage,
            narrator,
            media,
            captions: &captions,
        };
        render_script(&stages, cfg, &coffee_script(), &root.join("out/final.mp4")).await
    }

    fn footage(available: bool) -> FakeFootage {
        FakeFootage {
            available,
            requests: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn coffee_video_matches_narration_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), FallbackPolicy::Degrade);
        let media = FakeMedia::default();

        let report = render(dir.path(), &cfg, &footage(true), &FakeNarrator { broken: false }, &media)
            .await
            .unwrap();

        let script = coffee_script();
        assert!(script.len() >= 3);
        assert_eq!(report.rendered(), script.len());
        assert!(report.scenes.iter().all(|s| s.status == SceneStatus::Rendered));
        for (scene, rep) in script.scenes().iter().zip(&report.scenes) {
            assert_eq!(rep.duration, words_secs(&scene.text));
        }

        let final_secs = media.probe_duration(&report.output).await.unwrap();
        assert!((final_secs - report.total_duration()).abs() < 0.01);

        // Footage is shorter than some narrations and longer than others.
        let jobs = media.jobs.lock().unwrap();
        assert!(jobs.iter().all(|j| j.caption.is_some()));
        assert!(jobs.iter().any(|j| j.needs_loop()));
        assert!(jobs.iter().any(|j| !j.needs_loop()));

        let leftovers = std::fs::read_dir(&cfg.work_dir).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn failed_fetches_still_yield_every_scene_when_degrading() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), FallbackPolicy::Degrade);
        let media = FakeMedia::default();
        let source = footage(false);

        let report = render(dir.path(), &cfg, &source, &FakeNarrator { broken: false }, &media)
            .await
            .unwrap();

        assert_eq!(report.rendered(), 5);
        assert_eq!(report.degraded(), 5);
        for rep in &report.scenes {
            match &rep.status {
                SceneStatus::Degraded(d) => {
                    assert!(d.contains(&Degradation::Footage(FootageIssue::Missing)))
                }
                other => panic!("unexpected status {other:?}"),
            }
        }
        // Scene keyword, then the generic keyword, for each scene.
        let requests = source.requests.lock().unwrap();
        assert_eq!(requests.len(), 10);
        assert_eq!(requests[1], "abstract background");
        assert!(media
            .jobs
            .lock()
            .unwrap()
            .iter()
            .all(|j| matches!(j.visual, VisualSource::SolidColor { .. })));
    }

    #[tokio::test]
    async fn render_failure_drops_scene_under_skip_policy() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), FallbackPolicy::Skip);
        let media = FakeMedia {
            failing_scenes: HashSet::from([1]),
            ..FakeMedia::default()
        };

        let report = render(dir.path(), &cfg, &footage(true), &FakeNarrator { broken: false }, &media)
            .await
            .unwrap();

        assert_eq!(report.rendered(), 4);
        assert_eq!(report.skipped(), 1);
        assert!(matches!(report.scenes[1].status, SceneStatus::Skipped(_)));
        let final_secs = media.probe_duration(&report.output).await.unwrap();
        assert!((final_secs - report.total_duration()).abs() < 0.01);
    }

    #[tokio::test]
    async fn render_failure_is_degraded_under_degrade_policy() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), FallbackPolicy::Degrade);
        let media = FakeMedia {
            failing_scenes: HashSet::from([1]),
            ..FakeMedia::default()
        };

        let report = render(dir.path(), &cfg, &footage(true), &FakeNarrator { broken: false }, &media)
            .await
            .unwrap();

        assert_eq!(report.rendered(), 5);
        match &report.scenes[1].status {
            SceneStatus::Degraded(d) => assert!(matches!(d[0], Degradation::PlainRender(_))),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_narration_makes_silent_fallback_length_scenes() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), FallbackPolicy::Degrade);
        let media = FakeMedia::default();

        let report = render(dir.path(), &cfg, &footage(true), &FakeNarrator { broken: true }, &media)
            .await
            .unwrap();

        assert_eq!(report.rendered(), 5);
        assert!(report.scenes.iter().all(|s| s.duration == cfg.video.fallback_duration));
        assert!(media
            .jobs
            .lock()
            .unwrap()
            .iter()
            .all(|j| j.audio == AudioSource::Silence));
    }

    #[tokio::test]
    async fn cleanup_spares_output_inside_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path(), FallbackPolicy::Degrade);
        tokio::fs::create_dir_all(&cfg.work_dir).await.unwrap();
        let notes = cfg.work_dir.join("script_coffee.json");
        tokio::fs::write(&notes, b"{}").await.unwrap();
        let out_final = cfg.work_dir.join("final.mp4");

        let captions = CaptionRenderer::with_font(CaptionFont::Bitmap, CaptionStyle::default());
        let media = FakeMedia::default();
        let source = footage(true);
        let narrator = FakeNarrator { broken: false };
        let stages = Stages {
            footage: &source,
            narrator: &narrator,
            media: &media,
            captions: &captions,
        };
        let report = render_script(&stages, &cfg, &coffee_script(), &out_final)
            .await
            .unwrap();

        assert_eq!(report.output, out_final);
        let secs = media.probe_duration(&out_final).await.unwrap();
        assert!((secs - report.total_duration()).abs() < 0.01);
        assert!(notes.exists());
        assert!(!cfg.work_dir.join("scene_0.mp4").exists());
        assert!(!cfg.work_dir.join("concat_list.txt").exists());
    }

    #[test]
    fn only_render_intermediates_count_as_work_files() {
        for name in ["v_0_Goat.mp4", "v_1_x.mp4.part", "a_3.mp3", "c_2.png", "scene_4.mp4", "joined.mp4", "concat_list.txt"] {
            assert!(is_work_file(name), "{name}");
        }
        for name in ["final.mp4", "c_notes.json", "script_coffee.json", "voice_test.mp3"] {
            assert!(!is_work_file(name), "{name}");
        }
    }

    #[tokio::test]
    async fn keep_temp_leaves_scene_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = test_config(dir.path(), FallbackPolicy::Degrade);
        cfg.keep_temp = true;

        render(dir.path(), &cfg, &footage(true), &FakeNarrator { broken: false }, &FakeMedia::default())
            .await
            .unwrap();

        assert!(cfg.work_dir.join("scene_0.mp4").exists());
        assert!(cfg.work_dir.join("c_0.png").exists());
        assert!(cfg.work_dir.join("v_0_Ethiopia.mp4").exists());
    }

    struct EchoWriter;

    #[async_trait]
    impl ScriptWriter for EchoWriter {
        async fn write_script(&self, topic: &str, _duration: u32) -> Result<Script, crate::api::ScriptError> {
            let scenes = (0..3)
                .map(|i| Scene {
                    text: format!("{topic} fact {i}."),
                    keyword: topic.to_string(),
                })
                .collect();
            Ok(Script::new(topic, scenes).unwrap())
        }
    }

    #[tokio::test]
    async fn topic_is_trimmed_and_required() {
        let script = generate_script(&EchoWriter, "  Coffee ", 20).await.unwrap();
        assert_eq!(script.topic(), "Coffee");
        assert!(generate_script(&EchoWriter, "   ", 20).await.is_err());
    }
}
