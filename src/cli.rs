use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use topic_shorts::compositor::FallbackPolicy;
use topic_shorts::config::{Config, KeyOverrides};
use topic_shorts::generator::{self, RenderReport, SceneStatus};
use topic_shorts::init;
use topic_shorts::scene::{Script, slugify};
use topic_shorts::tts::{TtsEngine, resolve_voice};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "topic-shorts", version, about = "Turn a topic into a narrated vertical short video")]
struct Cli {
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    #[arg(long, global = true)]
    gemini_key: Option<String>,

    #[arg(long, global = true)]
    pexels_key: Option<String>,

    #[arg(long, global = true)]
    elevenlabs_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a script for a topic and save it as JSON.
    Script {
        #[command(flatten)]
        topic: TopicArgs,
        /// Where to save the script (default: <output_dir>/script_<topic>.json).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render a saved script into a video.
    Render {
        #[arg(long)]
        script: PathBuf,
        #[command(flatten)]
        voice: VoiceArgs,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Write a script and render it.
    Make {
        #[command(flatten)]
        topic: TopicArgs,
        #[command(flatten)]
        voice: VoiceArgs,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Speak a sample sentence with the chosen voice.
    VoiceTest {
        #[command(flatten)]
        voice: VoiceArgs,
        #[arg(long, default_value = "voice_test.mp3")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct TopicArgs {
    #[arg(long)]
    topic: String,
    /// Target length in seconds.
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(15..=300))]
    duration: u32,
}

#[derive(Args)]
struct VoiceArgs {
    /// Voice id or alias (ava, andrew, emma, brian).
    #[arg(long)]
    voice: Option<String>,
    /// Speech speed, 0.5 to 1.5.
    #[arg(long)]
    speed: Option<f32>,
    #[arg(long, value_enum)]
    engine: Option<EngineArg>,
}

#[derive(Args)]
struct RenderArgs {
    /// Final video path (default: a generated name in the output dir).
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    keep_temp: bool,
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,
    /// Background track to use instead of a random pick.
    #[arg(long, conflicts_with = "no_bgm")]
    bgm: Option<PathBuf>,
    #[arg(long)]
    no_bgm: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineArg {
    Edge,
    Elevenlabs,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Skip,
    Degrade,
}

impl VoiceArgs {
    fn apply(&self, cfg: &mut Config) {
        if let Some(voice) = &self.voice {
            cfg.voice = resolve_voice(voice);
        }
        if let Some(speed) = self.speed {
            cfg.set_speed(speed);
        }
        if let Some(engine) = self.engine {
            cfg.tts_engine = match engine {
                EngineArg::Edge => TtsEngine::Edge,
                EngineArg::Elevenlabs => TtsEngine::ElevenLabs,
            };
        }
    }
}

impl RenderArgs {
    fn apply(&self, cfg: &mut Config) {
        cfg.keep_temp |= self.keep_temp;
        if let Some(policy) = self.policy {
            cfg.fallback_policy = match policy {
                PolicyArg::Skip => FallbackPolicy::Skip,
                PolicyArg::Degrade => FallbackPolicy::Degrade,
            };
        }
        if let Some(bgm) = &self.bgm {
            cfg.bgm.enabled = true;
            cfg.bgm.file = Some(bgm.clone());
        }
        if self.no_bgm {
            cfg.bgm.enabled = false;
        }
    }
}

fn print_report(report: &RenderReport) {
    for scene in &report.scenes {
        let status = match &scene.status {
            SceneStatus::Rendered => "ok".to_string(),
            SceneStatus::Degraded(d) => format!("degraded {:?}", d),
            SceneStatus::Skipped(reason) => format!("skipped: {}", reason),
        };
        println!("  scene {:>2}: {:>6.2}s  {}", scene.index + 1, scene.duration, status);
    }
    println!(
        "{} ({} scenes, {} degraded, {} skipped, {:.1}s)",
        report.output.display(),
        report.rendered(),
        report.degraded(),
        report.skipped(),
        report.total_duration()
    );
}

async fn write_script(cfg: &Config, topic: &TopicArgs, out: Option<PathBuf>) -> Result<Script> {
    let script = generator::run_generate(cfg, &topic.topic, topic.duration).await?;
    println!("{}", script.preview());

    let out = out.unwrap_or_else(|| {
        let mut slug = slugify(script.topic());
        if slug.is_empty() {
            slug = "untitled".to_string();
        }
        cfg.output_dir.join(format!("script_{}.json", slug))
    });
    script.save(&out).await?;
    tracing::info!("Script saved to {}", out.display());
    Ok(script)
}

async fn run(cli: Cli) -> Result<()> {
    let mut cfg = Config::load_or_default(&cli.config).await?;
    cfg.apply_overrides(KeyOverrides {
        gemini: cli.gemini_key,
        pexels: cli.pexels_key,
        elevenlabs: cli.elevenlabs_key,
    });

    match cli.command {
        Command::Script { topic, out } => {
            init::ensure_directories(&cfg).await?;
            write_script(&cfg, &topic, out).await?;
        }
        Command::Render { script, voice, render } => {
            voice.apply(&mut cfg);
            render.apply(&mut cfg);
            init::ensure_directories(&cfg).await?;
            init::check_ffmpeg().await;
            let script = Script::load(&script).await?;
            let report = generator::run_render(&cfg, &script, render.out).await?;
            print_report(&report);
        }
        Command::Make { topic, voice, render } => {
            voice.apply(&mut cfg);
            render.apply(&mut cfg);
            init::ensure_directories(&cfg).await?;
            init::check_ffmpeg().await;
            let script = write_script(&cfg, &topic, None).await?;
            let report = generator::run_render(&cfg, &script, render.out).await?;
            print_report(&report);
        }
        Command::VoiceTest { voice, out } => {
            voice.apply(&mut cfg);
            let bytes = generator::run_voice_test(&cfg, &out).await?;
            println!("{} ({} bytes, voice {})", out.display(), bytes, cfg.voice);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    tokio::select! {
        res = run(cli) => match res {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!("{err:#}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; stopping.");
            ExitCode::from(130)
        }
    }
}
