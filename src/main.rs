use anyhow::{Context, Result};
use castcue::cooldown::GateState;
use castcue::{analyze_text, Engine, LifecycleEvent, PatternCompiler, Profile, RecordingSink, Settings, TurnKey};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "castcue")]
#[command(about = "Streaming speaker attribution for generated chat text")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream a text file through the engine and print every accepted switch
    Replay {
        /// Settings JSON file
        settings: PathBuf,

        /// Text to replay
        text: PathBuf,

        /// Profile to use instead of the active one
        #[arg(long)]
        profile: Option<String>,

        /// Characters per simulated token
        #[arg(long, default_value_t = 12)]
        chunk_chars: usize,
    },

    /// Print every detection, the winner timeline and focus scores as JSON
    Analyze {
        /// Settings JSON file
        settings: PathBuf,

        /// Text to analyze
        text: PathBuf,

        /// Profile to use instead of the active one
        #[arg(long)]
        profile: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // WHY: structured JSON logging keeps decision traces machine-readable
    tracing_subscriber::fmt()
        .with_target(false)
        .json()
        .init();

    let args = Args::parse();
    info!(?args, "Parsed CLI arguments");

    match args.command {
        Command::Replay {
            settings,
            text,
            profile,
            chunk_chars,
        } => replay(&settings, &text, profile.as_deref(), chunk_chars).await,
        Command::Analyze { settings, text, profile } => analyze(&settings, &text, profile.as_deref()).await,
    }
}

async fn load_inputs(settings_path: &Path, text_path: &Path, profile: Option<&str>) -> Result<(Profile, String)> {
    let settings = Settings::load_from_path_async(settings_path)
        .await
        .with_context(|| format!("Failed to load settings: {}", settings_path.display()))?;

    let profile = match profile {
        Some(name) => settings.profile(name)?,
        None => settings.active_profile()?,
    }
    .clone();

    let text = tokio::fs::read_to_string(text_path)
        .await
        .with_context(|| format!("Failed to read text: {}", text_path.display()))?;

    Ok((profile, text))
}

async fn replay(settings_path: &Path, text_path: &Path, profile: Option<&str>, chunk_chars: usize) -> Result<()> {
    if chunk_chars == 0 {
        anyhow::bail!("--chunk-chars must be at least 1");
    }

    let (profile, text) = load_inputs(settings_path, text_path, profile).await?;
    let mut engine = Engine::new(profile).context("Failed to compile profile patterns")?;
    let mut sink = RecordingSink::new();

    engine.handle(LifecycleEvent::TurnStarted { key: TurnKey::Live }, &mut sink);

    let chars: Vec<char> = text.chars().collect();
    let mut tokens = 0usize;
    let mut suppressed = 0usize;
    for chunk in chars.chunks(chunk_chars) {
        let token: String = chunk.iter().collect();
        tokens += 1;
        if let Some(decision) = engine.handle(
            LifecycleEvent::Token {
                key: TurnKey::Live,
                text: token,
            },
            &mut sink,
        ) {
            println!("{}", serde_json::to_string(&decision)?);
        }
        if let GateState::Suppressed(reason) = engine.gate_state() {
            debug!(token = tokens, %reason, "Switch suppressed");
            suppressed += 1;
        }
    }

    engine.handle(LifecycleEvent::TurnEnded { key: TurnKey::Live }, &mut sink);

    info!(
        "Replay complete: {} tokens, {} switches, {} suppressed, {} diagnostics",
        tokens,
        sink.decisions.len(),
        suppressed,
        sink.diagnostics.len()
    );
    Ok(())
}

async fn analyze(settings_path: &Path, text_path: &Path, profile: Option<&str>) -> Result<()> {
    let (profile, text) = load_inputs(settings_path, text_path, profile).await?;

    let set = PatternCompiler::default()
        .compile(&profile.name_patterns(), &profile.verb_lists(), &profile.veto_patterns)
        .context("Failed to compile profile patterns")?;

    let report = analyze_text(&text, &set, &profile);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
