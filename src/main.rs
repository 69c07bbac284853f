use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ulpan::catalog::Catalog;
use ulpan::legacy::JsonLegacyMirror;
use ulpan::progress::model::{EnglishLevel, TaskPayload};
use ulpan::progress::scoring::AnswerSheet;
use ulpan::progress::{JsonProgressStore, ProgressService};
use ulpan::{AppConfig, ProgressError};

#[derive(Parser)]
#[command(name = "ulpan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a zeroed progress document for a user
    Init {
        /// User identifier
        user: String,
        /// Seed a zero-progress entry for every catalog topic
        #[arg(long)]
        seed: bool,
    },
    /// Record a graded quiz/vocabulary attempt
    Attempt {
        user: String,
        topic: String,
        level: String,
        task: String,
        /// Correctly answered questions
        #[arg(long)]
        correct: u32,
        /// Total questions asked
        #[arg(long)]
        total: u32,
    },
    /// Record an interactive session attempt
    Session {
        user: String,
        topic: String,
        level: String,
        task: String,
        /// Pronunciation component, 0-100
        #[arg(long)]
        pronunciation: u32,
        /// Fluency component, 0-100
        #[arg(long)]
        fluency: u32,
        /// Grammar component, 0-100
        #[arg(long)]
        grammar: u32,
        /// Session duration in seconds
        #[arg(long)]
        duration: u32,
    },
    /// Mark a vocabulary word as learned
    Learn {
        user: String,
        word: String,
        topic: String,
        /// Stable flashcard id, when known
        #[arg(long)]
        flashcard: Option<String>,
    },
    /// Print a user's whole progress
    Show { user: String },
    /// Print a user's progress for one topic
    Topic { user: String, topic: String },
    /// Print a user's badge standing
    Badges { user: String },
    /// Update a user's English level (beginner/intermediate/advanced)
    SetLevel { user: String, level: String },
    /// Recompute derived roll-ups for a drifted document
    Repair { user: String },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ulpan=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let service = build_service(&config)?;

    match cli.command {
        Commands::Init { user, seed } => {
            match service.initialize_progress(&user, seed || config.seed_topics_on_init) {
                Ok(view) => print_json(&view)?,
                Err(ProgressError::AlreadyInitialized(_)) => {
                    println!("Progress already initialized for {user}");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Attempt { user, topic, level, task, correct, total } => {
            let answers = AnswerSheet::Quiz { correct, total };
            let outcome = service
                .submit_task_attempt(&user, &topic, &level, &task, &answers, TaskPayload::default())?;
            print_json(&outcome)?;
        }
        Commands::Session { user, topic, level, task, pronunciation, fluency, grammar, duration } => {
            let answers =
                AnswerSheet::Session { pronunciation, fluency, grammar, duration_seconds: duration };
            let payload = TaskPayload { duration_seconds: Some(duration), ..Default::default() };
            let outcome =
                service.submit_task_attempt(&user, &topic, &level, &task, &answers, payload)?;
            print_json(&outcome)?;
        }
        Commands::Learn { user, word, topic, flashcard } => {
            service.mark_word_learned(&user, &word, &topic, flashcard)?;
            println!("Learned \"{word}\" in topic {topic}");
        }
        Commands::Show { user } => print_json(&service.get_progress(&user)?)?,
        Commands::Topic { user, topic } => {
            print_json(&service.get_topic_progress(&user, &topic)?)?;
        }
        Commands::Badges { user } => print_json(&service.get_badge_status(&user)?)?,
        Commands::SetLevel { user, level } => {
            let level = parse_english_level(&level)?;
            service.set_english_level(&user, level)?;
            println!("Updated English level for {user}");
        }
        Commands::Repair { user } => print_json(&service.repair_progress(&user)?)?,
    }

    Ok(())
}

fn build_service(config: &AppConfig) -> Result<ProgressService<JsonProgressStore>> {
    let catalog_path = AppConfig::catalog_path()?;
    let catalog = Catalog::load(&catalog_path).with_context(|| {
        format!("No catalog at {:?}; place the topic catalog JSON there first", catalog_path)
    })?;
    let store = JsonProgressStore::open(AppConfig::progress_dir()?)?;

    let mut service = ProgressService::new(store, catalog, config);
    if config.mirror_legacy {
        service = service.with_mirror(Box::new(JsonLegacyMirror::new(
            AppConfig::legacy_mirror_path()?,
        )));
    }
    Ok(service)
}

fn parse_english_level(raw: &str) -> Result<EnglishLevel> {
    match raw.to_lowercase().as_str() {
        "beginner" => Ok(EnglishLevel::Beginner),
        "intermediate" => Ok(EnglishLevel::Intermediate),
        "advanced" => Ok(EnglishLevel::Advanced),
        other => anyhow::bail!("Unknown English level: {other}"),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
