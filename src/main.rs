//! Medtriage: hybrid clinical triage engine.
//!
//! Command-line entry point. Results are printed as JSON on stdout; logs go
//! to stderr or a file so they never mix with command output.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use medtriage::adapters::sanitize::{self, SanitizingMakeWriter};
use medtriage::adapters::SqliteStore;
use medtriage::application::{
    AnalyticsService, HybridRiskEngine, IntakeService, LabelledIntake, ModelRegistry, TriageQueue,
};
use medtriage::config::{LogMode, TriageConfig};
use medtriage::domain::PatientIntake;
use medtriage::ports::PatientStore;
use medtriage::RecordId;

#[derive(Parser)]
#[command(name = "medtriage")]
#[command(about = "Hybrid ML + rule triage engine with a priority queue")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess an intake document without storing it
    Assess {
        /// Path to intake JSON
        intake: PathBuf,
    },
    /// Assess an intake document and add the patient to the queue
    Admit {
        /// Path to intake JSON
        intake: PathBuf,
    },
    /// Show waiting patients in triage order
    Queue,
    /// Call in the most urgent waiting patient
    Next,
    /// Mark a patient under consultation as completed
    Complete {
        /// Visit id
        id: i64,
    },
    /// Show the visits of a registered user
    History {
        /// User id
        user_id: i64,
    },
    /// Visit statistics
    Stats {
        /// How many recent visits to include
        #[arg(long, default_value_t = 10)]
        recent: usize,
    },
    /// Score the active classifier on a labelled dataset
    Benchmark {
        /// Path to a JSON array of labelled intakes
        dataset: PathBuf,
    },
    /// Describe the active model
    ModelInfo,
}

fn init_logging(config: &TriageConfig) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    sanitize::set_max_bytes(config.log_max_bytes);

    let (writer, guard) = match &config.log_mode {
        LogMode::File(path) => {
            if let Some(parent) = path.parent() {
                // Best-effort: the open below reports the real failure.
                let _ = fs::create_dir_all(parent);
            }
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {path:?}"))?;
            tracing_appender::non_blocking(file)
        }
        LogMode::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    Ok(guard)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {path:?}"))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Malformed JSON in {path:?}"))
}

fn run<S: PatientStore>(command: Commands, engine: HybridRiskEngine, store: Arc<S>) -> Result<()> {
    match command {
        Commands::Assess { intake } => {
            let intake: PatientIntake = read_json(&intake)?;
            let (_, assessment) = engine.assess_intake(intake)?;
            print_json(&assessment)
        }
        Commands::Admit { intake } => {
            let intake: PatientIntake = read_json(&intake)?;
            let entry = IntakeService::new(engine, store).admit(intake)?;
            print_json(&entry)
        }
        Commands::Queue => print_json(&TriageQueue::new(store).list_queue()?),
        Commands::Next => match TriageQueue::new(store).next_patient()? {
            Some(entry) => print_json(&entry),
            None => {
                tracing::info!("No patients waiting");
                print_json(&serde_json::Value::Null)
            }
        },
        Commands::Complete { id } => print_json(&TriageQueue::new(store).complete(RecordId(id))?),
        Commands::History { user_id } => {
            print_json(&IntakeService::new(engine, store).history(user_id)?)
        }
        Commands::Stats { recent } => print_json(&AnalyticsService::new(engine, store).stats(recent)?),
        Commands::Benchmark { dataset } => {
            let rows: Vec<LabelledIntake> = read_json(&dataset)?;
            print_json(&AnalyticsService::new(engine, store).benchmark(rows)?)
        }
        Commands::ModelInfo => print_json(&engine.models().get_active().info()),
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = TriageConfig::from_env()?;
    let _guard = init_logging(&config)?;

    tracing::info!("Starting medtriage...");

    let policy = config.integrity_policy()?;
    let registry = ModelRegistry::load(&config.model_path, policy)
        .with_context(|| format!("Failed to load model from {:?}", config.model_path))?;
    let engine = HybridRiskEngine::new(Arc::new(registry));

    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path))?;
    run(cli.command, engine, Arc::new(store))
}
