use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use newscat::classify::{label_table_from_config, Classifier, KeywordModel, OnnxCategoryModel};
use newscat::config::Config;
use newscat::feed::Fetcher;
use newscat::pipeline::{FetchStatus, Pipeline, PipelineSettings};
use newscat::storage::{CategoryCount, Database, DatabaseError, StoredEntry};

/// Get the config directory path (~/.config/newscat/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("newscat"))
}

/// Create the config directory if needed, owner-only on Unix.
fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

    // SEC-007: user-only access to the directory holding the database
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "newscat",
    version,
    about = "Ingest news feeds, classify entries by topic, store them in SQLite"
)]
struct Args {
    /// Config file (default: ~/.config/newscat/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database file, overrides config and NEWSCAT_DATABASE_PATH
    #[arg(long, global = true, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Directory with model.onnx and tokenizer.json, overrides config and NEWSCAT_MODEL_DIR
    #[arg(long, global = true, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, classify and store new entries from every source
    Ingest {
        /// Feed URL to ingest instead of the configured sources (repeatable)
        #[arg(long = "source", value_name = "URL")]
        sources: Vec<String>,

        /// Classify with the built-in keyword model instead of ONNX
        #[arg(long)]
        dry_run_model: bool,
    },

    /// Classify a single headline and description
    Classify {
        #[arg(long)]
        title: String,

        #[arg(long)]
        summary: String,

        /// Classify with the built-in keyword model instead of ONNX
        #[arg(long)]
        dry_run_model: bool,
    },

    /// Show stored entry counts per category and the latest entries
    Stats {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Number of recent entries to list
        #[arg(long, default_value_t = 10)]
        recent: i64,
    },
}

#[derive(Serialize)]
struct Stats {
    total: i64,
    categories: Vec<CategoryCount>,
    recent: Vec<StoredEntry>,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("newscat=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newscat=info"))
    };

    // stdout carries command output; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_classifier(config: &Config, dry_run_model: bool) -> Result<Classifier> {
    if dry_run_model {
        tracing::info!("Using keyword model");
        return Ok(Classifier::new(Arc::new(KeywordModel::default())));
    }

    let model_dir = config.model_dir.as_deref().context(
        "No model directory configured: set model_dir, NEWSCAT_MODEL_DIR or --model-dir \
         (or pass --dry-run-model)",
    )?;
    let model = OnnxCategoryModel::from_directory(model_dir)
        .with_context(|| format!("Failed to load classifier from {}", model_dir.display()))?;
    let table = label_table_from_config(model_dir).unwrap_or_default();

    tracing::info!(dir = %model_dir.display(), labels = table.len(), "Loaded classifier");
    Ok(Classifier::with_table(Arc::new(model), table))
}

async fn open_database(config: &Config, config_dir: &Path) -> Result<Database> {
    let db_path = match &config.database_path {
        Some(path) => path.clone(),
        None => {
            ensure_config_dir(config_dir)?;
            config_dir.join("entries.db")
        }
    };
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;

    match Database::open(db_path_str).await {
        Ok(db) => Ok(db),
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: The database at {} is locked by another process.", db_path.display());
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database: {}", e)),
    }
}

async fn ingest(config: &Config, db: Database, sources: &[String], dry_run_model: bool) -> Result<()> {
    let sources = config
        .resolve_sources(sources)
        .context("Failed to resolve feed sources")?;
    if sources.is_empty() {
        anyhow::bail!(
            "No valid feed sources: add `sources` or `opml_path` to the config file, or pass --source URL"
        );
    }

    let classifier = load_classifier(config, dry_run_model)?;
    let fetcher = Fetcher::new(config.fetch_settings()).context("Failed to build HTTP client")?;
    let pipeline = Pipeline::new(
        db.clone(),
        fetcher,
        classifier,
        PipelineSettings {
            entry_delay: config.entry_delay(),
        },
    );

    tracing::info!(sources = sources.len(), "Starting ingest");
    let result = pipeline.run(&sources).await;
    db.close().await;
    let report = result.context("Ingest aborted")?;

    for source in &report.sources {
        match &source.status {
            FetchStatus::Fetched => println!(
                "{}: {} fetched, {} stored, {} duplicate, {} skipped",
                source.url, source.fetched, source.stored, source.duplicates, source.skipped_ineligible
            ),
            FetchStatus::Failed(e) => println!("{}: failed ({})", source.url, e),
        }
    }
    println!(
        "Stored {} new entries from {} sources ({} failed)",
        report.total_stored,
        report.sources.len(),
        report.failed_sources()
    );

    Ok(())
}

async fn stats(db: &Database, json: bool, recent: i64) -> Result<()> {
    let stats = Stats {
        total: db.count_entries().await.context("Failed to count entries")?,
        categories: db.category_counts().await.context("Failed to count categories")?,
        recent: db.recent_entries(recent).await.context("Failed to load recent entries")?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{} entries", stats.total);
    for CategoryCount { category, count } in &stats.categories {
        println!("  {:<16} {:>6}", category.label(), count);
    }
    if !stats.recent.is_empty() {
        println!();
        for entry in &stats.recent {
            let date = entry
                .published
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "No Date".to_string());
            println!("{}  [{}]  {}", date, entry.category, entry.title);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));

    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.apply_env();
    if let Some(path) = args.database {
        config.database_path = Some(path);
    }
    if let Some(dir) = args.model_dir {
        config.model_dir = Some(dir);
    }

    match args.command {
        Command::Ingest {
            sources,
            dry_run_model,
        } => {
            let db = open_database(&config, &config_dir).await?;
            ingest(&config, db, &sources, dry_run_model).await
        }
        Command::Classify {
            title,
            summary,
            dry_run_model,
        } => {
            let classifier = load_classifier(&config, dry_run_model)?;
            println!("{}", classifier.classify_async(&title, &summary).await);
            Ok(())
        }
        Command::Stats { json, recent } => {
            let db = open_database(&config, &config_dir).await?;
            let result = stats(&db, json, recent).await;
            db.close().await;
            result
        }
    }
}
