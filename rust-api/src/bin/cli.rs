//! F1 Predictor CLI - offline pipeline and next-race predictions

use anyhow::{bail, Context, Result};
use chrono::Datelike;
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

use f1_predictor::data::{load_results, save_features, save_results, FeatureBuilder};
use f1_predictor::ergast::{fetch_seasons, ClientConfig, ErgastClient, DEFAULT_BASE_URL};
use f1_predictor::models::{DriverPrediction, RaceMeta};
use f1_predictor::predictor::{save_artifacts, WinPredictor, FEATURES_FILE, MODEL_FILE};
use f1_predictor::service::{self, AutoPrediction, AWAITING_QUALIFYING_MESSAGE};
use f1_predictor::training::{train_win_model, EvaluationMetrics, FeatureTable, GbdtConfig};

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_MODEL_DIR: &str = "models";
const RESULTS_CSV: &str = "results.csv";
const FEATURES_CSV: &str = "features.csv";
const FIRST_SEASON: i32 = 2018;

#[derive(Parser)]
#[command(name = "f1-predictor")]
#[command(author, version, about = "F1 race winner prediction CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding results.csv and features.csv
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Directory holding model.json and features.json
    #[arg(long, default_value = DEFAULT_MODEL_DIR)]
    model_dir: PathBuf,

    /// Ergast-compatible results API base URL
    #[arg(long, env = "RESULTS_API_BASE", default_value = DEFAULT_BASE_URL)]
    api_base: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Download race results for a range of seasons into results.csv
    Fetch {
        /// First season to fetch
        #[arg(long, default_value_t = FIRST_SEASON)]
        start: i32,

        /// Last season to fetch (default: current year)
        #[arg(long)]
        end: Option<i32>,
    },

    /// Turn results.csv into features.csv
    BuildFeatures,

    /// Train the win classifier on features.csv
    Train {
        /// Number of boosting rounds
        #[arg(long, default_value = "400")]
        trees: usize,

        /// Maximum tree depth
        #[arg(long, default_value = "4")]
        depth: usize,

        /// Shrinkage applied to every tree
        #[arg(long, default_value = "0.05")]
        learning_rate: f64,

        /// Random seed for row and column sampling
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Predict the next race from its qualifying order
    Predict,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    println!("{}", format!("F1 Predictor v{}", env!("CARGO_PKG_VERSION")).cyan().bold());
    println!();

    match cli.command {
        Commands::Fetch { start, end } => {
            let end = end.unwrap_or_else(|| chrono::Utc::now().year());
            run_fetch(&cli.data_dir, &cli.api_base, start, end).await?;
        }
        Commands::BuildFeatures => {
            run_build_features(&cli.data_dir)?;
        }
        Commands::Train {
            trees,
            depth,
            learning_rate,
            seed,
        } => {
            let config = GbdtConfig {
                num_trees: trees,
                max_depth: depth,
                learning_rate,
                seed,
                ..GbdtConfig::default()
            };
            run_train(&cli.data_dir, &cli.model_dir, config)?;
        }
        Commands::Predict => {
            run_predict(&cli.model_dir, &cli.api_base).await?;
        }
    }

    Ok(())
}

fn client(api_base: &str) -> Result<ErgastClient> {
    ErgastClient::new(ClientConfig {
        base_url: api_base.to_string(),
        ..ClientConfig::default()
    })
    .context("Failed to build results API client")
}

fn spinner(msg: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn run_fetch(data_dir: &Path, api_base: &str, start: i32, end: i32) -> Result<()> {
    if start > end {
        bail!("Start season {} is after end season {}", start, end);
    }

    println!(
        "{}: seasons {}-{} from {}",
        "Fetching".green(),
        start,
        end,
        api_base
    );

    let client = client(api_base)?;
    let pb = spinner(format!("Downloading {} seasons...", end - start + 1));
    let fetch = fetch_seasons(&client, start..=end).await;
    pb.finish_and_clear();

    for (season, err) in &fetch.failed {
        println!("{} {}: {}", "Skipped".yellow(), season, err);
    }

    if fetch.records.is_empty() {
        bail!("No results downloaded; nothing written");
    }

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create {:?}", data_dir))?;
    let csv_path = data_dir.join(RESULTS_CSV);
    save_results(&fetch.records, &csv_path)
        .with_context(|| format!("Failed to write {:?}", csv_path))?;

    println!(
        "{}: {} rows -> {:?}",
        "Saved".green(),
        fetch.records.len(),
        csv_path
    );
    Ok(())
}

fn run_build_features(data_dir: &Path) -> Result<()> {
    let results_path = data_dir.join(RESULTS_CSV);
    println!("{}: {:?}", "Building features".green(), results_path);

    let results = load_results(&results_path)
        .with_context(|| format!("Failed to load results from {:?}", results_path))?;
    if results.is_empty() {
        bail!("{:?} has no rows", results_path);
    }

    let rows = FeatureBuilder::build(&results);
    let wins = rows.iter().filter(|r| r.win).count();

    let features_path = data_dir.join(FEATURES_CSV);
    save_features(&rows, &features_path)
        .with_context(|| format!("Failed to write {:?}", features_path))?;

    println!(
        "{}: {} rows ({} wins) -> {:?}",
        "Saved".green(),
        rows.len(),
        wins,
        features_path
    );
    Ok(())
}

fn run_train(data_dir: &Path, model_dir: &Path, config: GbdtConfig) -> Result<()> {
    let features_path = data_dir.join(FEATURES_CSV);
    println!("{}: {:?}", "Training".green(), features_path);

    let table = FeatureTable::load(&features_path)
        .with_context(|| format!("Failed to load features from {:?}", features_path))?;

    let pb = ProgressBar::new(config.num_trees as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} trees {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let report = train_win_model(&table, config, |built| pb.set_position(built as u64))
        .context("Training failed")?;
    pb.finish_and_clear();

    println!();
    println!("{}", "Split:".yellow().bold());
    println!(
        "  train seasons {:?} ({} rows)",
        report.split.train_seasons,
        report.split.train.len()
    );
    println!(
        "  test season   {} ({} rows)",
        report.split.test_season,
        report.split.test.len()
    );
    println!("  scale_pos_weight {:.2}", report.scale_pos_weight);
    println!();
    print_metrics(report.split.test_season, &report.test_metrics);

    save_artifacts(&report.model, model_dir)
        .with_context(|| format!("Failed to save model to {:?}", model_dir))?;
    println!();
    println!(
        "{}: {:?}, {:?}",
        "Saved".green(),
        model_dir.join(MODEL_FILE),
        model_dir.join(FEATURES_FILE)
    );
    Ok(())
}

fn print_metrics(season: i32, metrics: &EvaluationMetrics) {
    println!("{}", format!("Held-out season {}:", season).yellow().bold());
    println!("{}", "-".repeat(40));
    println!("{:<12} {:>10}", "rows", metrics.rows);
    println!("{:<12} {:>10}", "winners", metrics.positives);
    println!("{:<12} {:>10.4}", "accuracy", metrics.accuracy);
    match metrics.roc_auc {
        Some(auc) => println!("{:<12} {:>10.4}", "roc_auc", auc),
        None => println!("{:<12} {:>10}", "roc_auc", "n/a".dimmed()),
    }
    println!("{:<12} {:>10.4}", "log_loss", metrics.log_loss);
}

async fn run_predict(model_dir: &Path, api_base: &str) -> Result<()> {
    let predictor = WinPredictor::load(model_dir)
        .with_context(|| format!("Failed to load model from {:?}", model_dir))?;
    let client = client(api_base)?;

    let pb = spinner("Fetching next race...".to_string());
    let outcome = service::predict_next_race(&client, Some(&predictor)).await;
    pb.finish_and_clear();

    match outcome.context("Prediction failed")? {
        AutoPrediction::NoUpcomingRace => {
            println!("{}", "No upcoming race found.".yellow());
        }
        AutoPrediction::AwaitingQualifying(race) => {
            print_race(&race);
            println!("{}", AWAITING_QUALIFYING_MESSAGE.yellow());
        }
        AutoPrediction::Ready { race, predictions } => {
            print_race(&race);
            print_predictions(&predictions);
        }
    }
    Ok(())
}

fn print_race(race: &RaceMeta) {
    println!(
        "{} {} round {}: {} ({}, {})",
        "Next race".green(),
        race.season,
        race.round,
        race.race_name.bold(),
        race.circuit,
        race.date.as_deref().unwrap_or("date TBA")
    );
    println!();
}

fn print_predictions(predictions: &[DriverPrediction]) {
    println!("{}", "Win probabilities:".yellow().bold());
    println!(
        "{:>4} {:<24} {:<20} {:>5} {:>8}",
        "#", "Driver", "Constructor", "Grid", "Win %"
    );
    println!("{}", "-".repeat(65));

    for (rank, p) in predictions.iter().enumerate() {
        let pct = format!("{:>7.1}%", p.win_probability * 100.0);
        println!(
            "{:>4} {:<24} {:<20} {:>5} {}",
            rank + 1,
            p.driver,
            p.constructor,
            p.grid,
            if rank == 0 { pct.green() } else { pct.normal() }
        );
    }
}
