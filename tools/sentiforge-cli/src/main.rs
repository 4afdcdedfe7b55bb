//! SentiForge command-line tool
//!
//! Inspect a review table, run the preprocessing pipeline, train a
//! recurrent classifier and score new text with a saved model bundle.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sentiforge_core::{Milestone, Pipeline, PipelineConfig, PipelineContext, Table};
use sentiforge_trainer::{
    CompileOptions, CompiledModel, ModelBundle, ModelSpec, TracingCallback, summary,
};

/// Default directory for saved bundles
fn default_out_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sentiforge")
        .join("models")
}

/// CLI arguments
#[derive(Parser)]
#[command(name = "sentiforge")]
#[command(about = "Preprocess review text and train binary sentiment models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the columns, null counts and first rows of a CSV file
    Inspect {
        /// CSV file with a header row
        csv: PathBuf,

        /// Number of rows to print
        #[arg(short = 'n', long, default_value_t = 5)]
        rows: usize,
    },
    /// Run preprocessing and report the split, vocabulary and batches
    Preprocess {
        /// CSV file with a header row
        csv: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Number of most frequent words to print
        #[arg(long, default_value_t = 10)]
        top_words: usize,
    },
    /// Preprocess, train, evaluate and save a model bundle
    Train {
        /// CSV file with a header row
        csv: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// JSON layer stack
        #[arg(short, long)]
        model: PathBuf,

        /// JSON compile options (optimizer, loss, metrics, learning rate)
        #[arg(long)]
        compile: Option<PathBuf>,

        /// Number of passes over the training split
        #[arg(short, long, default_value_t = 10)]
        epochs: usize,

        /// Directory that receives the bundle directory
        #[arg(short, long, env = "SENTIFORGE_OUT")]
        out: Option<PathBuf>,

        /// Bundle name (defaults to the CSV file stem)
        #[arg(long)]
        name: Option<String>,
    },
    /// Score text with a saved model bundle
    Predict {
        /// Bundle directory written by `train`
        #[arg(short, long)]
        bundle: PathBuf,

        /// Text to score; repeat for several inputs
        #[arg(short, long, required = true)]
        text: Vec<String>,

        /// Print JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Pipeline settings; flags override values read from `--config`.
#[derive(Args)]
struct PipelineArgs {
    /// JSON pipeline config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Column holding the review text
    #[arg(long)]
    input_column: Option<String>,

    /// Column holding the sentiment label
    #[arg(long)]
    label_column: Option<String>,

    /// Share of rows used for training, in (0, 1)
    #[arg(long)]
    split_ratio: Option<f64>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    vocab_size: Option<usize>,

    /// Hash buckets for out-of-vocabulary words
    #[arg(long)]
    oov_buckets: Option<usize>,
}

impl PipelineArgs {
    /// Config file values with flag overrides applied; validated by the pipeline run.
    fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::read_json_path(path)
                .with_context(|| format!("Failed to read pipeline config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(column) = &self.input_column {
            config.input_column = column.clone();
        }
        if let Some(column) = &self.label_column {
            config.label_column = column.clone();
        }
        if let Some(ratio) = self.split_ratio {
            config.split_ratio = ratio;
        }
        if let Some(size) = self.batch_size {
            config.batch_size = size;
        }
        if let Some(size) = self.vocab_size {
            config.vocab_size = size;
        }
        if let Some(buckets) = self.oov_buckets {
            config.num_oov_buckets = buckets;
        }
        Ok(config)
    }
}

fn load_table(path: &Path) -> Result<Table> {
    Table::from_csv_path(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn run_pipeline(csv: &Path, args: &PipelineArgs) -> Result<PipelineContext> {
    let table = load_table(csv)?;
    let config = args.resolve()?;

    let mut progress = |m: Milestone| info!("[{:>3}%] {m}", m.percent());
    Pipeline::run_with_progress(&table, &config, &mut progress).context("Preprocessing failed")
}

fn inspect(csv: &Path, rows: usize) -> Result<()> {
    let table = load_table(csv)?;
    print!("{}", table.summary());

    println!();
    println!("{}", table.columns().join(" | "));
    for row in table.rows().iter().take(rows) {
        let cells: Vec<&str> = row.iter().map(|c| c.as_deref().unwrap_or("")).collect();
        println!("{}", cells.join(" | "));
    }
    Ok(())
}

fn preprocess(csv: &Path, args: &PipelineArgs, top_words: usize) -> Result<()> {
    let ctx = run_pipeline(csv, args)?;

    println!(
        "labels: {:?} -> 0, {:?} -> 1",
        ctx.labels().zero,
        ctx.labels().one
    );
    println!(
        "split: {} train / {} test ({} labeled 1 in train)",
        ctx.train().len(),
        ctx.test().len(),
        ctx.train().ones()
    );
    println!(
        "vocabulary: {} words, {} oov buckets, {} ids",
        ctx.vocabulary().len(),
        ctx.table().num_oov_buckets(),
        ctx.table().id_space()
    );
    for entry in ctx.vocabulary().entries().iter().take(top_words) {
        println!("  {:>6}  {}", entry.count, entry.word);
    }
    println!(
        "batches: {} train / {} test of up to {}",
        ctx.encoded_train().len(),
        ctx.encoded_test().len(),
        ctx.config().batch_size
    );

    if let Some(first) = ctx.encoded_train().next() {
        println!("first train batch: {:?}", first.sequences);
    }
    Ok(())
}

fn train(
    csv: &Path,
    args: &PipelineArgs,
    model: &Path,
    compile: Option<&Path>,
    epochs: usize,
    out: Option<PathBuf>,
    name: Option<String>,
) -> Result<()> {
    let spec = ModelSpec::from_json_path(model)
        .with_context(|| format!("Failed to read model spec {}", model.display()))?;
    let options = match compile {
        Some(path) => CompileOptions::from_json_path(path)
            .with_context(|| format!("Failed to read compile options {}", path.display()))?,
        None => CompileOptions::default(),
    };

    let ctx = run_pipeline(csv, args)?;
    print!("{}", summary(&spec, Some(ctx.table().id_space()))?);

    let mut compiled = CompiledModel::compile_for(&ctx, &spec, options)?;
    let history = compiled.fit(&ctx, epochs, &mut TracingCallback)?;
    if let Some(last) = history.last() {
        println!("{last}");
    }

    if ctx.test().is_empty() {
        warn!("Test split is empty, skipping evaluation");
    } else {
        println!("test: {}", compiled.evaluate(&ctx)?);
    }

    let name = match name {
        Some(name) => name,
        None => csv
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string()),
    };
    let dir = out.unwrap_or_else(default_out_dir).join(name);
    ModelBundle::new(&ctx, compiled)
        .save(&dir)
        .with_context(|| format!("Failed to save bundle to {}", dir.display()))?;
    println!("saved: {}", dir.display());
    Ok(())
}

fn predict(bundle: &Path, texts: &[String], json: bool) -> Result<()> {
    let bundle = ModelBundle::load(bundle)
        .with_context(|| format!("Failed to load bundle {}", bundle.display()))?;

    for text in texts {
        let (label, probability) = bundle.classify(text)?;
        if json {
            let line = serde_json::json!({
                "text": text,
                "label": label,
                "probability": probability,
            });
            println!("{line}");
        } else {
            println!("{label}\t{probability:.4}\t{text}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { csv, rows } => inspect(&csv, rows),
        Commands::Preprocess {
            csv,
            pipeline,
            top_words,
        } => preprocess(&csv, &pipeline, top_words),
        Commands::Train {
            csv,
            pipeline,
            model,
            compile,
            epochs,
            out,
            name,
        } => train(
            &csv,
            &pipeline,
            &model,
            compile.as_deref(),
            epochs,
            out,
            name,
        ),
        Commands::Predict { bundle, text, json } => predict(&bundle, &text, json),
    }
}
