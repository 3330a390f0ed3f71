//! Command implementations for the Polarity CLI.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use log::warn;
use serde_json::Value;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::pipeline::artifact::{ArtifactSet, MANIFEST, WRITE_LOCK};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::predictor::{Predictor, PredictorConfig};
use crate::pipeline::trainer::{Trainer, full_pipeline};
use crate::storage::Storage;
use crate::storage::file::{FileStorage, FileStorageConfig};

/// Execute a CLI command.
pub fn execute_command(args: PolarityArgs) -> Result<()> {
    match &args.command {
        Command::Train(train_args) => train(train_args.clone(), &args),
        Command::Predict(predict_args) => predict(predict_args.clone(), &args),
        Command::Repl(repl_args) => repl(repl_args.clone(), &args),
        Command::Inspect(inspect_args) => inspect(inspect_args.clone(), &args),
    }
}

/// Whether `directory` holds a saved artifact set. Never creates the directory.
fn artifacts_exist(directory: &Path) -> bool {
    directory.join(MANIFEST).is_file()
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => Ok(PipelineConfig::from_json_file(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

/// Configuration file (if any) with the command line overrides applied.
fn training_config(args: &TrainArgs) -> Result<PipelineConfig> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(column) = &args.text_column {
        config.corpus.text_column = column.clone();
    }
    if let Some(column) = &args.label_column {
        config.corpus.label_column = column.clone();
    }
    if let Some(fraction) = args.test_fraction {
        config.split.test_fraction = fraction;
    }
    if let Some(seed) = args.seed {
        config.split.seed = seed;
    }
    if let Some(max_features) = args.max_features {
        config.vectorizer.max_features = max_features;
    }
    if args.keep_stop_words {
        config.normalizer.remove_stop_words = false;
    }

    config.validate().context("invalid pipeline configuration")?;
    Ok(config)
}

/// Train on a corpus and save the artifacts.
fn train(args: TrainArgs, cli_args: &PolarityArgs) -> Result<()> {
    if artifacts_exist(&args.artifacts) && !args.force {
        bail!(
            "artifacts already exist in {}; use --force to overwrite",
            args.artifacts.display()
        );
    }

    let config = training_config(&args)?;
    if cli_args.verbosity() > 1 && cli_args.output_format == OutputFormat::Human {
        println!("Training on: {}", args.data.display());
    }

    let start = Instant::now();
    let mut trainer = Trainer::new(config)?;
    let report = trainer
        .fit_path(&args.data)
        .with_context(|| format!("training on {} failed", args.data.display()))?;

    let storage = FileStorage::new(FileStorageConfig::new(&args.artifacts))?;
    let locks = storage.lock_manager();
    if args.force {
        if locks.break_lock(WRITE_LOCK)? {
            warn!("cleared stale write lock in {}", args.artifacts.display());
        }
    } else if locks.lock_exists(WRITE_LOCK) {
        bail!(
            "{} is locked by another writer; if no training run is active, \
             rerun with --force to clear the stale lock",
            args.artifacts.display()
        );
    }
    let manifest = trainer
        .save(&storage)
        .with_context(|| format!("saving artifacts to {} failed", args.artifacts.display()))?;

    let summary = TrainingSummary {
        artifacts: args.artifacts.display().to_string(),
        artifact_id: manifest.id.to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
        report,
    };
    output_result("Training complete", &summary, cli_args)?;
    Ok(())
}

/// Texts of an input file: a JSON array, or one text per line.
///
/// Array items that are not strings become empty texts, which classify as
/// neutral with confidence 0.
fn read_input_texts(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read input file {}", path.display()))?;

    if content.trim_start().starts_with('[') {
        let items: Vec<Value> = serde_json::from_str(&content)
            .with_context(|| format!("{} is not a JSON array", path.display()))?;
        return Ok(items
            .into_iter()
            .map(|item| match item {
                Value::String(text) => text,
                _ => String::new(),
            })
            .collect());
    }

    Ok(content.lines().map(str::to_string).collect())
}

/// Classify texts given on the command line or in a file.
fn predict(args: PredictArgs, cli_args: &PolarityArgs) -> Result<()> {
    let mut texts = args.texts.clone();
    if let Some(input) = &args.input {
        texts.extend(read_input_texts(input)?);
    }
    if texts.is_empty() {
        bail!("nothing to classify; pass TEXT arguments or --input");
    }

    let config = PredictorConfig {
        unknown_terms_as_neutral: !args.classify_unknown,
    };
    let predictor = Predictor::open(&args.artifacts, config)
        .with_context(|| format!("failed to load artifacts from {}", args.artifacts.display()))?;

    let start = Instant::now();
    let results = predictor.predict_batch(&texts);
    let predictions = texts
        .into_iter()
        .zip(results)
        .map(|(text, result)| {
            let probabilities = if args.probabilities {
                predictor.predict_proba(&text).map(ProbabilityView::from)
            } else {
                None
            };
            PredictionRecord {
                text,
                label: result.label,
                confidence: result.confidence,
                probabilities,
            }
        })
        .collect();

    let results = PredictionResults {
        predictions,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    output_result("Predictions", &results, cli_args)?;
    Ok(())
}

/// Interactive loop, training first when no artifacts exist yet.
fn repl(args: ReplArgs, cli_args: &PolarityArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let human = cli_args.output_format == OutputFormat::Human;

    if !artifacts_exist(&args.artifacts) {
        let Some(data) = &args.data else {
            bail!(
                "no artifacts in {}; pass --data to train first",
                args.artifacts.display()
            );
        };
        if human && cli_args.verbosity() > 0 {
            println!("No artifacts found, training on {}...", data.display());
        }
        let storage = FileStorage::new(FileStorageConfig::new(&args.artifacts))?;
        let report = full_pipeline(data, &storage, config.clone())
            .with_context(|| format!("training on {} failed", data.display()))?;
        if human && cli_args.verbosity() > 0 {
            println!("Accuracy: {:.4}", report.metrics.accuracy);
            println!("{}", report.classification_report());
        }
    }

    let predictor = Predictor::open(&args.artifacts, config.predictor)
        .with_context(|| format!("failed to load artifacts from {}", args.artifacts.display()))?;

    if human && cli_args.verbosity() > 0 {
        println!("Type a sentence to classify, or 'exit' to quit.");
    }
    let stdin = io::stdin();
    let stdout = io::stdout();
    run_repl(
        &predictor,
        stdin.lock(),
        stdout.lock(),
        cli_args.output_format,
    )?;
    Ok(())
}

/// Read lines from `input` and answer each on `output` until `exit`, `quit`
/// or end of input. Returns the number of lines classified.
pub fn run_repl<R: BufRead, W: Write>(
    predictor: &Predictor,
    mut input: R,
    mut output: W,
    format: OutputFormat,
) -> io::Result<usize> {
    let mut answered = 0;
    let mut line = String::new();

    loop {
        if format == OutputFormat::Human {
            write!(output, "> ")?;
            output.flush()?;
        }

        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let text = line.trim();
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }

        let result = predictor.predict_single(text);
        match format {
            OutputFormat::Human => writeln!(output, "{}", format_prediction(&result))?,
            OutputFormat::Json => {
                let record = PredictionRecord {
                    text: text.to_string(),
                    label: result.label,
                    confidence: result.confidence,
                    probabilities: None,
                };
                let json = serde_json::to_string(&record).map_err(io::Error::other)?;
                writeln!(output, "{json}")?;
            }
        }
        answered += 1;
    }

    Ok(answered)
}

/// Show the manifest of a saved artifact set.
fn inspect(args: InspectArgs, cli_args: &PolarityArgs) -> Result<()> {
    if !args.artifacts.is_dir() {
        bail!(
            "artifact directory {} does not exist",
            args.artifacts.display()
        );
    }
    let storage = FileStorage::new(FileStorageConfig::new(&args.artifacts))?;

    let manifest = ArtifactSet::read_manifest(&storage)
        .with_context(|| format!("failed to read manifest in {}", args.artifacts.display()))?;
    let vocabulary = if args.vocabulary {
        let set = ArtifactSet::load(&storage).with_context(|| {
            format!("failed to load artifacts from {}", args.artifacts.display())
        })?;
        Some(set.vectorizer().terms().to_vec())
    } else {
        None
    };

    let summary = ArtifactSummary {
        path: args.artifacts.display().to_string(),
        manifest,
        vocabulary,
    };
    output_result("Artifacts", &summary, cli_args)?;
    Ok(())
}
