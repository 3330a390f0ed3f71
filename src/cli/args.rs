//! Command line argument parsing for the Polarity CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Polarity - sentiment classification for short social-media text
#[derive(Parser, Debug, Clone)]
#[command(name = "polarity")]
#[command(about = "Train and serve a TF-IDF + logistic regression sentiment classifier")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct PolarityArgs {
    /// Verbosity level (repeat for more: -v normal, -vv info, -vvv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl PolarityArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Train on a labelled corpus and save the artifacts
    Train(TrainArgs),

    /// Predict the sentiment of texts
    Predict(PredictArgs),

    /// Interactive prediction loop
    Repl(ReplArgs),

    /// Show the manifest of saved artifacts
    Inspect(InspectArgs),
}

/// Arguments for training
#[derive(Parser, Debug, Clone)]
pub struct TrainArgs {
    /// Corpus file (.csv with a header row, or .json array of objects)
    #[arg(short, long, value_name = "DATA_FILE")]
    pub data: PathBuf,

    /// Directory receiving the artifacts
    #[arg(short, long, value_name = "ARTIFACT_DIR", env = "POLARITY_ARTIFACTS")]
    pub artifacts: PathBuf,

    /// Pipeline configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Column holding the text
    #[arg(long)]
    pub text_column: Option<String>,

    /// Column holding the label
    #[arg(long)]
    pub label_column: Option<String>,

    /// Fraction of each class held out for evaluation
    #[arg(long)]
    pub test_fraction: Option<f64>,

    /// Split seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Maximum vocabulary size
    #[arg(long)]
    pub max_features: Option<usize>,

    /// Keep stop words
    #[arg(long)]
    pub keep_stop_words: bool,

    /// Overwrite existing artifacts and clear a write lock left by a crashed run
    #[arg(long)]
    pub force: bool,
}

/// Arguments for prediction
#[derive(Parser, Debug, Clone)]
pub struct PredictArgs {
    /// Directory holding the artifacts
    #[arg(short, long, value_name = "ARTIFACT_DIR", env = "POLARITY_ARTIFACTS")]
    pub artifacts: PathBuf,

    /// Texts to classify
    #[arg(value_name = "TEXT")]
    pub texts: Vec<String>,

    /// File of texts: one per line, or a JSON array of strings
    #[arg(short, long, value_name = "INPUT_FILE")]
    pub input: Option<PathBuf>,

    /// Include the probability of every class
    #[arg(long)]
    pub probabilities: bool,

    /// Classify text with no known term instead of answering neutral
    #[arg(long)]
    pub classify_unknown: bool,
}

/// Arguments for the interactive loop
#[derive(Parser, Debug, Clone)]
pub struct ReplArgs {
    /// Directory holding the artifacts
    #[arg(short, long, value_name = "ARTIFACT_DIR", env = "POLARITY_ARTIFACTS")]
    pub artifacts: PathBuf,

    /// Corpus to train on when no artifacts exist yet
    #[arg(short, long, value_name = "DATA_FILE")]
    pub data: Option<PathBuf>,

    /// Pipeline configuration file (JSON) used when training
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

/// Arguments for inspecting artifacts
#[derive(Parser, Debug, Clone)]
pub struct InspectArgs {
    /// Directory holding the artifacts
    #[arg(short, long, value_name = "ARTIFACT_DIR", env = "POLARITY_ARTIFACTS")]
    pub artifacts: PathBuf,

    /// Also list the learned vocabulary
    #[arg(long)]
    pub vocabulary: bool,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
