//! Output formatting for CLI commands.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, PolarityArgs};
use crate::error::Result;
use crate::ml::label::Sentiment;
use crate::ml::logistic::ClassProbabilities;
use crate::pipeline::artifact::ArtifactManifest;
use crate::pipeline::predictor::PredictionResult;
use crate::pipeline::trainer::TrainingReport;

/// Result structure for a training run.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub artifacts: String,
    pub artifact_id: String,
    pub duration_ms: u64,
    pub report: TrainingReport,
}

/// Probability of every class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityView {
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

impl From<ClassProbabilities> for ProbabilityView {
    fn from(probabilities: ClassProbabilities) -> Self {
        ProbabilityView {
            negative: probabilities.get(Sentiment::Negative),
            neutral: probabilities.get(Sentiment::Neutral),
            positive: probabilities.get(Sentiment::Positive),
        }
    }
}

/// One classified text.
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub text: String,
    pub label: Sentiment,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub probabilities: Option<ProbabilityView>,
}

/// Result structure for prediction.
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResults {
    pub predictions: Vec<PredictionRecord>,
    pub duration_ms: u64,
}

/// Result structure for artifact inspection.
#[derive(Debug, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub path: String,
    pub manifest: ArtifactManifest,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub vocabulary: Option<Vec<String>>,
}

/// Human-readable rendering of a command result.
pub trait HumanReadable {
    fn render_human(&self) -> String;
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize + HumanReadable>(
    message: &str,
    result: &T,
    args: &PolarityArgs,
) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 0 {
                println!("{message}");
                println!();
            }
            print!("{}", result.render_human());
            Ok(())
        }
        OutputFormat::Json => {
            println!("{}", to_json(result, args.pretty)?);
            Ok(())
        }
    }
}

/// Serialize a result as JSON.
pub fn to_json<T: Serialize>(result: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    Ok(json)
}

/// One line answer as printed by the interactive loop.
pub fn format_prediction(result: &PredictionResult) -> String {
    format!(
        "Sentiment: {} (Confidence: {:.2})",
        result.label.display_name(),
        result.confidence
    )
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "═".repeat(title.chars().count()));
}

impl HumanReadable for TrainingSummary {
    fn render_human(&self) -> String {
        let report = &self.report;
        let mut out = String::new();

        heading(&mut out, "Training Summary");
        let _ = writeln!(out, "Artifacts: {} ({})", self.artifacts, self.artifact_id);
        let _ = writeln!(
            out,
            "Corpus: {} loaded, {} skipped of {} rows",
            report.corpus.loaded,
            report.corpus.skipped(),
            report.corpus.rows
        );
        let _ = writeln!(
            out,
            "Split: {} train, {} test",
            report.train_size, report.test_size
        );
        let _ = writeln!(out, "Vocabulary: {} features", report.vocabulary_size);
        let _ = writeln!(
            out,
            "Optimizer: loss {:.6}, gradient norm {:.2e}{}",
            report.fit.final_loss,
            report.fit.gradient_norm,
            if report.fit.converged {
                ""
            } else {
                " (not converged)"
            }
        );
        let _ = writeln!(out, "Duration: {}ms", self.duration_ms);
        let _ = writeln!(out);

        heading(&mut out, "Evaluation");
        let _ = writeln!(out, "Accuracy: {:.4}", report.metrics.accuracy);
        let _ = writeln!(out);
        out.push_str(&report.classification_report());
        let _ = writeln!(out);

        heading(&mut out, "Confusion Matrix");
        out.push_str(&report.metrics.confusion_table());
        out
    }
}

impl HumanReadable for PredictionResults {
    fn render_human(&self) -> String {
        let mut out = String::new();
        heading(&mut out, "Predictions");
        for record in &self.predictions {
            let _ = writeln!(
                out,
                "{:<9} {:.2}  {}",
                record.label.display_name(),
                record.confidence,
                record.text
            );
            if let Some(p) = &record.probabilities {
                let _ = writeln!(
                    out,
                    "          negative {:.3}  neutral {:.3}  positive {:.3}",
                    p.negative, p.neutral, p.positive
                );
            }
        }
        out
    }
}

impl HumanReadable for ArtifactSummary {
    fn render_human(&self) -> String {
        let manifest = &self.manifest;
        let mut out = String::new();

        heading(&mut out, "Artifact Set");
        let _ = writeln!(out, "Path: {}", self.path);
        let _ = writeln!(out, "Id: {}", manifest.id);
        let _ = writeln!(out, "Created: {}", manifest.created_at.to_rfc3339());
        let _ = writeln!(out, "Format version: {}", manifest.format_version);
        let _ = writeln!(out, "Vocabulary: {} features", manifest.vocabulary_size);
        let classes: Vec<&str> = manifest.classes.iter().map(|c| c.as_str()).collect();
        let _ = writeln!(out, "Classes: {}", classes.join(", "));
        for blob in &manifest.blobs {
            let _ = writeln!(
                out,
                "Blob {}: {} (crc32 {:08x})",
                blob.name,
                format_bytes(blob.length),
                blob.checksum
            );
        }

        if let Some(metrics) = &manifest.metrics {
            let _ = writeln!(out);
            heading(&mut out, "Evaluation");
            let _ = writeln!(out, "Accuracy: {:.4}", metrics.accuracy);
            let _ = writeln!(out);
            out.push_str(&metrics.classification_report());
        }

        if let Some(vocabulary) = &self.vocabulary {
            let _ = writeln!(out);
            heading(&mut out, "Vocabulary");
            for (index, term) in vocabulary.iter().enumerate() {
                let _ = writeln!(out, "{index:>6}  {term}");
            }
        }
        out
    }
}

/// Format bytes in human-readable format.
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_format_prediction() {
        let result = PredictionResult {
            label: Sentiment::Positive,
            confidence: 0.8765,
        };
        assert_eq!(
            format_prediction(&result),
            "Sentiment: Positive (Confidence: 0.88)"
        );
        assert_eq!(
            format_prediction(&PredictionResult::NO_SIGNAL),
            "Sentiment: Neutral (Confidence: 0.00)"
        );
    }

    #[test]
    fn test_prediction_results_output() {
        let results = PredictionResults {
            predictions: vec![
                PredictionRecord {
                    text: "Worst flight ever.".to_string(),
                    label: Sentiment::Negative,
                    confidence: 0.5,
                    probabilities: Some(ProbabilityView::from(ClassProbabilities::new([
                        0.5, 0.3, 0.2,
                    ]))),
                },
                PredictionRecord {
                    text: String::new(),
                    label: Sentiment::Neutral,
                    confidence: 0.0,
                    probabilities: None,
                },
            ],
            duration_ms: 1,
        };

        let human = results.render_human();
        assert!(human.starts_with("Predictions\n═══════════\n"));
        assert!(human.contains("Negative  0.50  Worst flight ever."));
        assert!(human.contains("neutral 0.300"));

        let json = to_json(&results, false).unwrap();
        let json: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(json["predictions"][0]["label"], "negative");
        assert_eq!(json["predictions"][0]["probabilities"]["positive"], 0.2);
        assert!(json["predictions"][1].get("probabilities").is_none());
    }
}
