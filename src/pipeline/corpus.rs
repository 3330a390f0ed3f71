//! Labelled training corpus loading.
//!
//! A corpus is a CSV file with a header row or a JSON array of objects. Only
//! two columns matter: the text and its sentiment label. Rows with an empty
//! or missing text or label, or a label outside negative/neutral/positive,
//! are skipped and counted in [`CorpusStats`]; a missing column is fatal.
//!
//! ```csv
//! tweet_id,airline_sentiment,text
//! 1,positive,@airline I love this airline!
//! 2,negative,Worst flight ever.
//! ```

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PolarityError, Result};
use crate::ml::label::{NUM_CLASSES, Sentiment};

/// Key used for labels in JSON corpora when the configured label column is absent.
const JSON_LABEL_KEY: &str = "label";

/// One labelled training example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSample {
    /// The raw, unnormalized text.
    pub text: String,
    /// The sentiment label.
    pub label: Sentiment,
}

impl RawSample {
    /// Create a new sample.
    pub fn new<S: Into<String>>(text: S, label: Sentiment) -> Self {
        RawSample {
            text: text.into(),
            label,
        }
    }
}

/// Column names of the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Column holding the text.
    pub text_column: String,
    /// Column holding the label.
    pub label_column: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            text_column: "text".to_string(),
            label_column: "airline_sentiment".to_string(),
        }
    }
}

impl CorpusConfig {
    /// Check that both column names are set.
    pub fn validate(&self) -> Result<()> {
        if self.text_column.trim().is_empty() || self.label_column.trim().is_empty() {
            return Err(PolarityError::invalid_config(
                "corpus column names must not be empty",
            ));
        }
        Ok(())
    }
}

/// Counts gathered while loading a corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStats {
    /// Data rows read, excluding the header.
    pub rows: usize,
    /// Rows turned into samples.
    pub loaded: usize,
    /// Rows the reader could not parse.
    pub malformed: usize,
    /// Rows with an empty or missing text.
    pub missing_text: usize,
    /// Rows with an empty or missing label.
    pub missing_label: usize,
    /// Rows whose label is not a known sentiment.
    pub unknown_label: usize,
    /// Loaded samples per class, in [`Sentiment::ALL`] order.
    pub class_counts: [usize; NUM_CLASSES],
}

impl CorpusStats {
    /// Number of rows that did not become samples.
    pub fn skipped(&self) -> usize {
        self.malformed + self.missing_text + self.missing_label + self.unknown_label
    }

    /// Number of loaded samples of `label`.
    pub fn count(&self, label: Sentiment) -> usize {
        self.class_counts[label.index()]
    }
}

/// Loaded samples together with their load statistics.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    samples: Vec<RawSample>,
    stats: CorpusStats,
}

impl Corpus {
    /// Build a corpus from samples already in memory.
    pub fn from_samples(samples: Vec<RawSample>) -> Self {
        let mut stats = CorpusStats {
            rows: samples.len(),
            loaded: samples.len(),
            ..CorpusStats::default()
        };
        for sample in &samples {
            stats.class_counts[sample.label.index()] += 1;
        }
        Corpus { samples, stats }
    }

    /// The loaded samples, in file order.
    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    /// Load statistics.
    pub fn stats(&self) -> &CorpusStats {
        &self.stats
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample was loaded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Split into samples and statistics.
    pub fn into_parts(self) -> (Vec<RawSample>, CorpusStats) {
        (self.samples, self.stats)
    }

    fn push_row(&mut self, line: u64, text: Option<&str>, label: Option<&str>) {
        self.stats.rows += 1;

        let text = match text {
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                debug!("line {line}: skipping row without text");
                self.stats.missing_text += 1;
                return;
            }
        };
        let label = match label.map(str::trim) {
            Some(label) if !label.is_empty() => label,
            _ => {
                debug!("line {line}: skipping row without label");
                self.stats.missing_label += 1;
                return;
            }
        };
        let Some(label) = Sentiment::parse_label(label) else {
            debug!("line {line}: skipping row with unknown label {label:?}");
            self.stats.unknown_label += 1;
            return;
        };

        self.stats.loaded += 1;
        self.stats.class_counts[label.index()] += 1;
        self.samples.push(RawSample::new(text, label));
    }

    fn skip_malformed(&mut self, line: u64, reason: &str) {
        debug!("line {line}: skipping malformed row: {reason}");
        self.stats.rows += 1;
        self.stats.malformed += 1;
    }

    fn log_summary(&self, source: &str) {
        let stats = &self.stats;
        info!(
            "loaded {} samples from {} ({} negative, {} neutral, {} positive)",
            stats.loaded,
            source,
            stats.count(Sentiment::Negative),
            stats.count(Sentiment::Neutral),
            stats.count(Sentiment::Positive)
        );
        if stats.skipped() > 0 {
            warn!(
                "skipped {} of {} rows in {}: {} malformed, {} without text, \
                 {} without label, {} with unknown label",
                stats.skipped(),
                stats.rows,
                source,
                stats.malformed,
                stats.missing_text,
                stats.missing_label,
                stats.unknown_label
            );
        }
    }
}

/// File formats a corpus can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusFormat {
    /// Comma separated values with a header row.
    Csv,
    /// A JSON array of objects.
    Json,
}

impl CorpusFormat {
    /// Guess the format from the file extension; anything but `.json` is CSV.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => CorpusFormat::Json,
            _ => CorpusFormat::Csv,
        }
    }
}

/// Load a corpus file, picking the format from its extension.
pub fn load<P: AsRef<Path>>(path: P, config: &CorpusConfig) -> Result<Corpus> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        PolarityError::data(format!("cannot open corpus {}: {e}", path.display()))
    })?;
    let reader = BufReader::new(file);

    let corpus = match CorpusFormat::from_path(path) {
        CorpusFormat::Csv => parse_csv(reader, config),
        CorpusFormat::Json => parse_json(reader, config),
    }
    .map_err(|e| match e {
        PolarityError::Data(msg) => PolarityError::data(format!("{}: {msg}", path.display())),
        other => other,
    })?;

    corpus.log_summary(&path.display().to_string());
    Ok(corpus)
}

/// Read a CSV corpus with a header row.
pub fn read_csv<R: Read>(reader: R, config: &CorpusConfig) -> Result<Corpus> {
    let corpus = parse_csv(reader, config)?;
    corpus.log_summary("csv input");
    Ok(corpus)
}

/// Read a JSON corpus: an array of objects.
///
/// The label is taken from the configured label column, falling back to a
/// `label` key.
pub fn read_json<R: Read>(reader: R, config: &CorpusConfig) -> Result<Corpus> {
    let corpus = parse_json(reader, config)?;
    corpus.log_summary("json input");
    Ok(corpus)
}

fn parse_csv<R: Read>(reader: R, config: &CorpusConfig) -> Result<Corpus> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let text_index = column_index(&headers, &config.text_column)?;
    let label_index = column_index(&headers, &config.label_column)?;

    let mut corpus = Corpus::default();
    for (row, record) in csv_reader.records().enumerate() {
        // Header is line 1.
        let fallback_line = row as u64 + 2;
        match record {
            Ok(record) => {
                let line = record.position().map_or(fallback_line, |p| p.line());
                corpus.push_row(line, record.get(text_index), record.get(label_index));
            }
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => corpus.skip_malformed(fallback_line, &e.to_string()),
        }
    }

    Ok(corpus)
}

fn column_index(headers: &StringRecord, column: &str) -> Result<usize> {
    headers.iter().position(|h| h == column).ok_or_else(|| {
        PolarityError::data(format!(
            "missing column {column:?} (found: {})",
            headers.iter().collect::<Vec<_>>().join(", ")
        ))
    })
}

fn parse_json<R: Read>(reader: R, config: &CorpusConfig) -> Result<Corpus> {
    let value: Value = serde_json::from_reader(reader)
        .map_err(|e| PolarityError::data(format!("invalid JSON corpus: {e}")))?;
    let Value::Array(rows) = value else {
        return Err(PolarityError::data(
            "JSON corpus must be an array of objects",
        ));
    };

    let mut corpus = Corpus::default();
    for (index, row) in rows.iter().enumerate() {
        let line = index as u64 + 1;
        let Some(object) = row.as_object() else {
            corpus.skip_malformed(line, "not an object");
            continue;
        };
        let text = object.get(&config.text_column).and_then(Value::as_str);
        let label = object
            .get(&config.label_column)
            .or_else(|| object.get(JSON_LABEL_KEY))
            .and_then(Value::as_str);
        corpus.push_row(line, text, label);
    }

    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;

    const CSV: &str = "\
tweet_id,airline_sentiment,text
1,positive,I love this airline!
2,negative,Worst flight ever.
3,NEUTRAL ,It was okay.
4,,No label here
5,positive,
6,angry,Unknown label
7,Negative,\"Quoted, with comma\"
";

    #[test]
    fn test_csv_skips_and_counts() {
        let corpus = read_csv(CSV.as_bytes(), &CorpusConfig::default()).unwrap();
        let stats = corpus.stats();

        assert_eq!(stats.rows, 7);
        assert_eq!(stats.loaded, 4);
        assert_eq!(stats.missing_label, 1);
        assert_eq!(stats.missing_text, 1);
        assert_eq!(stats.unknown_label, 1);
        assert_eq!(stats.skipped(), 3);
        assert_eq!(stats.class_counts, [2, 1, 1]);

        assert_eq!(
            corpus.samples()[0],
            RawSample::new("I love this airline!", Sentiment::Positive)
        );
        assert_eq!(corpus.samples()[2].label, Sentiment::Neutral);
        assert_eq!(corpus.samples()[3].text, "Quoted, with comma");
    }

    #[test]
    fn test_csv_missing_column() {
        let err =
            read_csv("id,text\n1,hello\n".as_bytes(), &CorpusConfig::default()).unwrap_err();
        match err {
            PolarityError::Data(msg) => assert!(msg.contains("airline_sentiment"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_csv_custom_columns_and_ragged_rows() {
        let config = CorpusConfig {
            text_column: "body".to_string(),
            label_column: "label".to_string(),
        };
        let csv = "label,body\npositive,great\nnegative\n";
        let corpus = read_csv(csv.as_bytes(), &config).unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.stats().missing_text, 1);
    }

    #[test]
    fn test_json_corpus() {
        let json = r#"[
            {"text": "I love this airline!", "label": "positive"},
            {"text": "Worst flight ever.", "airline_sentiment": "negative"},
            {"text": null, "label": "neutral"},
            {"text": 12, "label": "neutral"},
            "not an object",
            {"text": "It was okay.", "label": "Neutral"}
        ]"#;
        let corpus = read_json(json.as_bytes(), &CorpusConfig::default()).unwrap();
        let stats = corpus.stats();
        assert_eq!(stats.rows, 6);
        assert_eq!(stats.loaded, 3);
        assert_eq!(stats.missing_text, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.class_counts, [1, 1, 1]);
    }

    #[test]
    fn test_json_must_be_array() {
        assert!(matches!(
            read_json(r#"{"text": "x"}"#.as_bytes(), &CorpusConfig::default()),
            Err(PolarityError::Data(_))
        ));
    }

    #[test]
    fn test_load_by_extension() {
        let dir = TempDir::new().unwrap();

        let csv_path = dir.path().join("tweets.csv");
        std::fs::write(&csv_path, CSV).unwrap();
        assert_eq!(CorpusFormat::from_path(&csv_path), CorpusFormat::Csv);
        assert_eq!(load(&csv_path, &CorpusConfig::default()).unwrap().len(), 4);

        let json_path = dir.path().join("tweets.JSON");
        let mut file = File::create(&json_path).unwrap();
        write!(file, r#"[{{"text": "fine", "label": "neutral"}}]"#).unwrap();
        assert_eq!(CorpusFormat::from_path(&json_path), CorpusFormat::Json);
        assert_eq!(load(&json_path, &CorpusConfig::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.csv");
        match load(&path, &CorpusConfig::default()) {
            Err(PolarityError::Data(msg)) => assert!(msg.contains("absent.csv")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_from_samples_counts_classes() {
        let corpus = Corpus::from_samples(vec![
            RawSample::new("a", Sentiment::Positive),
            RawSample::new("b", Sentiment::Positive),
            RawSample::new("c", Sentiment::Negative),
        ]);
        assert_eq!(corpus.stats().class_counts, [1, 0, 2]);
        assert_eq!(corpus.stats().skipped(), 0);
    }
}
