use std::path::{Path, PathBuf};

use tempfile::TempDir;

use polarity::error::{PolarityError, Result};
use polarity::ml::label::Sentiment;
use polarity::pipeline::config::PipelineConfig;
use polarity::pipeline::predictor::{PredictionResult, Predictor, PredictorConfig};
use polarity::pipeline::trainer::{Trainer, full_pipeline};
use polarity::storage::file::{FileStorage, FileStorageConfig};

const POSITIVE: &[&str] = &[
    "I love this airline!",
    "Love the crew, great service",
    "Great flight, love it",
    "Thanks for the great service!",
    "Amazing crew, love flying with you",
    "Best airline ever, thank you",
    "Great experience, friendly crew",
    "Love the seats and great food",
    "Thank you for an amazing flight",
    "Friendly staff, great airline",
    "Awesome service, love this airline",
    "Great crew, thanks again",
];

const NEGATIVE: &[&str] = &[
    "Worst flight ever.",
    "Flight delayed again, terrible service",
    "Lost my bag, worst trip",
    "Terrible customer service, delayed flight",
    "Cancelled flight and rude staff",
    "Worst experience, never again",
    "Delayed for hours, terrible",
    "Rude crew and lost luggage",
    "Flight cancelled, worst service ever",
    "Terrible delay, awful trip",
    "My bag is lost, awful service",
    "Delayed again, worst trip",
];

const NEUTRAL: &[&str] = &[
    "It was okay.",
    "What time does the flight board?",
    "Is there wifi on the flight?",
    "Flight to Boston tomorrow",
    "Can I change my seat?",
    "Which gate for the Denver flight?",
    "Need to check my reservation",
    "Flying to Chicago on Monday",
    "Is the flight on time?",
    "How do I change my reservation?",
    "Booking a flight for next week",
    "What is the baggage policy?",
];

fn labelled_rows() -> Vec<(&'static str, &'static str)> {
    let mut rows = Vec::new();
    for (label, texts) in [("positive", POSITIVE), ("negative", NEGATIVE), ("neutral", NEUTRAL)] {
        rows.extend(texts.iter().map(|text| (label, *text)));
    }
    rows
}

fn write_csv(path: &Path, rows: &[(&str, &str)]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["airline_sentiment", "text"])?;
    for (label, text) in rows {
        writer.write_record([label, text])?;
    }
    writer.flush()?;
    Ok(())
}

fn tweets_csv(dir: &TempDir) -> Result<PathBuf> {
    let path = dir.path().join("tweets.csv");
    let mut rows = labelled_rows();
    rows.push(("positive", ""));
    rows.push(("mixed", "Great food, rude staff"));
    write_csv(&path, &rows)?;
    Ok(path)
}

fn file_storage(path: &Path) -> Result<FileStorage> {
    FileStorage::new(FileStorageConfig::new(path))
}

#[test]
fn test_train_save_and_serve_from_csv() -> Result<()> {
    let dir = TempDir::new()?;
    let data = tweets_csv(&dir)?;
    let artifacts = dir.path().join("model");

    let report = full_pipeline(&data, &file_storage(&artifacts)?, PipelineConfig::default())?;
    assert_eq!(report.corpus.rows, 38);
    assert_eq!(report.corpus.loaded, 36);
    assert_eq!(report.corpus.missing_text, 1);
    assert_eq!(report.corpus.unknown_label, 1);
    assert_eq!(report.train_size, 30);
    assert_eq!(report.test_size, 6);
    assert_eq!(report.metrics.support, 6);
    assert!(report.vocabulary_size > 0);
    assert!(report.classification_report().contains("weighted avg"));

    let predictor = Predictor::open(&artifacts, PredictorConfig::default())?;
    let result = predictor.predict_single("I love this airline!");
    assert_eq!(result.label, Sentiment::Positive);
    assert!(result.confidence > 0.5, "{result:?}");
    Ok(())
}

#[test]
fn test_persisted_artifacts_predict_identically() -> Result<()> {
    let dir = TempDir::new()?;
    let data = tweets_csv(&dir)?;

    let mut trainer = Trainer::new(PipelineConfig::default())?;
    trainer.fit_path(&data)?;
    let storage = file_storage(&dir.path().join("model"))?;
    trainer.save(&storage)?;

    let in_memory = trainer.predictor()?;
    let loaded = Predictor::load(&storage)?;
    assert_eq!(loaded.artifacts().id(), in_memory.artifacts().id());

    let texts = [
        "I love this airline!",
        "Worst flight ever.",
        "It was okay.",
        "delayed crew, great seats",
        "",
        "zebra",
    ];
    assert_eq!(loaded.predict_batch(&texts), in_memory.predict_batch(&texts));
    for text in texts {
        assert_eq!(loaded.predict_proba(text), in_memory.predict_proba(text));
    }
    Ok(())
}

#[test]
fn test_json_corpus_trains_like_csv() -> Result<()> {
    let dir = TempDir::new()?;
    let rows: Vec<serde_json::Value> = labelled_rows()
        .into_iter()
        .enumerate()
        .map(|(i, (label, text))| {
            // Half the rows use the generic label key.
            if i % 2 == 0 {
                serde_json::json!({ "airline_sentiment": label, "text": text })
            } else {
                serde_json::json!({ "label": label, "text": text })
            }
        })
        .collect();
    let json_path = dir.path().join("tweets.json");
    std::fs::write(&json_path, serde_json::to_string(&rows)?)?;

    let csv_path = dir.path().join("tweets.csv");
    write_csv(&csv_path, &labelled_rows())?;

    let mut from_json = Trainer::new(PipelineConfig::default())?;
    let mut from_csv = Trainer::new(PipelineConfig::default())?;
    let json_report = from_json.fit_path(&json_path)?;
    let csv_report = from_csv.fit_path(&csv_path)?;

    assert_eq!(json_report.corpus.loaded, 36);
    assert_eq!(json_report.metrics, csv_report.metrics);
    assert_eq!(json_report.vocabulary_size, csv_report.vocabulary_size);
    Ok(())
}

#[test]
fn test_missing_class_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("two_classes.csv");
    let rows: Vec<_> = labelled_rows()
        .into_iter()
        .filter(|(label, _)| *label != "neutral")
        .collect();
    write_csv(&path, &rows)?;

    let artifacts = dir.path().join("model");
    let err = full_pipeline(&path, &file_storage(&artifacts)?, PipelineConfig::default())
        .unwrap_err();
    match err {
        PolarityError::InvalidTrainingSet(msg) => assert!(msg.contains("neutral"), "{msg}"),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!artifacts.join("artifacts.json").exists());
    Ok(())
}

#[test]
fn test_missing_column_is_a_data_error() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("tweets.csv");
    write_csv(&path, &labelled_rows())?;

    let mut config = PipelineConfig::default();
    config.corpus.label_column = "sentiment".to_string();
    let err = Trainer::new(config)?.fit_path(&path).unwrap_err();
    match err {
        PolarityError::Data(msg) => assert!(msg.contains("sentiment"), "{msg}"),
        other => panic!("unexpected error {other:?}"),
    }
    Ok(())
}

#[test]
fn test_inputs_without_signal_answer_neutral() -> Result<()> {
    let dir = TempDir::new()?;
    let data = tweets_csv(&dir)?;
    let mut trainer = Trainer::new(PipelineConfig::default())?;
    trainer.fit_path(&data)?;
    let predictor = trainer.predictor()?;

    assert_eq!(predictor.predict_single(""), PredictionResult::NO_SIGNAL);
    assert_eq!(
        predictor.predict_batch(&["exit", "quit", ""]),
        vec![PredictionResult::NO_SIGNAL; 3]
    );

    let batch = predictor.predict_batch(&["", "I love this airline!", "   "]);
    assert!(batch[0].is_no_signal());
    assert_eq!(batch[1].label, Sentiment::Positive);
    assert!(batch[2].is_no_signal());
    Ok(())
}

#[test]
fn test_training_is_deterministic() -> Result<()> {
    let dir = TempDir::new()?;
    let data = tweets_csv(&dir)?;

    let mut first = Trainer::new(PipelineConfig::default())?;
    let mut second = Trainer::new(PipelineConfig::default())?;
    assert_eq!(first.fit_path(&data)?, second.fit_path(&data)?);

    let text = "Great crew, terrible delay";
    assert_eq!(
        first.predictor()?.predict_proba(text),
        second.predictor()?.predict_proba(text)
    );
    Ok(())
}
