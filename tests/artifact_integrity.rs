use std::fs;
use std::path::Path;

use serde::Serialize;
use tempfile::TempDir;

use polarity::error::{PolarityError, Result};
use polarity::ml::label::Sentiment;
use polarity::ml::logistic::{ClassifierConfig, FitReport};
use polarity::pipeline::artifact::{
    ArtifactSet, CLASSIFIER_BLOB, FORMAT_VERSION, MAGIC, MANIFEST, VECTORIZER_BLOB,
};
use polarity::pipeline::config::PipelineConfig;
use polarity::pipeline::corpus::RawSample;
use polarity::pipeline::predictor::{Predictor, PredictorConfig};
use polarity::pipeline::trainer::Trainer;
use polarity::storage::file::{FileStorage, FileStorageConfig};

fn samples(extra: &str) -> Vec<RawSample> {
    let rows = [
        ("love great crew", Sentiment::Positive),
        ("love great service", Sentiment::Positive),
        ("love great seats", Sentiment::Positive),
        ("terrible delayed flight", Sentiment::Negative),
        ("terrible delayed bags", Sentiment::Negative),
        ("terrible delayed again", Sentiment::Negative),
        ("gate noon today", Sentiment::Neutral),
        ("gate noon tomorrow", Sentiment::Neutral),
        ("gate noon friday", Sentiment::Neutral),
    ];
    rows.iter()
        .map(|(text, label)| RawSample::new(format!("{text} {extra}"), *label))
        .collect()
}

fn save_to(directory: &Path, extra: &str) -> Result<()> {
    let mut trainer = Trainer::new(PipelineConfig::default())?;
    trainer.fit_samples(samples(extra))?;
    trainer.save(&FileStorage::new(FileStorageConfig::new(directory))?)?;
    Ok(())
}

fn open(directory: &Path) -> Result<Predictor> {
    Predictor::open(directory, PredictorConfig::default())
}

/// Persisted classifier fields, rebuilt from the public accessors.
#[derive(Serialize)]
struct ClassifierRecord {
    config: ClassifierConfig,
    classes: Vec<Sentiment>,
    n_features: usize,
    weights: Vec<f64>,
    bias: Vec<f64>,
    report: Option<FitReport>,
}

/// Re-frame the stored classifier after `edit` and update its manifest entry,
/// leaving every checksum valid.
fn rewrite_classifier(directory: &Path, edit: fn(&mut ClassifierRecord)) -> Result<()> {
    let storage = FileStorage::new(FileStorageConfig::new(directory))?;
    let mut manifest = ArtifactSet::read_manifest(&storage)?;
    let predictor = open(directory)?;
    let classifier = predictor.artifacts().classifier();

    let mut record = ClassifierRecord {
        config: classifier.config().clone(),
        classes: classifier.classes().to_vec(),
        n_features: classifier.n_features(),
        weights: Sentiment::ALL
            .iter()
            .flat_map(|&label| classifier.coefficients(label).unwrap().to_vec())
            .collect(),
        bias: Sentiment::ALL
            .iter()
            .map(|&label| classifier.intercept(label).unwrap())
            .collect(),
        report: classifier.fit_report(),
    };
    edit(&mut record);

    let payload = bincode::serde::encode_to_vec(&record, bincode::config::standard())
        .map_err(|e| PolarityError::serialization(e.to_string()))?;
    let mut blob = Vec::new();
    blob.extend_from_slice(&MAGIC);
    blob.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    blob.extend_from_slice(manifest.id.as_bytes());
    blob.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    blob.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    blob.extend_from_slice(&payload);
    fs::write(directory.join(CLASSIFIER_BLOB), &blob)?;

    for entry in manifest.blobs.iter_mut().filter(|e| e.name == CLASSIFIER_BLOB) {
        entry.checksum = crc32fast::hash(&blob);
        entry.length = blob.len() as u64;
    }
    fs::write(directory.join(MANIFEST), serde_json::to_vec_pretty(&manifest)?)?;
    Ok(())
}

#[test]
fn test_saved_directory_layout() -> Result<()> {
    let dir = TempDir::new()?;
    save_to(dir.path(), "")?;

    let mut names: Vec<String> = fs::read_dir(dir.path())?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<_>>()?;
    names.sort();
    assert_eq!(names, vec![MANIFEST, CLASSIFIER_BLOB, VECTORIZER_BLOB]);

    let manifest = ArtifactSet::read_manifest(&FileStorage::new(FileStorageConfig::new(
        dir.path(),
    ))?)?;
    assert_eq!(manifest.classes, Sentiment::ALL.to_vec());
    assert!(manifest.metrics.is_some());
    Ok(())
}

#[test]
fn test_missing_files_are_not_found() -> Result<()> {
    let dir = TempDir::new()?;
    save_to(dir.path(), "")?;
    fs::remove_file(dir.path().join(VECTORIZER_BLOB))?;
    assert!(matches!(open(dir.path()), Err(PolarityError::ArtifactNotFound(_))));

    let dir = TempDir::new()?;
    save_to(dir.path(), "")?;
    fs::remove_file(dir.path().join(MANIFEST))?;
    assert!(matches!(open(dir.path()), Err(PolarityError::ArtifactNotFound(_))));
    Ok(())
}

#[test]
fn test_flipped_byte_is_corrupt() -> Result<()> {
    let dir = TempDir::new()?;
    save_to(dir.path(), "")?;

    let path = dir.path().join(CLASSIFIER_BLOB);
    let mut bytes = fs::read(&path)?;
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&path, bytes)?;

    assert!(matches!(open(dir.path()), Err(PolarityError::ArtifactCorrupt(_))));
    Ok(())
}

#[test]
fn test_truncated_manifest_is_corrupt() -> Result<()> {
    let dir = TempDir::new()?;
    save_to(dir.path(), "")?;

    let path = dir.path().join(MANIFEST);
    let manifest = fs::read_to_string(&path)?;
    fs::write(&path, &manifest[..manifest.len() / 2])?;

    assert!(matches!(open(dir.path()), Err(PolarityError::ArtifactCorrupt(_))));
    Ok(())
}

#[test]
fn test_blobs_from_different_runs_are_rejected() -> Result<()> {
    let first = TempDir::new()?;
    let second = TempDir::new()?;
    save_to(first.path(), "")?;
    save_to(second.path(), "today")?;

    fs::copy(
        second.path().join(CLASSIFIER_BLOB),
        first.path().join(CLASSIFIER_BLOB),
    )?;
    assert!(matches!(open(first.path()), Err(PolarityError::ArtifactCorrupt(_))));
    Ok(())
}

#[test]
fn test_resave_replaces_previous_set() -> Result<()> {
    let dir = TempDir::new()?;
    save_to(dir.path(), "")?;
    let before = open(dir.path())?.artifacts().id();

    save_to(dir.path(), "today")?;
    let after = open(dir.path())?;
    assert_ne!(after.artifacts().id(), before);
    assert_eq!(after.predict_single("love great").label, Sentiment::Positive);
    Ok(())
}

#[test]
fn test_reframed_classifier_still_loads() -> Result<()> {
    let dir = TempDir::new()?;
    save_to(dir.path(), "")?;
    rewrite_classifier(dir.path(), |_| {})?;

    let predictor = open(dir.path())?;
    assert_eq!(predictor.predict_single("love great").label, Sentiment::Positive);
    Ok(())
}

#[test]
fn test_misshapen_classifier_is_corrupt() -> Result<()> {
    let edits: [fn(&mut ClassifierRecord); 5] = [
        |record| record.weights.truncate(1),
        |record| record.bias.truncate(1),
        |record| record.classes.reverse(),
        |record| record.n_features += 1,
        |record| record.weights[0] = f64::NAN,
    ];
    for (case, edit) in edits.into_iter().enumerate() {
        let dir = TempDir::new()?;
        save_to(dir.path(), "")?;
        rewrite_classifier(dir.path(), edit)?;

        match open(dir.path()) {
            Err(PolarityError::ArtifactCorrupt(msg)) => {
                assert!(msg.contains(CLASSIFIER_BLOB), "case {case}: {msg}")
            }
            Err(other) => panic!("case {case}: unexpected error {other:?}"),
            Ok(_) => panic!("case {case}: misshapen classifier loaded"),
        }
    }
    Ok(())
}
