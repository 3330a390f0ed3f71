//! Persisted artifact sets.
//!
//! An [`ArtifactSet`] is everything a predictor needs: the normalizer
//! settings, the fitted vectorizer and the fitted classifier. It is stored as
//! three files in a [`Storage`]:
//!
//! | Name             | Content                                        |
//! |------------------|------------------------------------------------|
//! | `vectorizer.bin` | framed normalizer settings + vocabulary + IDF  |
//! | `classifier.bin` | framed weights, biases and class order         |
//! | `artifacts.json` | manifest: set id, blob checksums, metrics      |
//!
//! Every blob is framed as
//!
//! ```text
//! magic "PLRT" | version u32 | set id [16] | crc32 u32 | length u64 | payload
//! ```
//!
//! with little-endian integers and a bincode payload. Both blobs carry the id
//! of their set, so a blob from another training run is rejected.
//!
//! Saving removes the old manifest, writes both blobs through temp files and
//! renames, then writes the new manifest last. A reader either sees a
//! complete set or no manifest at all.

use std::io::{self, Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::normalizer::NormalizerConfig;
use crate::error::{PolarityError, Result};
use crate::ml::label::Sentiment;
use crate::ml::logistic::{FitReport, LogisticRegression};
use crate::ml::metrics::Metrics;
use crate::ml::tfidf::TfIdfVectorizer;
use crate::storage::Storage;

/// Version of the blob frame and payload layout.
pub const FORMAT_VERSION: u32 = 1;

/// Leading bytes of every blob.
pub const MAGIC: [u8; 4] = *b"PLRT";

/// Blob holding the normalizer settings and the fitted vectorizer.
pub const VECTORIZER_BLOB: &str = "vectorizer.bin";

/// Blob holding the fitted classifier.
pub const CLASSIFIER_BLOB: &str = "classifier.bin";

/// Manifest file name.
pub const MANIFEST: &str = "artifacts.json";

/// Lock serialising writers of one storage.
pub const WRITE_LOCK: &str = "write";

const HEADER_LEN: usize = 4 + 4 + 16 + 4 + 8;

/// Name, size and checksum of one stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    /// File name in the storage.
    pub name: String,
    /// CRC32 of the whole file.
    pub checksum: u32,
    /// File length in bytes.
    pub length: u64,
}

impl BlobEntry {
    fn describe(name: &str, bytes: &[u8]) -> Self {
        BlobEntry {
            name: name.to_string(),
            checksum: crc32fast::hash(bytes),
            length: bytes.len() as u64,
        }
    }
}

/// JSON manifest written after the blobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Identity of the artifact set.
    pub id: Uuid,
    /// Blob format version.
    pub format_version: u32,
    /// When the set was created.
    pub created_at: DateTime<Utc>,
    /// Stored blobs.
    pub blobs: Vec<BlobEntry>,
    /// Number of features.
    pub vocabulary_size: usize,
    /// Class order of the classifier.
    pub classes: Vec<Sentiment>,
    /// Optimizer outcome.
    pub fit: Option<FitReport>,
    /// Held-out evaluation of the training run.
    pub metrics: Option<Metrics>,
}

impl ArtifactManifest {
    fn blob(&self, name: &str) -> Result<&BlobEntry> {
        self.blobs.iter().find(|b| b.name == name).ok_or_else(|| {
            PolarityError::artifact_corrupt(format!("{MANIFEST} does not list {name}"))
        })
    }
}

/// A fitted normalizer/vectorizer/classifier triple that is saved and loaded
/// as a unit.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    id: Uuid,
    created_at: DateTime<Utc>,
    normalizer: NormalizerConfig,
    vectorizer: TfIdfVectorizer,
    classifier: LogisticRegression,
    metrics: Option<Metrics>,
}

impl ArtifactSet {
    /// Bundle fitted components under a fresh set id.
    pub fn new(
        normalizer: NormalizerConfig,
        vectorizer: TfIdfVectorizer,
        classifier: LogisticRegression,
    ) -> Result<Self> {
        if !vectorizer.is_fitted() {
            return Err(PolarityError::not_fitted("vectorizer"));
        }
        if !classifier.is_fitted() {
            return Err(PolarityError::not_fitted("classifier"));
        }
        if vectorizer.vocabulary_size() != classifier.n_features() {
            return Err(PolarityError::length_mismatch(format!(
                "vectorizer has {} features, classifier expects {}",
                vectorizer.vocabulary_size(),
                classifier.n_features()
            )));
        }

        Ok(ArtifactSet {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            normalizer,
            vectorizer,
            classifier,
            metrics: None,
        })
    }

    /// Attach the held-out evaluation of the run that produced this set.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Identity of the set.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Normalizer settings used at training time.
    pub fn normalizer_config(&self) -> &NormalizerConfig {
        &self.normalizer
    }

    /// The fitted vectorizer.
    pub fn vectorizer(&self) -> &TfIdfVectorizer {
        &self.vectorizer
    }

    /// The fitted classifier.
    pub fn classifier(&self) -> &LogisticRegression {
        &self.classifier
    }

    /// Held-out metrics, if recorded.
    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// Whether `storage` holds an artifact manifest.
    pub fn exists(storage: &dyn Storage) -> bool {
        storage.file_exists(MANIFEST)
    }

    /// Write the set to `storage`, replacing any previous set.
    ///
    /// Fails with a storage error when another writer holds the write lock.
    pub fn save(&self, storage: &dyn Storage) -> Result<ArtifactManifest> {
        let _lock = storage.lock_manager().acquire_lock(WRITE_LOCK)?;

        let features = encode_blob(&self.id, &(&self.normalizer, &self.vectorizer))?;
        let classifier = encode_blob(&self.id, &self.classifier)?;

        let manifest = ArtifactManifest {
            id: self.id,
            format_version: FORMAT_VERSION,
            created_at: self.created_at,
            blobs: vec![
                BlobEntry::describe(VECTORIZER_BLOB, &features),
                BlobEntry::describe(CLASSIFIER_BLOB, &classifier),
            ],
            vocabulary_size: self.vectorizer.vocabulary_size(),
            classes: self.classifier.classes().to_vec(),
            fit: self.classifier.fit_report(),
            metrics: self.metrics.clone(),
        };
        let manifest_json = serde_json::to_vec_pretty(&manifest)?;

        storage.delete_file(MANIFEST)?;
        storage.write_atomic(VECTORIZER_BLOB, &features)?;
        storage.write_atomic(CLASSIFIER_BLOB, &classifier)?;
        storage.sync()?;
        storage.write_atomic(MANIFEST, &manifest_json)?;
        storage.sync()?;

        info!(
            "saved artifact set {} to {} ({} + {} bytes)",
            self.id,
            storage.location(),
            features.len(),
            classifier.len()
        );
        Ok(manifest)
    }

    /// Read only the manifest of the set stored in `storage`.
    pub fn read_manifest(storage: &dyn Storage) -> Result<ArtifactManifest> {
        if !storage.file_exists(MANIFEST) {
            return Err(PolarityError::artifact_not_found(format!(
                "no {MANIFEST} in {}",
                storage.location()
            )));
        }
        let bytes = storage.read_all(MANIFEST)?;
        let manifest: ArtifactManifest = serde_json::from_slice(&bytes).map_err(|e| {
            PolarityError::artifact_corrupt(format!(
                "{MANIFEST} in {}: {e}",
                storage.location()
            ))
        })?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(PolarityError::artifact_corrupt(format!(
                "{MANIFEST} in {} has format version {}, expected {FORMAT_VERSION}",
                storage.location(),
                manifest.format_version
            )));
        }
        Ok(manifest)
    }

    /// Load and verify the set stored in `storage`.
    pub fn load(storage: &dyn Storage) -> Result<Self> {
        let manifest = Self::read_manifest(storage)?;

        let bytes = read_blob(storage, &manifest, VECTORIZER_BLOB)?;
        let (normalizer, vectorizer): (NormalizerConfig, TfIdfVectorizer) =
            decode_blob(VECTORIZER_BLOB, &bytes, manifest.id)?;

        let bytes = read_blob(storage, &manifest, CLASSIFIER_BLOB)?;
        let classifier: LogisticRegression = decode_blob(CLASSIFIER_BLOB, &bytes, manifest.id)?;

        if !vectorizer.is_fitted() || !classifier.is_fitted() {
            return Err(PolarityError::artifact_corrupt(format!(
                "artifact set {} in {} holds an unfitted component",
                manifest.id,
                storage.location()
            )));
        }
        if vectorizer.vocabulary_size() != classifier.n_features()
            || vectorizer.vocabulary_size() != manifest.vocabulary_size
        {
            return Err(PolarityError::artifact_corrupt(format!(
                "artifact set {} in {}: vocabulary of {} terms, classifier over {} features, \
                 manifest lists {}",
                manifest.id,
                storage.location(),
                vectorizer.vocabulary_size(),
                classifier.n_features(),
                manifest.vocabulary_size
            )));
        }

        debug!(
            "loaded artifact set {} from {} ({} features)",
            manifest.id,
            storage.location(),
            manifest.vocabulary_size
        );
        Ok(ArtifactSet {
            id: manifest.id,
            created_at: manifest.created_at,
            normalizer,
            vectorizer,
            classifier,
            metrics: manifest.metrics,
        })
    }
}

fn read_blob(storage: &dyn Storage, manifest: &ArtifactManifest, name: &str) -> Result<Vec<u8>> {
    let entry = manifest.blob(name)?;
    if !storage.file_exists(name) {
        return Err(PolarityError::artifact_not_found(format!(
            "no {name} in {}",
            storage.location()
        )));
    }

    let bytes = storage.read_all(name)?;
    if bytes.len() as u64 != entry.length || crc32fast::hash(&bytes) != entry.checksum {
        return Err(PolarityError::artifact_corrupt(format!(
            "{name} in {} does not match its manifest entry",
            storage.location()
        )));
    }
    Ok(bytes)
}

/// Frame a serialised payload.
fn encode_blob<T: Serialize>(id: &Uuid, value: &T) -> Result<Vec<u8>> {
    let payload = bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| PolarityError::serialization(format!("failed to encode blob: {e}")))?;

    let mut blob = Vec::with_capacity(HEADER_LEN + payload.len());
    blob.extend_from_slice(&MAGIC);
    blob.write_u32::<LittleEndian>(FORMAT_VERSION)?;
    blob.extend_from_slice(id.as_bytes());
    blob.write_u32::<LittleEndian>(crc32fast::hash(&payload))?;
    blob.write_u64::<LittleEndian>(payload.len() as u64)?;
    blob.extend_from_slice(&payload);
    Ok(blob)
}

struct FrameHeader {
    magic: [u8; 4],
    version: u32,
    id: Uuid,
    checksum: u32,
    length: u64,
}

impl FrameHeader {
    fn read(bytes: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        let version = cursor.read_u32::<LittleEndian>()?;
        let mut id = [0u8; 16];
        cursor.read_exact(&mut id)?;
        let checksum = cursor.read_u32::<LittleEndian>()?;
        let length = cursor.read_u64::<LittleEndian>()?;
        Ok(FrameHeader {
            magic,
            version,
            id: Uuid::from_bytes(id),
            checksum,
            length,
        })
    }
}

/// Verify a frame and decode its payload.
fn decode_blob<T: DeserializeOwned>(name: &str, bytes: &[u8], expected_id: Uuid) -> Result<T> {
    let corrupt = |reason: String| PolarityError::artifact_corrupt(format!("{name}: {reason}"));

    if bytes.len() < HEADER_LEN {
        return Err(corrupt(format!("truncated header ({} bytes)", bytes.len())));
    }
    let header = FrameHeader::read(bytes).map_err(|e| corrupt(e.to_string()))?;
    if header.magic != MAGIC {
        return Err(corrupt("bad magic".to_string()));
    }
    if header.version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "format version {}, expected {FORMAT_VERSION}",
            header.version
        )));
    }
    if header.id != expected_id {
        return Err(corrupt(format!(
            "belongs to artifact set {}, manifest names {expected_id}",
            header.id
        )));
    }

    let payload = &bytes[HEADER_LEN..];
    if payload.len() as u64 != header.length {
        return Err(corrupt(format!(
            "payload is {} bytes, header says {}",
            payload.len(),
            header.length
        )));
    }
    if crc32fast::hash(payload) != header.checksum {
        return Err(corrupt("checksum mismatch".to_string()));
    }

    let (value, consumed) =
        bincode::serde::decode_from_slice::<T, _>(payload, bincode::config::standard())
            .map_err(|e| corrupt(e.to_string()))?;
    if consumed != payload.len() {
        return Err(corrupt(format!(
            "{} trailing bytes after payload",
            payload.len() - consumed
        )));
    }
    Ok(value)
}
