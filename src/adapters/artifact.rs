//! Model artifact adapter: loading, validation and integrity checks.
//!
//! An artifact is one JSON document holding the classifier, one encoder per
//! categorical field and the label encoder. It is parsed and validated as a
//! whole into an [`ActiveModel`]; nothing is partially applied.
//!
//! # Integrity
//!
//! When `manifest.json` sits next to the artifact it must bind the artifact
//! file by SHA-256. When `model.sig` is also present it must be a valid
//! Ed25519 signature over the exact manifest bytes. An [`IntegrityPolicy`]
//! that requires signed models turns a missing manifest, signature or
//! verifying key into a load error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::logistic::{LogisticError, LogisticParams, MultinomialLogistic};
use super::trees::{GradientBoostedTrees, TreeEnsembleParams, TreeError};
use crate::domain::{
    CategoricalEncoder, CategoricalField, EncoderError, EncoderSet, LabelEncoder, FEATURE_NAMES,
};
use crate::ports::RiskClassifier;

/// Artifact file name inside a model directory.
pub const ARTIFACT_FILE: &str = "triage_model.json";

/// Manifest binding model files by hash.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Detached Ed25519 signature over the manifest bytes.
pub const SIGNATURE_FILE: &str = "model.sig";

/// Supported artifact format version.
pub const FORMAT_VERSION: u32 = 1;

/// Supported manifest version.
pub const MANIFEST_VERSION: u32 = 1;

/// Error loading a model artifact. The active model is never touched.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported artifact format version {0}")]
    UnsupportedVersion(u32),

    #[error("Artifact is missing required component: {0}")]
    MissingComponent(&'static str),

    #[error("Feature order does not match the engine: {0}")]
    FeatureOrder(String),

    #[error("Invalid encoder: {0}")]
    Encoder(#[from] EncoderError),

    #[error("Invalid tree ensemble: {0}")]
    Trees(#[from] TreeError),

    #[error("Invalid logistic model: {0}")]
    Logistic(#[from] LogisticError),

    #[error("Classifier has {classifier} classes but label encoder has {labels}")]
    ClassCount { classifier: usize, labels: usize },

    #[error("Integrity check failed: {0}")]
    Integrity(String),
}

impl ModelLoadError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Class lists for each categorical encoder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactEncoders {
    #[serde(default)]
    pub gender: Option<Vec<String>>,
    #[serde(default)]
    pub symptom: Option<Vec<String>>,
    #[serde(default)]
    pub consciousness: Option<Vec<String>>,
    #[serde(default)]
    pub condition: Option<Vec<String>>,
}

/// Serialized classifier, tagged by model family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassifierParams {
    GradientBoostedTrees(TreeEnsembleParams),
    MultinomialLogistic(LogisticParams),
}

/// On-disk model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub trained_at: Option<String>,

    pub feature_names: Vec<String>,

    #[serde(default)]
    pub encoders: Option<ArtifactEncoders>,

    #[serde(default)]
    pub label_encoder: Option<Vec<String>>,

    #[serde(default)]
    pub classifier: Option<ClassifierParams>,
}

/// A fully validated (classifier, encoders, label encoder) triple.
#[derive(Debug)]
pub struct ActiveModel {
    pub classifier: Box<dyn RiskClassifier>,
    pub encoders: EncoderSet,
    pub labels: LabelEncoder,

    /// Short SHA-256 prefix of the artifact bytes
    pub fingerprint: String,

    pub name: Option<String>,
    pub source: Option<PathBuf>,
    pub loaded_at: DateTime<Utc>,
}

/// Summary of the active model for operators.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub fingerprint: String,
    pub name: Option<String>,
    pub kind: &'static str,
    pub num_classes: usize,
    pub source: Option<PathBuf>,
    pub loaded_at: DateTime<Utc>,
    pub vocabulary: BTreeMap<&'static str, Vec<String>>,
}

impl ActiveModel {
    #[must_use]
    pub fn info(&self) -> ModelInfo {
        let vocabulary = CategoricalField::ALL
            .iter()
            .map(|f| (f.artifact_key(), self.encoders.get(*f).classes().to_vec()))
            .collect();
        ModelInfo {
            fingerprint: self.fingerprint.clone(),
            name: self.name.clone(),
            kind: self.classifier.kind(),
            num_classes: self.classifier.num_classes(),
            source: self.source.clone(),
            loaded_at: self.loaded_at,
            vocabulary,
        }
    }
}

/// Compute a short identification fingerprint (first 8 bytes of SHA-256).
#[must_use]
pub fn compute_fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    to_hex(&digest[..8])
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn sha256_hex(bytes: &[u8]) -> String {
    to_hex(&Sha256::digest(bytes))
}

// Constant-time compare for ASCII strings (used for SHA-256 hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn encoder(
    field: CategoricalField,
    classes: Option<Vec<String>>,
    component: &'static str,
) -> Result<CategoricalEncoder, ModelLoadError> {
    let classes = classes.ok_or(ModelLoadError::MissingComponent(component))?;
    Ok(CategoricalEncoder::from_classes(field, classes)?)
}

impl ModelArtifact {
    /// Parse artifact JSON.
    ///
    /// # Errors
    /// Returns error if the document is not a valid artifact.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ModelLoadError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Validate every component and build the active model.
    ///
    /// # Errors
    /// Returns error if any component is missing or inconsistent.
    pub fn into_active(
        self,
        fingerprint: String,
        source: Option<PathBuf>,
    ) -> Result<ActiveModel, ModelLoadError> {
        if self.format_version != FORMAT_VERSION {
            return Err(ModelLoadError::UnsupportedVersion(self.format_version));
        }

        let order_matches = self.feature_names.len() == FEATURE_NAMES.len()
            && self
                .feature_names
                .iter()
                .zip(FEATURE_NAMES)
                .all(|(a, b)| a == b);
        if !order_matches {
            return Err(ModelLoadError::FeatureOrder(format!(
                "expected {FEATURE_NAMES:?}, got {:?}",
                self.feature_names
            )));
        }

        let enc = self
            .encoders
            .ok_or(ModelLoadError::MissingComponent("encoders"))?;
        let encoders = EncoderSet {
            gender: encoder(CategoricalField::Gender, enc.gender, "encoders.gender")?,
            symptom: encoder(CategoricalField::Symptom, enc.symptom, "encoders.symptom")?,
            consciousness: encoder(
                CategoricalField::Consciousness,
                enc.consciousness,
                "encoders.consciousness",
            )?,
            condition: encoder(CategoricalField::Condition, enc.condition, "encoders.condition")?,
        };

        let label_classes = self
            .label_encoder
            .ok_or(ModelLoadError::MissingComponent("label_encoder"))?;
        let labels = LabelEncoder::from_classes(&label_classes)?;

        let classifier: Box<dyn RiskClassifier> = match self
            .classifier
            .ok_or(ModelLoadError::MissingComponent("classifier"))?
        {
            ClassifierParams::GradientBoostedTrees(params) => {
                Box::new(GradientBoostedTrees::from_params(params)?)
            }
            ClassifierParams::MultinomialLogistic(params) => {
                Box::new(MultinomialLogistic::from_params(params)?)
            }
        };

        if classifier.num_classes() != labels.len() {
            return Err(ModelLoadError::ClassCount {
                classifier: classifier.num_classes(),
                labels: labels.len(),
            });
        }

        Ok(ActiveModel {
            classifier,
            encoders,
            labels,
            fingerprint,
            name: self.name,
            source,
            loaded_at: Utc::now(),
        })
    }
}

/// Parse and validate artifact bytes into an active model.
///
/// # Errors
/// Returns error if the artifact is malformed or incomplete.
pub fn parse_active(bytes: &[u8], source: Option<PathBuf>) -> Result<ActiveModel, ModelLoadError> {
    let fingerprint = compute_fingerprint(bytes);
    ModelArtifact::from_json(bytes)?.into_active(fingerprint, source)
}

/// How strictly artifact integrity is enforced.
#[derive(Debug, Clone, Default)]
pub struct IntegrityPolicy {
    /// Refuse artifacts without a manifest and a verified signature
    pub require_signed: bool,

    /// Key that model signatures must verify against
    pub verifying_key: Option<VerifyingKey>,
}

impl IntegrityPolicy {
    /// Decode a base64 Ed25519 verifying key.
    ///
    /// # Errors
    /// Returns error if the key is not 32 bytes of valid base64.
    pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ModelLoadError> {
        use base64::Engine;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64.trim())
            .map_err(|_| ModelLoadError::Integrity("Invalid public key base64".into()))?;
        let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            ModelLoadError::Integrity("Invalid public key length (expected 32 bytes)".into())
        })?;
        VerifyingKey::from_bytes(&bytes)
            .map_err(|_| ModelLoadError::Integrity("Invalid verifying key".into()))
    }
}

/// Manifest written by `seal_model` and checked at load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub version: u32,

    /// Monotonic serial (a CI build number or similar)
    pub serial: u64,

    /// Unix timestamp (seconds) of sealing
    pub created_at: i64,

    /// Random nonce (base64, 16 bytes)
    #[serde(default)]
    pub nonce_b64: Option<String>,

    /// File name → SHA-256 hex
    pub files: BTreeMap<String, String>,
}

/// Resolve a model path to (artifact file, directory holding it).
fn resolve_paths(path: &Path) -> (PathBuf, PathBuf) {
    if path.is_dir() {
        (path.join(ARTIFACT_FILE), path.to_path_buf())
    } else {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        (path.to_path_buf(), dir)
    }
}

/// Read, verify and parse an artifact from a file or model directory.
///
/// # Errors
/// Returns error if reading, integrity verification or validation fails.
pub fn load_artifact(path: &Path, policy: &IntegrityPolicy) -> Result<ActiveModel, ModelLoadError> {
    let (file, dir) = resolve_paths(path);
    let bytes = fs::read(&file).map_err(|e| ModelLoadError::io(&file, e))?;

    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ModelLoadError::Integrity(format!("Unusable artifact path {file:?}")))?;
    verify_integrity(&dir, file_name, &bytes, policy)?;

    parse_active(&bytes, Some(file))
}

/// Check the manifest (and signature) beside an artifact.
///
/// `artifact_bytes` are the bytes that will be parsed, so the hash check
/// covers exactly what gets loaded.
///
/// # Errors
/// Returns error if the policy is not satisfied or any check fails.
pub fn verify_integrity(
    dir: &Path,
    artifact_name: &str,
    artifact_bytes: &[u8],
    policy: &IntegrityPolicy,
) -> Result<(), ModelLoadError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let sig_path = dir.join(SIGNATURE_FILE);

    if !manifest_path.exists() {
        if policy.require_signed {
            return Err(ModelLoadError::Integrity(format!(
                "Signed models required but {MANIFEST_FILE} is missing"
            )));
        }
        tracing::debug!("No {MANIFEST_FILE} beside artifact; skipping hash check");
        return Ok(());
    }

    let manifest_bytes =
        fs::read(&manifest_path).map_err(|e| ModelLoadError::io(&manifest_path, e))?;

    if sig_path.exists() {
        match &policy.verifying_key {
            Some(key) => {
                let sig_bytes = fs::read(&sig_path).map_err(|e| ModelLoadError::io(&sig_path, e))?;
                let sig_bytes: [u8; 64] = sig_bytes.as_slice().try_into().map_err(|_| {
                    ModelLoadError::Integrity("Invalid signature length (expected 64 bytes)".into())
                })?;
                key.verify(&manifest_bytes, &Signature::from_bytes(&sig_bytes))
                    .map_err(|_| ModelLoadError::Integrity("Invalid model signature".into()))?;
            }
            None if policy.require_signed => {
                return Err(ModelLoadError::Integrity(
                    "Signed models required but no verifying key is configured".into(),
                ));
            }
            None => {
                tracing::warn!("{SIGNATURE_FILE} present but no verifying key configured; signature not checked");
            }
        }
    } else if policy.require_signed {
        return Err(ModelLoadError::Integrity(format!(
            "Signed models required but {SIGNATURE_FILE} is missing"
        )));
    }

    let manifest: ModelManifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| ModelLoadError::Integrity(format!("Invalid {MANIFEST_FILE} format: {e}")))?;
    if manifest.version != MANIFEST_VERSION {
        return Err(ModelLoadError::Integrity(format!(
            "Unsupported manifest version: {}",
            manifest.version
        )));
    }
    if !manifest.files.contains_key(artifact_name) {
        return Err(ModelLoadError::Integrity(format!(
            "{MANIFEST_FILE} does not bind {artifact_name}"
        )));
    }

    for (rel, expected_hex) in &manifest.files {
        if rel.contains(['/', '\\']) || rel == ".." {
            return Err(ModelLoadError::Integrity(format!(
                "Manifest entry {rel:?} is not a plain file name"
            )));
        }
        let actual_hex = if rel == artifact_name {
            sha256_hex(artifact_bytes)
        } else {
            let path = dir.join(rel);
            sha256_hex(&fs::read(&path).map_err(|e| ModelLoadError::io(&path, e))?)
        };
        if !constant_time_eq_str(&actual_hex, &expected_hex.to_ascii_lowercase()) {
            return Err(ModelLoadError::Integrity(format!(
                "File hash mismatch for {rel}"
            )));
        }
    }

    tracing::info!(
        "Model manifest verified (serial {}, {} file(s))",
        manifest.serial,
        manifest.files.len()
    );
    Ok(())
}

/// Write `manifest.json` binding the artifact in `dir`, and `model.sig`
/// when a signing key is given. Returns the manifest written.
///
/// # Errors
/// Returns error if the artifact is missing or files cannot be written.
pub fn seal_directory(
    dir: &Path,
    serial: u64,
    nonce_b64: Option<String>,
    signing_key: Option<&SigningKey>,
) -> Result<ModelManifest, ModelLoadError> {
    let artifact = dir.join(ARTIFACT_FILE);
    let bytes = fs::read(&artifact).map_err(|e| ModelLoadError::io(&artifact, e))?;

    let mut files = BTreeMap::new();
    files.insert(ARTIFACT_FILE.to_string(), sha256_hex(&bytes));

    let manifest = ModelManifest {
        version: MANIFEST_VERSION,
        serial,
        created_at: Utc::now().timestamp(),
        nonce_b64,
        files,
    };
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;

    let manifest_path = dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, &manifest_bytes).map_err(|e| ModelLoadError::io(&manifest_path, e))?;

    let sig_path = dir.join(SIGNATURE_FILE);
    match signing_key {
        Some(key) => {
            let sig: Signature = key.sign(&manifest_bytes);
            fs::write(&sig_path, sig.to_bytes()).map_err(|e| ModelLoadError::io(&sig_path, e))?;
        }
        None if sig_path.exists() => {
            // A stale signature would no longer match the new manifest.
            fs::remove_file(&sig_path).map_err(|e| ModelLoadError::io(&sig_path, e))?;
        }
        None => {}
    }

    Ok(manifest)
}
