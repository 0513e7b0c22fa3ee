//! Runtime configuration.
//!
//! Resolved once at process startup and passed into services. Nothing on
//! the assessment or queue path reads environment variables.

use std::fs;
use std::path::{Path, PathBuf};

use crate::adapters::sanitize::DEFAULT_MAX_BYTES;
use crate::adapters::IntegrityPolicy;
use crate::TriageError;

pub const MODEL_PATH_ENV: &str = "MEDTRIAGE_MODEL_PATH";
pub const DB_PATH_ENV: &str = "MEDTRIAGE_DB_PATH";
pub const LOG_MODE_ENV: &str = "MEDTRIAGE_LOG_MODE";
pub const LOG_FILE_ENV: &str = "MEDTRIAGE_LOG_FILE";
pub const LOG_MAX_BYTES_ENV: &str = "MEDTRIAGE_LOG_MAX_BYTES";
pub const REQUIRE_SIGNED_ENV: &str = "MEDTRIAGE_REQUIRE_SIGNED_MODELS";
pub const PUBKEY_B64_ENV: &str = "MEDTRIAGE_MODEL_PUBKEY_B64";
pub const PUBKEY_B64_FILE_ENV: &str = "MEDTRIAGE_MODEL_PUBKEY_B64_FILE";

const DEFAULT_MODEL_PATH: &str = "models";
const DEFAULT_DB_PATH: &str = "medtriage.db";
const DEFAULT_LOG_FILE: &str = "medtriage.log";

/// SQLite in-memory path; rejected because every CLI command is a fresh process.
const SQLITE_IN_MEMORY: &str = ":memory:";

/// Where formatted log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogMode {
    Stderr,
    File(PathBuf),
}

/// Configuration resolved at startup.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub model_path: PathBuf,

    /// SQLite database file
    pub db_path: String,

    pub log_mode: LogMode,

    /// Per-line scan cap for the log sanitizer
    pub log_max_bytes: usize,

    pub require_signed_models: bool,

    /// Base64 Ed25519 verifying key
    pub model_pubkey_b64: Option<String>,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            db_path: DEFAULT_DB_PATH.to_string(),
            log_mode: LogMode::Stderr,
            log_max_bytes: DEFAULT_MAX_BYTES,
            require_signed_models: false,
            model_pubkey_b64: None,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, TriageError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(TriageError::Config(format!("{key}: expected a boolean, got {other:?}"))),
    }
}

fn read_key_file(path: &Path) -> Result<String, TriageError> {
    let content = fs::read_to_string(path)
        .map_err(|e| TriageError::Config(format!("Failed reading public key file {path:?}: {e}")))?;
    let key = content.trim().to_string();
    if key.is_empty() {
        return Err(TriageError::Config(format!("Public key file {path:?} is empty")));
    }
    Ok(key)
}

impl TriageConfig {
    /// Resolve from the process environment.
    ///
    /// # Errors
    /// Returns `Config` for unparseable values.
    pub fn from_env() -> Result<Self, TriageError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns `Config` for unparseable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TriageError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let model_path = get(MODEL_PATH_ENV).map_or(defaults.model_path, PathBuf::from);
        let db_path = get(DB_PATH_ENV).unwrap_or(defaults.db_path);
        if db_path.trim() == SQLITE_IN_MEMORY {
            return Err(TriageError::Config(format!(
                "{DB_PATH_ENV}: queue state must persist between commands; use a database file"
            )));
        }

        let log_mode = match get(LOG_MODE_ENV).as_deref().map(str::trim) {
            None | Some("stderr") => LogMode::Stderr,
            Some("file") => LogMode::File(
                get(LOG_FILE_ENV).map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from),
            ),
            Some(other) => {
                return Err(TriageError::Config(format!(
                    "{LOG_MODE_ENV}: expected stderr or file, got {other:?}"
                )))
            }
        };

        let log_max_bytes = match get(LOG_MAX_BYTES_ENV) {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    TriageError::Config(format!("{LOG_MAX_BYTES_ENV}: expected a positive integer"))
                })?,
            None => defaults.log_max_bytes,
        };

        let require_signed_models = match get(REQUIRE_SIGNED_ENV) {
            Some(v) => parse_bool(REQUIRE_SIGNED_ENV, &v)?,
            None => false,
        };

        let model_pubkey_b64 = match get(PUBKEY_B64_ENV) {
            Some(v) => Some(v.trim().to_string()),
            None => get(PUBKEY_B64_FILE_ENV)
                .map(|p| read_key_file(Path::new(p.trim())))
                .transpose()?,
        };

        Ok(Self {
            model_path,
            db_path,
            log_mode,
            log_max_bytes,
            require_signed_models,
            model_pubkey_b64,
        })
    }

    /// Integrity policy for model loads.
    ///
    /// # Errors
    /// Returns error if the configured public key is invalid.
    pub fn integrity_policy(&self) -> Result<IntegrityPolicy, TriageError> {
        let verifying_key = self
            .model_pubkey_b64
            .as_deref()
            .map(IntegrityPolicy::verifying_key_from_b64)
            .transpose()?;
        Ok(IntegrityPolicy {
            require_signed: self.require_signed_models,
            verifying_key,
        })
    }
}
