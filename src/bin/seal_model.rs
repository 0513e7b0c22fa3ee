//! Model sealing utility for medtriage artifacts.
//!
//! Writes `manifest.json` (SHA-256 of `triage_model.json`) beside the
//! artifact and, when a signing seed is available, an Ed25519 signature over
//! the manifest (`model.sig`).
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin seal_model -- <model_dir_or_artifact> [--serial <n>] [--nonce-b64 <b64>]
//! ```
//!
//! A file argument must be the artifact (`triage_model.json`) itself.
//!
//! The seed (base64, 32 bytes) is read from the file named by
//! `MEDTRIAGE_MODEL_SIGNING_KEY_B64_FILE` or, on unix, from the descriptor in
//! `MEDTRIAGE_MODEL_SIGNING_KEY_B64_FD`. Without either, the manifest is
//! written unsigned. Seed material is zeroized after use.

use std::env;
use std::fs;
#[cfg(unix)]
use std::os::unix::io::FromRawFd;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use clap::Parser;
use ed25519_dalek::SigningKey;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use medtriage::adapters::artifact::{seal_directory, ARTIFACT_FILE};

const KEY_FD_ENV: &str = "MEDTRIAGE_MODEL_SIGNING_KEY_B64_FD";
const KEY_FILE_ENV: &str = "MEDTRIAGE_MODEL_SIGNING_KEY_B64_FILE";

#[derive(Parser)]
#[command(name = "seal_model")]
#[command(about = "Write the integrity manifest (and signature) for a model artifact")]
struct Args {
    /// Model directory, or the artifact file inside it
    model: PathBuf,

    /// Monotonic serial (defaults to the current unix time)
    #[arg(long)]
    serial: Option<u64>,

    /// 16-byte nonce, base64 (random when omitted)
    #[arg(long)]
    nonce_b64: Option<String>,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn non_empty(secret: String) -> Result<Zeroizing<String>> {
    let secret = Zeroizing::new(secret);
    let trimmed = secret.trim_end_matches(['\n', '\r']);
    if trimmed.is_empty() {
        bail!("Empty signing key");
    }
    Ok(Zeroizing::new(trimmed.to_string()))
}

fn read_signing_seed_b64() -> Result<Option<Zeroizing<String>>> {
    #[cfg(unix)]
    if let Ok(fd_str) = env::var(KEY_FD_ENV) {
        use std::io::Read;

        let fd: i32 = fd_str.trim().parse().context("Invalid key FD")?;
        if fd <= 2 {
            bail!("Refusing to read signing key from stdio FD");
        }
        // SAFETY: take ownership of FD for one-time secret read.
        let mut file = unsafe { fs::File::from_raw_fd(fd) };
        let mut buf = String::new();
        file.read_to_string(&mut buf)
            .context("Failed reading signing key from FD")?;
        return non_empty(buf).map(Some);
    }

    if let Ok(path) = env::var(KEY_FILE_ENV) {
        let content =
            fs::read_to_string(path.trim()).context("Failed reading signing key file")?;
        return non_empty(content).map(Some);
    }

    Ok(None)
}

fn read_signing_seed() -> Result<Option<Seed>> {
    let Some(b64) = read_signing_seed_b64()? else {
        return Ok(None);
    };

    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(b64.trim())
            .context("Invalid base64 in signing key")?,
    );
    if raw.len() != 32 {
        bail!(
            "Signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        );
    }

    let mut seed = Seed([0u8; 32]);
    seed.0.copy_from_slice(&raw);
    Ok(Some(seed))
}

fn make_nonce_b64() -> String {
    let mut nonce = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    general_purpose::STANDARD.encode(nonce)
}

fn validate_nonce_b64(nonce_b64: &str) -> Result<()> {
    let raw = general_purpose::STANDARD
        .decode(nonce_b64.trim())
        .context("Invalid base64 nonce")?;
    if raw.len() != 16 {
        bail!("nonce must decode to exactly 16 bytes");
    }
    Ok(())
}

/// Directory to seal. A file argument must be the artifact itself, since
/// only `triage_model.json` is hashed and loaded.
fn resolve_model_dir(model: &Path) -> Result<PathBuf> {
    if !model.is_file() {
        return Ok(model.to_path_buf());
    }
    if model.file_name().and_then(|n| n.to_str()) != Some(ARTIFACT_FILE) {
        bail!("Model file must be named {ARTIFACT_FILE}, got {model:?}");
    }
    Ok(model
        .parent()
        .context("Model path has no parent directory")?
        .to_path_buf())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let model_dir = resolve_model_dir(&args.model)?;

    let nonce_b64 = match args.nonce_b64 {
        Some(v) => {
            validate_nonce_b64(&v)?;
            v
        }
        None => make_nonce_b64(),
    };
    let serial = args
        .serial
        .unwrap_or_else(|| u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(1));

    let seed = read_signing_seed()?;
    let signing_key = seed.as_ref().map(|s| SigningKey::from_bytes(&s.0));

    let manifest = seal_directory(&model_dir, serial, Some(nonce_b64), signing_key.as_ref())
        .with_context(|| format!("Failed to seal {model_dir:?}"))?;

    println!("Wrote manifest: {:?}", model_dir.join("manifest.json"));
    for (file, digest) in &manifest.files {
        println!("  {file}  sha256={digest}");
    }
    match &signing_key {
        Some(key) => {
            println!("Wrote signature: {:?}", model_dir.join("model.sig"));
            println!(
                "MEDTRIAGE_MODEL_PUBKEY_B64={}",
                general_purpose::STANDARD.encode(key.verifying_key().as_bytes())
            );
        }
        None => println!("No signing key configured; manifest is unsigned"),
    }

    // SigningKey zeroizes on drop; the seed wrapper does too.
    drop(signing_key);
    drop(seed);

    Ok(())
}
