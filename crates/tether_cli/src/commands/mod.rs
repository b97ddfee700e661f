//! CLI command implementations.

pub mod batch;
pub mod parse;
pub mod seal;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;
use tether_core::crypto::FieldKey;
use tracing::debug;

/// Reads a body from disk.
pub fn read_body(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let body = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    debug!(path = %path.display(), bytes = body.len(), "read body");
    Ok(body)
}

/// Decodes a base64 field key.
pub fn load_key(encoded: &str) -> Result<FieldKey, Box<dyn std::error::Error>> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("Key is not valid base64: {e}"))?;
    Ok(FieldKey::from_bytes(&bytes)?)
}
