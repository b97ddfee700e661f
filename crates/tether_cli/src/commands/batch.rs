//! Batch command implementation.

use super::{load_key, read_body};
use serde::Serialize;
use std::path::Path;
use tether_core::crypto::FieldCipher;
use tether_sync_protocol::Batch;

/// One decoded item.
#[derive(Debug, Serialize)]
pub struct ItemView {
    /// Lookup key string.
    pub key: String,
    /// Whether the item is a removal.
    pub removed: bool,
    /// Properties in wire order.
    pub properties: Vec<(String, String)>,
}

/// A property that could not be opened.
#[derive(Debug, Serialize)]
pub struct UnreadableView {
    /// Lookup key string.
    pub key: String,
    /// Property name.
    pub property: String,
    /// Why it failed.
    pub error: String,
}

/// Batch decoding result.
#[derive(Debug, Serialize)]
pub struct BatchResult {
    /// Input path.
    pub path: String,
    /// Decoded items.
    pub items: Vec<ItemView>,
    /// Sealed properties that could not be opened.
    pub unreadable: Vec<UnreadableView>,
    /// Records skipped as missing or malformed.
    pub skipped: usize,
}

/// Decodes a batch body into a result.
pub fn decode(path: &Path, key: Option<&str>) -> Result<BatchResult, Box<dyn std::error::Error>> {
    let body = read_body(path)?;
    let cipher = key.map(load_key).transpose()?.map(FieldCipher::new);
    let decoded = Batch::from_body(&body, cipher.as_ref())?;

    Ok(BatchResult {
        path: path.display().to_string(),
        items: decoded
            .items
            .iter()
            .map(|item| ItemView {
                key: item.lookup_key().to_string(),
                removed: item.is_remove(),
                properties: item
                    .properties()
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
            })
            .collect(),
        unreadable: decoded
            .unreadable
            .iter()
            .map(|field| UnreadableView {
                key: field.key.to_string(),
                property: field.property.clone(),
                error: field.error.to_string(),
            })
            .collect(),
        skipped: decoded.skipped,
    })
}

/// Runs the batch command.
pub fn run(path: &Path, key: Option<&str>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = decode(path, key)?;
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }
    Ok(())
}

fn print_text_output(result: &BatchResult) {
    println!("{}", result.path);
    println!("  Items:   {}", result.items.len());
    println!("  Skipped: {}", result.skipped);
    for item in &result.items {
        println!();
        if item.removed {
            println!("{} (removed)", item.key);
            continue;
        }
        println!("{}", item.key);
        for (name, value) in &item.properties {
            println!("  {name} = {value:?}");
        }
    }

    if !result.unreadable.is_empty() {
        println!();
        println!("Unreadable:");
        for field in &result.unreadable {
            println!("  {} {}: {}", field.key, field.property, field.error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tether_core::crypto::FieldKey;
    use tether_core::SyncItem;
    use tether_sync_protocol::{RecordWriter, SensitiveFields};

    fn sealed_batch_file(key: &[u8]) -> NamedTempFile {
        let cipher = FieldCipher::new(FieldKey::from_bytes(key).unwrap());
        let policy = SensitiveFields::new(["password"]);
        let login = SyncItem::new("passwords", Some("login"), "1")
            .unwrap()
            .with_property("host", "example.com")
            .with_property("password", "hunter2");
        let body = Batch::from_iter([login])
            .to_body(&RecordWriter::new(Some(&cipher), &policy))
            .unwrap();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn decode_with_key() {
        let file = sealed_batch_file(&[4u8; 32]);
        let result = decode(file.path(), Some(&STANDARD.encode([4u8; 32]))).unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].key, "passwords/login/1");
        assert!(result
            .items[0]
            .properties
            .contains(&("password".to_string(), "hunter2".to_string())));
        assert!(result.unreadable.is_empty());
    }

    #[test]
    fn decode_without_key_lists_sealed_fields() {
        let file = sealed_batch_file(&[4u8; 32]);
        let result = decode(file.path(), None).unwrap();
        assert_eq!(result.items[0].properties.len(), 1);
        assert_eq!(result.unreadable.len(), 1);
        assert_eq!(result.unreadable[0].property, "password");
    }
}
