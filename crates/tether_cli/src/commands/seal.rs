//! Encrypt and decrypt command implementations.

use super::load_key;
use tether_core::crypto::FieldCipher;

/// Seals a value.
pub fn seal(key: &str, context: &str, value: &str) -> Result<String, Box<dyn std::error::Error>> {
    let cipher = FieldCipher::new(load_key(key)?);
    Ok(cipher.encrypt(value, context)?)
}

/// Opens a sealed value.
pub fn open(key: &str, context: &str, value: &str) -> Result<String, Box<dyn std::error::Error>> {
    let cipher = FieldCipher::new(load_key(key)?);
    Ok(cipher.decrypt(value, context)?)
}

/// Runs the encrypt command.
pub fn encrypt(key: &str, context: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", seal(key, context, value)?);
    Ok(())
}

/// Runs the decrypt command.
pub fn decrypt(key: &str, context: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", open(key, context, value)?);
    Ok(())
}
