//! Value-level authenticated encryption.
//!
//! Sensitive property values are sealed one at a time before they leave the
//! client. Each sealed value is bound to a context string (normally the
//! item's lookup key), so moving it to another item is detected on open.
//!
//! ## Scheme
//!
//! - AES-256-CBC; the plaintext is always padded with `0x01` followed by
//!   zero bytes up to the block size
//! - The IV is HMAC-SHA256(key, plaintext ‖ context) truncated to one block,
//!   which makes encryption deterministic without a random source
//! - On decrypt the MAC is recomputed over the recovered plaintext and the
//!   context and must equal the transmitted IV
//! - Encoding: `base64(ciphertext) "|" base64(iv) "*" version`; an empty
//!   plaintext seals to the empty string
//!
//! ## Usage
//!
//! ```
//! use tether_core::crypto::{FieldCipher, FieldKey};
//!
//! let cipher = FieldCipher::new(FieldKey::generate());
//! let sealed = cipher.encrypt("hunter2", "passwords/logins/1").unwrap();
//! assert_eq!(cipher.decrypt(&sealed, "passwords/logins/1").unwrap(), "hunter2");
//! assert!(cipher.decrypt(&sealed, "passwords/logins/2").is_err());
//! ```

mod field;
mod key;

pub use field::{FieldCipher, BLOCK_SIZE, FORMAT_VERSION};
pub use key::{FieldKey, KEY_SIZE, LEGACY_KEY_SIZE};
