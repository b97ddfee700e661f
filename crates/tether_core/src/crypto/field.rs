//! Deterministic, context-bound encryption of single string values.

use super::key::FieldKey;
use crate::error::{CoreError, CoreResult};
use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Block size of the cipher, and size of the IV.
pub const BLOCK_SIZE: usize = 16;
/// Version tag appended to every sealed value.
pub const FORMAT_VERSION: &str = "1";

const PAD_MARKER: u8 = 0x01;

/// Seals and opens individual property values.
///
/// One key drives both AES-256-CBC and HMAC-SHA256.
pub struct FieldCipher {
    key: FieldKey,
}

impl FieldCipher {
    /// Creates a cipher for the given key.
    #[must_use]
    pub fn new(key: FieldKey) -> Self {
        Self { key }
    }

    /// Seals `plaintext`, binding it to `context`.
    ///
    /// The output is `base64(ciphertext)|base64(iv)*version`. The same
    /// plaintext and context always seal to the same string. The empty
    /// string seals to the empty string.
    pub fn encrypt(&self, plaintext: &str, context: &str) -> CoreResult<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let iv = self.derive_iv(plaintext.as_bytes(), context.as_bytes())?;
        let padded = pad(plaintext.as_bytes());
        let ciphertext = Aes256CbcEnc::new(self.key.as_bytes().into(), (&iv).into())
            .encrypt_padded_vec_mut::<NoPadding>(&padded);

        Ok(format!(
            "{}|{}*{}",
            STANDARD.encode(ciphertext),
            STANDARD.encode(iv),
            FORMAT_VERSION
        ))
    }

    /// Opens a value sealed by [`encrypt`](Self::encrypt) with the same
    /// context.
    ///
    /// # Errors
    ///
    /// Fails for unknown format versions, malformed encodings, and values
    /// whose MAC does not verify (wrong key, wrong context, or tampering).
    /// Each failure concerns this value only.
    pub fn decrypt(&self, encoded: &str, context: &str) -> CoreResult<String> {
        if encoded.is_empty() {
            return Ok(String::new());
        }

        let result = self.open(encoded, context);
        if let Err(err) = &result {
            warn!(%context, error = %err, "failed to open sealed value");
        }
        result
    }

    fn open(&self, encoded: &str, context: &str) -> CoreResult<String> {
        let (body, version) = encoded
            .rsplit_once('*')
            .ok_or_else(|| CoreError::malformed_ciphertext("missing format version"))?;
        if version != FORMAT_VERSION {
            return Err(CoreError::UnknownFormatVersion {
                version: version.to_string(),
            });
        }

        let (ciphertext, iv) = body
            .split_once('|')
            .ok_or_else(|| CoreError::malformed_ciphertext("missing IV separator"))?;
        let ciphertext = STANDARD
            .decode(ciphertext)
            .map_err(|_| CoreError::malformed_ciphertext("ciphertext is not base64"))?;
        let iv = STANDARD
            .decode(iv)
            .map_err(|_| CoreError::malformed_ciphertext("IV is not base64"))?;

        let iv: [u8; BLOCK_SIZE] = iv
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::malformed_ciphertext("IV must be one block"))?;
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CoreError::malformed_ciphertext(
                "ciphertext is not a whole number of blocks",
            ));
        }

        let padded = Aes256CbcDec::new(self.key.as_bytes().into(), (&iv).into())
            .decrypt_padded_vec_mut::<NoPadding>(&ciphertext)
            .map_err(|_| CoreError::malformed_ciphertext("ciphertext is not block aligned"))?;
        let plaintext = unpad(&padded).ok_or(CoreError::IntegrityCheckFailed)?;

        let mut mac = self.mac()?;
        mac.update(plaintext);
        mac.update(context.as_bytes());
        mac.verify_truncated_left(&iv)
            .map_err(|_| CoreError::IntegrityCheckFailed)?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| CoreError::malformed_ciphertext("plaintext is not UTF-8"))
    }

    fn mac(&self) -> CoreResult<HmacSha256> {
        <HmacSha256 as Mac>::new_from_slice(self.key.as_bytes())
            .map_err(|_| CoreError::invalid_key_size(self.key.as_bytes().len(), super::KEY_SIZE))
    }

    fn derive_iv(&self, plaintext: &[u8], context: &[u8]) -> CoreResult<[u8; BLOCK_SIZE]> {
        let mut mac = self.mac()?;
        mac.update(plaintext);
        mac.update(context);
        let digest = mac.finalize().into_bytes();

        let mut iv = [0u8; BLOCK_SIZE];
        iv.copy_from_slice(&digest[..BLOCK_SIZE]);
        Ok(iv)
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher")
            .field("cipher", &"Aes256Cbc+HmacSha256")
            .finish()
    }
}

/// Appends `0x01` and zero bytes up to the next block boundary. Padding is
/// always added, even to block-aligned input.
fn pad(data: &[u8]) -> Vec<u8> {
    let padded_len = (data.len() / BLOCK_SIZE + 1) * BLOCK_SIZE;
    let mut padded = Vec::with_capacity(padded_len);
    padded.extend_from_slice(data);
    padded.push(PAD_MARKER);
    padded.resize(padded_len, 0);
    padded
}

fn unpad(padded: &[u8]) -> Option<&[u8]> {
    let end = padded.iter().rposition(|b| *b != 0)?;
    if padded[end] != PAD_MARKER || padded.len() - end > BLOCK_SIZE {
        return None;
    }
    Some(&padded[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_cipher() -> FieldCipher {
        FieldCipher::new(FieldKey::from_bytes(&[0u8; 32]).unwrap())
    }

    #[test]
    fn known_answer() {
        let cipher = zero_cipher();
        let sealed = cipher.encrypt("abc", "xyz").unwrap();
        assert_eq!(
            sealed,
            "FKcHeWcJuL0iz3PwUUQqlg==|dxoZpGluRxYmCCok2S36LA==*1"
        );
        assert_eq!(
            cipher
                .decrypt("FKcHeWcJuL0iz3PwUUQqlg==|dxoZpGluRxYmCCok2S36LA==*1", "xyz")
                .unwrap(),
            "abc"
        );
    }

    #[test]
    fn roundtrip() {
        let cipher = FieldCipher::new(FieldKey::generate());
        for plaintext in ["a", "hunter2", "exactly16bytes!!", "h\u{e9}llo w\u{f6}rld", "pad\0ded\0"] {
            let sealed = cipher.encrypt(plaintext, "ctx").unwrap();
            assert_eq!(cipher.decrypt(&sealed, "ctx").unwrap(), plaintext);
        }
    }

    #[test]
    fn empty_plaintext() {
        let cipher = zero_cipher();
        assert_eq!(cipher.encrypt("", "xyz").unwrap(), "");
        assert_eq!(cipher.decrypt("", "xyz").unwrap(), "");
    }

    #[test]
    fn block_aligned_input_gets_a_full_pad_block() {
        let sealed = zero_cipher().encrypt("exactly16bytes!!", "xyz").unwrap();
        let (ciphertext, _) = sealed.split_once('|').unwrap();
        assert_eq!(STANDARD.decode(ciphertext).unwrap().len(), 32);
    }

    #[test]
    fn deterministic_per_context() {
        let cipher = zero_cipher();
        assert_eq!(
            cipher.encrypt("abc", "xyz").unwrap(),
            cipher.encrypt("abc", "xyz").unwrap()
        );
        assert_ne!(
            cipher.encrypt("abc", "xyz").unwrap(),
            cipher.encrypt("abc", "other").unwrap()
        );
    }

    #[test]
    fn wrong_context_fails() {
        let cipher = zero_cipher();
        let sealed = cipher.encrypt("abc", "xyz").unwrap();
        assert_eq!(
            cipher.decrypt(&sealed, "xyz2"),
            Err(CoreError::IntegrityCheckFailed)
        );
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = zero_cipher().encrypt("secret value", "ctx").unwrap();
        let other = FieldCipher::new(FieldKey::generate());
        assert!(other.decrypt(&sealed, "ctx").is_err());
    }

    #[test]
    fn legacy_key_matches_padded_native_key() {
        let mut native = [0u8; 32];
        native[..20].copy_from_slice(&[3u8; 20]);
        let legacy = FieldCipher::new(FieldKey::from_bytes(&[3u8; 20]).unwrap());
        let padded = FieldCipher::new(FieldKey::from_bytes(&native).unwrap());
        assert_eq!(
            legacy.encrypt("v", "c").unwrap(),
            padded.encrypt("v", "c").unwrap()
        );
    }

    #[test]
    fn unknown_version_rejected() {
        let err = zero_cipher()
            .decrypt("FKcHeWcJuL0iz3PwUUQqlg==|dxoZpGluRxYmCCok2S36LA==*2", "xyz")
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::UnknownFormatVersion {
                version: "2".into()
            }
        );
    }

    #[test]
    fn malformed_values_rejected() {
        let cipher = zero_cipher();
        for encoded in [
            "no-version",
            "no-iv-separator*1",
            "!!!|dxoZpGluRxYmCCok2S36LA==*1",
            "FKcHeWcJuL0iz3PwUUQqlg==|AAAA*1",
            "AAAA|dxoZpGluRxYmCCok2S36LA==*1",
            "|dxoZpGluRxYmCCok2S36LA==*1",
        ] {
            let err = cipher.decrypt(encoded, "xyz").unwrap_err();
            assert!(err.is_decryption_failure(), "{encoded}: {err}");
        }
    }

    #[test]
    fn tampered_iv_fails() {
        let cipher = zero_cipher();
        let tampered = "FKcHeWcJuL0iz3PwUUQqlg==|QRyUc+dW/3seGxU2bJIdVA==*1";
        assert!(cipher.decrypt(tampered, "xyz").is_err());
    }

    #[test]
    fn pad_and_unpad() {
        assert_eq!(pad(b"abc").len(), 16);
        assert_eq!(pad(&[0u8; 15]).len(), 16);
        assert_eq!(pad(&[0u8; 16]).len(), 32);
        assert_eq!(unpad(&pad(b"abc")), Some(&b"abc"[..]));
        assert_eq!(unpad(&pad(b"ends\x01\0")), Some(&b"ends\x01\0"[..]));
        assert_eq!(unpad(&[0u8; 16]), None);
        assert_eq!(unpad(&[2u8; 16]), None);
    }
}
