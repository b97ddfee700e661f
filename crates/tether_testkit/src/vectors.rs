//! Cross-implementation test vectors for Tether.
//!
//! Any client speaking protocol4 and sealing fields must reproduce these
//! byte for byte.

use serde::{Deserialize, Serialize};

/// A field cipher known-answer vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Key bytes (hex-encoded, 20 or 32 bytes).
    pub key_hex: String,
    /// Plaintext value.
    pub plaintext: String,
    /// Cipher context.
    pub context: String,
    /// Expected sealed value.
    pub sealed: String,
}

/// A protocol4 parsing vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Input body.
    pub body: String,
    /// Expected fields, in order.
    pub expected: Vec<(String, String)>,
}

const ZERO_KEY: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Field cipher vectors.
pub fn cipher_vectors() -> Vec<CipherVector> {
    vec![
        CipherVector {
            id: "cipher_zero_key_abc".into(),
            description: "All-zero key, short value".into(),
            key_hex: ZERO_KEY.into(),
            plaintext: "abc".into(),
            context: "xyz".into(),
            sealed: "FKcHeWcJuL0iz3PwUUQqlg==|dxoZpGluRxYmCCok2S36LA==*1".into(),
        },
        CipherVector {
            id: "cipher_zero_key_other_context".into(),
            description: "Same value, different context".into(),
            key_hex: ZERO_KEY.into(),
            plaintext: "abc".into(),
            context: "other".into(),
            sealed: "m1GO1mpeBYluRn0iZLMXdg==|QRyUc+dW/3seGxU2bJIdVA==*1".into(),
        },
        CipherVector {
            id: "cipher_full_block".into(),
            description: "A 16-byte value still gets a padding block".into(),
            key_hex: ZERO_KEY.into(),
            plaintext: "exactly16bytes!!".into(),
            context: "xyz".into(),
            sealed: "uww6jDmtscLokOcV4hRTkAfE0moewzQLAmQVewCNGlM=|yYeNNGNKO/0Byc/rA6bIBA==*1"
                .into(),
        },
        CipherVector {
            id: "cipher_legacy_key".into(),
            description: "20-byte legacy key, zero padded".into(),
            key_hex: "000102030405060708090a0b0c0d0e0f10111213".into(),
            plaintext: "hunter2".into(),
            context: "passwords/logins/1".into(),
            sealed: "1gsxL84/rG06s3q6d/j9Iw==|LmJD+8tibzLUfzMhHNrwyA==*1".into(),
        },
        CipherVector {
            id: "cipher_non_ascii".into(),
            description: "Multi-byte UTF-8 value".into(),
            key_hex: ZERO_KEY.into(),
            plaintext: "h\u{e9}llo w\u{f6}rld".into(),
            context: "xyz".into(),
            sealed: "cHpCBIn+iAxm/11Edd9VNg==|qhScnrWevGqxXrGTZG5cOA==*1".into(),
        },
        CipherVector {
            id: "cipher_empty".into(),
            description: "The empty string seals to the empty string".into(),
            key_hex: ZERO_KEY.into(),
            plaintext: String::new(),
            context: "xyz".into(),
            sealed: String::new(),
        },
    ]
}

fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// protocol4 parsing vectors, for the lenient line parser.
pub fn codec_vectors() -> Vec<CodecVector> {
    vec![
        CodecVector {
            id: "codec_mixed_line_endings".into(),
            description: "LF and CRLF terminated records".into(),
            body: "foo:3:bar\nbar:3:baz\r\nbom:3:yaz\n".into(),
            expected: fields(&[("foo", "bar"), ("bar", "baz"), ("bom", "yaz")]),
        },
        CodecVector {
            id: "codec_empty".into(),
            description: "Empty body".into(),
            body: String::new(),
            expected: Vec::new(),
        },
        CodecVector {
            id: "codec_skip_malformed".into(),
            description: "Lines without a numeric length are skipped".into(),
            body: "garbage\nfoo:x:bar\nok:2:ok\n:0:\n".into(),
            expected: fields(&[("ok", "ok")]),
        },
        CodecVector {
            id: "codec_colon_in_value".into(),
            description: "Values may contain colons".into(),
            body: "url:8:http://x\n".into(),
            expected: fields(&[("url", "http://x")]),
        },
        CodecVector {
            id: "codec_batch".into(),
            description: "A one-item batch".into(),
            body: "version:1:4\ncount:1:1\n0.component:9:bookmarks\n0.item:1:1\n0.p.url:8:http://x\n"
                .into(),
            expected: fields(&[
                ("version", "4"),
                ("count", "1"),
                ("0.component", "bookmarks"),
                ("0.item", "1"),
                ("0.p.url", "http://x"),
            ]),
        },
    ]
}

/// Lowercase hex encoding.
pub fn hex_encode(data: &[u8]) -> String {
    data.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Decodes hex, panicking on malformed input.
pub fn hex_decode(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("Invalid hex"))
        .collect()
}

/// Generate all test vectors as JSON for cross-implementation use.
pub fn all_vectors_json() -> String {
    let vectors = AllTestVectors {
        cipher: cipher_vectors(),
        codec: codec_vectors(),
    };

    serde_json::to_string_pretty(&vectors).expect("Failed to serialize vectors")
}

#[derive(Debug, Serialize, Deserialize)]
struct AllTestVectors {
    cipher: Vec<CipherVector>,
    codec: Vec<CodecVector>,
}
