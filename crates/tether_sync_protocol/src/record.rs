//! One item inside a protocol4 map.
//!
//! ```text
//! component:9:passwords
//! type:5:login
//! item:1:1
//! p.host:11:example.com
//! s.password:51:FKcHeWcJuL0iz3PwUUQqlg==|dxoZpGluRxYmCCok2S36LA==*1
//! ```
//!
//! `type` is omitted when absent and `remove:1:1` marks a removal. Plaintext
//! properties use `p.`; sealed properties use `s.` and are bound to the
//! item's lookup key string. Property names are escaped so that `%`, `:`,
//! `\r` and `\n` never reach the field name (`a:b` travels as `p.a%3Ab`).

use crate::error::{ProtocolError, ProtocolResult};
use std::collections::HashSet;
use tether_codec::WireMap;
use tether_core::crypto::FieldCipher;
use tether_core::{CoreError, LookupKey, SyncItem};
use tracing::warn;

/// Field holding the component id.
pub const FIELD_COMPONENT: &str = "component";
/// Field holding the optional type id.
pub const FIELD_TYPE: &str = "type";
/// Field holding the item id.
pub const FIELD_ITEM: &str = "item";
/// Field present with value `"1"` on removals.
pub const FIELD_REMOVE: &str = "remove";
/// Prefix of plaintext property fields.
pub const PLAIN_PREFIX: &str = "p.";
/// Prefix of sealed property fields.
pub const SEALED_PREFIX: &str = "s.";

/// Decides which properties must be sealed before leaving the client.
///
/// The policy belongs to the owning component; the protocol never guesses.
pub trait FieldPolicy {
    /// Returns true if `property` of the item `key` must be encrypted.
    fn is_sensitive(&self, key: &LookupKey, property: &str) -> bool;
}

/// A policy under which nothing is sensitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextFields;

impl FieldPolicy for PlaintextFields {
    fn is_sensitive(&self, _key: &LookupKey, _property: &str) -> bool {
        false
    }
}

/// A policy naming sensitive properties, regardless of item type.
#[derive(Debug, Clone, Default)]
pub struct SensitiveFields {
    names: HashSet<String>,
}

impl SensitiveFields {
    /// Creates a policy sealing the given property names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl FieldPolicy for SensitiveFields {
    fn is_sensitive(&self, _key: &LookupKey, property: &str) -> bool {
        self.names.contains(property)
    }
}

/// A property that could not be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableField {
    /// The item carrying the property.
    pub key: LookupKey,
    /// The property name.
    pub property: String,
    /// Why it could not be opened.
    pub error: CoreError,
}

/// An item read back from a record, with the properties that were dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedItem {
    /// The item, without any unreadable properties.
    pub item: SyncItem,
    /// Sealed properties that failed to open.
    pub unreadable: Vec<UnreadableField>,
}

/// Writes items into protocol4 maps, sealing sensitive properties.
pub struct RecordWriter<'a> {
    cipher: Option<&'a FieldCipher>,
    policy: &'a dyn FieldPolicy,
}

impl<'a> RecordWriter<'a> {
    /// Creates a writer.
    pub fn new(cipher: Option<&'a FieldCipher>, policy: &'a dyn FieldPolicy) -> Self {
        Self { cipher, policy }
    }

    /// Writes `item` into `out`, prefixing every field name with `prefix`.
    ///
    /// # Errors
    ///
    /// Fails if a sensitive property must be sealed and no cipher is set.
    pub fn write(&self, item: &SyncItem, prefix: &str, out: &mut WireMap) -> ProtocolResult<()> {
        let key = item.lookup_key();
        out.insert(field(prefix, FIELD_COMPONENT), key.component().to_string());
        if let Some(type_id) = key.type_id() {
            out.insert(field(prefix, FIELD_TYPE), type_id.to_string());
        }
        out.insert(field(prefix, FIELD_ITEM), key.item().to_string());
        if item.is_remove() {
            out.insert(field(prefix, FIELD_REMOVE), "1".to_string());
            return Ok(());
        }

        let context = key.to_string();
        for (name, value) in item.properties().iter() {
            if self.policy.is_sensitive(key, name) {
                let cipher = self.cipher.ok_or_else(|| ProtocolError::MissingCipher {
                    property: name.to_string(),
                })?;
                let sealed = cipher.encrypt(value, &context)?;
                out.insert(
                    format!("{prefix}{SEALED_PREFIX}{}", escape_name(name)),
                    sealed,
                );
            } else {
                out.insert(
                    format!("{prefix}{PLAIN_PREFIX}{}", escape_name(name)),
                    value.to_string(),
                );
            }
        }
        Ok(())
    }
}

fn field(prefix: &str, name: &str) -> String {
    format!("{prefix}{name}")
}

fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            '\r' => out.push_str("%0D"),
            '\n' => out.push_str("%0A"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_name(name: &str) -> Option<String> {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        match rest.get(pos + 1..pos + 3) {
            Some("25") => out.push('%'),
            Some("3A") | Some("3a") => out.push(':'),
            Some("0D") | Some("0d") => out.push('\r'),
            Some("0A") | Some("0a") => out.push('\n'),
            _ => return None,
        }
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Some(out)
}

/// Reads one item from an unprefixed record map.
///
/// Sealed properties are opened with `cipher`; any that fail (or that
/// arrive without a cipher) are dropped from the item and listed in
/// [`DecodedItem::unreadable`] instead of failing the record.
///
/// # Errors
///
/// Fails if the identity fields are missing or malformed.
pub fn read_record(record: &WireMap, cipher: Option<&FieldCipher>) -> ProtocolResult<DecodedItem> {
    let component = record
        .get(FIELD_COMPONENT)
        .ok_or_else(|| ProtocolError::missing_field(FIELD_COMPONENT))?;
    let item_id = record
        .get(FIELD_ITEM)
        .ok_or_else(|| ProtocolError::missing_field(FIELD_ITEM))?;
    let key = LookupKey::new(
        component,
        record.get(FIELD_TYPE).map(String::as_str),
        item_id,
    )?;

    match record.get(FIELD_REMOVE).map(String::as_str) {
        None | Some("0") => {}
        Some("1") => {
            return Ok(DecodedItem {
                item: SyncItem::removal(key),
                unreadable: Vec::new(),
            })
        }
        Some(other) => {
            return Err(ProtocolError::invalid_field(
                FIELD_REMOVE,
                format!("expected 0 or 1, got {other:?}"),
            ))
        }
    }

    let context = key.to_string();
    let mut item = SyncItem::from_key(key);
    let mut unreadable = Vec::new();
    for (name, value) in record {
        let (sealed, escaped) = if let Some(escaped) = name.strip_prefix(PLAIN_PREFIX) {
            (false, escaped)
        } else if let Some(escaped) = name.strip_prefix(SEALED_PREFIX) {
            (true, escaped)
        } else {
            continue;
        };
        let Some(property) = unescape_name(escaped) else {
            warn!(
                key = %item.lookup_key(),
                field = %name,
                "dropping property with a bad escape"
            );
            continue;
        };

        if !sealed {
            item.set_property(property, value.as_str());
        } else {
            let opened = match cipher {
                Some(cipher) => cipher.decrypt(value, &context),
                None => Err(CoreError::IntegrityCheckFailed),
            };
            match opened {
                Ok(plaintext) => {
                    item.set_property(property, plaintext);
                }
                Err(error) => {
                    warn!(key = %item.lookup_key(), %property, "dropping unreadable property");
                    unreadable.push(UnreadableField {
                        key: item.lookup_key().clone(),
                        property,
                        error,
                    });
                }
            }
        }
    }

    Ok(DecodedItem { item, unreadable })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::crypto::FieldKey;

    fn zero_cipher() -> FieldCipher {
        FieldCipher::new(FieldKey::from_bytes(&[0u8; 32]).unwrap())
    }

    fn login() -> SyncItem {
        SyncItem::new("passwords", Some("login"), "1")
            .unwrap()
            .with_property("host", "example.com")
            .with_property("password", "hunter2")
    }

    #[test]
    fn plaintext_record() {
        let mut out = WireMap::new();
        RecordWriter::new(None, &PlaintextFields)
            .write(&login(), "", &mut out)
            .unwrap();

        assert_eq!(out["component"], "passwords");
        assert_eq!(out["type"], "login");
        assert_eq!(out["item"], "1");
        assert_eq!(out["p.host"], "example.com");
        assert_eq!(out["p.password"], "hunter2");

        let decoded = read_record(&out, None).unwrap();
        assert_eq!(decoded.item, login());
        assert!(decoded.unreadable.is_empty());
    }

    #[test]
    fn sensitive_properties_are_sealed() {
        let cipher = zero_cipher();
        let policy = SensitiveFields::new(["password"]);
        let mut out = WireMap::new();
        RecordWriter::new(Some(&cipher), &policy)
            .write(&login(), "", &mut out)
            .unwrap();

        assert!(!out.contains_key("p.password"));
        let sealed = &out["s.password"];
        assert!(sealed.ends_with("*1"));
        assert_eq!(
            cipher.decrypt(sealed, "passwords/login/1").unwrap(),
            "hunter2"
        );

        let decoded = read_record(&out, Some(&cipher)).unwrap();
        assert_eq!(decoded.item.property("password"), Some("hunter2"));
    }

    #[test]
    fn sensitive_without_cipher_fails() {
        let policy = SensitiveFields::new(["password"]);
        let mut out = WireMap::new();
        let err = RecordWriter::new(None, &policy)
            .write(&login(), "", &mut out)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MissingCipher { .. }));
    }

    #[test]
    fn sealed_value_moved_to_other_item_is_unreadable() {
        let cipher = zero_cipher();
        let policy = SensitiveFields::new(["password"]);
        let mut out = WireMap::new();
        RecordWriter::new(Some(&cipher), &policy)
            .write(&login(), "", &mut out)
            .unwrap();
        out.insert("item".into(), "2".into());

        let decoded = read_record(&out, Some(&cipher)).unwrap();
        assert_eq!(decoded.item.property("password"), None);
        assert_eq!(decoded.item.property("host"), Some("example.com"));
        assert_eq!(decoded.unreadable.len(), 1);
        assert_eq!(decoded.unreadable[0].property, "password");
        assert_eq!(decoded.unreadable[0].error, CoreError::IntegrityCheckFailed);
    }

    #[test]
    fn removal_record() {
        let removal = SyncItem::removal(login().lookup_key().clone());
        let mut out = WireMap::new();
        RecordWriter::new(None, &PlaintextFields)
            .write(&removal, "7.", &mut out)
            .unwrap();
        assert_eq!(out["7.remove"], "1");
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn missing_identity_fails() {
        let mut record = WireMap::new();
        record.insert("item".into(), "1".into());
        assert_eq!(
            read_record(&record, None).unwrap_err(),
            ProtocolError::missing_field("component")
        );

        record.insert("component".into(), "".into());
        assert!(matches!(
            read_record(&record, None).unwrap_err(),
            ProtocolError::Core(CoreError::MalformedKey { .. })
        ));
    }

    #[test]
    fn bad_remove_flag_fails() {
        let mut record = WireMap::new();
        record.insert("component".into(), "bookmarks".into());
        record.insert("item".into(), "1".into());
        record.insert("remove".into(), "yes".into());
        assert!(matches!(
            read_record(&record, None).unwrap_err(),
            ProtocolError::InvalidField { .. }
        ));
    }

    #[test]
    fn property_names_are_escaped() {
        let item = SyncItem::new("bookmarks", None, "1")
            .unwrap()
            .with_property("a:b", "1")
            .with_property("line\r\nbreak", "2")
            .with_property("50%", "3");
        let mut out = WireMap::new();
        RecordWriter::new(None, &PlaintextFields)
            .write(&item, "0.", &mut out)
            .unwrap();

        assert_eq!(out["0.p.a%3Ab"], "1");
        assert_eq!(out["0.p.line%0D%0Abreak"], "2");
        assert_eq!(out["0.p.50%25"], "3");
        assert!(tether_codec::serialize(&out).is_ok());

        let record: WireMap = out
            .iter()
            .map(|(name, value)| (name["0.".len()..].to_string(), value.clone()))
            .collect();
        assert_eq!(read_record(&record, None).unwrap().item, item);
    }

    #[test]
    fn bad_escape_drops_only_that_property() {
        let mut record = WireMap::new();
        record.insert("component".into(), "bookmarks".into());
        record.insert("item".into(), "1".into());
        record.insert("p.url".into(), "http://a".into());
        record.insert("p.bad%zz".into(), "x".into());

        let decoded = read_record(&record, None).unwrap();
        assert_eq!(decoded.item.property("url"), Some("http://a"));
        assert_eq!(decoded.item.properties().len(), 1);
    }
}
