//! protocol4 serializer.

use crate::error::{CodecError, CodecResult};

/// Serialize `(name, value)` pairs into a protocol4 body.
///
/// Records are written in iteration order as `name:length:value\n`, where
/// `length` is the byte length of `value`.
///
/// # Errors
///
/// Returns an error if a name is empty or contains `:`, `\r` or `\n`; such
/// names cannot be read back.
pub fn serialize<'a, I, K, V>(fields: I) -> CodecResult<String>
where
    I: IntoIterator<Item = (&'a K, &'a V)>,
    K: AsRef<str> + ?Sized + 'a,
    V: AsRef<str> + ?Sized + 'a,
{
    let mut serializer = Serializer::new();
    for (name, value) in fields {
        serializer.write_field(name.as_ref(), value.as_ref())?;
    }
    Ok(serializer.finish())
}

/// An incremental protocol4 writer.
#[derive(Debug, Default)]
pub struct Serializer {
    buffer: String,
}

impl Serializer {
    /// Create an empty serializer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a serializer with the given byte capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: String::with_capacity(capacity),
        }
    }

    /// Append one record.
    pub fn write_field(&mut self, name: &str, value: &str) -> CodecResult<()> {
        validate_name(name)?;
        self.buffer.push_str(name);
        self.buffer.push(':');
        self.buffer.push_str(&value.len().to_string());
        self.buffer.push(':');
        self.buffer.push_str(value);
        self.buffer.push('\n');
        Ok(())
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consume the serializer and return the body.
    pub fn finish(self) -> String {
        self.buffer
    }
}

fn validate_name(name: &str) -> CodecResult<()> {
    if name.is_empty() {
        return Err(CodecError::invalid_name(name, "empty name"));
    }
    if name.contains(':') {
        return Err(CodecError::invalid_name(name, "contains ':'"));
    }
    if name.contains(['\r', '\n']) {
        return Err(CodecError::invalid_name(name, "contains a line break"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WireMap;

    #[test]
    fn serialize_in_insertion_order() {
        let mut map = WireMap::new();
        map.insert("foo".into(), "bar".into());
        map.insert("a".into(), "".into());
        map.insert("url".into(), "http://x:1".into());

        let body = serialize(&map).unwrap();
        assert_eq!(body, "foo:3:bar\na:0:\nurl:10:http://x:1\n");
    }

    #[test]
    fn serialize_uses_byte_length() {
        let body = serialize([("name", "h\u{e9}llo")]).unwrap();
        assert_eq!(body, "name:6:h\u{e9}llo\n");
    }

    #[test]
    fn serialize_empty_map() {
        assert_eq!(serialize(&WireMap::new()).unwrap(), "");
    }

    #[test]
    fn serialize_rejects_bad_names() {
        assert!(serialize([("", "x")]).is_err());
        assert!(serialize([("a:b", "x")]).is_err());
        assert!(serialize([("a\nb", "x")]).is_err());
    }

    #[test]
    fn incremental_writer() {
        let mut serializer = Serializer::with_capacity(32);
        assert!(serializer.is_empty());
        serializer.write_field("count", "2").unwrap();
        assert_eq!(serializer.len(), 10);
        assert_eq!(serializer.finish(), "count:1:2\n");
    }
}
