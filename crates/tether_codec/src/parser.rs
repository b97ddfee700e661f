//! protocol4 parsers.

use crate::error::{CodecError, CodecResult};
use crate::WireMap;
use tracing::trace;

/// Parse a protocol4 body line by line.
///
/// Each line must look like `name:length:value`. The length is checked to
/// be a decimal number but is not compared with the value: everything after
/// the second colon is taken verbatim. Lines that do not match are skipped,
/// which keeps older clients working when the server adds blank lines or
/// new framing. A repeated name keeps its first position and its last value.
pub fn parse(text: &str) -> WireMap {
    let mut map = WireMap::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        match split_line(line) {
            Some((name, value)) => {
                map.insert(name.to_string(), value.to_string());
            }
            None if line.is_empty() => {}
            None => trace!(line, "skipping malformed protocol4 line"),
        }
    }
    map
}

fn split_line(line: &str) -> Option<(&str, &str)> {
    let (name, rest) = line.split_once(':')?;
    let (length, value) = rest.split_once(':')?;
    if name.is_empty() || !is_decimal(length) {
        return None;
    }
    Some((name, value))
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a protocol4 body honouring every length prefix.
///
/// Unlike [`parse`], values may contain newlines and colons, and any framing
/// problem is an error instead of a skipped line.
///
/// # Errors
///
/// Returns an error if a record is truncated, has a bad length prefix, is
/// missing its terminator, or its value is not valid UTF-8.
pub fn parse_framed(text: &str) -> CodecResult<WireMap> {
    FramedParser::new(text).collect_map()
}

/// A strict, length-honouring protocol4 parser.
pub struct FramedParser<'a> {
    data: &'a str,
    pos: usize,
}

impl<'a> FramedParser<'a> {
    /// Create a parser over the given body.
    pub fn new(data: &'a str) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns true once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Read the next `(name, value)` record, or `None` at the end of input.
    pub fn next_record(&mut self) -> CodecResult<Option<(&'a str, &'a str)>> {
        self.skip_blank_lines();
        if self.is_empty() {
            return Ok(None);
        }

        let start = self.pos;
        let name = self.read_until_colon(start)?;
        if name.is_empty() {
            return Err(CodecError::invalid_name(name, "empty name"));
        }

        let length = self.read_until_colon(start)?;
        if !is_decimal(length) {
            return Err(CodecError::InvalidLength { offset: start });
        }
        let length: usize = length
            .parse()
            .map_err(|_| CodecError::InvalidLength { offset: start })?;

        let end = self
            .pos
            .checked_add(length)
            .filter(|end| *end <= self.data.len())
            .ok_or(CodecError::UnexpectedEof { offset: start })?;
        let value = self
            .data
            .get(self.pos..end)
            .ok_or(CodecError::InvalidUtf8 { offset: self.pos })?;
        self.pos = end;

        self.read_terminator()?;
        Ok(Some((name, value)))
    }

    fn collect_map(mut self) -> CodecResult<WireMap> {
        let mut map = WireMap::new();
        while let Some((name, value)) = self.next_record()? {
            map.insert(name.to_string(), value.to_string());
        }
        Ok(map)
    }

    fn skip_blank_lines(&mut self) {
        let rest = &self.data[self.pos..];
        let trimmed = rest.trim_start_matches(['\r', '\n']);
        self.pos += rest.len() - trimmed.len();
    }

    fn read_until_colon(&mut self, record_start: usize) -> CodecResult<&'a str> {
        let rest = &self.data[self.pos..];
        let colon = rest.find(':');
        let newline = rest.find('\n');
        match (colon, newline) {
            (Some(c), Some(n)) if n < c => Err(CodecError::InvalidLength {
                offset: record_start,
            }),
            (Some(c), _) => {
                let field = &rest[..c];
                self.pos += c + 1;
                Ok(field)
            }
            (None, _) => Err(CodecError::UnexpectedEof {
                offset: record_start,
            }),
        }
    }

    fn read_terminator(&mut self) -> CodecResult<()> {
        let rest = &self.data[self.pos..];
        if rest.starts_with('\n') {
            self.pos += 1;
        } else if rest.starts_with("\r\n") {
            self.pos += 2;
        } else if !rest.is_empty() {
            return Err(CodecError::MissingTerminator { offset: self.pos });
        }
        Ok(())
    }
}
