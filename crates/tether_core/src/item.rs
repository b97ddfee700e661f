//! Sync items and their identity.

use crate::error::{CoreError, CoreResult};
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

/// Identity of a synchronized item.
///
/// Two items with equal keys are the same logical entity. The key is a
/// three-part value; its string form is only derived at the wire boundary,
/// with each part escaped so that separators inside ids cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LookupKey {
    component: String,
    type_id: Option<String>,
    item: String,
}

const SEGMENT_SEPARATOR: char = '/';

impl LookupKey {
    /// Creates a key.
    ///
    /// An empty `type_id` is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if `component` or `item` is empty.
    pub fn new(component: &str, type_id: Option<&str>, item: &str) -> CoreResult<Self> {
        if component.is_empty() {
            return Err(CoreError::malformed_key("empty component id"));
        }
        if item.is_empty() {
            return Err(CoreError::malformed_key("empty item id"));
        }
        Ok(Self {
            component: component.to_string(),
            type_id: type_id.filter(|t| !t.is_empty()).map(str::to_string),
            item: item.to_string(),
        })
    }

    /// The owning component, e.g. `"bookmarks"`.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// The optional sub-type within the component.
    pub fn type_id(&self) -> Option<&str> {
        self.type_id.as_deref()
    }

    /// The item id within `(component, type)`.
    pub fn item(&self) -> &str {
        &self.item
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            escape(&self.component),
            escape(self.type_id.as_deref().unwrap_or("")),
            escape(&self.item),
            sep = SEGMENT_SEPARATOR
        )
    }
}

impl FromStr for LookupKey {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let segments: Vec<&str> = s.split(SEGMENT_SEPARATOR).collect();
        let [component, type_id, item] = segments.as_slice() else {
            return Err(CoreError::malformed_key(format!(
                "expected 3 segments in {s:?}, found {}",
                segments.len()
            )));
        };
        let type_id = unescape(type_id)?;
        Self::new(
            &unescape(component)?,
            Some(type_id.as_str()),
            &unescape(item)?,
        )
    }
}

fn escape(segment: &str) -> String {
    segment.replace('%', "%25").replace(SEGMENT_SEPARATOR, "%2F")
}

fn unescape(segment: &str) -> CoreResult<String> {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let code = rest.get(pos + 1..pos + 3);
        match code {
            Some("25") => out.push('%'),
            Some("2F") | Some("2f") => out.push(SEGMENT_SEPARATOR),
            _ => {
                return Err(CoreError::malformed_key(format!(
                    "bad escape in segment {segment:?}"
                )))
            }
        }
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Insertion-ordered string properties of an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: IndexMap<String, String>,
}

impl Properties {
    /// Creates an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a property.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Returns true if the property is present.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Sets a property, returning true if the stored value changed.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let value = value.into();
        match self.entries.entry(name.into()) {
            indexmap::map::Entry::Occupied(mut entry) => {
                if *entry.get() == value {
                    false
                } else {
                    entry.insert(value);
                    true
                }
            }
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    /// Removes a property, keeping the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.shift_remove(name)
    }

    /// Removes every property.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Property names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no properties.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Properties::new();
        for (name, value) in iter {
            properties.insert(name, value);
        }
        properties
    }
}

/// The unit of synchronized state: an identity plus a property bag, or a
/// removal marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncItem {
    key: LookupKey,
    properties: Properties,
    is_remove: bool,
}

impl SyncItem {
    /// Creates an item with no properties.
    ///
    /// # Errors
    ///
    /// Returns an error if `component` or `item` is empty.
    pub fn new(component: &str, type_id: Option<&str>, item: &str) -> CoreResult<Self> {
        Ok(Self::from_key(LookupKey::new(component, type_id, item)?))
    }

    /// Creates an item with no properties for an existing key.
    pub fn from_key(key: LookupKey) -> Self {
        Self {
            key,
            properties: Properties::new(),
            is_remove: false,
        }
    }

    /// Creates a removal marker for a key.
    pub fn removal(key: LookupKey) -> Self {
        Self {
            key,
            properties: Properties::new(),
            is_remove: true,
        }
    }

    /// Builder-style property setter.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name, value);
        self
    }

    /// The item's identity.
    pub fn lookup_key(&self) -> &LookupKey {
        &self.key
    }

    /// The owning component.
    pub fn component_id(&self) -> &str {
        self.key.component()
    }

    /// The optional sub-type.
    pub fn type_id(&self) -> Option<&str> {
        self.key.type_id()
    }

    /// The item id.
    pub fn item_id(&self) -> &str {
        self.key.item()
    }

    /// All properties.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// A single property value.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name)
    }

    /// Sets a property, returning true if it changed.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        self.properties.insert(name, value)
    }

    /// Removes a property.
    pub fn remove_property(&mut self, name: &str) -> Option<String> {
        self.properties.remove(name)
    }

    /// Property names in insertion order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.names()
    }

    /// Returns true if this item is a removal marker.
    pub fn is_remove(&self) -> bool {
        self.is_remove
    }

    /// Turns the item into a removal marker, dropping its properties.
    ///
    /// Returns true if the item was not already a removal.
    pub fn mark_removed(&mut self) -> bool {
        if self.is_remove {
            return false;
        }
        self.is_remove = true;
        self.properties.clear();
        true
    }

    /// Folds a newer mutation of the same item into this one.
    ///
    /// A removal clears every property. A value update revives a removed
    /// item and overlays each of its properties. Returns true if anything
    /// changed.
    pub fn merge_from(&mut self, newer: &SyncItem) -> bool {
        debug_assert_eq!(self.key, newer.key, "merging items with different keys");

        if newer.is_remove {
            return self.mark_removed();
        }

        let mut changed = false;
        if self.is_remove {
            self.is_remove = false;
            changed = true;
        }
        for (name, value) in newer.properties.iter() {
            changed |= self.properties.insert(name, value);
        }
        changed
    }

    /// Replaces this item's state with a newer mutation, discarding the
    /// previous property history.
    ///
    /// Returns true if the resulting item differs from the previous one.
    pub fn replace_from(&mut self, newer: &SyncItem) -> bool {
        debug_assert_eq!(self.key, newer.key, "replacing items with different keys");

        let changed = self.is_remove != newer.is_remove || self.properties != newer.properties;
        self.is_remove = newer.is_remove;
        self.properties = newer.properties.clone();
        changed
    }
}
