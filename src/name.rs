// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hierarchical NDN names.
//!
//! A [`Name`] is an ordered sequence of opaque byte [`Component`]s. Names tie
//! the key hierarchy to the network namespace: content, content-key, E-KEY
//! and D-KEY packets are all addressed by names composed from a handful of
//! reserved components.
use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tlv::{types, write_element, TlvError, TlvReader};

/// Reserved name components used by the protocol.
pub mod components {
    pub const FOR: &str = "FOR";
    pub const READ: &str = "READ";
    pub const SAMPLE: &str = "SAMPLE";
    pub const ACCESS: &str = "ACCESS";
    pub const E_KEY: &str = "E-KEY";
    pub const D_KEY: &str = "D-KEY";
    pub const C_KEY: &str = "C-KEY";
}

/// Single opaque name component.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Component(#[serde(with = "serde_bytes")] Vec<u8>);

impl Component {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Component value as UTF-8, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }
}

impl From<&str> for Component {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for Component {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<&[u8]> for Component {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<Vec<u8>> for Component {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

/// NDN canonical order: shorter components sort first, ties are broken by
/// the byte values.
impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            match byte {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                    write!(f, "{}", *byte as char)?
                }
                _ => write!(f, "%{byte:02X}")?,
            }
        }
        Ok(())
    }
}

/// Ordered sequence of components.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Name(Vec<Component>);

impl Name {
    /// Returns the empty name (`/`).
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends one component.
    pub fn append(mut self, component: impl Into<Component>) -> Self {
        self.0.push(component.into());
        self
    }

    /// Appends all components of another name.
    pub fn append_name(mut self, other: &Name) -> Self {
        self.0.extend(other.0.iter().cloned());
        self
    }

    /// Component at `index`; negative indices count from the end, so `-1` is
    /// the last component.
    pub fn component(&self, index: isize) -> Option<&Component> {
        let len = self.0.len() as isize;
        let index = if index < 0 { len + index } else { index };
        if (0..len).contains(&index) {
            self.0.get(index as usize)
        } else {
            None
        }
    }

    /// First `count` components; a negative `count` drops that many
    /// components from the end instead.
    pub fn prefix(&self, count: isize) -> Name {
        let len = self.0.len() as isize;
        let keep = (if count < 0 { len + count } else { count }).clamp(0, len);
        Name(self.0[..keep as usize].to_vec())
    }

    /// Last `count` components.
    pub fn suffix(&self, count: usize) -> Name {
        let skip = self.0.len().saturating_sub(count);
        Name(self.0[skip..].to_vec())
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        other.0.starts_with(&self.0)
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.0.iter()
    }

    /// Encodes this name as a TLV element.
    pub(crate) fn encode_tlv(&self, out: &mut Vec<u8>) {
        let mut inner = Vec::new();
        for component in &self.0 {
            write_element(&mut inner, types::NAME_COMPONENT, component.as_bytes());
        }
        write_element(out, types::NAME, &inner);
    }

    /// Decodes a name from the value of a `Name` TLV element.
    pub(crate) fn decode_tlv(value: &[u8]) -> Result<Name, TlvError> {
        let mut reader = TlvReader::new(value);
        let mut components = Vec::new();
        while reader.has_more() {
            let bytes = reader.read_expected(types::NAME_COMPONENT)?;
            components.push(Component::from(bytes));
        }
        Ok(Name(components))
    }
}

/// Builds a name from a URI-like string, e.g. `"/alice/SAMPLE/x"`.
impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Self(
            value
                .split('/')
                .filter(|part| !part.is_empty())
                .map(Component::from)
                .collect(),
        )
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for component in &self.0 {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{components, Component, Name};

    #[test]
    fn append_and_index() {
        let name = Name::from("/p")
            .append(components::SAMPLE)
            .append_name(&Name::from("/x/y"))
            .append("20240101T101500");

        assert_eq!(name.to_string(), "/p/SAMPLE/x/y/20240101T101500");
        assert_eq!(name.len(), 5);
        assert_eq!(name.component(0).unwrap().as_str(), Some("p"));
        assert_eq!(name.component(-1).unwrap().as_str(), Some("20240101T101500"));
        assert_eq!(name.component(-5).unwrap().as_str(), Some("p"));
        assert!(name.component(5).is_none());
        assert!(name.component(-6).is_none());
    }

    #[test]
    fn prefix_and_suffix() {
        let ekey = Name::from("/p/READ/x/y/E-KEY/20240101T000000/20240102T000000");

        // The D-KEY derivation from the consumer pipeline.
        let dkey = ekey
            .prefix(-3)
            .append(components::D_KEY)
            .append_name(&ekey.suffix(2));
        assert_eq!(
            dkey.to_string(),
            "/p/READ/x/y/D-KEY/20240101T000000/20240102T000000"
        );

        assert_eq!(ekey.prefix(2).to_string(), "/p/READ");
        assert_eq!(ekey.prefix(0), Name::empty());
        assert_eq!(ekey.prefix(-100), Name::empty());
        assert_eq!(ekey.prefix(100), ekey);
    }

    #[test]
    fn prefix_of() {
        let consumer = Name::from("/c");
        assert!(consumer.is_prefix_of(&Name::from("/c/key")));
        assert!(consumer.is_prefix_of(&Name::from("/c")));
        assert!(!consumer.is_prefix_of(&Name::from("/d/key")));
        assert!(Name::empty().is_prefix_of(&consumer));
    }

    #[test]
    fn canonical_component_order() {
        let short = Component::from("zz");
        let long = Component::from("aaa");
        // Shorter components sort first regardless of byte values.
        assert!(short < long);
        assert!(Component::from("aa") < Component::from("ab"));

        // ISO timestamps are equal length, so they sort chronologically.
        assert!(Component::from("20240101T000000") < Component::from("20240102T000000"));
    }

    #[test]
    fn tlv_round_trip() {
        let name = Name::from("/p/READ/x/E-KEY");
        let mut buf = Vec::new();
        name.encode_tlv(&mut buf);

        let mut reader = crate::tlv::TlvReader::new(&buf);
        let value = reader.read_expected(crate::tlv::types::NAME).unwrap();
        assert_eq!(Name::decode_tlv(value).unwrap(), name);
    }

    #[test]
    fn uri_escaping() {
        let name = Name::empty().append([0x01u8, 0xFF].as_slice());
        assert_eq!(name.to_string(), "/%01%FF");
        assert_eq!(Name::empty().to_string(), "/");
    }
}
