//! # Address Patterns
//!
//! Hierarchical addressing over three independent axes: data key path,
//! device and host.
//!
//! ```text
//! u/a/*@ctd@lab
//! ───┬─ ─┬─ ─┬─
//!    │   │   └── host: name or uuid of the enriching host
//!    │   └────── device: producing device
//!    └────────── key path: one matcher per segment
//! ```
//!
//! `*` matches exactly one segment. A pattern shorter than a path matches
//! every path below it, so `**` as the last segment is accepted and means the
//! same as leaving the tail off. An omitted or `*` axis matches anything.
//! All comparisons are exact and case-sensitive.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use shared_types::{EnrichedPacket, HostIdentity, Payload};
use thiserror::Error;

use super::key_path::{extract_key_paths, KeyTree, SEPARATOR};

/// Separates the key path, device and host axes.
pub const AXIS_DELIMITER: char = '@';

/// Single segment wildcard.
pub const WILDCARD: &str = "*";

/// Recursive wildcard, last segment only.
pub const RECURSIVE_WILDCARD: &str = "**";

/// Errors from parsing address patterns.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The pattern string violates the pattern grammar.
    #[error("Malformed address pattern `{pattern}`: {reason}")]
    Malformed { pattern: String, reason: String },
}

/// Matcher for one key path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Literal(String),
    /// `*`
    Any,
}

impl Segment {
    /// True if this matcher accepts `segment`.
    #[must_use]
    pub fn accepts(&self, segment: &str) -> bool {
        match self {
            Self::Literal(name) => name == segment,
            Self::Any => true,
        }
    }
}

/// Matcher for the device or host axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum AxisMatcher {
    #[default]
    Any,
    Exact(String),
}

impl AxisMatcher {
    /// True if this matcher accepts `value`.
    #[must_use]
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(name) => name == value,
        }
    }

    /// Host axis: accepts the host's name or uuid.
    #[must_use]
    pub fn accepts_host(&self, host: &HostIdentity) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(ident) => host.is_named(ident),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            Self::Any => WILDCARD,
            Self::Exact(name) => name,
        }
    }
}

/// Parsed, immutable address pattern.
///
/// An empty key path list is the universal key matcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AddressPattern {
    keys: Vec<Segment>,
    device: AxisMatcher,
    host: AxisMatcher,
}

impl AddressPattern {
    /// Matches every key of every packet.
    #[must_use]
    pub fn universal() -> Self {
        Self::default()
    }

    /// Every key of one device, from any host.
    #[must_use]
    pub fn for_device(device: impl Into<String>) -> Self {
        Self {
            device: AxisMatcher::Exact(device.into()),
            ..Self::default()
        }
    }

    /// Restrict the host axis.
    #[must_use]
    pub fn on_host(mut self, host: impl Into<String>) -> Self {
        self.host = AxisMatcher::Exact(host.into());
        self
    }

    /// Parse a pattern string.
    ///
    /// # Errors
    ///
    /// `AddressError::Malformed` for empty segments, a `**` that is not last,
    /// segments mixing `*` with other characters, or more than three axes.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let malformed = |reason: String| AddressError::Malformed {
            pattern: input.to_string(),
            reason,
        };

        let mut axes = input.split(AXIS_DELIMITER);
        let key_part = axes.next().unwrap_or_default();
        let device_part = axes.next().unwrap_or_default();
        let host_part = axes.next().unwrap_or_default();
        if axes.next().is_some() {
            return Err(malformed("at most three `@`-separated axes".into()));
        }

        Ok(Self {
            keys: parse_key_path(key_part).map_err(malformed)?,
            device: parse_axis("device", device_part).map_err(malformed)?,
            host: parse_axis("host", host_part).map_err(malformed)?,
        })
    }

    /// Key path matchers; empty means every key.
    #[must_use]
    pub fn keys(&self) -> &[Segment] {
        &self.keys
    }

    #[must_use]
    pub fn device(&self) -> &AxisMatcher {
        &self.device
    }

    #[must_use]
    pub fn host(&self) -> &AxisMatcher {
        &self.host
    }

    /// True if the key axis accepts every key path.
    #[must_use]
    pub fn matches_all_keys(&self) -> bool {
        self.keys.is_empty()
    }

    /// True if all three axes accept anything.
    #[must_use]
    pub fn is_universal(&self) -> bool {
        self.keys.is_empty() && self.device == AxisMatcher::Any && self.host == AxisMatcher::Any
    }

    /// Device and host axes only.
    #[must_use]
    pub fn matches_origin(&self, device: &str, host: &HostIdentity) -> bool {
        self.device.accepts(device) && self.host.accepts_host(host)
    }

    /// True if the packet's origin matches and at least one of its key paths
    /// (sequences expanded) is addressed by the key axis.
    #[must_use]
    pub fn matches(&self, packet: &EnrichedPacket) -> bool {
        if !self.matches_origin(packet.device(), packet.host()) {
            return false;
        }
        self.keys.is_empty() || self.matches_tree(&extract_key_paths(&packet.payload, true).tree)
    }

    /// Key axis against a prebuilt path tree.
    #[must_use]
    pub fn matches_tree(&self, tree: &KeyTree) -> bool {
        tree_matches(tree, &self.keys)
    }

    /// Key axis against one `/`-joined path.
    ///
    /// The path matches if the pattern's segments accept its leading
    /// segments; deeper segments are covered by the recursive tail.
    #[must_use]
    pub fn matches_path(&self, path: &str) -> bool {
        if self.keys.is_empty() {
            return true;
        }
        let mut segments = path.split(SEPARATOR);
        self.keys.iter().all(|matcher| {
            segments
                .next()
                .is_some_and(|segment| !segment.is_empty() && matcher.accepts(segment))
        })
    }

    /// The subtree of a packet's payload addressed by this pattern.
    ///
    /// The result keeps the original nesting: `u/a` on
    /// `{u: {a: [..], b: ..}}` yields `{u: {a: [..]}}`. Selecting through a
    /// sequence keeps matching elements in order. A packet whose origin does
    /// not match selects nothing.
    #[must_use]
    pub fn select(&self, packet: &EnrichedPacket) -> Payload {
        if !self.matches_origin(packet.device(), packet.host()) {
            return Payload::new();
        }
        self.select_payload(&packet.payload)
    }

    /// Key axis selection on a bare payload.
    #[must_use]
    pub fn select_payload(&self, payload: &Payload) -> Payload {
        match self.keys.split_first() {
            None => payload.clone(),
            Some((head, rest)) => select_entries(payload, head, rest),
        }
    }
}

impl fmt::Display for AddressPattern {
    /// Canonical form. The universal pattern is `*`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.keys.is_empty() {
            f.write_str(WILDCARD)?;
        }
        for (i, segment) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            match segment {
                Segment::Literal(name) => f.write_str(name)?,
                Segment::Any => f.write_str(WILDCARD)?,
            }
        }
        match (&self.device, &self.host) {
            (_, AxisMatcher::Exact(host)) => {
                write!(f, "{AXIS_DELIMITER}{}{AXIS_DELIMITER}{host}", self.device.as_str())
            }
            (AxisMatcher::Exact(device), AxisMatcher::Any) => {
                write!(f, "{AXIS_DELIMITER}{device}")
            }
            (AxisMatcher::Any, AxisMatcher::Any) => Ok(()),
        }
    }
}

impl FromStr for AddressPattern {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for AddressPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AddressPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_key_path(text: &str) -> Result<Vec<Segment>, String> {
    if text.is_empty() || text == WILDCARD || text == RECURSIVE_WILDCARD {
        return Ok(Vec::new());
    }

    let raw: Vec<&str> = text.split(SEPARATOR).collect();
    let last = raw.len() - 1;
    let mut segments = Vec::with_capacity(raw.len());
    for (i, segment) in raw.into_iter().enumerate() {
        match segment {
            "" => return Err(format!("empty key segment at position {i}")),
            WILDCARD => segments.push(Segment::Any),
            // A trailing recursive wildcard is the implicit tail.
            RECURSIVE_WILDCARD if i == last => {}
            RECURSIVE_WILDCARD => return Err("`**` is only allowed as the last segment".into()),
            name if name.contains('*') => {
                return Err(format!("segment `{name}` mixes `*` with other characters"))
            }
            name => segments.push(Segment::Literal(name.to_string())),
        }
    }
    // `*/**` selects every top-level key, same as `*`.
    if segments == [Segment::Any] {
        segments.clear();
    }
    Ok(segments)
}

fn parse_axis(axis: &str, text: &str) -> Result<AxisMatcher, String> {
    match text {
        "" | WILDCARD => Ok(AxisMatcher::Any),
        name if name.contains('*') => Err(format!("{axis} `{name}` mixes `*` with other characters")),
        name if name.contains(SEPARATOR) => Err(format!("{axis} `{name}` contains `{SEPARATOR}`")),
        name => Ok(AxisMatcher::Exact(name.to_string())),
    }
}

// =============================================================================
// MATCHING & SELECTION
// =============================================================================

fn tree_matches(node: &KeyTree, segments: &[Segment]) -> bool {
    let Some((head, rest)) = segments.split_first() else {
        return true;
    };
    match head {
        Segment::Literal(name) => node.child(name).is_some_and(|child| tree_matches(child, rest)),
        Segment::Any => node.children().any(|(_, child)| tree_matches(child, rest)),
    }
}

fn select_entries(map: &Payload, head: &Segment, rest: &[Segment]) -> Payload {
    let mut picked = Payload::new();
    match head {
        Segment::Literal(name) => {
            if let Some((key, value)) = map.get_key_value(name) {
                if let Some(selected) = select_value(value, rest) {
                    picked.insert(key.clone(), selected);
                }
            }
        }
        Segment::Any => {
            for (key, value) in map {
                if let Some(selected) = select_value(value, rest) {
                    picked.insert(key.clone(), selected);
                }
            }
        }
    }
    picked
}

fn select_value(value: &Value, segments: &[Segment]) -> Option<Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value.clone());
    };
    match value {
        Value::Object(map) => {
            let picked = select_entries(map, head, rest);
            (!picked.is_empty()).then_some(Value::Object(picked))
        }
        Value::Array(items) => {
            let picked: Vec<Value> = items
                .iter()
                .enumerate()
                .filter(|(i, _)| head.accepts(&i.to_string()))
                .filter_map(|(_, item)| select_value(item, rest))
                .collect();
            (!picked.is_empty()).then_some(Value::Array(picked))
        }
        // Scalars and empty containers have no deeper segments.
        _ => None,
    }
}
