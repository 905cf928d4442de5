use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier assigned to a record when it is constructed.
///
/// Rendered as 16 lowercase hex digits, both in `Display` and on the wire,
/// so JSON consumers never see a number wider than 53 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(u64);

impl RecordId {
    pub fn generate() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16).map(Self)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One channel entry: a display name and the locator a player should open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub url: String,
}

impl Record {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: RecordId::generate(),
            name: name.into(),
            url: url.into(),
        }
    }

    /// Same name and url, ignoring the id.
    pub fn same_entry(&self, other: &Record) -> bool {
        self.name == other.name && self.url == other.url
    }
}

// Ids are per-construction, so equality compares the whole record including
// the id. Use `same_entry` to compare content only.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.same_entry(other)
    }
}

impl Eq for Record {}
