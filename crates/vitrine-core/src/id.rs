//! Identifier types.
//!
//! Backend entity identifiers are full-precision 64-bit integers. They are
//! serialized as JSON strings and never pass through a floating-point type,
//! so identifiers above 2^53 round-trip exactly.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::Error;

/// Opaque backend entity identifier.
///
/// Carried as an exact `i64`; the JSON representation is a string so that
/// consumers without 64-bit integers cannot silently lose precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(i64);

impl EntityId {
    /// Wrap a raw identifier.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw identifier value.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .map(EntityId)
            .map_err(|e| Error::InvalidInput(format!("invalid entity id {s:?}: {e}")))
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

struct EntityIdVisitor;

impl Visitor<'_> for EntityIdVisitor {
    type Value = EntityId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer identifier as a string or integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse::<i64>().map(EntityId).map_err(de::Error::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(EntityId(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v).map(EntityId).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(EntityIdVisitor)
    }
}

/// Client-generated identifier for one pending upload item.
///
/// Composed from the batch identifier (one user gesture) and the item's
/// ordinal within the batch. Displays as `"<batch-uuid>:<ordinal>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadItemId {
    pub batch: Uuid,
    pub ordinal: u32,
}

impl UploadItemId {
    /// Create an item id from a batch id and ordinal.
    pub const fn new(batch: Uuid, ordinal: u32) -> Self {
        Self { batch, ordinal }
    }
}

impl fmt::Display for UploadItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.batch, self.ordinal)
    }
}

impl FromStr for UploadItemId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (batch, ordinal) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidInput(format!("invalid upload item id {s:?}")))?;
        let batch = Uuid::parse_str(batch)
            .map_err(|e| Error::InvalidInput(format!("invalid batch id in {s:?}: {e}")))?;
        let ordinal = ordinal
            .parse::<u32>()
            .map_err(|e| Error::InvalidInput(format!("invalid ordinal in {s:?}: {e}")))?;
        Ok(Self { batch, ordinal })
    }
}

impl Serialize for UploadItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UploadItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
