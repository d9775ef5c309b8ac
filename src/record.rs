//! The (key, value, tombstone) triple that moves through every layer of the
//! store: cache entry, durability-log entry, and table data-region entry all
//! share this one wire shape.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single mutation: an insert carrying a JSON value, or an erase carrying
/// a tombstone. The field names mirror the on-disk wire format exactly
/// (`Key`, `Value`, `Deleted`) so that the JSON emitted here is the JSON
/// stored verbatim in a table's data region and in durability-log records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: serde_json::Value,
    #[serde(rename = "Deleted")]
    pub tombstone: bool,
}

impl Record {
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Record {
        Record {
            key: key.into(),
            value,
            tombstone: false,
        }
    }

    pub fn tombstone(key: impl Into<String>) -> Record {
        Record {
            key: key.into(),
            value: serde_json::Value::Null,
            tombstone: true,
        }
    }

    /// Estimated byte footprint used by the cache's capacity accounting:
    /// the stringified length of the key plus the stringified length of the
    /// value. This is an approximation, not an exact byte count.
    pub fn footprint(&self) -> u64 {
        stringify_len(&self.key) + stringify_value_len(&self.value)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Record> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn stringify_len(s: &str) -> u64 {
    s.len() as u64
}

fn stringify_value_len(v: &serde_json::Value) -> u64 {
    match v {
        serde_json::Value::String(s) => s.len() as u64,
        serde_json::Value::Null => 0,
        other => other.to_string().len() as u64,
    }
}
