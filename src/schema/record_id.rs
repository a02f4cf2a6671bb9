//! Record identifiers
//!
//! A record id locates a stored record as `#<cluster>:<position>`. The cluster
//! component is bounded by `MAX_CLUSTER_ID`; negative components denote
//! temporary records and are accepted.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::errors::CastError;

/// Largest cluster id a record id may carry
pub const MAX_CLUSTER_ID: i64 = 32767;

/// Field carrying the record id of an embedded record
pub const RID_FIELD: &str = "@rid";

const RID_SOURCE: &str = r"^#?-?\d{1,5}:-?\d+$";
const STRICT_RID_SOURCE: &str = r"^#-?\d{1,5}:-?\d+$";

static RID_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
static STRICT_RID_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn rid_pattern(require_hash: bool) -> Result<&'static Regex, CastError> {
    let (cell, source) = if require_hash {
        (&STRICT_RID_PATTERN, STRICT_RID_SOURCE)
    } else {
        (&RID_PATTERN, RID_SOURCE)
    };
    cell.get_or_init(|| Regex::new(source).ok())
        .as_ref()
        .ok_or_else(|| CastError::new("record id", format!("grammar '{}' does not compile", source)))
}

/// A structured record locator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    cluster: i16,
    position: i64,
}

impl RecordId {
    /// Create a record id, rejecting clusters outside the addressable range
    pub fn new(cluster: i64, position: i64) -> Result<Self, CastError> {
        if cluster.unsigned_abs() > MAX_CLUSTER_ID as u64 {
            return Err(CastError::new(
                "record id",
                format!("cluster id {} exceeds {}", cluster, MAX_CLUSTER_ID),
            ));
        }
        Ok(Self {
            cluster: cluster as i16,
            position,
        })
    }

    pub fn cluster(&self) -> i16 {
        self.cluster
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    /// Parse the textual form. With `require_hash` the leading `#` is mandatory.
    pub fn parse(text: &str, require_hash: bool) -> Result<Self, CastError> {
        let text = text.trim();
        if !rid_pattern(require_hash)?.is_match(text) {
            return Err(CastError::new(
                "record id",
                format!("'{}' is not a valid record id", text),
            ));
        }

        let body = text.strip_prefix('#').unwrap_or(text);
        let (cluster, position) = body
            .split_once(':')
            .ok_or_else(|| CastError::new("record id", format!("'{}' has no ':'", text)))?;

        let cluster: i64 = cluster
            .parse()
            .map_err(|_| CastError::new("record id", format!("bad cluster in '{}'", text)))?;
        let position: i64 = position
            .parse()
            .map_err(|_| CastError::new("record id", format!("bad position in '{}'", text)))?;

        Self::new(cluster, position)
    }

    /// Accepts a record-id string, an embedded record carrying `@rid`, or the
    /// native `{"cluster": c, "position": p}` object.
    pub fn from_value(value: &Value, require_hash: bool) -> Result<Self, CastError> {
        match value {
            Value::String(s) => Self::parse(s, require_hash),
            Value::Object(map) => {
                if let Some(inner) = map.get(RID_FIELD) {
                    return Self::from_value(inner, require_hash);
                }
                match (
                    map.get("cluster").and_then(Value::as_i64),
                    map.get("position").and_then(Value::as_i64),
                ) {
                    (Some(cluster), Some(position)) => Self::new(cluster, position),
                    _ => Err(CastError::new(
                        "record id",
                        "object carries neither '@rid' nor cluster/position",
                    )),
                }
            }
            other => Err(CastError::new(
                "record id",
                format!("unsupported value {}", other),
            )),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.cluster, self.position)
    }
}

impl FromStr for RecordId {
    type Err = CastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, false)
    }
}

impl From<RecordId> for Value {
    fn from(rid: RecordId) -> Self {
        Value::String(rid.to_string())
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text, false).map_err(serde::de::Error::custom)
    }
}
