//! Query fingerprints
//!
//! A [`CacheKey`] is the SHA-256 digest of a canonical JSON document holding
//! the whitespace-collapsed query, the variables with every object's keys in
//! sorted order, and the normalized endpoint.

use std::fmt::{self, Display};

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::endpoint::Endpoint;

/// A fingerprint of the semantic content of a GraphQL request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(
        query: &str,
        variables: &Map<String, Value>,
        endpoint: &Endpoint,
    ) -> Result<Self, serde_json::Error> {
        let document = KeyDocument {
            base_url: endpoint.as_str(),
            query: &normalize_query(query),
            variables,
        };

        let mut hasher = Sha256::new();
        serde_json::to_writer(&mut hasher, &document)?;
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collapse all runs of whitespace into single spaces
pub(crate) fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct KeyDocument<'a> {
    base_url: &'a str,
    query: &'a str,
    variables: &'a Map<String, Value>,
}

impl Serialize for KeyDocument<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("base_url", self.base_url)?;
        map.serialize_entry("query", self.query)?;
        map.serialize_entry("variables", &Canonical::Object(self.variables))?;
        map.end()
    }
}

/// A JSON value that serializes object members in key order, whatever order
/// the underlying map keeps them in
#[derive(Clone, Copy)]
enum Canonical<'a> {
    Value(&'a Value),
    Object(&'a Map<String, Value>),
}

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Canonical::Object(object) | Canonical::Value(Value::Object(object)) => {
                let mut members: Vec<_> = object.iter().collect();
                members.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

                let mut map = serializer.serialize_map(Some(members.len()))?;
                for (key, value) in members {
                    map.serialize_entry(key, &Canonical::Value(value))?;
                }
                map.end()
            }
            Canonical::Value(Value::Array(items)) => {
                serializer.collect_seq(items.iter().map(Canonical::Value))
            }
            Canonical::Value(scalar) => scalar.serialize(serializer),
        }
    }
}
