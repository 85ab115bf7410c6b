//! Raw call-graph samples as returned by the sampler.
//!
//! A sample maps edge keys of the form `caller==>callee` to the cost of that
//! edge. The synthetic root of the graph has no caller and is stored under
//! [`ROOT_KEY`].

use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::path::Path;

use crate::{TestprofError, TestprofResult};

/// Key of the synthetic root entry.
pub const ROOT_KEY: &str = "main()";

/// Separator between caller and callee in an edge key.
pub const EDGE_SEPARATOR: &str = "==>";

/// Cost metrics recorded for one call-graph edge.
///
/// The record is opaque: every metric the sampler emits is kept as-is,
/// including ones this crate has no accessor for (`mem.aa`, `mem.na`, ...).
/// `cpu`, `mu` and `pmu` are only present when the sampler ran with the
/// matching flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostRecord {
    metrics: BTreeMap<String, serde_json::Value>,
}

impl CostRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metrics.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.metrics.get(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.metrics.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Invocation count.
    pub fn ct(&self) -> Option<u64> {
        self.get("ct").and_then(serde_json::Value::as_u64)
    }

    /// Wall-clock time in microseconds.
    pub fn wt(&self) -> Option<u64> {
        self.get("wt").and_then(serde_json::Value::as_u64)
    }

    pub fn cpu(&self) -> Option<u64> {
        self.get("cpu").and_then(serde_json::Value::as_u64)
    }

    /// Memory delta in bytes. Can be negative.
    pub fn mu(&self) -> Option<i64> {
        self.get("mu").and_then(serde_json::Value::as_i64)
    }

    /// Peak memory delta in bytes.
    pub fn pmu(&self) -> Option<i64> {
        self.get("pmu").and_then(serde_json::Value::as_i64)
    }
}

/// One caller/callee pair split out of an edge key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge<'a> {
    pub caller: &'a str,
    pub callee: &'a str,
}

impl<'a> Edge<'a> {
    /// Splits `key` on [`EDGE_SEPARATOR`]. The key must contain exactly one
    /// separator.
    pub fn parse(key: &'a str) -> TestprofResult<Self> {
        let mut parts = key.split(EDGE_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(caller), Some(callee), None) => Ok(Self { caller, callee }),
            _ => Err(TestprofError::MalformedEdgeKey(key.to_string())),
        }
    }

    pub fn key(&self) -> String {
        format!("{}{EDGE_SEPARATOR}{}", self.caller, self.callee)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawProfileSample {
    edges: BTreeMap<String, CostRecord>,
}

impl RawProfileSample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, cost: CostRecord) -> Option<CostRecord> {
        self.edges.insert(key.into(), cost)
    }

    pub fn get(&self, key: &str) -> Option<&CostRecord> {
        self.edges.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.edges.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn root(&self) -> Option<&CostRecord> {
        self.edges.get(ROOT_KEY)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CostRecord)> {
        self.edges.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn read_json(path: &Path) -> TestprofResult<Self> {
        let bytes = std::fs::read(path)?;
        let sample: RawProfileSample = serde_json::from_slice(&bytes)?;
        Ok(sample)
    }
}

impl FromIterator<(String, CostRecord)> for RawProfileSample {
    fn from_iter<I: IntoIterator<Item = (String, CostRecord)>>(iter: I) -> Self {
        Self {
            edges: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<(&'a str, CostRecord)> for RawProfileSample {
    fn from_iter<I: IntoIterator<Item = (&'a str, CostRecord)>>(iter: I) -> Self {
        iter.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}
