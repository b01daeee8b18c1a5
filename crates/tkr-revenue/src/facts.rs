//! Company-facts document model.
//!
//! Mirrors the shape served by the EDGAR `companyfacts` endpoint:
//!
//! ```text
//! { "entityName": "...",
//!   "facts": { <namespace>: { <tag>: { "units": { <unit>: [ {end, val, fp, ...} ] } } } } }
//! ```
//!
//! Every level is optional on the wire. Missing levels deserialize to empty
//! maps so lookups degrade to "candidate absent" instead of decode errors.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Full facts document for one filer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyFacts {
    #[serde(default, rename = "entityName")]
    pub entity_name: Option<String>,

    /// namespace -> tag -> facts
    #[serde(default)]
    pub facts: BTreeMap<String, BTreeMap<String, TagFacts>>,
}

impl CompanyFacts {
    /// Decode a raw JSON payload.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Decode an already-parsed JSON value.
    pub fn from_value(v: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(v)
    }

    /// Look up a single tag. `None` when the namespace or the tag is absent.
    pub fn tag(&self, namespace: &str, tag: &str) -> Option<&TagFacts> {
        self.facts.get(namespace)?.get(tag)
    }
}

/// All reported points for one tag, grouped by unit of measure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagFacts {
    #[serde(default)]
    pub label: Option<String>,

    /// unit (e.g. `USD`, `EUR`) -> points in stored order
    #[serde(default)]
    pub units: BTreeMap<String, Vec<FactPoint>>,
}

/// One reported value.
///
/// `end` is parsed leniently: a missing or malformed date becomes `None` and
/// the point is ignored by recency selection rather than failing the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactPoint {
    #[serde(default, deserialize_with = "lenient_date")]
    pub end: Option<NaiveDate>,

    #[serde(default)]
    pub val: Option<f64>,

    /// Fiscal period code (`FY`, `Q1`..`Q4`).
    #[serde(default)]
    pub fp: Option<String>,

    #[serde(default)]
    pub form: Option<String>,
}

impl FactPoint {
    pub fn is_annual(&self) -> bool {
        self.fp.as_deref() == Some(crate::ANNUAL_PERIOD)
    }
}

fn lenient_date<'de, D>(d: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(d)?;
    Ok(raw
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()))
}
