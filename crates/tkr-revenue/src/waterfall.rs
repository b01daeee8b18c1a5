use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::facts::{CompanyFacts, FactPoint};

/// Unit preferred when a tag reports several currencies.
pub const BASE_CURRENCY: &str = "USD";

/// Fiscal-period code of a full fiscal year.
pub const ANNUAL_PERIOD: &str = "FY";

/// Default tag priority, highest confidence first.
///
/// The same top-line concept is tagged differently across filers:
/// ASC 606 reporters, legacy US GAAP, IFRS reporters and banks each use their
/// own tag. Order is policy; change it here (or via config), not in code paths.
pub const DEFAULT_WATERFALL: &[(&str, &str)] = &[
    ("us-gaap", "RevenueFromContractWithCustomerExcludingAssessedTax"),
    ("us-gaap", "SalesRevenueNet"),
    ("us-gaap", "SalesRevenueGoodsNet"),
    ("us-gaap", "Revenues"),
    ("ifrs-full", "RevenueFromContractsWithCustomers"),
    ("ifrs-full", "Revenue"),
    ("us-gaap", "InterestAndDividendIncomeOperating"),
];

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// One `(namespace, tag)` entry of the waterfall.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagCandidate {
    pub namespace: String,
    pub tag: String,
}

impl TagCandidate {
    pub fn new(namespace: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            tag: tag.into(),
        }
    }

    /// Parse the `namespace:tag` form used in configuration.
    pub fn parse(s: &str) -> Result<Self, TagParseError> {
        let (ns, tag) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| TagParseError(s.to_string()))?;
        let (ns, tag) = (ns.trim(), tag.trim());
        if ns.is_empty() || tag.is_empty() || tag.contains(':') {
            return Err(TagParseError(s.to_string()));
        }
        Ok(Self::new(ns, tag))
    }
}

impl fmt::Display for TagCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.tag)
    }
}

/// A waterfall entry that is not of the form `namespace:tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagParseError(pub String);

impl fmt::Display for TagParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid waterfall entry '{}': expected 'namespace:tag'",
            self.0
        )
    }
}

impl std::error::Error for TagParseError {}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// The single figure selected by the waterfall, with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueFact {
    pub value: f64,
    pub source: TagCandidate,
    pub unit: String,
    pub end: NaiveDate,
    pub fiscal_period: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Ordered tag waterfall over a [`CompanyFacts`] document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevenueResolver {
    candidates: Vec<TagCandidate>,
}

impl Default for RevenueResolver {
    fn default() -> Self {
        Self::new(
            DEFAULT_WATERFALL
                .iter()
                .map(|(ns, tag)| TagCandidate::new(*ns, *tag))
                .collect(),
        )
    }
}

impl RevenueResolver {
    /// Build a resolver with an explicit priority order.
    pub fn new(candidates: Vec<TagCandidate>) -> Self {
        Self { candidates }
    }

    /// Build from `namespace:tag` strings (config form).
    pub fn from_specs<S: AsRef<str>>(specs: &[S]) -> Result<Self, TagParseError> {
        let candidates = specs
            .iter()
            .map(|s| TagCandidate::parse(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(candidates))
    }

    pub fn candidates(&self) -> &[TagCandidate] {
        &self.candidates
    }

    /// Walk the waterfall; first candidate yielding a non-zero value wins.
    ///
    /// Per candidate:
    /// 1. unit: `USD` if present, else the first unit in key order
    /// 2. annual points if any exist, else all points
    /// 3. point with the greatest `end` (equal `end`: last in stored order)
    /// 4. zero / missing value falls through to the next candidate
    pub fn resolve(&self, facts: &CompanyFacts) -> Option<RevenueFact> {
        for cand in &self.candidates {
            let tag = match facts.tag(&cand.namespace, &cand.tag) {
                Some(t) => t,
                None => continue,
            };
            let (unit, points) = match select_unit(&tag.units) {
                Some(u) => u,
                None => continue,
            };
            let point = match latest_point(points) {
                Some(p) => p,
                None => continue,
            };

            match (point.val, point.end) {
                (Some(v), Some(end)) if v != 0.0 && !v.is_nan() => {
                    return Some(RevenueFact {
                        value: v,
                        source: cand.clone(),
                        unit: unit.to_string(),
                        end,
                        fiscal_period: point.fp.clone(),
                    });
                }
                _ => continue,
            }
        }
        None
    }
}

/// Prefer the base currency; otherwise any unit, taken in key order so the
/// choice is stable for a given document. Not a cross-currency guarantee.
fn select_unit(units: &BTreeMap<String, Vec<FactPoint>>) -> Option<(&str, &[FactPoint])> {
    if let Some(points) = units.get(BASE_CURRENCY) {
        return Some((BASE_CURRENCY, points.as_slice()));
    }
    units
        .iter()
        .next()
        .map(|(unit, points)| (unit.as_str(), points.as_slice()))
}

fn latest_point(points: &[FactPoint]) -> Option<&FactPoint> {
    let any_annual = points.iter().any(FactPoint::is_annual);

    points
        .iter()
        .filter(|p| !any_annual || p.is_annual())
        .filter(|p| p.end.is_some())
        // equal dates: the later point replaces the current best
        .fold(None, |best: Option<&FactPoint>, p| match best {
            Some(b) if b.end > p.end => Some(b),
            _ => Some(p),
        })
}
