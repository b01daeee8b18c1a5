//! tkr-revenue
//!
//! Revenue resolution over an XBRL company-facts document.
//!
//! Architectural decisions:
//! - One representative revenue figure per entity, resolved fresh on every call
//! - Ordered tag waterfall: most specific tag first, generic / sector tags last
//! - Annual (`fp == "FY"`) points preferred over interim points
//! - Most recent `end` date wins; ties resolved by stored order (last seen wins)
//! - Absent namespace / tag / unit is a negative result, never an error
//!
//! Deterministic, pure logic. No IO.

mod facts;
mod waterfall;

pub use facts::{CompanyFacts, FactPoint, TagFacts};
pub use waterfall::{
    RevenueFact, RevenueResolver, TagCandidate, TagParseError, ANNUAL_PERIOD, BASE_CURRENCY,
    DEFAULT_WATERFALL,
};
