//! tkr-edgar
//!
//! HTTP-backed [`Directory`] over the SEC EDGAR endpoints: the ticker
//! directory (snapshot), per-filer XBRL company facts and per-filer
//! submissions (profile). Every request carries the configured User-Agent and
//! goes through the shared [`RequestBudget`].
//!
//! This crate does not write to the DB; callers hand the results to tkr-db.

pub mod budget;
pub mod feed;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Deserializer, Serialize};
use tkr_registry::{Directory, DirectoryError, EntityKey, Snapshot, SnapshotRecord};
use tkr_revenue::CompanyFacts;
use tracing::debug;

pub use budget::RequestBudget;
pub use feed::{parse_title, parse_titles};

pub const DEFAULT_DIRECTORY_URL: &str = "https://www.sec.gov/files/company_tickers.json";
pub const DEFAULT_DATA_BASE_URL: &str = "https://data.sec.gov";
pub const ARCHIVES_BASE_URL: &str = "https://www.sec.gov/Archives/edgar/data";

const ANNUAL_REPORT_FORM: &str = "10-K";

/// EDGAR client. The User-Agent must identify the operator (name + email);
/// upstream rejects anonymous traffic.
#[derive(Debug)]
pub struct EdgarClient {
    http: reqwest::Client,
    user_agent: String,
    directory_url: String,
    data_base_url: String,
    budget: RequestBudget,
}

impl EdgarClient {
    pub fn new(user_agent: String) -> Self {
        Self::new_with_base_url(
            user_agent,
            DEFAULT_DIRECTORY_URL.to_string(),
            DEFAULT_DATA_BASE_URL.to_string(),
        )
    }

    pub fn new_with_base_url(user_agent: String, directory_url: String, data_base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            user_agent,
            directory_url,
            data_base_url,
            budget: RequestBudget::default(),
        }
    }

    pub fn with_budget(mut self, budget: RequestBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn facts_url(&self, key: EntityKey) -> String {
        format!(
            "{}/api/xbrl/companyfacts/CIK{}.json",
            self.data_base_url.trim_end_matches('/'),
            key.padded()
        )
    }

    pub fn submissions_url(&self, key: EntityKey) -> String {
        format!(
            "{}/submissions/CIK{}.json",
            self.data_base_url.trim_end_matches('/'),
            key.padded()
        )
    }

    /// Filer metadata used for profile enrichment.
    pub async fn fetch_submissions(&self, key: EntityKey) -> Result<FilerProfile, DirectoryError> {
        let url = self.submissions_url(key);
        let body = self.get_text(&url).await?;
        FilerProfile::from_json_str(key, &body).map_err(|e| DirectoryError::Decode(format!("{url}: {e}")))
    }

    async fn get_text(&self, url: &str) -> Result<String, DirectoryError> {
        self.budget.acquire().await;
        debug!(url, "edgar request");

        let resp = self
            .http
            .get(url)
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await
            .map_err(|e| DirectoryError::Transport(format!("{url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DirectoryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text()
            .await
            .map_err(|e| DirectoryError::Transport(format!("{url}: {e}")))
    }
}

#[async_trait::async_trait]
impl Directory for EdgarClient {
    fn name(&self) -> &'static str {
        "edgar"
    }

    async fn fetch_snapshot(&self) -> Result<Snapshot, DirectoryError> {
        let body = self.get_text(&self.directory_url).await?;
        parse_directory(&body)
            .map_err(|e| DirectoryError::Decode(format!("{}: {e}", self.directory_url)))
    }

    async fn fetch_facts(&self, key: EntityKey) -> Result<CompanyFacts, DirectoryError> {
        let url = self.facts_url(key);
        let body = self.get_text(&url).await?;
        CompanyFacts::from_json_str(&body).map_err(|e| DirectoryError::Decode(format!("{url}: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Ticker directory
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DirectoryEntry {
    #[serde(deserialize_with = "de_cik")]
    cik_str: u64,
    ticker: String,
    title: String,
}

/// Parse the ticker directory document.
///
/// The document is an object of `{"<rank>": {cik_str, ticker, title}}`.
/// Entries are taken in ascending numeric rank (document order), so when
/// one filer lists several tickers the last-listed one wins. A listed entry
/// with a blank ticker is kept with an empty symbol: the filer is still
/// registered.
pub fn parse_directory(raw: &str) -> Result<Snapshot, serde_json::Error> {
    let doc: BTreeMap<String, DirectoryEntry> = serde_json::from_str(raw)?;

    let mut ranked: Vec<(u64, String, DirectoryEntry)> = doc
        .into_iter()
        .map(|(rank, e)| (rank.parse::<u64>().unwrap_or(u64::MAX), rank, e))
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    Ok(Snapshot::from_records(
        ranked
            .into_iter()
            .map(|(_, _, e)| SnapshotRecord::new(e.cik_str, &e.ticker, &e.title)),
    ))
}

fn de_cik<'de, D>(d: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Text(String),
    }
    match Raw::deserialize(d)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Submissions -> profile
// ---------------------------------------------------------------------------

/// Most recent annual report of a filer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnualReport {
    pub report_date: Option<NaiveDate>,
    pub url: String,
}

/// Supplementary per-filer metadata. Not part of the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilerProfile {
    pub key: EntityKey,
    pub industry: Option<String>,
    /// `"City, ST"`, or whichever half is known.
    pub location: Option<String>,
    pub latest_annual_report: Option<AnnualReport>,
}

#[derive(Debug, Default, Deserialize)]
struct SubmissionsDoc {
    #[serde(rename = "sicDescription")]
    sic_description: Option<String>,
    #[serde(default)]
    addresses: Addresses,
    #[serde(default)]
    filings: Filings,
}

#[derive(Debug, Default, Deserialize)]
struct Addresses {
    business: Option<Address>,
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    city: Option<String>,
    #[serde(rename = "stateOrCountry", alias = "stateProvince")]
    state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Filings {
    #[serde(default)]
    recent: RecentFilings,
}

/// Column-oriented: index `i` of every vector describes the same filing,
/// newest first.
#[derive(Debug, Default, Deserialize)]
struct RecentFilings {
    #[serde(default)]
    form: Vec<String>,
    #[serde(default, rename = "accessionNumber")]
    accession_number: Vec<String>,
    #[serde(default, rename = "primaryDocument")]
    primary_document: Vec<String>,
    #[serde(default, rename = "reportDate")]
    report_date: Vec<String>,
}

impl FilerProfile {
    pub fn from_json_str(key: EntityKey, raw: &str) -> Result<Self, serde_json::Error> {
        let doc: SubmissionsDoc = serde_json::from_str(raw)?;
        Ok(Self::from_doc(key, doc))
    }

    fn from_doc(key: EntityKey, doc: SubmissionsDoc) -> Self {
        let industry = doc
            .sic_description
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let location = doc.addresses.business.and_then(|b| {
            let parts: Vec<String> = [b.city, b.state]
                .into_iter()
                .flatten()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        });

        Self {
            key,
            industry,
            location,
            latest_annual_report: latest_annual_report(key, &doc.filings.recent),
        }
    }
}

fn latest_annual_report(key: EntityKey, recent: &RecentFilings) -> Option<AnnualReport> {
    let idx = recent.form.iter().position(|f| f == ANNUAL_REPORT_FORM)?;
    let accession = recent.accession_number.get(idx)?.replace('-', "");
    let document = recent.primary_document.get(idx)?;
    let report_date = recent
        .report_date
        .get(idx)
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok());
    Some(AnnualReport {
        report_date,
        url: format!("{ARCHIVES_BASE_URL}/{}/{accession}/{document}", key.get()),
    })
}

// -----------------
// Tests (no network)
// -----------------
