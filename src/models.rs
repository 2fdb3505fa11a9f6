//! Core review data types shared by the crawler, store, classifier and report.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Canonical on-disk timestamp format
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single customer review scraped from a listing page.
///
/// `complaint_url` is the identity key: it is unique across the persisted table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    #[serde(rename = "Company")]
    pub company: String,

    #[serde(rename = "ComplaintURL")]
    pub complaint_url: String,

    #[serde(rename = "Title", default)]
    pub title: Option<String>,

    #[serde(rename = "Status", default)]
    pub status: Option<String>,

    #[serde(rename = "Text", default)]
    pub body_text: Option<String>,

    #[serde(rename = "Timestamp", default, with = "timestamp_column")]
    pub timestamp: Option<NaiveDateTime>,

    #[serde(rename = "Rating", default)]
    pub rating: Option<String>,

    #[serde(rename = "PayoutRating", default)]
    pub payout_rating: Option<String>,
}

impl ReviewRecord {
    /// Create a record with only the identity fields set
    pub fn new(company: impl Into<String>, complaint_url: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            complaint_url: complaint_url.into(),
            title: None,
            status: None,
            body_text: None,
            timestamp: None,
            rating: None,
            payout_rating: None,
        }
    }
}

/// Parse a timestamp as it appears in `datetime` attributes or in the stored table.
///
/// RFC 3339 values keep their wall-clock time; the offset is dropped.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// CSV column codec for optional timestamps
mod timestamp_column {
    use super::{parse_timestamp, TIMESTAMP_FORMAT};
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse_timestamp))
    }
}

/// Rating category derived from the numeric review grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CategoryLabel {
    Excellent,
    Average,
    Poor,
    Undetermined,
}

impl CategoryLabel {
    pub const ALL: [CategoryLabel; 4] = [
        CategoryLabel::Excellent,
        CategoryLabel::Average,
        CategoryLabel::Poor,
        CategoryLabel::Undetermined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryLabel::Excellent => "Excellent",
            CategoryLabel::Average => "Average",
            CategoryLabel::Poor => "Poor",
            CategoryLabel::Undetermined => "Undetermined",
        }
    }
}

impl fmt::Display for CategoryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of problem areas detected in review text.
///
/// Declaration order doubles as the deterministic tie-break when ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemTag {
    Payouts,
    Timeliness,
    Service,
    Documents,
    InsuranceCaseDenial,
}

impl ProblemTag {
    pub const ALL: [ProblemTag; 5] = [
        ProblemTag::Payouts,
        ProblemTag::Timeliness,
        ProblemTag::Service,
        ProblemTag::Documents,
        ProblemTag::InsuranceCaseDenial,
    ];

    /// Stable key used in config files and the persisted table
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemTag::Payouts => "payouts",
            ProblemTag::Timeliness => "timeliness",
            ProblemTag::Service => "service",
            ProblemTag::Documents => "documents",
            ProblemTag::InsuranceCaseDenial => "insurance_case_denial",
        }
    }

    /// Russian name used by the reviews portal's audience
    pub fn local_name(&self) -> &'static str {
        match self {
            ProblemTag::Payouts => "выплаты",
            ProblemTag::Timeliness => "сроки",
            ProblemTag::Service => "обслуживание",
            ProblemTag::Documents => "документы",
            ProblemTag::InsuranceCaseDenial => "страховой_случай",
        }
    }
}

impl fmt::Display for ProblemTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProblemTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_lowercase();
        ProblemTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == key || tag.local_name() == key)
            .ok_or_else(|| Error::Config(format!("Unknown problem tag: {}", s)))
    }
}

/// A review after the classification pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedReview {
    pub record: ReviewRecord,
    pub category: CategoryLabel,
    pub tags: BTreeSet<ProblemTag>,
}

impl ClassifiedReview {
    /// Tags joined for the `ProblemTags` column
    pub fn tags_column(&self) -> String {
        self.tags
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// What a recommendation row is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSubject {
    Problem(ProblemTag),
    General,
}

impl fmt::Display for RecommendationSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationSubject::Problem(tag) => write!(f, "{}", tag),
            RecommendationSubject::General => f.write_str("general"),
        }
    }
}

/// A recommended action for a problem area
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub subject: RecommendationSubject,
    pub primary_action: String,
    pub secondary_actions: Vec<String>,
}
