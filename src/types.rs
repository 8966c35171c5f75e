use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants;

/// Whether a research run looks for festivals or for venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Festival,
    Venue,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Festival => write!(f, "festival"),
            EntityKind::Venue => write!(f, "venue"),
        }
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "festival" | "festivals" => Ok(EntityKind::Festival),
            "venue" | "venues" | "club" => Ok(EntityKind::Venue),
            other => Err(format!("unknown kind '{}', expected festival or venue", other)),
        }
    }
}

/// One result from an external search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCandidate {
    #[serde(alias = "link")]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "description")]
    pub snippet: String,
}

impl SearchCandidate {
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactType {
    Email,
    Form,
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub has_contact_form: bool,
    pub contact_page_url: Option<String>,
}

impl ContactInfo {
    pub fn contact_type(&self) -> ContactType {
        if self.email.is_some() {
            ContactType::Email
        } else if self.has_contact_form {
            ContactType::Form
        } else {
            ContactType::Unknown
        }
    }
}

/// Which scoring gate produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceGate {
    BlockedDomain,
    NegativeSignal,
    Keywords,
    /// Borderline keyword score decided by the escalation gate.
    Escalation,
}

impl RelevanceGate {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelevanceGate::BlockedDomain => "blocked_domain",
            RelevanceGate::NegativeSignal => "negative_signal",
            RelevanceGate::Keywords => "keywords",
            RelevanceGate::Escalation => "escalation",
        }
    }
}

impl fmt::Display for RelevanceGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceVerdict {
    pub score: u8,
    pub relevant: bool,
    pub reason: String,
    pub gate: RelevanceGate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatedSize {
    Small,
    Medium,
    Large,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationPeriod {
    Explicit,
    Estimated,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowcaseStatus {
    Showcase,
    NotShowcase,
    #[default]
    Unknown,
}

/// Best-effort facts pulled from page text. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFacts {
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_km: Option<f64>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub estimated_size: EstimatedSize,
    pub application_url: Option<String>,
    pub application_period: ApplicationPeriod,
    pub showcase_status: ShowcaseStatus,
    pub red_flags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenreConfidence {
    Explicit,
    Implicit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedGenre {
    pub genre: String,
    pub confidence: GenreConfidence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreMatchResult {
    pub detected_genres: Vec<DetectedGenre>,
    pub negative_signals: Vec<String>,
    pub match_score: u8,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Apply,
    Watch,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub verdict: Verdict,
    pub explanation: String,
}

/// How a candidate was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingSource {
    Keyword,
    SimilarBand,
    ListPage,
}

/// The band a research run is done for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BandProfile {
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub similar_bands: Vec<String>,
    #[serde(default)]
    pub negative_keywords: Vec<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl BandProfile {
    /// Negative genre keywords, falling back to the built-in list.
    pub fn negative_keywords_or_default(&self) -> Vec<String> {
        if self.negative_keywords.is_empty() {
            constants::owned(constants::DEFAULT_NEGATIVE_GENRES)
        } else {
            self.negative_keywords.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_type_prefers_email_over_form() {
        let mut info = ContactInfo {
            email: Some("booking@band.de".to_string()),
            has_contact_form: true,
            contact_page_url: None,
        };
        assert_eq!(info.contact_type(), ContactType::Email);
        info.email = None;
        assert_eq!(info.contact_type(), ContactType::Form);
        info.has_contact_form = false;
        assert_eq!(info.contact_type(), ContactType::Unknown);
    }

    #[test]
    fn entity_kind_parses_cli_values() {
        assert_eq!("Festival".parse::<EntityKind>().unwrap(), EntityKind::Festival);
        assert_eq!("venues".parse::<EntityKind>().unwrap(), EntityKind::Venue);
        assert!("stadium".parse::<EntityKind>().is_err());
    }

    #[test]
    fn search_candidate_accepts_provider_field_names() {
        let candidate: SearchCandidate = serde_json::from_str(
            r#"{"link": "https://fest.de", "title": "Fest", "description": "Ein Festival"}"#,
        )
        .unwrap();
        assert_eq!(candidate.url, "https://fest.de");
        assert_eq!(candidate.snippet, "Ein Festival");
    }

    #[test]
    fn profile_falls_back_to_default_negative_genres() {
        let profile = BandProfile {
            name: "Test".to_string(),
            ..Default::default()
        };
        assert!(profile
            .negative_keywords_or_default()
            .contains(&"Schlager".to_string()));
    }
}
