use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ScoutError};
use crate::scrapers::html::{domain_stem, site_root};
use crate::types::{
    ContactInfo, ContactType, EntityKind, ExtractedFacts, FindingSource, GenreMatchResult,
    Recommendation, RelevanceVerdict,
};

const TITLE_SEPARATORS: &[&str] = &[" | ", "|", " - ", " – ", " — "];

/// Finished research output for one accepted festival or venue page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// UUID v5 of the natural key, stable across runs.
    pub id: Uuid,
    pub kind: EntityKind,
    pub name: String,
    pub website: String,
    pub description: Option<String>,
    pub contact: ContactInfo,
    pub contact_type: ContactType,
    pub facts: ExtractedFacts,
    pub genre_match: Option<GenreMatchResult>,
    pub recommendation: Recommendation,
    pub source: FindingSource,
    pub source_urls: Vec<String>,
    pub relevance_score: u8,
    pub discovered_at: DateTime<Utc>,
}

impl Finding {
    /// Festivals are keyed by website, venues by name and city.
    pub fn natural_key(&self) -> String {
        natural_key(self.kind, &self.name, &self.website, self.facts.city.as_deref())
    }
}

fn natural_key(kind: EntityKind, name: &str, website: &str, city: Option<&str>) -> String {
    match kind {
        EntityKind::Festival => website.trim_end_matches('/').to_lowercase(),
        EntityKind::Venue => format!(
            "{}|{}",
            name.trim().to_lowercase(),
            city.map(|c| c.trim().to_lowercase())
                .unwrap_or_else(|| website.trim_end_matches('/').to_lowercase())
        ),
    }
}

/// Entity name from a page title: the part before the first site-name separator.
pub fn name_from_title(title: &str) -> Option<String> {
    let mut name = title.trim();
    for separator in TITLE_SEPARATORS {
        if let Some((head, _)) = name.split_once(separator) {
            if !head.trim().is_empty() {
                name = head.trim();
            }
        }
    }
    (!name.is_empty()).then(|| name.to_string())
}

/// Builds a [`Finding`]. `kind`, `source` and the page URL are given up front;
/// a positive relevance verdict and a recommendation are required by `build`.
#[derive(Debug, Clone)]
pub struct FindingBuilder {
    kind: EntityKind,
    source: FindingSource,
    page_url: String,
    title: Option<String>,
    description: Option<String>,
    contact: ContactInfo,
    facts: ExtractedFacts,
    genre_match: Option<GenreMatchResult>,
    recommendation: Option<Recommendation>,
    relevance: Option<RelevanceVerdict>,
    extra_urls: Vec<String>,
}

impl FindingBuilder {
    pub fn new(kind: EntityKind, source: FindingSource, page_url: impl Into<String>) -> Self {
        Self {
            kind,
            source,
            page_url: page_url.into(),
            title: None,
            description: None,
            contact: ContactInfo::default(),
            facts: ExtractedFacts::default(),
            genre_match: None,
            recommendation: None,
            relevance: None,
            extra_urls: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn contact(mut self, contact: ContactInfo) -> Self {
        self.contact = contact;
        self
    }

    pub fn facts(mut self, facts: ExtractedFacts) -> Self {
        self.facts = facts;
        self
    }

    pub fn genre_match(mut self, genre_match: Option<GenreMatchResult>) -> Self {
        self.genre_match = genre_match;
        self
    }

    pub fn recommendation(mut self, recommendation: Recommendation) -> Self {
        self.recommendation = Some(recommendation);
        self
    }

    pub fn relevance(mut self, verdict: RelevanceVerdict) -> Self {
        self.relevance = Some(verdict);
        self
    }

    /// A further URL the entity was seen under, e.g. the list page linking to it.
    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.extra_urls.push(url.into());
        self
    }

    pub fn build(self) -> Result<Finding> {
        let relevance = self
            .relevance
            .ok_or_else(|| ScoutError::IncompleteFinding("missing relevance verdict".to_string()))?;
        if !relevance.relevant {
            return Err(ScoutError::IncompleteFinding(format!(
                "{} was not judged relevant ({})",
                self.page_url, relevance.reason
            )));
        }
        let recommendation = self
            .recommendation
            .ok_or_else(|| ScoutError::IncompleteFinding("missing recommendation".to_string()))?;
        let website = site_root(&self.page_url).ok_or_else(|| {
            ScoutError::IncompleteFinding(format!("no website in '{}'", self.page_url))
        })?;
        let name = self
            .title
            .as_deref()
            .and_then(name_from_title)
            .or_else(|| domain_stem(&self.page_url))
            .ok_or_else(|| ScoutError::IncompleteFinding("missing name".to_string()))?;

        let key = natural_key(self.kind, &name, &website, self.facts.city.as_deref());
        let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("{}:{}", self.kind, key).as_bytes());

        let mut source_urls = vec![self.page_url];
        for url in self.extra_urls {
            if !source_urls.contains(&url) {
                source_urls.push(url);
            }
        }

        Ok(Finding {
            id,
            kind: self.kind,
            name,
            website,
            description: self.description,
            contact_type: self.contact.contact_type(),
            contact: self.contact,
            facts: self.facts,
            genre_match: self.genre_match,
            recommendation,
            source: self.source,
            source_urls,
            relevance_score: relevance.score,
            discovered_at: Utc::now(),
        })
    }
}
