//! Research run orchestration.
//!
//! A run plans search queries from the band profile, searches sequentially with a
//! fixed pause after every provider call, and evaluates each candidate in turn:
//! fetch, relevance score (escalating borderline scores), then contact and fact
//! extraction, genre analysis and the recommendation rule. Accepted candidates
//! become [`Finding`]s handed to the [`FindingSink`]. A failing candidate is logged
//! and skipped; it never aborts the run.

pub mod queries;

use chrono::{Datelike, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::app::ports::{FindingSink, HttpClientPort, SearchProvider, TextCapability};
use crate::config::{Config, ResearchConfig};
use crate::error::Result;
use crate::finding::{Finding, FindingBuilder};
use crate::metrics::CandidateMetrics;
use crate::scrapers::contact::ContactExtractor;
use crate::scrapers::escalation::EscalationGate;
use crate::scrapers::facts::{lineup_excerpt, FactExtractor};
use crate::scrapers::fetcher::Fetcher;
use crate::scrapers::genre::GenreAnalyzer;
use crate::scrapers::html::{anchors, host_of, html_to_text, meta_description, page_title};
use crate::scrapers::rate_limiter::DomainRateLimiter;
use crate::scrapers::recommendation::RecommendationPolicy;
use crate::scrapers::relevance::RelevanceScorer;
use crate::types::{
    BandProfile, EntityKind, FetchedPage, FindingSource, RelevanceGate, RelevanceVerdict,
    SearchCandidate,
};

pub use queries::{plan_queries, PlannedQuery};

/// A candidate together with how it was discovered.
#[derive(Debug, Clone)]
pub struct Lead {
    pub candidate: SearchCandidate,
    pub source: FindingSource,
    /// List page the candidate was linked from.
    pub via: Option<String>,
}

impl Lead {
    pub fn new(candidate: SearchCandidate, source: FindingSource) -> Self {
        Self {
            candidate,
            source,
            via: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    pub url: String,
    pub title: String,
    pub score: u8,
    pub gate: RelevanceGate,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Evaluation {
    Accepted { finding: Box<Finding>, escalated: bool },
    Rejected(Rejection),
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedCandidate {
    pub url: String,
    pub kind: String,
    pub message: String,
}

/// What a run produced. Findings are also handed to the sink as they are accepted.
#[derive(Debug, Default, Serialize)]
pub struct ResearchReport {
    pub queries: Vec<PlannedQuery>,
    pub findings: Vec<Finding>,
    pub rejected: Vec<Rejection>,
    pub failed: Vec<FailedCandidate>,
    pub escalated: usize,
}

pub struct ResearchPipeline {
    fetcher: Fetcher,
    search: Arc<dyn SearchProvider>,
    sink: Arc<dyn FindingSink>,
    scorer: RelevanceScorer,
    escalation: EscalationGate,
    contacts: ContactExtractor,
    facts: FactExtractor,
    genres: GenreAnalyzer,
    policy: RecommendationPolicy,
    research: ResearchConfig,
}

impl ResearchPipeline {
    pub fn new(
        config: &Config,
        http: Arc<dyn HttpClientPort>,
        search: Arc<dyn SearchProvider>,
        text: TextCapability,
        sink: Arc<dyn FindingSink>,
    ) -> Result<Self> {
        let limiter = DomainRateLimiter::new(Duration::from_millis(config.fetch.min_interval_ms));
        Ok(Self {
            fetcher: Fetcher::new(http, limiter, config.fetch.clone()),
            search,
            sink,
            scorer: RelevanceScorer::new(config.relevance.clone()),
            escalation: EscalationGate::new(text.clone()),
            contacts: ContactExtractor::new(config.contact.clone()),
            facts: FactExtractor::new(config.extraction.clone()),
            genres: GenreAnalyzer::new(text),
            policy: RecommendationPolicy::from_config(&config.extraction)?,
            research: config.research.clone(),
        })
    }

    /// Plan queries for the current year and run them.
    pub async fn run(&self, kind: EntityKind, band: &BandProfile) -> ResearchReport {
        let queries = plan_queries(kind, band, Utc::now().year(), self.research.max_queries);
        self.run_queries(kind, band, queries).await
    }

    #[instrument(skip_all, fields(kind = %kind, band = %band.name))]
    pub async fn run_queries(
        &self,
        kind: EntityKind,
        band: &BandProfile,
        queries: Vec<PlannedQuery>,
    ) -> ResearchReport {
        let mut report = ResearchReport::default();
        let mut seen = Seen::default();
        let mut list_budget = self.research.max_list_candidates;
        let query_delay = Duration::from_millis(self.research.query_delay_ms);

        for query in queries.iter().take(self.research.max_queries) {
            info!(query = %query.text, "Searching");
            let results = self.search.search(&query.text).await;
            tokio::time::sleep(query_delay).await;

            let results = match results {
                Ok(results) => results,
                Err(e) => {
                    warn!(query = %query.text, error = %e, "Search failed, skipping query");
                    continue;
                }
            };

            for candidate in results.into_iter().take(self.research.results_per_query) {
                if !seen.claim(&candidate.url) {
                    debug!(url = %candidate.url, "Already evaluated, skipping");
                    continue;
                }
                let lead = Lead::new(candidate, query.source);
                let Some(page) = self.process(kind, &lead, band, &mut report).await else {
                    continue;
                };
                if !self.research.expand_list_pages || list_budget == 0 {
                    continue;
                }

                let leads = self.list_page_leads(&page, &mut seen, list_budget);
                info!(url = %page.url, links = leads.len(), "Expanding list page");
                list_budget -= leads.len();
                for list_lead in leads {
                    self.process(kind, &list_lead, band, &mut report).await;
                }
            }
        }

        report.queries = queries;
        info!(
            findings = report.findings.len(),
            rejected = report.rejected.len(),
            failed = report.failed.len(),
            escalated = report.escalated,
            "Research run finished"
        );
        report
    }

    /// Evaluate one lead, record the outcome in `report` and persist accepted findings.
    /// Returns the page when it was rejected as a list/overview page.
    async fn process(
        &self,
        kind: EntityKind,
        lead: &Lead,
        band: &BandProfile,
        report: &mut ResearchReport,
    ) -> Option<FetchedPage> {
        match self.fetch_and_evaluate(kind, lead, band).await {
            Ok((_, Evaluation::Accepted { finding, escalated })) => {
                if escalated {
                    report.escalated += 1;
                }
                self.persist(&finding).await;
                report.findings.push(*finding);
                None
            }
            Ok((page, Evaluation::Rejected(rejection))) => {
                if rejection.gate == RelevanceGate::Escalation {
                    report.escalated += 1;
                }
                let is_list_page = rejection.gate == RelevanceGate::NegativeSignal;
                report.rejected.push(rejection);
                page.filter(|_| is_list_page)
            }
            Err(e) => {
                warn!(url = %lead.candidate.url, kind = e.kind(), error = %e, "Candidate failed");
                report.failed.push(FailedCandidate {
                    url: lead.candidate.url.clone(),
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                });
                None
            }
        }
    }

    async fn persist(&self, finding: &Finding) {
        match self.sink.upsert(finding).await {
            Ok(()) => CandidateMetrics::record_persisted(),
            Err(e) => {
                CandidateMetrics::record_persist_error();
                warn!(key = %finding.natural_key(), error = %e, "Failed to persist finding");
            }
        }
    }

    /// Fetch and evaluate a single lead without persisting anything.
    pub async fn evaluate_candidate(&self, kind: EntityKind, lead: &Lead, band: &BandProfile) -> Result<Evaluation> {
        self.fetch_and_evaluate(kind, lead, band)
            .await
            .map(|(_, evaluation)| evaluation)
    }

    async fn fetch_and_evaluate(
        &self,
        kind: EntityKind,
        lead: &Lead,
        band: &BandProfile,
    ) -> Result<(Option<FetchedPage>, Evaluation)> {
        let candidate = &lead.candidate;
        // Blocked hosts are rejected from the URL alone.
        if self.scorer.blocked_domain(&candidate.url).is_some() {
            let verdict = self
                .scorer
                .score(kind, &candidate.url, &candidate.title, &candidate.snippet, "");
            return Ok((None, Evaluation::Rejected(reject(candidate, &candidate.title, verdict))));
        }

        let page = self.fetcher.fetch(&candidate.url).await?;
        let evaluation = self.evaluate_page(kind, lead, &page, band).await?;
        Ok((Some(page), evaluation))
    }

    /// Score an already fetched page and, when relevant, build its finding.
    pub async fn evaluate_page(
        &self,
        kind: EntityKind,
        lead: &Lead,
        page: &FetchedPage,
        band: &BandProfile,
    ) -> Result<Evaluation> {
        let candidate = &lead.candidate;
        let text = html_to_text(&page.html);
        let title = pick_title(lead, &page.html);
        let description = if candidate.snippet.trim().is_empty() {
            meta_description(&page.html).unwrap_or_default()
        } else {
            candidate.snippet.clone()
        };

        let mut verdict = self.scorer.score(kind, &page.url, &title, &description, &text);
        let mut escalated = false;
        if verdict.gate == RelevanceGate::Keywords && self.scorer.config().is_borderline(verdict.score) {
            CandidateMetrics::record_escalated();
            escalated = true;
            let decision = self.escalation.classify(kind, &title, &description, &text).await;
            verdict.relevant = decision.relevant;
            verdict.gate = RelevanceGate::Escalation;
            verdict.reason = format!("{}; escalation: {}", verdict.reason, decision.reason);
        }

        if !verdict.relevant {
            return Ok(Evaluation::Rejected(reject(candidate, &title, verdict)));
        }

        let contact = self.contacts.extract(&page.html, &page.url);
        let facts = self.facts.extract(&page.html, &page.url);
        let genre_match = if band.genres.is_empty() {
            None
        } else {
            let lineup = lineup_excerpt(&text);
            self.genres
                .analyze(&band.genres, &text, lineup.as_deref(), &band.negative_keywords_or_default())
                .await
        };
        let recommendation = self.policy.recommend(
            &facts.red_flags,
            genre_match.as_ref().map(|g| g.match_score),
            facts.showcase_status,
        );

        let score = verdict.score;
        let mut builder = FindingBuilder::new(kind, lead.source, page.url.clone())
            .title(title)
            .description(Some(description))
            .contact(contact)
            .facts(facts)
            .genre_match(genre_match)
            .recommendation(recommendation)
            .relevance(verdict);
        if let Some(via) = &lead.via {
            builder = builder.source_url(via.clone());
        }
        let finding = builder.build()?;

        CandidateMetrics::record_accepted();
        info!(
            url = %page.url,
            score,
            name = %finding.name,
            verdict = ?finding.recommendation.verdict,
            "Accepted candidate"
        );
        Ok(Evaluation::Accepted {
            finding: Box::new(finding),
            escalated,
        })
    }

    /// Outbound links of a list page worth evaluating as candidates of their own.
    fn list_page_leads(&self, page: &FetchedPage, seen: &mut Seen, budget: usize) -> Vec<Lead> {
        let list_host = host_of(&page.url);
        let mut leads = Vec::new();
        for (url, text) in anchors(&page.html, &page.url) {
            if leads.len() >= budget {
                break;
            }
            if host_of(&url) == list_host || self.scorer.blocked_domain(&url).is_some() {
                continue;
            }
            if !seen.claim(&url) {
                continue;
            }
            leads.push(Lead {
                candidate: SearchCandidate::new(url, text, ""),
                source: FindingSource::ListPage,
                via: Some(page.url.clone()),
            });
        }
        leads
    }
}

fn pick_title(lead: &Lead, html: &str) -> String {
    let from_page = page_title(html);
    let from_search = Some(lead.candidate.title.trim().to_string()).filter(|t| !t.is_empty());
    let chosen = match lead.source {
        // Anchor text on list pages is often just "Website" or "mehr".
        FindingSource::ListPage => from_page.or(from_search),
        FindingSource::Keyword | FindingSource::SimilarBand => from_search.or(from_page),
    };
    chosen.unwrap_or_default()
}

fn reject(candidate: &SearchCandidate, title: &str, verdict: RelevanceVerdict) -> Rejection {
    CandidateMetrics::record_rejected(verdict.gate.as_str());
    info!(
        url = %candidate.url,
        score = verdict.score,
        gate = %verdict.gate,
        reason = %verdict.reason,
        "Rejected candidate"
    );
    Rejection {
        url: candidate.url.clone(),
        title: title.to_string(),
        score: verdict.score,
        gate: verdict.gate,
        reason: verdict.reason,
    }
}

/// URLs and hosts already taken by this run.
#[derive(Default)]
struct Seen {
    urls: HashSet<String>,
    hosts: HashSet<String>,
}

impl Seen {
    /// False when the URL or its host was seen before.
    fn claim(&mut self, url: &str) -> bool {
        let normalized = url.trim().trim_end_matches('/').to_lowercase();
        let host = host_of(url).unwrap_or_else(|| normalized.clone());
        if self.urls.contains(&normalized) || self.hosts.contains(&host) {
            return false;
        }
        self.urls.insert(normalized);
        self.hosts.insert(host);
        true
    }
}
