use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::config::{KindRules, RelevanceConfig};
use crate::scrapers::html::{domain_stem, host_of, truncate_chars};
use crate::types::{EntityKind, RelevanceGate, RelevanceVerdict};

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());
static NON_ALNUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9äöüß]").unwrap());

/// Minimum slug length for the domain/name comparison, so stems like "de" or "fm"
/// never match everything.
const MIN_SLUG_LEN: usize = 4;

/// Heuristic "is this a single official festival/venue site" scorer.
///
/// Sequential gates: blocked domain, list/overview phrasing, then keyword density
/// plus bonuses. Pure and deterministic for identical inputs.
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    config: RelevanceConfig,
    festival_patterns: Vec<Regex>,
    venue_patterns: Vec<Regex>,
}

impl RelevanceScorer {
    pub fn new(config: RelevanceConfig) -> Self {
        let festival_patterns = compile_patterns(&config.festival);
        let venue_patterns = compile_patterns(&config.venue);
        Self {
            config,
            festival_patterns,
            venue_patterns,
        }
    }

    pub fn config(&self) -> &RelevanceConfig {
        &self.config
    }

    pub fn score_festival_relevance(
        &self,
        url: &str,
        title: &str,
        description: &str,
        html_text: &str,
    ) -> RelevanceVerdict {
        self.score(EntityKind::Festival, url, title, description, html_text)
    }

    pub fn score_venue_relevance(
        &self,
        url: &str,
        title: &str,
        description: &str,
        html_text: &str,
    ) -> RelevanceVerdict {
        self.score(EntityKind::Venue, url, title, description, html_text)
    }

    pub fn is_relevant(
        &self,
        kind: EntityKind,
        url: &str,
        title: &str,
        description: &str,
        html_text: &str,
    ) -> bool {
        self.score(kind, url, title, description, html_text).relevant
    }

    pub fn score(
        &self,
        kind: EntityKind,
        url: &str,
        title: &str,
        description: &str,
        html_text: &str,
    ) -> RelevanceVerdict {
        let rules = self.config.rules(kind);

        if let Some(domain) = self.blocked_domain(url) {
            return RelevanceVerdict {
                score: 0,
                relevant: false,
                reason: format!("blocked domain ({})", domain),
                gate: RelevanceGate::BlockedDomain,
            };
        }

        let body = truncate_chars(html_text, self.config.body_scan_chars);
        let combined = format!("{} {} {}", title, description, body).to_lowercase();

        if let Some(signal) = self.negative_signal(kind, rules, &combined) {
            return RelevanceVerdict {
                score: 0,
                relevant: false,
                reason: format!("looks like a list/overview/wiki page ('{}')", signal),
                gate: RelevanceGate::NegativeSignal,
            };
        }

        let matched: Vec<&str> = rules
            .keywords
            .iter()
            .filter(|k| combined.contains(k.as_str()))
            .map(String::as_str)
            .collect();
        let mut score = (matched.len() as u32 * rules.keyword_weight).min(100);
        let mut reasons = vec![format!("{} keywords [{}]", matched.len(), matched.join(", "))];

        let title_lower = title.to_lowercase();
        if rules.title_keywords.iter().any(|k| title_lower.contains(k.as_str())) {
            score += self.config.title_bonus;
            reasons.push("title bonus".to_string());
        }

        if self
            .config
            .application_keywords
            .iter()
            .any(|k| combined.contains(k.as_str()))
        {
            score += self.config.application_bonus;
            reasons.push("application/contact bonus".to_string());
        }

        if self.domain_matches_name(url, title) {
            score += self.config.domain_match_bonus;
            reasons.push("domain matches name".to_string());
        }

        let score = score.min(100) as u8;
        RelevanceVerdict {
            score,
            relevant: score >= rules.threshold,
            reason: reasons.join("; "),
            gate: RelevanceGate::Keywords,
        }
    }

    /// Blocked entry matching the URL's host, if any.
    pub fn blocked_domain(&self, url: &str) -> Option<String> {
        let host = host_of(url)?;
        if let Some(prefix) = self
            .config
            .blocked_host_prefixes
            .iter()
            .find(|p| host.starts_with(p.as_str()))
        {
            return Some(prefix.clone());
        }
        self.config
            .blocked_domains
            .iter()
            .find(|entry| host_matches(&host, entry))
            .cloned()
    }

    fn negative_signal(&self, kind: EntityKind, rules: &KindRules, combined: &str) -> Option<String> {
        if let Some(phrase) = rules.negative_phrases.iter().find(|p| combined.contains(p.as_str())) {
            return Some(phrase.clone());
        }
        let patterns = match kind {
            EntityKind::Festival => &self.festival_patterns,
            EntityKind::Venue => &self.venue_patterns,
        };
        patterns
            .iter()
            .find_map(|re| re.find(combined).map(|m| m.as_str().to_string()))
    }

    /// Slugified title (generic words and years removed) contained in the domain stem
    /// or the other way round.
    pub fn domain_matches_name(&self, url: &str, title: &str) -> bool {
        let Some(stem) = domain_stem(url) else {
            return false;
        };
        let stem = NON_ALNUM_RE.replace_all(&stem, "").to_string();

        let mut name = title.to_lowercase();
        for word in &self.config.generic_title_words {
            name = name.replace(word.as_str(), " ");
        }
        let name = YEAR_RE.replace_all(&name, " ");
        let slug = NON_ALNUM_RE.replace_all(&name, "").to_string();

        if stem.len() < MIN_SLUG_LEN || slug.len() < MIN_SLUG_LEN {
            return false;
        }
        slug.contains(&stem) || stem.contains(&slug)
    }
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::new(RelevanceConfig::default())
    }
}

fn compile_patterns(rules: &KindRules) -> Vec<Regex> {
    rules
        .negative_patterns
        .iter()
        .filter_map(|p| match Regex::new(&format!("(?i){}", p)) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = %p, error = %e, "Skipping invalid negative pattern");
                None
            }
        })
        .collect()
}

/// `entry` matches whole domain labels; entries ending in `.` match any TLD.
fn host_matches(host: &str, entry: &str) -> bool {
    let entry = entry.to_lowercase();
    if entry.ends_with('.') {
        host.starts_with(&entry) || host.contains(&format!(".{}", entry))
    } else {
        host == entry || host.ends_with(&format!(".{}", entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALDERN_BODY: &str = "Haldern Pop Festival am Niederrhein. Line-up 2025 mit Headliner und Newcomer. \
        Tickets, Camping und Anreise. Bewerbung für Bands über das Kontakt Formular.";

    fn scorer() -> RelevanceScorer {
        RelevanceScorer::default()
    }

    /// One keyword per `weight` points and nothing else, for exact boundary checks.
    fn minimal_scorer(weight: u32) -> RelevanceScorer {
        let mut config = RelevanceConfig::default();
        config.festival.keyword_weight = weight;
        config.festival.keywords = vec!["alpha".into(), "beta".into(), "gamma".into(), "delta".into()];
        config.festival.title_keywords = vec![];
        config.application_keywords = vec![];
        config.domain_match_bonus = 0;
        RelevanceScorer::new(config)
    }

    #[test]
    fn scoring_is_deterministic() {
        let s = scorer();
        let a = s.score_festival_relevance("https://haldernpop.com", "Haldern Pop Festival", "", HALDERN_BODY);
        let b = s.score_festival_relevance("https://haldernpop.com", "Haldern Pop Festival", "", HALDERN_BODY);
        assert_eq!(a, b);
        let v1 = s.score_venue_relevance("https://club.de", "Club", "Live", "Konzert");
        let v2 = s.score_venue_relevance("https://club.de", "Club", "Live", "Konzert");
        assert_eq!(v1, v2);
    }

    #[test]
    fn blocked_domain_scores_zero_regardless_of_content() {
        let verdict = scorer().score_festival_relevance(
            "https://de.wikipedia.org/x",
            "Hurricane Festival",
            "bewerbung kontakt festival booking",
            HALDERN_BODY,
        );
        assert_eq!(verdict.score, 0);
        assert!(!verdict.relevant);
        assert_eq!(verdict.gate, RelevanceGate::BlockedDomain);
        assert!(verdict.reason.starts_with("blocked domain"));
    }

    #[test]
    fn blocklist_matches_labels_not_substrings() {
        let s = scorer();
        assert!(s.blocked_domain("https://www.facebook.com/fest").is_some());
        assert!(s.blocked_domain("https://m.youtube.com/watch").is_some());
        assert!(s.blocked_domain("https://www.amazon.de/dp/1").is_some());
        assert!(s.blocked_domain("https://news.festival.de").is_some());
        assert!(s.blocked_domain("https://www.eventim.de/event").is_some());
        assert!(s.blocked_domain("https://rox.com").is_none());
        assert!(s.blocked_domain("https://haldernpop.com").is_none());
    }

    #[test]
    fn negative_signal_beats_keyword_density() {
        let verdict = scorer().score_festival_relevance(
            "https://festival-info.de/liste",
            "Liste der Festivals 2025",
            "Line-up, Tickets, Bühne, Camping, Headliner, Bewerbung, Kontakt",
            HALDERN_BODY,
        );
        assert_eq!(verdict.score, 0);
        assert_eq!(verdict.gate, RelevanceGate::NegativeSignal);
        assert!(verdict.reason.contains("list/overview/wiki"));
    }

    #[test]
    fn yearly_roundup_pattern_is_negative() {
        let verdict = scorer().score_festival_relevance(
            "https://rockblog.de/sommer",
            "Die Rock Festivals 2026 im Überblick",
            "",
            "",
        );
        assert_eq!(verdict.gate, RelevanceGate::NegativeSignal);
    }

    #[test]
    fn threshold_is_inclusive() {
        let s = minimal_scorer(15);
        let at = s.score_festival_relevance("https://a.de", "", "alpha beta gamma", "");
        assert_eq!(at.score, 45);
        assert!(at.relevant);

        let s = minimal_scorer(11);
        let below = s.score_festival_relevance("https://a.de", "", "alpha beta gamma delta", "");
        assert_eq!(below.score, 44);
        assert!(!below.relevant);
    }

    #[test]
    fn venue_threshold_is_forty() {
        let mut config = RelevanceConfig::default();
        config.venue.keywords = vec!["alpha".into(), "beta".into()];
        config.venue.keyword_weight = 20;
        config.venue.title_keywords = vec![];
        config.application_keywords = vec![];
        let s = RelevanceScorer::new(config);
        let verdict = s.score_venue_relevance("https://a.de", "", "alpha beta", "");
        assert_eq!(verdict.score, 40);
        assert!(verdict.relevant);
        assert!(s.is_relevant(EntityKind::Venue, "https://a.de", "", "alpha beta", ""));
    }

    #[test]
    fn bonuses_add_up_and_clamp() {
        let verdict = scorer().score_festival_relevance(
            "https://haldernpop.com",
            "Haldern Pop Festival",
            "",
            HALDERN_BODY,
        );
        assert_eq!(verdict.score, 100);
        assert!(verdict.relevant);
        assert!(verdict.reason.contains("title bonus"));
        assert!(verdict.reason.contains("domain matches name"));
    }

    #[test]
    fn keyword_weights_sum_exactly() {
        // festival + tickets = 2 keywords * 12, title bonus 15, no contact, no domain match
        let verdict =
            scorer().score_festival_relevance("https://example-events.de", "Sommerfestival", "", "Tickets");
        assert_eq!(verdict.score, 24 + 15);
    }

    #[test]
    fn body_scan_is_limited() {
        let padding = "x".repeat(3000);
        let late_keywords = format!("{} festival line-up tickets camping", padding);
        let verdict = scorer().score_festival_relevance("https://a.de", "", "", &late_keywords);
        assert_eq!(verdict.score, 0);
        assert!(!verdict.relevant);
    }

    #[test]
    fn domain_name_heuristic() {
        let s = scorer();
        assert!(s.domain_matches_name("https://www.haldernpop.com", "Haldern Pop Festival 2025"));
        assert!(s.domain_matches_name("https://southside.de", "Southside Festival | Home"));
        assert!(s.domain_matches_name("https://rocco-del-schlacko.de", "Rocco del Schlacko"));
        assert!(!s.domain_matches_name("https://tickets-online.de", "Haldern Pop Festival"));
        // generic-only titles never match
        assert!(!s.domain_matches_name("https://festival.de", "Festival"));
    }
}
