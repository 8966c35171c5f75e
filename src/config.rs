use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::constants::{self, owned};
use crate::error::{Result, ScoutError};
use crate::types::EntityKind;

/// Top-level configuration, read from `config.toml`. Every section falls back to
/// its defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub relevance: RelevanceConfig,
    pub contact: ContactConfig,
    pub extraction: ExtractionConfig,
    pub research: ResearchConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Minimum time between two requests to the same domain.
    pub min_interval_ms: u64,
    pub max_retries: u32,
    /// Base delay for 429 and exponential backoff.
    pub retry_delay_ms: u64,
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub respect_robots: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: constants::DEFAULT_MIN_INTERVAL_MS,
            max_retries: constants::DEFAULT_MAX_RETRIES,
            retry_delay_ms: constants::DEFAULT_RETRY_DELAY_MS,
            timeout_seconds: constants::DEFAULT_TIMEOUT_SECONDS,
            user_agent: constants::USER_AGENT.to_string(),
            respect_robots: true,
        }
    }
}

/// Scoring rules for one entity kind. In `config.toml` each field is optional and
/// falls back to that kind's own default.
#[derive(Debug, Clone, Serialize)]
pub struct KindRules {
    pub threshold: u8,
    pub keyword_weight: u32,
    pub keywords: Vec<String>,
    pub title_keywords: Vec<String>,
    pub negative_phrases: Vec<String>,
    /// Regex patterns checked alongside `negative_phrases`.
    pub negative_patterns: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct KindRulesOverride {
    threshold: Option<u8>,
    keyword_weight: Option<u32>,
    keywords: Option<Vec<String>>,
    title_keywords: Option<Vec<String>>,
    negative_phrases: Option<Vec<String>>,
    negative_patterns: Option<Vec<String>>,
}

impl KindRulesOverride {
    fn apply(self, base: KindRules) -> KindRules {
        KindRules {
            threshold: self.threshold.unwrap_or(base.threshold),
            keyword_weight: self.keyword_weight.unwrap_or(base.keyword_weight),
            keywords: self.keywords.unwrap_or(base.keywords),
            title_keywords: self.title_keywords.unwrap_or(base.title_keywords),
            negative_phrases: self.negative_phrases.unwrap_or(base.negative_phrases),
            negative_patterns: self.negative_patterns.unwrap_or(base.negative_patterns),
        }
    }
}

fn festival_rules<'de, D>(deserializer: D) -> std::result::Result<KindRules, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(KindRulesOverride::deserialize(deserializer)?.apply(KindRules::festival()))
}

fn venue_rules<'de, D>(deserializer: D) -> std::result::Result<KindRules, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(KindRulesOverride::deserialize(deserializer)?.apply(KindRules::venue()))
}

impl KindRules {
    pub fn festival() -> Self {
        Self {
            threshold: constants::FESTIVAL_THRESHOLD,
            keyword_weight: constants::FESTIVAL_KEYWORD_WEIGHT,
            keywords: owned(constants::FESTIVAL_KEYWORDS),
            title_keywords: owned(constants::FESTIVAL_TITLE_KEYWORDS),
            negative_phrases: owned(constants::FESTIVAL_NEGATIVE_PHRASES),
            negative_patterns: owned(constants::FESTIVAL_NEGATIVE_PATTERNS),
        }
    }

    pub fn venue() -> Self {
        Self {
            threshold: constants::VENUE_THRESHOLD,
            keyword_weight: constants::VENUE_KEYWORD_WEIGHT,
            keywords: owned(constants::VENUE_KEYWORDS),
            title_keywords: owned(constants::VENUE_TITLE_KEYWORDS),
            negative_phrases: owned(constants::VENUE_NEGATIVE_PHRASES),
            negative_patterns: owned(constants::VENUE_NEGATIVE_PATTERNS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    #[serde(deserialize_with = "festival_rules")]
    pub festival: KindRules,
    #[serde(deserialize_with = "venue_rules")]
    pub venue: KindRules,
    pub blocked_domains: Vec<String>,
    pub blocked_host_prefixes: Vec<String>,
    pub application_keywords: Vec<String>,
    pub generic_title_words: Vec<String>,
    pub title_bonus: u32,
    pub application_bonus: u32,
    pub domain_match_bonus: u32,
    /// How many characters of page text take part in scoring.
    pub body_scan_chars: usize,
    /// Inclusive score band handed to the escalation gate.
    pub borderline_low: u8,
    pub borderline_high: u8,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            festival: KindRules::festival(),
            venue: KindRules::venue(),
            blocked_domains: owned(constants::BLOCKED_DOMAINS),
            blocked_host_prefixes: owned(constants::BLOCKED_HOST_PREFIXES),
            application_keywords: owned(constants::APPLICATION_KEYWORDS),
            generic_title_words: owned(constants::GENERIC_TITLE_WORDS),
            title_bonus: constants::TITLE_BONUS,
            application_bonus: constants::APPLICATION_BONUS,
            domain_match_bonus: constants::DOMAIN_MATCH_BONUS,
            body_scan_chars: constants::BODY_SCAN_CHARS,
            borderline_low: constants::BORDERLINE_LOW,
            borderline_high: constants::BORDERLINE_HIGH,
        }
    }
}

impl RelevanceConfig {
    pub fn rules(&self, kind: EntityKind) -> &KindRules {
        match kind {
            EntityKind::Festival => &self.festival,
            EntityKind::Venue => &self.venue,
        }
    }

    pub fn is_borderline(&self, score: u8) -> bool {
        score >= self.borderline_low && score <= self.borderline_high
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactConfig {
    pub email_blocklist: Vec<String>,
    /// Matches ending in these are asset names like `logo@2x.png`, not addresses.
    pub email_file_suffixes: Vec<String>,
    pub preferred_email_tokens: Vec<String>,
    pub form_markers: Vec<String>,
    pub form_context_keywords: Vec<String>,
    pub contact_page_patterns: Vec<String>,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            email_blocklist: owned(constants::EMAIL_BLOCKLIST),
            email_file_suffixes: owned(constants::EMAIL_FILE_SUFFIXES),
            preferred_email_tokens: owned(constants::PREFERRED_EMAIL_TOKENS),
            form_markers: owned(constants::CONTACT_FORM_MARKERS),
            form_context_keywords: owned(constants::FORM_CONTEXT_KEYWORDS),
            contact_page_patterns: owned(constants::CONTACT_PAGE_PATTERNS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub text_budget_chars: usize,
    pub red_flags: Vec<String>,
    pub monetary_red_flag_pattern: String,
    pub home_latitude: f64,
    pub home_longitude: f64,
    pub apply_min_score: u8,
    pub watch_min_score: u8,
    /// Deadline phrasing, including the bare `bis `/`ab `/`von ` prepositions.
    pub deadline_phrases: Vec<String>,
    pub application_mentions: Vec<String>,
    pub application_href_pattern: String,
    pub small_size_words: Vec<String>,
    pub large_size_words: Vec<String>,
    pub medium_size_words: Vec<String>,
    /// Lower-cased month names to month numbers for `D.–D. Monat YYYY` ranges.
    pub months: BTreeMap<String, u32>,
    /// Used when a range names no month or an unknown one.
    pub default_month: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            text_budget_chars: constants::TEXT_BUDGET_CHARS,
            red_flags: owned(constants::RED_FLAGS),
            monetary_red_flag_pattern: constants::MONETARY_RED_FLAG_PATTERN.to_string(),
            home_latitude: constants::HOME_LATITUDE,
            home_longitude: constants::HOME_LONGITUDE,
            apply_min_score: constants::APPLY_MIN_SCORE,
            watch_min_score: constants::WATCH_MIN_SCORE,
            deadline_phrases: owned(constants::DEADLINE_PHRASES),
            application_mentions: owned(constants::APPLICATION_MENTIONS),
            application_href_pattern: constants::APPLICATION_HREF_PATTERN.to_string(),
            small_size_words: owned(constants::SMALL_SIZE_WORDS),
            large_size_words: owned(constants::LARGE_SIZE_WORDS),
            medium_size_words: owned(constants::MEDIUM_SIZE_WORDS),
            months: constants::GERMAN_MONTHS
                .iter()
                .map(|(name, number)| (name.to_string(), *number))
                .collect(),
            default_month: constants::DEFAULT_MONTH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    pub max_queries: usize,
    pub results_per_query: usize,
    pub max_list_candidates: usize,
    /// Pause after every search call; provider free tiers allow one call per second.
    pub query_delay_ms: u64,
    pub expand_list_pages: bool,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_queries: constants::MAX_QUERIES,
            results_per_query: constants::RESULTS_PER_QUERY,
            max_list_candidates: constants::MAX_LIST_CANDIDATES,
            query_delay_ms: constants::QUERY_DELAY_MS,
            expand_list_pages: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_seconds: u64,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: constants::DEFAULT_LLM_BASE_URL.to_string(),
            model: constants::DEFAULT_LLM_MODEL.to_string(),
            api_key_env: constants::DEFAULT_LLM_KEY_ENV.to_string(),
            timeout_seconds: 60,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub country: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: constants::DEFAULT_SEARCH_BASE_URL.to_string(),
            api_key_env: constants::DEFAULT_SEARCH_KEY_ENV.to_string(),
            country: "DE".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ScoutError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.relevance;
        if r.borderline_low > r.borderline_high {
            return Err(ScoutError::Config(format!(
                "borderline band is empty: {} > {}",
                r.borderline_low, r.borderline_high
            )));
        }
        for rules in [&r.festival, &r.venue] {
            if rules.threshold > 100 {
                return Err(ScoutError::Config(format!(
                    "relevance threshold {} is above 100",
                    rules.threshold
                )));
            }
        }
        if self.fetch.max_retries == 0 {
            return Err(ScoutError::Config("fetch.max_retries must be at least 1".to_string()));
        }
        let e = &self.extraction;
        regex::Regex::new(&e.monetary_red_flag_pattern).map_err(|err| {
            ScoutError::Config(format!("invalid monetary_red_flag_pattern: {}", err))
        })?;
        regex::Regex::new(&e.application_href_pattern).map_err(|err| {
            ScoutError::Config(format!("invalid application_href_pattern: {}", err))
        })?;
        let valid_month = |m: u32| (1..=12).contains(&m);
        if !valid_month(e.default_month) || !e.months.values().copied().all(valid_month) {
            return Err(ScoutError::Config("month numbers must lie in 1..=12".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.relevance.festival.threshold, 45);
        assert_eq!(config.relevance.venue.threshold, 40);
        assert_eq!(config.relevance.borderline_low, 35);
        assert_eq!(config.relevance.borderline_high, 55);
        assert_eq!(config.fetch.min_interval_ms, 1000);
        assert_eq!(config.research.max_queries, 5);
    }

    #[test]
    fn partial_sections_override_only_named_fields() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[fetch]\nmin_interval_ms = 250\n\n[relevance]\nborderline_low = 30\n\n[research]\nquery_delay_ms = 0"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.fetch.min_interval_ms, 250);
        assert_eq!(config.fetch.max_retries, 3);
        assert_eq!(config.relevance.borderline_low, 30);
        assert_eq!(config.relevance.borderline_high, 55);
        assert_eq!(config.research.query_delay_ms, 0);
    }

    #[test]
    fn kind_rules_merge_onto_their_own_defaults() {
        let config: Config = toml::from_str("[relevance.festival]\nthreshold = 50").unwrap();
        assert_eq!(config.relevance.festival.threshold, 50);
        assert_eq!(config.relevance.festival.keyword_weight, constants::FESTIVAL_KEYWORD_WEIGHT);
        assert_eq!(config.relevance.festival.keywords, owned(constants::FESTIVAL_KEYWORDS));
        assert_eq!(config.relevance.venue.threshold, constants::VENUE_THRESHOLD);

        let config: Config =
            toml::from_str("[relevance.venue]\nkeywords = [\"jazzkeller\"]\nkeyword_weight = 20").unwrap();
        assert_eq!(config.relevance.venue.keywords, vec!["jazzkeller".to_string()]);
        assert_eq!(config.relevance.venue.keyword_weight, 20);
        assert_eq!(config.relevance.venue.threshold, constants::VENUE_THRESHOLD);
        assert_eq!(config.relevance.venue.title_keywords, owned(constants::VENUE_TITLE_KEYWORDS));
        assert_eq!(config.relevance.festival.threshold, constants::FESTIVAL_THRESHOLD);
    }

    #[test]
    fn misspelled_kind_rule_is_an_error() {
        assert!(toml::from_str::<Config>("[relevance.festival]\nthreshhold = 50").is_err());
    }

    #[test]
    fn extraction_tables_are_validated() {
        let mut config = Config::default();
        config.extraction.application_href_pattern = "(apply".to_string();
        assert!(matches!(config.validate(), Err(ScoutError::Config(_))));

        let mut config = Config::default();
        config.extraction.months.insert("smarch".to_string(), 13);
        assert!(matches!(config.validate(), Err(ScoutError::Config(_))));
    }

    #[test]
    fn inverted_borderline_band_is_rejected() {
        let mut config = Config::default();
        config.relevance.borderline_low = 60;
        assert!(matches!(config.validate(), Err(ScoutError::Config(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default("/nonexistent/booking_scout.toml").unwrap();
        assert_eq!(config.fetch.max_retries, 3);
    }

    #[test]
    fn borderline_band_is_inclusive() {
        let config = RelevanceConfig::default();
        assert!(config.is_borderline(35));
        assert!(config.is_borderline(55));
        assert!(!config.is_borderline(34));
        assert!(!config.is_borderline(56));
    }
}
