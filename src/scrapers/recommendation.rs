use regex::Regex;

use crate::config::ExtractionConfig;
use crate::constants::{APPLY_MIN_SCORE, MONETARY_RED_FLAG_PATTERN, WATCH_MIN_SCORE};
use crate::error::{Result, ScoutError};
use crate::types::{Recommendation, ShowcaseStatus, Verdict};

/// Deterministic apply/watch/skip rule over red flags, genre score and showcase status.
#[derive(Debug, Clone)]
pub struct RecommendationPolicy {
    monetary: Regex,
    apply_min_score: u8,
    watch_min_score: u8,
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self {
            monetary: Regex::new(MONETARY_RED_FLAG_PATTERN).unwrap(),
            apply_min_score: APPLY_MIN_SCORE,
            watch_min_score: WATCH_MIN_SCORE,
        }
    }
}

impl RecommendationPolicy {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let monetary = Regex::new(&config.monetary_red_flag_pattern).map_err(|e| {
            ScoutError::Config(format!("invalid monetary_red_flag_pattern: {}", e))
        })?;
        Ok(Self {
            monetary,
            apply_min_score: config.apply_min_score,
            watch_min_score: config.watch_min_score,
        })
    }

    /// A missing genre score counts as 0.
    pub fn recommend(
        &self,
        red_flags: &[String],
        genre_match_score: Option<u8>,
        showcase_status: ShowcaseStatus,
    ) -> Recommendation {
        let monetary: Vec<&str> = red_flags
            .iter()
            .filter(|flag| self.monetary.is_match(flag))
            .map(String::as_str)
            .collect();
        if !monetary.is_empty() {
            return Recommendation {
                verdict: Verdict::Skip,
                explanation: format!("Monetary or competitive red flags: {}", monetary.join(", ")),
            };
        }

        if !red_flags.is_empty() && showcase_status == ShowcaseStatus::Showcase {
            return Recommendation {
                verdict: Verdict::Watch,
                explanation: "Showcase/fee signals, needs manual review".to_string(),
            };
        }

        let score = genre_match_score.unwrap_or(0);
        let (verdict, explanation) = if score >= self.apply_min_score {
            (Verdict::Apply, format!("Strong genre match ({}/100)", score))
        } else if score >= self.watch_min_score {
            (Verdict::Watch, format!("Partial genre match ({}/100)", score))
        } else if genre_match_score.is_none() {
            (Verdict::Skip, "No genre match score available".to_string())
        } else {
            (Verdict::Skip, format!("Weak genre match ({}/100)", score))
        };
        Recommendation { verdict, explanation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn monetary_flag_overrides_high_score() {
        let rec = RecommendationPolicy::default().recommend(
            &flags(&["pay to play"]),
            Some(90),
            ShowcaseStatus::NotShowcase,
        );
        assert_eq!(rec.verdict, Verdict::Skip);
        assert!(rec.explanation.contains("pay to play"));
    }

    #[test]
    fn german_fee_terms_are_monetary() {
        let policy = RecommendationPolicy::default();
        let rec = policy.recommend(&flags(&["bewerbungsgebühr"]), Some(80), ShowcaseStatus::NotShowcase);
        assert_eq!(rec.verdict, Verdict::Skip);
        let rec = policy.recommend(&flags(&["Wettbewerb"]), Some(80), ShowcaseStatus::NotShowcase);
        assert_eq!(rec.verdict, Verdict::Skip);
    }

    #[test]
    fn showcase_alone_goes_to_watch() {
        let rec = RecommendationPolicy::default().recommend(
            &flags(&["showcase"]),
            Some(90),
            ShowcaseStatus::Showcase,
        );
        assert_eq!(rec.verdict, Verdict::Watch);
    }

    #[test]
    fn score_bands() {
        let policy = RecommendationPolicy::default();
        let verdict = |score| policy.recommend(&[], Some(score), ShowcaseStatus::Unknown).verdict;
        assert_eq!(verdict(65), Verdict::Apply);
        assert_eq!(verdict(60), Verdict::Apply);
        assert_eq!(verdict(59), Verdict::Watch);
        assert_eq!(verdict(45), Verdict::Watch);
        assert_eq!(verdict(40), Verdict::Watch);
        assert_eq!(verdict(10), Verdict::Skip);
    }

    #[test]
    fn missing_score_counts_as_zero() {
        let rec = RecommendationPolicy::default().recommend(&[], None, ShowcaseStatus::Unknown);
        assert_eq!(rec.verdict, Verdict::Skip);
    }

    #[test]
    fn thresholds_come_from_config() {
        let config = ExtractionConfig {
            apply_min_score: 80,
            watch_min_score: 20,
            ..ExtractionConfig::default()
        };
        let policy = RecommendationPolicy::from_config(&config).unwrap();
        assert_eq!(policy.recommend(&[], Some(65), ShowcaseStatus::Unknown).verdict, Verdict::Watch);
        assert_eq!(policy.recommend(&[], Some(25), ShowcaseStatus::Unknown).verdict, Verdict::Watch);
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let config = ExtractionConfig {
            monetary_red_flag_pattern: "(fee".to_string(),
            ..ExtractionConfig::default()
        };
        assert!(matches!(
            RecommendationPolicy::from_config(&config),
            Err(ScoutError::Config(_))
        ));
    }
}
