use serde::Deserialize;
use tracing::{debug, warn};

use crate::app::ports::TextCapability;
use crate::constants::{self, GENRE_TEXT_CHARS};
use crate::scrapers::html::truncate_chars;
use crate::types::{DetectedGenre, GenreConfidence, GenreMatchResult};

#[derive(Debug, Deserialize)]
struct RawGenreMatch {
    #[serde(default)]
    detected_genres: Vec<RawGenre>,
    #[serde(default)]
    negative_signals: Vec<String>,
    match_score: f64,
    #[serde(default)]
    explanation: String,
}

#[derive(Debug, Deserialize)]
struct RawGenre {
    genre: String,
    #[serde(default)]
    confidence: Option<String>,
}

/// Scores how well a festival's music fits the band, via the text capability.
#[derive(Debug, Clone)]
pub struct GenreAnalyzer {
    capability: TextCapability,
}

impl GenreAnalyzer {
    pub fn new(capability: TextCapability) -> Self {
        Self { capability }
    }

    /// `None` when no capability is configured or the call or its answer is unusable.
    pub async fn analyze(
        &self,
        band_genres: &[String],
        festival_text: &str,
        lineup_text: Option<&str>,
        negative_keywords: &[String],
    ) -> Option<GenreMatchResult> {
        let TextCapability::Available(generator) = &self.capability else {
            debug!("No text capability, skipping genre analysis");
            return None;
        };

        let negatives = if negative_keywords.is_empty() {
            constants::owned(constants::DEFAULT_NEGATIVE_GENRES)
        } else {
            negative_keywords.to_vec()
        };
        let prompt = build_prompt(band_genres, festival_text, lineup_text, &negatives);

        let answer = match generator.generate(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Genre analysis call failed");
                return None;
            }
        };
        let parsed = parse_response(&answer);
        if parsed.is_none() {
            warn!("Genre analysis answer was not valid JSON");
        }
        parsed
    }
}

fn build_prompt(
    band_genres: &[String],
    festival_text: &str,
    lineup_text: Option<&str>,
    negatives: &[String],
) -> String {
    let lineup = lineup_text
        .map(|l| truncate_chars(l, GENRE_TEXT_CHARS))
        .unwrap_or("(no line-up found)");
    format!(
        r#"You compare the musical profile of a festival with a band.

Band genres: {genres}
Negative genres (reduce the score when the festival leans towards them): {negatives}

Festival text:
{festival}

Line-up:
{lineup}

Tasks:
1. List the festival's genres. Mark a genre "explicit" when the page names it, "implicit" when you infer it from the line-up.
2. List which negative genres the festival shows signs of.
3. Give a compatibility score from 0 to 100. Strong explicit matches score higher than partial or implicit ones; negative signals lower the score.
4. Explain the score in one sentence.

Answer with JSON only, no prose:
{{"detected_genres": [{{"genre": "...", "confidence": "explicit"}}], "negative_signals": ["..."], "match_score": 0, "explanation": "..."}}"#,
        genres = band_genres.join(", "),
        negatives = negatives.join(", "),
        festival = truncate_chars(festival_text, GENRE_TEXT_CHARS),
        lineup = lineup,
    )
}

/// Parses the JSON object in an answer, tolerating code fences and surrounding
/// prose. The score is clamped to 0..=100.
pub fn parse_response(answer: &str) -> Option<GenreMatchResult> {
    let start = answer.find('{')?;
    let end = answer.rfind('}')?;
    if end < start {
        return None;
    }
    let raw: RawGenreMatch = serde_json::from_str(&answer[start..=end]).ok()?;
    if !raw.match_score.is_finite() {
        return None;
    }

    let detected_genres = raw
        .detected_genres
        .into_iter()
        .filter(|g| !g.genre.trim().is_empty())
        .map(|g| DetectedGenre {
            genre: g.genre.trim().to_string(),
            confidence: match g.confidence.as_deref().map(str::to_lowercase).as_deref() {
                Some("explicit") => GenreConfidence::Explicit,
                _ => GenreConfidence::Implicit,
            },
        })
        .collect();

    Some(GenreMatchResult {
        detected_genres,
        negative_signals: raw.negative_signals,
        match_score: raw.match_score.round().clamp(0.0, 100.0) as u8,
        explanation: raw.explanation.trim().to_string(),
    })
}
