use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::config::ExtractionConfig;
use crate::constants::{APPLICATION_HREF_PATTERN, LINEUP_EXCERPT_CHARS};
use crate::scrapers::html::{hrefs, html_to_text, resolve_url, truncate_chars};
use crate::types::{ApplicationPeriod, EstimatedSize, ExtractedFacts, ShowcaseStatus};

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap());
static GERMAN_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\.(\d{1,2})\.(\d{4})\b").unwrap());
static DATE_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})\.?\s*[-–—]\s*(\d{1,2})\.\s*(?:([A-Za-zÄÖÜäöü]+)\s+)?(\d{4})\b").unwrap()
});
static VISITORS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,3}(?:[.,]\d{3})+|\d+)\s*(?:\+\s*)?(?:besucher|besucherinnen|gäste|zuschauer|visitors|attendees|fans)")
        .unwrap()
});
static CITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-ZÄÖÜ][a-zäöüß]+(?:[ -][A-ZÄÖÜ][a-zäöüß]+)*),\s*(?:Deutschland|Germany|DE)\b").unwrap()
});
static LAT_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:lat|latitude|breitengrad)\s*[:=]\s*(-?\d{1,2}(?:\.\d+)?)").unwrap()
});
static LON_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:lon|lng|longitude|längengrad)\s*[:=]\s*(-?\d{1,3}(?:\.\d+)?)").unwrap()
});
static COORD_PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{2}\.\d{3,})\s*,\s*(\d{1,2}\.\d{3,})\b").unwrap());
static DEFAULT_APPLICATION_HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(APPLICATION_HREF_PATTERN).unwrap());
static LINEUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)line-?up").unwrap());

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Text-pattern extraction of festival attributes. Pure and idempotent.
#[derive(Debug, Clone)]
pub struct FactExtractor {
    config: ExtractionConfig,
    application_href: Regex,
}

impl FactExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        let application_href = Regex::new(&config.application_href_pattern).unwrap_or_else(|e| {
            warn!(
                pattern = %config.application_href_pattern,
                error = %e,
                "Invalid application href pattern, using the default"
            );
            DEFAULT_APPLICATION_HREF_RE.clone()
        });
        Self {
            config,
            application_href,
        }
    }

    pub fn extract(&self, html: &str, page_url: &str) -> ExtractedFacts {
        let full_text = html_to_text(html);
        let text = truncate_chars(&full_text, self.config.text_budget_chars);
        let lower = text.to_lowercase();

        let red_flags = self.red_flags(&lower);
        let showcase_status = showcase_status(&red_flags);
        let (date_start, date_end) = self.extract_dates(text).unzip();
        let (latitude, longitude) = extract_coordinates(text).unzip();
        let distance_km = latitude.zip(longitude).map(|(lat, lon)| {
            round1(haversine_km(
                self.config.home_latitude,
                self.config.home_longitude,
                lat,
                lon,
            ))
        });
        let city = extract_city(text);
        let country = city.as_ref().map(|_| "Deutschland".to_string());

        ExtractedFacts {
            city,
            country,
            latitude,
            longitude,
            distance_km,
            date_start,
            date_end,
            estimated_size: self.estimate_size(&lower),
            application_url: self.application_url(html, page_url),
            application_period: self.application_period(&lower),
            showcase_status,
            red_flags,
        }
    }

    /// Red-flag keywords present in the lower-cased text, in table order.
    pub fn red_flags(&self, lower_text: &str) -> Vec<String> {
        self.config
            .red_flags
            .iter()
            .filter(|flag| lower_text.contains(flag.to_lowercase().as_str()))
            .cloned()
            .collect()
    }

    /// ISO dates first, then `DD.MM.YYYY`, then `D.–D. Monat YYYY`. Only the range form
    /// yields distinct start and end dates.
    pub fn extract_dates(&self, text: &str) -> Option<(NaiveDate, NaiveDate)> {
        let iso = ISO_DATE_RE
            .captures_iter(text)
            .find_map(|c| date_from_parts(&c[1], &c[2], &c[3]));
        if let Some(date) = iso {
            return Some((date, date));
        }

        let german = GERMAN_DATE_RE
            .captures_iter(text)
            .find_map(|c| date_from_parts(&c[3], &c[2], &c[1]));
        if let Some(date) = german {
            return Some((date, date));
        }

        DATE_RANGE_RE.captures_iter(text).find_map(|c| {
            let month = c
                .get(3)
                .map(|m| self.month_number(m.as_str()))
                .unwrap_or(self.config.default_month);
            let year: i32 = c[4].parse().ok()?;
            let start = NaiveDate::from_ymd_opt(year, month, c[1].parse().ok()?)?;
            let end = NaiveDate::from_ymd_opt(year, month, c[2].parse().ok()?)?;
            Some((start, end))
        })
    }

    fn month_number(&self, name: &str) -> u32 {
        self.config
            .months
            .get(&name.to_lowercase())
            .copied()
            .unwrap_or(self.config.default_month)
    }

    /// Small is checked before Large before Medium; the first bucket that fires wins.
    pub fn estimate_size(&self, lower_text: &str) -> EstimatedSize {
        let visitors: Vec<u64> = VISITORS_RE
            .captures_iter(lower_text)
            .filter_map(|c| c[1].replace(['.', ','], "").parse().ok())
            .collect();
        let mentions = |words: &[String]| words.iter().any(|w| lower_text.contains(w.as_str()));

        if mentions(&self.config.small_size_words) || visitors.iter().any(|n| *n < 5_000) {
            EstimatedSize::Small
        } else if mentions(&self.config.large_size_words) || visitors.iter().any(|n| *n >= 20_000) {
            EstimatedSize::Large
        } else if mentions(&self.config.medium_size_words)
            || visitors.iter().any(|n| (5_000..=15_000).contains(n))
        {
            EstimatedSize::Medium
        } else {
            EstimatedSize::Unknown
        }
    }

    /// First application-looking link, else the first `kontakt` link.
    pub fn application_url(&self, html: &str, page_url: &str) -> Option<String> {
        let links: Vec<String> = hrefs(html)
            .into_iter()
            .filter(|h| {
                let lower = h.to_lowercase();
                !lower.starts_with("mailto:") && !lower.starts_with("tel:") && !lower.starts_with("javascript:")
            })
            .collect();
        links
            .iter()
            .find(|h| self.application_href.is_match(h))
            .or_else(|| links.iter().find(|h| h.to_lowercase().contains("kontakt")))
            .and_then(|h| resolve_url(page_url, h))
    }

    /// Deadline phrasing makes the period explicit; a bare mention of applying only
    /// lets us estimate it.
    pub fn application_period(&self, lower_text: &str) -> ApplicationPeriod {
        let contains_any = |words: &[String]| words.iter().any(|w| lower_text.contains(w.as_str()));
        if contains_any(&self.config.deadline_phrases) {
            ApplicationPeriod::Explicit
        } else if contains_any(&self.config.application_mentions) {
            ApplicationPeriod::Estimated
        } else {
            ApplicationPeriod::Unknown
        }
    }
}

impl Default for FactExtractor {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

pub fn showcase_status(red_flags: &[String]) -> ShowcaseStatus {
    if red_flags.iter().any(|f| f.to_lowercase().contains("showcase")) {
        ShowcaseStatus::Showcase
    } else if !red_flags.is_empty() {
        ShowcaseStatus::NotShowcase
    } else {
        ShowcaseStatus::Unknown
    }
}

fn date_from_parts(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

pub fn extract_city(text: &str) -> Option<String> {
    CITY_RE.captures(text).map(|c| c[1].to_string())
}

/// Labelled pairs first, then a bare pair inside Germany's bounding box.
pub fn extract_coordinates(text: &str) -> Option<(f64, f64)> {
    let lat = LAT_LABEL_RE
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok());
    let lon = LON_LABEL_RE
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok());
    if let (Some(lat), Some(lon)) = (lat, lon) {
        if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
            return Some((lat, lon));
        }
        warn!(lat, lon, "Ignoring out-of-range labelled coordinates");
    }

    COORD_PAIR_RE.captures_iter(text).find_map(|c| {
        let lat: f64 = c[1].parse().ok()?;
        let lon: f64 = c[2].parse().ok()?;
        ((47.0..=55.0).contains(&lat) && (5.0..=15.0).contains(&lon)).then_some((lat, lon))
    })
}

pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Text following the first "line-up" mention, for the genre analyzer.
pub fn lineup_excerpt(text: &str) -> Option<String> {
    let m = LINEUP_RE.find(text)?;
    let excerpt = truncate_chars(text[m.end()..].trim_start_matches([':', ' ', '-']), LINEUP_EXCERPT_CHARS);
    (!excerpt.trim().is_empty()).then(|| excerpt.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn iso_date_wins_over_german_range() {
        let e = FactExtractor::default();
        let (start, end) = e.extract_dates("Festival 12.–14. Juni 2025, Vorverkauf ab 2025-01-15").unwrap();
        assert_eq!(start, d("2025-01-15"));
        assert_eq!(end, d("2025-01-15"));
    }

    #[test]
    fn german_range_with_month_name() {
        let e = FactExtractor::default();
        let (start, end) = e.extract_dates("Am 12.–14. Juni 2025 in Haldern").unwrap();
        assert_eq!(start.to_string(), "2025-06-12");
        assert_eq!(end.to_string(), "2025-06-14");

        let (start, end) = e.extract_dates("vom 7.-9. August 2026").unwrap();
        assert_eq!((start, end), (d("2026-08-07"), d("2026-08-09")));
    }

    #[test]
    fn range_without_known_month_defaults_to_june() {
        let e = FactExtractor::default();
        let (start, end) = e.extract_dates("Termin: 3.–5. 2026").unwrap();
        assert_eq!((start, end), (d("2026-06-03"), d("2026-06-05")));
        let (start, _) = e.extract_dates("20.-22. Sommer 2026").unwrap();
        assert_eq!(start, d("2026-06-20"));
    }

    #[test]
    fn german_numeric_date_sets_both_ends() {
        let e = FactExtractor::default();
        let (start, end) = e.extract_dates("Einlass am 01.08.2025 ab 14 Uhr").unwrap();
        assert_eq!(start, d("2025-08-01"));
        assert_eq!(start, end);
    }

    #[test]
    fn invalid_dates_are_skipped() {
        let e = FactExtractor::default();
        assert_eq!(e.extract_dates("Version 2025-13-45"), None);
        assert_eq!(e.extract_dates("kein Datum"), None);
    }

    #[test]
    fn size_buckets_follow_priority() {
        let e = FactExtractor::default();
        assert_eq!(e.estimate_size("ein kleines festival"), EstimatedSize::Small);
        assert_eq!(e.estimate_size("rund 3.000 besucher"), EstimatedSize::Small);
        assert_eq!(e.estimate_size("über 80.000 besucher"), EstimatedSize::Large);
        assert_eq!(e.estimate_size("die große bühne"), EstimatedSize::Large);
        assert_eq!(e.estimate_size("etwa 8000 gäste"), EstimatedSize::Medium);
        assert_eq!(e.estimate_size("ein mittelgroßes festival"), EstimatedSize::Large);
        assert_eq!(e.estimate_size("intime atmosphäre, 100.000 fans"), EstimatedSize::Small);
        assert_eq!(e.estimate_size("nichts dazu"), EstimatedSize::Unknown);
    }

    #[test]
    fn application_url_prefers_application_links() {
        let e = FactExtractor::default();
        let html = r#"<a href="/kontakt">Kontakt</a><a href="/bands/bewerbung">Bewerbung</a>"#;
        assert_eq!(
            e.application_url(html, "https://fest.de").as_deref(),
            Some("https://fest.de/bands/bewerbung")
        );
        let html = r#"<a href="mailto:booking@fest.de">Mail</a><a href="/kontakt">Kontakt</a>"#;
        assert_eq!(e.application_url(html, "https://fest.de").as_deref(), Some("https://fest.de/kontakt"));
        assert_eq!(e.application_url("<a href='/tickets'>T</a>", "https://fest.de"), None);
    }

    #[test]
    fn application_period_levels() {
        let e = FactExtractor::default();
        assert_eq!(e.application_period("bewerbungsschluss ist der 1. märz"), ApplicationPeriod::Explicit);
        assert_eq!(e.application_period("bewerbung bis 31.01. möglich"), ApplicationPeriod::Explicit);
        assert_eq!(e.application_period("bewerbung per mail"), ApplicationPeriod::Estimated);
        assert_eq!(e.application_period("tickets und camping"), ApplicationPeriod::Unknown);
    }

    #[test]
    fn generic_prepositions_count_as_deadline_phrasing() {
        let e = FactExtractor::default();
        assert_eq!(
            e.application_period("tickets ab 20 euro, einlass von 18 uhr"),
            ApplicationPeriod::Explicit
        );
        assert_eq!(e.application_period("geöffnet bis 22 uhr"), ApplicationPeriod::Explicit);
    }

    #[test]
    fn tables_come_from_config() {
        let mut months = std::collections::BTreeMap::new();
        months.insert("march".to_string(), 3);
        let e = FactExtractor::new(ExtractionConfig {
            small_size_words: vec!["winzig".to_string()],
            large_size_words: vec![],
            medium_size_words: vec![],
            deadline_phrases: vec!["closing date".to_string()],
            application_mentions: vec!["submit".to_string()],
            application_href_pattern: r"(?i)/submit".to_string(),
            months,
            default_month: 9,
            ..ExtractionConfig::default()
        });
        assert_eq!(e.estimate_size("ein winziges fest"), EstimatedSize::Small);
        assert_eq!(e.estimate_size("ein kleines fest"), EstimatedSize::Unknown);
        assert_eq!(e.application_period("closing date 1 may"), ApplicationPeriod::Explicit);
        assert_eq!(e.application_period("submit your band"), ApplicationPeriod::Estimated);
        assert_eq!(e.application_period("bewerbungsschluss"), ApplicationPeriod::Unknown);
        assert_eq!(
            e.extract_dates("12.-14. March 2026"),
            Some((d("2026-03-12"), d("2026-03-14")))
        );
        assert_eq!(
            e.extract_dates("12.-14. Juni 2026"),
            Some((d("2026-09-12"), d("2026-09-14")))
        );
        let html = r#"<a href="/bewerbung">B</a><a href="/submit">S</a>"#;
        assert_eq!(e.application_url(html, "https://fest.de").as_deref(), Some("https://fest.de/submit"));
    }

    #[test]
    fn invalid_href_pattern_falls_back_to_default() {
        let e = FactExtractor::new(ExtractionConfig {
            application_href_pattern: "(bewerbung".to_string(),
            ..ExtractionConfig::default()
        });
        let html = r#"<a href="/bewerbung">Bewerbung</a>"#;
        assert_eq!(e.application_url(html, "https://fest.de").as_deref(), Some("https://fest.de/bewerbung"));
    }

    #[test]
    fn entity_encoded_text_is_extracted() {
        let html = "<p>12.&#8211;14. M&#228;rz 2026 auf der B&#252;hne, ein kleines Fest</p>";
        let facts = FactExtractor::default().extract(html, "https://fest.de/");
        assert_eq!(facts.date_start, Some(d("2026-03-12")));
        assert_eq!(facts.date_end, Some(d("2026-03-14")));
        assert_eq!(facts.estimated_size, EstimatedSize::Small);
    }

    #[test]
    fn city_before_country_marker() {
        assert_eq!(extract_city("Festivalgelände, 46459 Rees-Haldern. Haldern, Deutschland").as_deref(), Some("Haldern"));
        assert_eq!(extract_city("Bad Kreuznach, Germany").as_deref(), Some("Bad Kreuznach"));
        assert_eq!(extract_city("irgendwo in Europa"), None);
    }

    #[test]
    fn labelled_coordinates_take_precedence() {
        let text = "51.7500, 6.4000 Karte: lat: 49.4875 lng: 8.4660";
        assert_eq!(extract_coordinates(text), Some((49.4875, 8.466)));
    }

    #[test]
    fn bare_pair_must_lie_in_germany() {
        assert_eq!(extract_coordinates("GPS 51.7689, 6.3933"), Some((51.7689, 6.3933)));
        assert_eq!(extract_coordinates("Paris 48.8566, 2.3522"), None);
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Karlsruhe to Mannheim is roughly 53 km
        let km = haversine_km(49.0069, 8.4037, 49.4875, 8.4660);
        assert!((km - 53.6).abs() < 1.5, "got {km}");
        assert_eq!(haversine_km(49.0, 8.0, 49.0, 8.0), 0.0);
    }

    #[test]
    fn red_flags_and_showcase_status() {
        let e = FactExtractor::default();
        let flags = e.red_flags("newcomer showcase mit submission fee");
        assert_eq!(flags, vec!["showcase", "submission fee"]);
        assert_eq!(showcase_status(&flags), ShowcaseStatus::Showcase);
        assert_eq!(showcase_status(&["contest".to_string()]), ShowcaseStatus::NotShowcase);
        assert_eq!(showcase_status(&[]), ShowcaseStatus::Unknown);
    }

    #[test]
    fn extraction_is_idempotent_and_complete() {
        let html = r#"<html><body><script>var lat = 0;</script>
            <h1>Haldern Pop Festival</h1><p>7.–9. August 2025, Haldern, Deutschland.</p>
            <p>Ein kleines Festival. Bewerbung für Bands bis zum 1. März.</p>
            <p>lat: 51.7689 lon: 6.3933</p><a href="/bewerbung">Bewerben</a></body></html>"#;
        let e = FactExtractor::default();
        let a = e.extract(html, "https://haldernpop.com/");
        let b = e.extract(html, "https://haldernpop.com/");
        assert_eq!(a, b);

        assert_eq!(a.date_start, Some(d("2025-08-07")));
        assert_eq!(a.date_end, Some(d("2025-08-09")));
        assert_eq!(a.city.as_deref(), Some("Haldern"));
        assert_eq!(a.country.as_deref(), Some("Deutschland"));
        assert_eq!(a.estimated_size, EstimatedSize::Small);
        assert_eq!(a.application_period, ApplicationPeriod::Explicit);
        assert_eq!(a.application_url.as_deref(), Some("https://haldernpop.com/bewerbung"));
        assert_eq!(a.latitude, Some(51.7689));
        assert!(a.distance_km.unwrap() > 250.0);
        assert!(a.red_flags.is_empty());
        assert_eq!(a.showcase_status, ShowcaseStatus::Unknown);
    }

    #[test]
    fn lineup_excerpt_follows_marker() {
        assert_eq!(
            lineup_excerpt("Tickets. Line-up: Die Nerven, Blond, Zugezogen Maskulin").as_deref(),
            Some("Die Nerven, Blond, Zugezogen Maskulin")
        );
        assert_eq!(lineup_excerpt("kein Programm"), None);
    }
}
