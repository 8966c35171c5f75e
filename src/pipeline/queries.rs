use serde::Serialize;

use crate::constants::DEFAULT_REGION;
use crate::types::{BandProfile, EntityKind, FindingSource};

/// One search query and the discovery path its results are tagged with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedQuery {
    pub text: String,
    pub source: FindingSource,
}

/// Genre queries first, then similar-band queries, capped at `max_queries`.
pub fn plan_queries(kind: EntityKind, band: &BandProfile, year: i32, max_queries: usize) -> Vec<PlannedQuery> {
    let region = band
        .region
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REGION);

    let keyword = band.genres.iter().map(|genre| match kind {
        EntityKind::Festival => format!("{} festival bewerbung bands {}", genre.trim(), year),
        EntityKind::Venue => format!("{} live club {}", genre.trim(), region),
    });
    let similar = band.similar_bands.iter().map(|other| match kind {
        EntityKind::Festival => format!("{} festival {}", other.trim(), year),
        EntityKind::Venue => format!("{} konzert club {}", other.trim(), region),
    });

    let mut planned: Vec<PlannedQuery> = Vec::new();
    let tagged = keyword
        .map(|text| (text, FindingSource::Keyword))
        .chain(similar.map(|text| (text, FindingSource::SimilarBand)));
    for (text, source) in tagged {
        if planned.len() >= max_queries {
            break;
        }
        if planned.iter().any(|q| q.text.eq_ignore_ascii_case(&text)) {
            continue;
        }
        planned.push(PlannedQuery { text, source });
    }
    planned
}
