use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::app::ports::TextCapability;
use crate::scrapers::html::truncate_chars;
use crate::types::EntityKind;

const SNIPPET_CHARS: usize = 1500;
const AFFIRMATIVE: &[&str] = &["JA", "YES"];
const NEGATIVE: &[&str] = &["NEIN", "NO"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationDecision {
    pub relevant: bool,
    pub reason: String,
}

/// Arbiter for borderline relevance scores. Fails closed: no capability, a failed
/// call or an unparseable answer all mean "not relevant".
#[derive(Debug, Clone)]
pub struct EscalationGate {
    capability: TextCapability,
}

impl EscalationGate {
    pub fn new(capability: TextCapability) -> Self {
        Self { capability }
    }

    pub async fn classify(
        &self,
        kind: EntityKind,
        title: &str,
        description: &str,
        body_snippet: &str,
    ) -> EscalationDecision {
        let generator = match &self.capability {
            TextCapability::Available(generator) => generator,
            TextCapability::Unavailable => {
                return EscalationDecision {
                    relevant: false,
                    reason: "borderline score and no classifier configured".to_string(),
                }
            }
        };

        let prompt = build_prompt(kind, title, description, body_snippet);
        match generator.generate(&prompt).await {
            Ok(answer) => {
                let decision = parse_answer(&answer);
                debug!(relevant = decision.relevant, "Escalation answer: {}", decision.reason);
                decision
            }
            Err(e) => {
                warn!(error = %e, "Escalation call failed, rejecting candidate");
                EscalationDecision {
                    relevant: false,
                    reason: format!("classifier call failed: {}", e),
                }
            }
        }
    }
}

fn build_prompt(kind: EntityKind, title: &str, description: &str, body_snippet: &str) -> String {
    let subject = match kind {
        EntityKind::Festival => "the official website of ONE specific music festival",
        EntityKind::Venue => "the official website of ONE specific live music venue or club",
    };
    format!(
        "Decide whether the following web page is {subject}.\n\
         Answer NO for lists, overviews, calendars, news articles, wikis, ticket shops, \
         social media profiles and aggregators.\n\
         Reply with JA or NEIN on the first line, followed by one short sentence of reasoning.\n\n\
         Title: {title}\n\
         Description: {description}\n\
         Page text:\n{snippet}",
        subject = subject,
        title = title,
        description = description,
        snippet = truncate_chars(body_snippet, SNIPPET_CHARS),
    )
}

/// Leading token of a line: its first run of letters, upper-cased.
fn leading_token(line: &str) -> String {
    line.trim_start_matches(|c: char| !c.is_alphabetic())
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_uppercase()
}

/// Affirmative at the start or alone on a line means relevant; a negative start or
/// anything else means not relevant.
pub fn parse_answer(answer: &str) -> EscalationDecision {
    let trimmed = answer.trim();
    let reason = truncate_chars(trimmed, 300).to_string();
    let first = leading_token(trimmed);

    if AFFIRMATIVE.contains(&first.as_str()) {
        return EscalationDecision { relevant: true, reason };
    }
    if NEGATIVE.contains(&first.as_str()) {
        return EscalationDecision { relevant: false, reason };
    }
    let affirmative_line = trimmed.lines().any(|line| {
        let line = line.trim().trim_end_matches(['.', '!']).to_uppercase();
        AFFIRMATIVE.contains(&line.as_str())
    });
    EscalationDecision {
        relevant: affirmative_line,
        reason: if reason.is_empty() { "empty classifier answer".to_string() } else { reason },
    }
}
