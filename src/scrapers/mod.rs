//! The page-level stages of a research run: fetching, relevance scoring, escalation,
//! contact and fact extraction, genre analysis and the recommendation rule.

pub mod contact;
pub mod escalation;
pub mod facts;
pub mod fetcher;
pub mod genre;
pub mod html;
pub mod rate_limiter;
pub mod recommendation;
pub mod relevance;
