use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ContactConfig;
use crate::scrapers::html::{hrefs, resolve_url};
use crate::types::{ContactInfo, ContactType};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());

/// Pulls contact channels out of raw page HTML. Pure; no I/O.
#[derive(Debug, Clone, Default)]
pub struct ContactExtractor {
    config: ContactConfig,
}

impl ContactExtractor {
    pub fn new(config: ContactConfig) -> Self {
        Self { config }
    }

    pub fn extract(&self, html: &str, page_url: &str) -> ContactInfo {
        ContactInfo {
            email: self.preferred_email(html),
            has_contact_form: self.has_contact_form(html),
            contact_page_url: self.contact_page_url(html, page_url),
        }
    }

    pub fn determine_contact_type(&self, info: &ContactInfo) -> ContactType {
        info.contact_type()
    }

    /// Unique, filtered addresses in first-seen order.
    pub fn emails(&self, html: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for m in EMAIL_RE.find_iter(html) {
            let email = m.as_str().trim_end_matches('.').to_string();
            let lower = email.to_lowercase();
            if self.config.email_blocklist.iter().any(|b| lower.contains(b.as_str())) {
                continue;
            }
            if self.config.email_file_suffixes.iter().any(|s| lower.ends_with(s.as_str())) {
                continue;
            }
            if !found.iter().any(|e| e.eq_ignore_ascii_case(&email)) {
                found.push(email);
            }
        }
        found
    }

    fn preferred_email(&self, html: &str) -> Option<String> {
        let emails = self.emails(html);
        emails
            .iter()
            .find(|email| {
                let lower = email.to_lowercase();
                self.config
                    .preferred_email_tokens
                    .iter()
                    .any(|token| lower.contains(token.as_str()))
            })
            .or_else(|| emails.first())
            .cloned()
    }

    pub fn has_contact_form(&self, html: &str) -> bool {
        let lower = html.to_lowercase();
        if self.config.form_markers.iter().any(|m| lower.contains(m.as_str())) {
            return true;
        }
        lower.contains("<form")
            && self
                .config
                .form_context_keywords
                .iter()
                .any(|k| lower.contains(k.as_str()))
    }

    /// First link matching the highest-priority contact pattern, resolved against
    /// `page_url`.
    pub fn contact_page_url(&self, html: &str, page_url: &str) -> Option<String> {
        let links = hrefs(html);
        self.config.contact_page_patterns.iter().find_map(|pattern| {
            links
                .iter()
                .filter(|href| !href.to_lowercase().starts_with("mailto:"))
                .find(|href| href.to_lowercase().contains(pattern.as_str()))
                .and_then(|href| resolve_url(page_url, href))
        })
    }
}
