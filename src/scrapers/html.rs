//! Tolerant HTML helpers. Nothing here assumes well-formed markup; every function
//! returns an empty or `None` result instead of failing.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node, Selector};
use url::Url;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"'<>]+)["']"#).unwrap());

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static META_DESCRIPTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[name="description"], meta[property="og:description"]"#).unwrap()
});
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Elements whose text never counts as page content.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Visible text of a document or fragment. Parsing goes through html5ever, so every
/// named and numeric entity is decoded; comments and script/style content are
/// dropped and whitespace is collapsed.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::with_capacity(html.len() / 2);
    for node in document.tree.nodes() {
        let Node::Text(chunk) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            text.push_str(chunk);
            text.push(' ');
        }
    }
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// All `href` attribute values in document order.
pub fn hrefs(html: &str) -> Vec<String> {
    HREF_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().replace("&amp;", "&"))
        .filter(|href| !href.is_empty())
        .collect()
}

/// Resolve `href` against `base`. Returns `None` for non-navigable links.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let lower = href.to_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("tel:") || lower.starts_with('#') {
        return None;
    }
    if lower.starts_with("mailto:") {
        return Some(href.to_string());
    }
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Url::parse(base).ok()?.join(href).ok().map(|u| u.to_string()),
    }
}

/// Lower-cased host without a leading `www.`.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Registrable-looking stem of the host: `www.haldernpop.com` becomes `haldernpop`.
pub fn domain_stem(url: &str) -> Option<String> {
    let host = host_of(url)?;
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let stem = match labels.len() {
        0 => return None,
        1 => labels[0],
        n => labels[n - 2],
    };
    Some(stem.to_string())
}

/// `scheme://host` of a page URL, without a trailing slash.
pub fn site_root(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(format!("{}://{}", parsed.scheme(), host))
}

pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title = document
        .select(&TITLE_SELECTOR)
        .next()?
        .text()
        .collect::<String>();
    let title = WHITESPACE_RE.replace_all(&title, " ").trim().to_string();
    (!title.is_empty()).then_some(title)
}

pub fn meta_description(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&META_DESCRIPTION_SELECTOR)
        .filter_map(|el| el.value().attr("content"))
        .map(|c| WHITESPACE_RE.replace_all(c, " ").trim().to_string())
        .find(|c| !c.is_empty())
}

/// Anchors as `(absolute url, anchor text)` pairs, http(s) only.
pub fn anchors(html: &str, base: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|el| {
            let href = el.value().attr("href")?;
            let url = resolve_url(base, href)?;
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return None;
            }
            let text = el.text().collect::<String>();
            let text = WHITESPACE_RE.replace_all(&text, " ").trim().to_string();
            Some((url, text))
        })
        .collect()
}
