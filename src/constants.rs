//! Default keyword and threshold tables. Everything here is only a default: the
//! scorers and extractors read their tables from `config`, so a `config.toml` or a
//! test fixture can swap any of them out.

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";
pub const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
pub const ACCEPT_LANGUAGE: &str = "de-DE,de;q=0.9,en-US;q=0.8,en;q=0.7";

// Fetch defaults
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 15;

// Relevance defaults
pub const FESTIVAL_THRESHOLD: u8 = 45;
pub const VENUE_THRESHOLD: u8 = 40;
pub const BORDERLINE_LOW: u8 = 35;
pub const BORDERLINE_HIGH: u8 = 55;
pub const FESTIVAL_KEYWORD_WEIGHT: u32 = 12;
pub const VENUE_KEYWORD_WEIGHT: u32 = 15;
pub const TITLE_BONUS: u32 = 15;
pub const APPLICATION_BONUS: u32 = 10;
pub const DOMAIN_MATCH_BONUS: u32 = 15;
pub const BODY_SCAN_CHARS: usize = 3000;

// Research run caps
pub const MAX_QUERIES: usize = 5;
pub const RESULTS_PER_QUERY: usize = 5;
pub const MAX_LIST_CANDIDATES: usize = 20;
pub const QUERY_DELAY_MS: u64 = 1000;
/// Venue queries fall back to this when the band profile names no region.
pub const DEFAULT_REGION: &str = "Baden-Württemberg";

// Extraction defaults
pub const TEXT_BUDGET_CHARS: usize = 8000;
pub const GENRE_TEXT_CHARS: usize = 3000;
pub const LINEUP_EXCERPT_CHARS: usize = 1500;

/// Reference point for distance calculations (Karlsruhe).
pub const HOME_LATITUDE: f64 = 49.0069;
pub const HOME_LONGITUDE: f64 = 8.4037;

pub const APPLY_MIN_SCORE: u8 = 60;
pub const WATCH_MIN_SCORE: u8 = 40;

/// Matched against the host as whole domain labels; entries ending in `.` match any
/// TLD (`amazon.` covers amazon.de and amazon.com).
pub const BLOCKED_DOMAINS: &[&str] = &[
    "wikipedia.org",
    "wikimedia.org",
    "facebook.com",
    "fb.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "youtube.com",
    "youtu.be",
    "linkedin.com",
    "amazon.",
    "ebay.",
    "google.",
    "bing.com",
    "reddit.com",
    "tiktok.com",
    "pinterest.",
    "spiegel.de",
    "zeit.de",
    "faz.net",
    "sueddeutsche.de",
    "welt.de",
    "bild.de",
    "tagesschau.de",
    "stern.de",
    "focus.de",
    "eventim.",
    "songkick.com",
    "bandsintown.com",
    "last.fm",
    "discogs.com",
];

/// Host prefixes that mark news portals regardless of the domain.
pub const BLOCKED_HOST_PREFIXES: &[&str] = &["news."];

pub const FESTIVAL_NEGATIVE_PHRASES: &[&str] = &[
    "liste der",
    "liste von",
    "list of",
    "alle festivals",
    "übersicht",
    "uebersicht",
    "top 10",
    "top 20",
    "top 50",
    "festivals in deutschland",
    "festivals in germany",
    "festivalkalender",
    "festival-kalender",
    "kalender",
    "die besten festivals",
    "best festivals",
    "wikipedia",
    "was ist ein",
    "definition ",
    "meaning of",
];

/// Plural "festivals <year>" marks yearly round-up pages.
pub const FESTIVAL_NEGATIVE_PATTERNS: &[&str] = &[r"festivals\s+20\d{2}"];

pub const VENUE_NEGATIVE_PHRASES: &[&str] = &[
    "liste der",
    "list of",
    "übersicht",
    "uebersicht",
    "top 10",
    "top 20",
    "die besten clubs",
    "die besten bars",
    "best clubs",
    "alle clubs",
    "wikipedia",
    "was ist ein",
    "definition ",
    "meaning of",
];

pub const VENUE_NEGATIVE_PATTERNS: &[&str] = &[r"clubs\s+in\s+\w+\s+20\d{2}"];

pub const FESTIVAL_KEYWORDS: &[&str] = &[
    "festival",
    "line-up",
    "lineup",
    "tickets",
    "bühne",
    "stage",
    "open air",
    "bands",
    "programm",
    "anreise",
    "camping",
    "headliner",
    "newcomer",
    "veranstalter",
    "impressum",
    "festivalgelände",
];

pub const VENUE_KEYWORDS: &[&str] = &[
    "club",
    "live",
    "konzert",
    "venue",
    "bühne",
    "veranstaltungen",
    "programm",
    "tickets",
    "kapazität",
    "location",
    "einlass",
    "impressum",
    "livemusik",
];

pub const FESTIVAL_TITLE_KEYWORDS: &[&str] = &["festival"];
pub const VENUE_TITLE_KEYWORDS: &[&str] = &["club", "venue", "bühne"];

pub const APPLICATION_KEYWORDS: &[&str] = &["bewerbung", "apply", "kontakt", "booking"];

/// Words stripped from a page title before comparing it against the domain.
pub const GENERIC_TITLE_WORDS: &[&str] = &[
    "festival",
    "openair",
    "open air",
    "official",
    "offizielle",
    "website",
    "homepage",
    "startseite",
    "home",
    "club",
    "live",
];

// Contact extraction
pub const EMAIL_BLOCKLIST: &[&str] = &["example.com", "test@", "noreply", "no-reply", "donotreply"];
pub const EMAIL_FILE_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg"];
pub const PREFERRED_EMAIL_TOKENS: &[&str] = &["booking", "contact", "info", "anfrage", "kontakt"];
pub const CONTACT_FORM_MARKERS: &[&str] = &[
    "contact-form",
    "contactform",
    "contact_form",
    "booking-form",
    "bookingform",
    "anfrage",
    "kontaktformular",
    "kontakt-formular",
    "formulario de contacto",
    "wpcf7",
];
pub const FORM_CONTEXT_KEYWORDS: &[&str] = &["contact", "booking", "anfrage", "kontakt"];
pub const CONTACT_PAGE_PATTERNS: &[&str] = &["/contact", "/kontakt", "/booking", "/anfrage"];

// Fact extraction
pub const RED_FLAGS: &[&str] = &[
    "showcase",
    "submission fee",
    "pay to play",
    "pay-to-play",
    "sell tickets",
    "contest",
    "bewerbungsgebühr",
    "teilnahmegebühr",
    "tickets verkaufen",
    "wettbewerb",
];
pub const MONETARY_RED_FLAG_PATTERN: &str = r"(?i)fee|pay|sell|contest|gebühr|wettbewerb";

pub const DEADLINE_PHRASES: &[&str] = &[
    "bewerbungsschluss",
    "deadline",
    "bis zum",
    "bewerbungsfrist",
    "bis ",
    "ab ",
    "von ",
];
pub const APPLICATION_MENTIONS: &[&str] = &["bewerbung", "apply"];

pub const APPLICATION_HREF_PATTERN: &str = r"(?i)bewerbung|apply|application|anfrage|booking";

pub const SMALL_SIZE_WORDS: &[&str] = &["klein", "intim"];
pub const LARGE_SIZE_WORDS: &[&str] = &["groß", "gross"];
pub const MEDIUM_SIZE_WORDS: &[&str] = &["mittel"];

pub const GERMAN_MONTHS: &[(&str, u32)] = &[
    ("januar", 1),
    ("februar", 2),
    ("märz", 3),
    ("maerz", 3),
    ("april", 4),
    ("mai", 5),
    ("juni", 6),
    ("juli", 7),
    ("august", 8),
    ("september", 9),
    ("oktober", 10),
    ("november", 11),
    ("dezember", 12),
];
pub const DEFAULT_MONTH: u32 = 6;

pub const DEFAULT_NEGATIVE_GENRES: &[&str] = &["Schlager", "Volksmusik", "Klassik", "DJ only", "Metalcore"];

// Text generation
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LLM_KEY_ENV: &str = "OPENAI_API_KEY";

// Search
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://api.search.brave.com/res/v1/web/search";
pub const DEFAULT_SEARCH_KEY_ENV: &str = "BRAVE_API_KEY";

/// Convert a static table into the owned form stored in config.
pub fn owned(table: &[&str]) -> Vec<String> {
    table.iter().map(|s| s.to_string()).collect()
}
