use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("robots.txt disallows crawling {url}")]
    RobotsDisallowed { url: String },

    #[error("fetching {url} failed: {message}")]
    Fetch {
        url: String,
        message: String,
        status: Option<u16>,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Text generation failed: {0}")]
    Generation(String),

    #[error("Search provider error: {0}")]
    Search(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Incomplete finding: {0}")]
    IncompleteFinding(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

impl ScoutError {
    pub fn fetch(url: &str, message: impl Into<String>, status: Option<u16>) -> Self {
        ScoutError::Fetch {
            url: url.to_string(),
            message: message.into(),
            status,
        }
    }

    /// Short label used in diagnostic logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ScoutError::RobotsDisallowed { .. } => "robots_disallowed",
            ScoutError::Fetch { .. } | ScoutError::Http(_) => "fetch",
            ScoutError::Json(_) | ScoutError::Toml(_) => "parse",
            ScoutError::Io(_) => "io",
            ScoutError::Url(_) => "url",
            ScoutError::Config(_) | ScoutError::Env(_) => "config",
            ScoutError::Generation(_) => "generation",
            ScoutError::Search(_) => "search",
            ScoutError::Persistence(_) => "persistence",
            ScoutError::IncompleteFinding(_) => "finding",
        }
    }
}

pub type Result<T> = std::result::Result<T, ScoutError>;
