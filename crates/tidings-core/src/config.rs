use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::pipeline::PipelineConfig;

/// Feeds used when `TIDINGS_FEEDS` is not set: S&P 500 and Nasdaq headlines.
pub const DEFAULT_FEEDS: &[&str] = &[
    "https://finance.yahoo.com/rss/headline?s=%5EGSPC",
    "https://finance.yahoo.com/rss/headline?s=%5EIXIC",
];

pub const DEFAULT_TRANSLATE_URL: &str = "https://translate.astian.org/translate";

/// A page scraped for headlines with a CSS selector matching `<a>` elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlSourceSpec {
    pub url: String,
    pub selector: String,
}

impl FromStr for HtmlSourceSpec {
    type Err = AppError;

    /// Parses `url|selector`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (url, selector) = s.split_once('|').ok_or_else(|| {
            AppError::ConfigError(format!(
                "Invalid HTML source '{s}': expected 'url|css selector'"
            ))
        })?;
        let (url, selector) = (url.trim(), selector.trim());
        if url.is_empty() || selector.is_empty() {
            return Err(AppError::ConfigError(format!(
                "Invalid HTML source '{s}': url and selector must be non-empty"
            )));
        }
        Ok(Self {
            url: url.to_string(),
            selector: selector.to_string(),
        })
    }
}

/// Relay configuration, read from `TIDINGS_*` environment variables.
#[derive(Debug, Clone)]
pub struct TidingsConfig {
    pub bot_token: Option<String>,
    pub channel_id: Option<String>,
    pub feeds: Vec<String>,
    pub html_sources: Vec<HtmlSourceSpec>,
    pub state_dir: PathBuf,
    pub max_per_cycle: usize,
    pub per_source_limit: usize,
    pub seen_capacity: usize,
    pub min_interval: Duration,
    pub pacing: Duration,
    pub cycle_deadline: Option<Duration>,
    pub tick: Duration,
    pub source_lang: String,
    pub target_lang: String,
    pub translate_url: Option<String>,
    pub translate_api_key: Option<String>,
    pub google_fallback: bool,
    pub translate_timeout: Duration,
    pub link_preview: bool,
    pub fetch_timeout: Duration,
    pub server_port: u16,
    /// Run the scheduler inside the server alongside the `/run` trigger.
    pub server_schedule: bool,
}

impl TidingsConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup` (unset and blank values use defaults).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let feeds = match get("TIDINGS_FEEDS") {
            Some(raw) => split_list(&raw),
            None => DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect(),
        };

        let html_sources = match get("TIDINGS_HTML_SOURCES") {
            Some(raw) => split_list(&raw)
                .iter()
                .map(|s| s.parse())
                .collect::<Result<Vec<HtmlSourceSpec>, AppError>>()?,
            None => Vec::new(),
        };

        // An explicitly empty TIDINGS_TRANSLATE_URL disables LibreTranslate.
        let translate_url = match lookup("TIDINGS_TRANSLATE_URL") {
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(raw.trim().to_string()),
            None => Some(DEFAULT_TRANSLATE_URL.to_string()),
        };

        let deadline_secs: u64 = parse_or(&get, "TIDINGS_CYCLE_DEADLINE_SECS", 300)?;

        let config = Self {
            bot_token: get("TIDINGS_BOT_TOKEN"),
            channel_id: get("TIDINGS_CHANNEL_ID"),
            feeds,
            html_sources,
            state_dir: get("TIDINGS_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("state")),
            max_per_cycle: parse_or(&get, "TIDINGS_MAX_PER_CYCLE", 5)?,
            per_source_limit: parse_or(&get, "TIDINGS_PER_SOURCE_LIMIT", 5)?,
            seen_capacity: parse_or(&get, "TIDINGS_SEEN_CAPACITY", 1000)?,
            min_interval: Duration::from_secs(parse_or(&get, "TIDINGS_MIN_INTERVAL_SECS", 3600)?),
            pacing: Duration::from_millis(parse_or(&get, "TIDINGS_PACING_MS", 1000)?),
            cycle_deadline: (deadline_secs > 0).then(|| Duration::from_secs(deadline_secs)),
            tick: Duration::from_secs(parse_or(&get, "TIDINGS_TICK_SECS", 60)?),
            source_lang: get("TIDINGS_SOURCE_LANG").unwrap_or_else(|| "en".to_string()),
            target_lang: get("TIDINGS_TARGET_LANG").unwrap_or_else(|| "uk".to_string()),
            translate_url,
            translate_api_key: get("TIDINGS_TRANSLATE_API_KEY"),
            google_fallback: parse_bool_or(&get, "TIDINGS_GOOGLE_FALLBACK", true)?,
            translate_timeout: Duration::from_secs(parse_or(
                &get,
                "TIDINGS_TRANSLATE_TIMEOUT_SECS",
                15,
            )?),
            link_preview: parse_bool_or(&get, "TIDINGS_LINK_PREVIEW", true)?,
            fetch_timeout: Duration::from_secs(parse_or(&get, "TIDINGS_FETCH_TIMEOUT_SECS", 15)?),
            server_port: parse_or(&get, "TIDINGS_SERVER_PORT", 3000)?,
            server_schedule: parse_bool_or(&get, "TIDINGS_SERVER_SCHEDULE", false)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.max_per_cycle == 0 {
            return Err(AppError::ConfigError(
                "TIDINGS_MAX_PER_CYCLE must be at least 1".into(),
            ));
        }
        if self.seen_capacity < self.max_per_cycle {
            return Err(AppError::ConfigError(format!(
                "TIDINGS_SEEN_CAPACITY ({}) must be at least TIDINGS_MAX_PER_CYCLE ({})",
                self.seen_capacity, self.max_per_cycle
            )));
        }
        if self.feeds.is_empty() && self.html_sources.is_empty() {
            return Err(AppError::ConfigError(
                "No sources configured: set TIDINGS_FEEDS or TIDINGS_HTML_SOURCES".into(),
            ));
        }
        // Keys evicted while their items are still listed by a source get
        // republished, so the set must hold at least one full fetch.
        let per_fetch = self.max_items_per_fetch();
        if self.seen_capacity < per_fetch {
            return Err(AppError::ConfigError(format!(
                "TIDINGS_SEEN_CAPACITY ({}) must be at least {per_fetch}: {} sources x \
                 TIDINGS_PER_SOURCE_LIMIT ({})",
                self.seen_capacity,
                self.source_count(),
                self.per_source_limit
            )));
        }
        if self.tick.is_zero() {
            return Err(AppError::ConfigError(
                "TIDINGS_TICK_SECS must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn source_count(&self) -> usize {
        self.feeds.len() + self.html_sources.len()
    }

    /// Upper bound on candidates a single fetch across all sources can return.
    pub fn max_items_per_fetch(&self) -> usize {
        self.source_count().saturating_mul(self.per_source_limit)
    }

    /// Bot token and channel, required before anything can be published.
    pub fn telegram_credentials(&self) -> Result<(&str, &str), AppError> {
        let token = self.bot_token.as_deref().ok_or_else(|| {
            AppError::ConfigError("TIDINGS_BOT_TOKEN not set. Required for publishing.".into())
        })?;
        let channel = self.channel_id.as_deref().ok_or_else(|| {
            AppError::ConfigError("TIDINGS_CHANNEL_ID not set. Required for publishing.".into())
        })?;
        Ok((token, channel))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_per_cycle: self.max_per_cycle,
            seen_capacity: self.seen_capacity,
            min_interval: self.min_interval,
            deadline: self.cycle_deadline,
            allow_link_preview: self.link_preview,
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::ConfigError(format!("Invalid {key} '{raw}': must be a non-negative integer"))
        }),
    }
}

fn parse_bool_or<G>(get: &G, key: &str, default: bool) -> Result<bool, AppError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(AppError::ConfigError(format!(
            "Invalid {key} '{v}': expected true/false"
        ))),
    }
}
