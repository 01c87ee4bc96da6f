use anyhow::{anyhow, Context, Result};
use url::Url;

pub const DEFAULT_URL_MAX_LENGTH: usize = 100;
pub const DEFAULT_PARAM_MAX_LENGTH: usize = 10;

/// Tracker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Origin that root-relative beacon urls (`/1.gif`) are resolved against.
    pub origin: Option<Url>,
    /// When set, every beacon created afterwards targets this url instead.
    pub redirect_url: Option<String>,
    /// Advisory limit on the final request url.
    pub url_max_length: usize,
    /// Advisory limit on a single rendered parameter value.
    pub param_max_length: usize,
    /// Install the advisory validation layer.
    pub debug: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            origin: None,
            redirect_url: None,
            url_max_length: DEFAULT_URL_MAX_LENGTH,
            param_max_length: DEFAULT_PARAM_MAX_LENGTH,
            debug: false,
        }
    }
}

impl TrackerConfig {
    /// Read `BEACON_*` variables from the process environment.
    ///
    /// - `BEACON_ORIGIN`: origin for root-relative urls
    /// - `BEACON_REDIRECT_URL`: send every beacon here instead
    /// - `BEACON_URL_MAX_LENGTH`: advisory url length limit (defaults to 100)
    /// - `BEACON_PARAM_MAX_LENGTH`: advisory value length limit (defaults to 10)
    /// - `BEACON_DEBUG`: `1`/`true`/`yes`/`on` installs the validation layer
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = TrackerConfig::default();

        if let Some(origin) = lookup("BEACON_ORIGIN").filter(|v| !v.is_empty()) {
            cfg.origin = Some(parse_origin(&origin)?);
        }
        cfg.redirect_url = lookup("BEACON_REDIRECT_URL").filter(|v| !v.is_empty());

        if let Some(value) = lookup("BEACON_URL_MAX_LENGTH") {
            cfg.url_max_length = value
                .parse::<usize>()
                .map_err(|_| anyhow!("Invalid BEACON_URL_MAX_LENGTH: {}", value))?;
        }
        if let Some(value) = lookup("BEACON_PARAM_MAX_LENGTH") {
            cfg.param_max_length = value
                .parse::<usize>()
                .map_err(|_| anyhow!("Invalid BEACON_PARAM_MAX_LENGTH: {}", value))?;
        }
        if let Some(value) = lookup("BEACON_DEBUG") {
            cfg.debug = parse_flag(&value)
                .ok_or_else(|| anyhow!("Invalid BEACON_DEBUG: {}", value))?;
        }

        Ok(cfg)
    }

    pub fn with_origin(mut self, origin: &str) -> Result<Self> {
        self.origin = Some(parse_origin(origin)?);
        Ok(self)
    }
}

fn parse_origin(origin: &str) -> Result<Url> {
    Url::parse(origin).with_context(|| format!("Invalid BEACON_ORIGIN: {origin}"))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
