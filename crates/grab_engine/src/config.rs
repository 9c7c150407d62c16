use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Environment variable holding the resolver API key.
pub const API_KEY_VAR: &str = "RAPIDAPI_KEY";
/// Environment variable holding the resolver API host.
pub const API_HOST_VAR: &str = "RAPIDAPI_HOST";
/// Optional override for the resolver base URL (scheme and host).
pub const RESOLVER_BASE_VAR: &str = "INSTAGRAB_RESOLVER_BASE";

const PLACEHOLDERS: &[&str] = &[
    "undefined",
    "null",
    "your_rapidapi_key_here",
    "your_rapidapi_host_here",
];

/// Source of the current time. Injected so file names and history ids are testable.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("API key not configured ({variable} is missing or a placeholder)")]
    MissingApiKey { variable: &'static str },
    #[error("API host not configured ({variable} is missing or a placeholder)")]
    MissingApiHost { variable: &'static str },
    #[error("resolver base URL {base:?} is not a valid http(s) URL")]
    InvalidResolverBase { base: String },
}

impl ConfigError {
    pub fn remediation(&self) -> String {
        match self {
            ConfigError::MissingApiKey { variable } => format!(
                "Set {variable} to your RapidAPI key, in the environment or in a .env file next to where you run instagrab."
            ),
            ConfigError::MissingApiHost { variable } => format!(
                "Set {variable} to the RapidAPI host of the scraper API (for example instagram-scraper.p.rapidapi.com)."
            ),
            ConfigError::InvalidResolverBase { .. } => format!(
                "Fix or unset {RESOLVER_BASE_VAR}; it must look like https://host[:port]."
            ),
        }
    }
}

/// Credentials and location of the resolver API. Built once at start and
/// passed by reference to the clients that need it.
#[derive(Clone)]
pub struct ApiConfig {
    api_key: String,
    api_host: String,
    resolver_base: Option<String>,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &"<redacted>")
            .field("api_host", &self.api_host)
            .field("resolver_base", &self.resolver_base)
            .finish()
    }
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>, api_host: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_host: api_host.into(),
            resolver_base: None,
        }
    }

    /// Sends requests to `base` instead of `https://{api_host}`.
    pub fn with_resolver_base(mut self, base: impl Into<String>) -> Self {
        self.resolver_base = Some(base.into());
        self
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Missing values are kept empty
    /// and reported by [`ApiConfig::validate`], never replaced by defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let config = Self::new(
            lookup(API_KEY_VAR).unwrap_or_default(),
            lookup(API_HOST_VAR).unwrap_or_default(),
        );
        match lookup(RESOLVER_BASE_VAR).filter(|base| !base.trim().is_empty()) {
            Some(base) => config.with_resolver_base(base),
            None => config,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if is_placeholder(&self.api_key) {
            return Err(ConfigError::MissingApiKey {
                variable: API_KEY_VAR,
            });
        }
        if is_placeholder(&self.api_host) {
            return Err(ConfigError::MissingApiHost {
                variable: API_HOST_VAR,
            });
        }
        let base = self.resolver_base();
        match url::Url::parse(&base) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
            _ => Err(ConfigError::InvalidResolverBase { base }),
        }
    }

    pub fn api_host(&self) -> &str {
        self.api_host.trim()
    }

    pub(crate) fn api_key(&self) -> &str {
        self.api_key.trim()
    }

    /// Base URL without a trailing slash.
    pub fn resolver_base(&self) -> String {
        match &self.resolver_base {
            Some(base) => base.trim().trim_end_matches('/').to_string(),
            None => format!("https://{}", self.api_host()),
        }
    }
}

fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || PLACEHOLDERS
            .iter()
            .any(|placeholder| placeholder.eq_ignore_ascii_case(value))
}

/// Settings for the resolver client.
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Option<Duration>,
    /// Delay after the first request of a batch.
    pub batch_delay_base: Duration,
    /// Added to the delay for every further request.
    pub batch_delay_step: Duration,
    pub batch_delay_cap: Duration,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Some(Duration::from_secs(30)),
            batch_delay_base: Duration::from_millis(1000),
            batch_delay_step: Duration::from_millis(500),
            batch_delay_cap: Duration::from_millis(3000),
        }
    }
}

impl ScrapeSettings {
    /// Pause after the request at `index` (0-based) and before the next one.
    pub fn batch_delay(&self, index: usize) -> Duration {
        let steps = u32::try_from(index).unwrap_or(u32::MAX);
        self.batch_delay_step
            .checked_mul(steps)
            .and_then(|extra| self.batch_delay_base.checked_add(extra))
            .map_or(self.batch_delay_cap, |delay| delay.min(self.batch_delay_cap))
    }

    /// Settings without any pauses, for tests and local resolvers.
    pub fn without_delays() -> Self {
        Self {
            batch_delay_base: Duration::ZERO,
            batch_delay_step: Duration::ZERO,
            batch_delay_cap: Duration::ZERO,
            ..Self::default()
        }
    }
}

pub const DEFAULT_RELAYS: &[&str] = &[
    "https://api.allorigins.win/raw?url=",
    "https://cors-anywhere.herokuapp.com/",
    "https://thingproxy.freeboard.io/fetch/",
];

/// Settings for the media fetch chain.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    /// Whole-request limit for every strategy, relays included.
    pub request_timeout: Duration,
    pub user_agent: String,
    pub referer: String,
    pub origin: String,
    pub direct_attempts: u32,
    /// Backoff before retry `n` is `n * backoff_step`.
    pub backoff_step: Duration,
    /// Payloads must be strictly larger than this to count as media.
    pub min_payload_bytes: u64,
    pub max_bytes: u64,
    pub relays: Vec<String>,
    pub relay_timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
            referer: "https://www.instagram.com/".to_string(),
            origin: "https://www.instagram.com".to_string(),
            direct_attempts: 3,
            backoff_step: Duration::from_secs(1),
            min_payload_bytes: 0,
            max_bytes: 512 * 1024 * 1024,
            relays: DEFAULT_RELAYS.iter().map(|relay| relay.to_string()).collect(),
            relay_timeout: Duration::from_secs(10),
        }
    }
}

/// Settings for archive jobs and the individual-download fallback.
#[derive(Clone)]
pub struct ArchiveSettings {
    pub output_dir: PathBuf,
    pub inter_item_delay: Duration,
    pub individual_delay: Duration,
    pub min_payload_bytes: u64,
    /// Fetched media above this total is not packed; the job fails with
    /// `AssemblyFailed` and keeps the payloads.
    pub max_archive_bytes: u64,
    pub clock: Clock,
}

impl fmt::Debug for ArchiveSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveSettings")
            .field("output_dir", &self.output_dir)
            .field("inter_item_delay", &self.inter_item_delay)
            .field("individual_delay", &self.individual_delay)
            .field("min_payload_bytes", &self.min_payload_bytes)
            .field("max_archive_bytes", &self.max_archive_bytes)
            .finish_non_exhaustive()
    }
}

impl ArchiveSettings {
    pub fn default_with_output(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            inter_item_delay: Duration::from_millis(500),
            individual_delay: Duration::from_millis(1000),
            min_payload_bytes: 0,
            // Largest archive readable without ZIP64 support.
            max_archive_bytes: u64::from(u32::MAX),
            clock: system_clock(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn complete_config_validates() {
        let config = ApiConfig::from_lookup(lookup_from(&[
            (API_KEY_VAR, " secret "),
            (API_HOST_VAR, "scraper.example.com"),
        ]));
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.api_key(), "secret");
        assert_eq!(config.resolver_base(), "https://scraper.example.com");
    }

    #[test]
    fn missing_and_placeholder_values_are_rejected() {
        let missing = ApiConfig::from_lookup(lookup_from(&[(API_HOST_VAR, "h")]));
        assert_eq!(
            missing.validate(),
            Err(ConfigError::MissingApiKey {
                variable: API_KEY_VAR
            })
        );

        let placeholder = ApiConfig::new("your_rapidapi_key_here", "h");
        assert!(matches!(
            placeholder.validate(),
            Err(ConfigError::MissingApiKey { .. })
        ));

        let no_host = ApiConfig::new("key", "undefined");
        let err = no_host.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiHost { .. }));
        assert!(err.remediation().contains(API_HOST_VAR));
    }

    #[test]
    fn resolver_base_override_is_trimmed_and_checked() {
        let config = ApiConfig::new("key", "host").with_resolver_base("http://127.0.0.1:9000/");
        assert_eq!(config.resolver_base(), "http://127.0.0.1:9000");
        assert_eq!(config.validate(), Ok(()));

        let bad = ApiConfig::new("key", "host").with_resolver_base("not a url");
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::InvalidResolverBase { .. })
        ));
    }

    #[test]
    fn debug_output_hides_the_key() {
        let config = ApiConfig::new("super-secret", "host");
        assert!(!format!("{config:?}").contains("super-secret"));
    }

    #[test]
    fn batch_delay_grows_to_cap() {
        let settings = ScrapeSettings::default();
        assert_eq!(settings.batch_delay(0), Duration::from_millis(1000));
        assert_eq!(settings.batch_delay(1), Duration::from_millis(1500));
        assert_eq!(settings.batch_delay(4), Duration::from_millis(3000));
        assert_eq!(settings.batch_delay(10_000), Duration::from_millis(3000));
        assert_eq!(ScrapeSettings::without_delays().batch_delay(3), Duration::ZERO);
    }
}
