use grab_core::{DownloadResult, MediaDescriptor};
use grab_logging::{grab_debug, grab_info, grab_warn};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;

use crate::config::{ApiConfig, ScrapeSettings};
use crate::{ClientError, NoMediaReason, ScrapeError};

const API_KEY_HEADER: &str = "x-rapidapi-key";
const API_HOST_HEADER: &str = "x-rapidapi-host";

/// Client of the resolver API that turns source URLs into media descriptors.
pub struct ScrapeClient {
    config: ApiConfig,
    settings: ScrapeSettings,
    client: reqwest::Client,
}

impl ScrapeClient {
    pub fn new(config: &ApiConfig, settings: ScrapeSettings) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder().connect_timeout(settings.connect_timeout);
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| ClientError::Build(err.to_string()))?;
        Ok(Self {
            config: config.clone(),
            settings,
            client,
        })
    }

    /// Resolves one source URL. The configuration is checked before anything
    /// goes on the wire.
    pub async fn resolve(&self, source_url: &str) -> Result<DownloadResult, ScrapeError> {
        self.config.validate()?;
        let source_url = source_url.trim();
        let endpoint = self.endpoint(source_url)?;
        grab_debug!("Resolving {} via {}", source_url, self.config.api_host());

        let response = self
            .client
            .get(endpoint)
            .header(API_KEY_HEADER, self.config.api_key())
            .header(API_HOST_HEADER, self.config.api_host())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            grab_warn!("Resolver answered {} for {}", status, source_url);
            return Err(ScrapeError::from_status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let items = parse_media_list(&body)?;
        grab_info!("Resolved {} media items for {}", items.len(), source_url);
        Ok(DownloadResult::single(source_url, items))
    }

    /// Resolves `urls` one after another with a growing pause in between.
    ///
    /// Failures are collected per URL; only a configuration problem stops the
    /// batch. `on_resolved` sees every successful result as soon as it arrives.
    pub async fn resolve_batch(
        &self,
        urls: &[String],
        mut on_resolved: impl FnMut(&DownloadResult),
    ) -> Result<BatchOutcome, ScrapeError> {
        self.config.validate()?;

        let mut sources = Vec::new();
        let mut failures = Vec::new();
        for (index, url) in urls.iter().enumerate() {
            match self.resolve(url).await {
                Ok(result) => {
                    on_resolved(&result);
                    sources.push(result);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    grab_warn!("Error processing URL {}: {}", url, err);
                    failures.push(BatchFailure {
                        source_url: url.trim().to_string(),
                        error: err,
                    });
                }
            }

            if index + 1 < urls.len() {
                let delay = self.settings.batch_delay(index);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Ok(BatchOutcome {
            requested: urls.len(),
            result: (!sources.is_empty()).then(|| DownloadResult::batch(sources)),
            failures,
        })
    }

    fn endpoint(&self, source_url: &str) -> Result<url::Url, ScrapeError> {
        let base = self.config.resolver_base();
        let mut endpoint = url::Url::parse(&format!("{base}/scraper")).map_err(|_| {
            ScrapeError::ConfigurationMissing(crate::ConfigError::InvalidResolverBase {
                base: base.clone(),
            })
        })?;
        endpoint.query_pairs_mut().append_pair("url", source_url);
        Ok(endpoint)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub source_url: String,
    pub error: ScrapeError,
}

/// Result of a batch: the aggregate of every success plus the failures.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub requested: usize,
    pub result: Option<DownloadResult>,
    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.result
            .as_ref()
            .and_then(|result| result.batch_sources.as_ref())
            .map_or(0, Vec::len)
    }

    /// Partial-failure message naming each failed URL; `None` when all succeeded.
    pub fn summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        let reasons = self
            .failures
            .iter()
            .map(|failure| format!("{} ({})", failure.source_url, failure.error))
            .collect::<Vec<_>>()
            .join("; ");
        if self.result.is_none() {
            Some(format!(
                "Could not fetch download links for any of the {} URLs: {reasons}",
                self.requested
            ))
        } else {
            Some(format!(
                "Successfully processed {} out of {} URLs. Failed: {reasons}",
                self.succeeded(),
                self.requested
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResolverResponse {
    #[serde(default)]
    data: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<String>,
}

/// Parses a resolver body into descriptors, dropping entries without media.
pub fn parse_media_list(body: &[u8]) -> Result<Vec<MediaDescriptor>, ScrapeError> {
    let response: ResolverResponse = serde_json::from_slice(body).map_err(|err| {
        ScrapeError::no_media(NoMediaReason::Malformed, format!("invalid JSON: {err}"))
    })?;

    let entries = match (response.data, response.error) {
        (Some(entries), _) => entries,
        (None, Some(error)) => {
            return Err(ScrapeError::no_media(NoMediaReason::Unavailable, error));
        }
        (None, None) => {
            return Err(ScrapeError::no_media(
                NoMediaReason::Malformed,
                "response has no data array",
            ));
        }
    };

    let listed = entries.len();
    let items: Vec<MediaDescriptor> = entries.iter().filter_map(descriptor_from).collect();
    if items.is_empty() {
        let detail = if listed == 0 {
            "the post has no media; it may be private, restricted or deleted".to_string()
        } else {
            format!("none of the {listed} listed entries has a media URL")
        };
        return Err(ScrapeError::no_media(NoMediaReason::Unavailable, detail));
    }
    Ok(items)
}

fn descriptor_from(entry: &Value) -> Option<MediaDescriptor> {
    let media_url = entry.get("media")?.as_str()?.trim();
    if media_url.is_empty() {
        return None;
    }
    Some(MediaDescriptor {
        media_url: media_url.to_string(),
        is_video: entry.get("isVideo").is_some_and(lenient_bool),
        thumbnail_url: entry
            .get("thumbnail")
            .and_then(Value::as_str)
            .filter(|thumb| !thumb.trim().is_empty())
            .map(str::to_string),
        width: entry.get("width").and_then(lenient_u32),
        height: entry.get("height").and_then(lenient_u32),
        duration_seconds: entry.get("duration").and_then(lenient_f64),
    })
}

fn lenient_bool(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(text) => text.eq_ignore_ascii_case("true"),
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

fn lenient_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite() && *n >= 0.0)
}

fn lenient_u32(value: &Value) -> Option<u32> {
    lenient_f64(value)
        .map(f64::round)
        .filter(|n| *n <= f64::from(u32::MAX))
        .map(|n| n as u32)
}

fn map_reqwest_error(err: reqwest::Error) -> ScrapeError {
    if err.is_timeout() {
        return ScrapeError::Network(format!("request timed out: {err}"));
    }
    ScrapeError::Network(err.to_string())
}
