use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use grab_logging::{grab_debug, grab_info, grab_warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};

use crate::config::FetchSettings;
use crate::{ClientError, FetchOutcome, MediaPayload, StrategyKind};

const MEDIA_ACCEPT: &str = "image/*,video/*,*/*";

/// Anything that can turn a media URL into bytes.
#[async_trait::async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch_media(&self, url: &str) -> FetchOutcome;
}

/// One way of retrieving a media URL. Strategies never return errors:
/// every problem collapses into `FetchOutcome::Failure`.
#[async_trait::async_trait]
pub trait FetchStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn attempt(&self, client: &reqwest::Client, url: &str) -> FetchOutcome;
}

/// Ordered fallback chain: the first outcome that is not `Failure` wins.
pub struct MediaFetcher {
    client: reqwest::Client,
    strategies: Vec<Box<dyn FetchStrategy>>,
}

impl MediaFetcher {
    /// Direct, then relays, then alternate origin, then the reachability probe.
    pub fn new(settings: &FetchSettings) -> Result<Self, ClientError> {
        Self::with_strategies(settings, default_strategies(settings))
    }

    pub fn with_strategies(
        settings: &FetchSettings,
        strategies: Vec<Box<dyn FetchStrategy>>,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ClientError::Build(err.to_string()))?;
        Ok(Self { client, strategies })
    }

    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        for strategy in &self.strategies {
            match strategy.attempt(&self.client, url).await {
                FetchOutcome::Failure => {
                    grab_debug!("{} strategy exhausted for {}", strategy.kind(), url);
                }
                outcome => return outcome,
            }
        }
        grab_warn!("All strategies failed for: {}", url);
        FetchOutcome::Failure
    }

    /// Bytes of `url`, or `None` when the item should be skipped.
    pub async fn fetch_media_bytes(&self, url: &str) -> Option<MediaPayload> {
        self.fetch(url).await.into_payload()
    }
}

#[async_trait::async_trait]
impl MediaSource for MediaFetcher {
    async fn fetch_media(&self, url: &str) -> FetchOutcome {
        self.fetch(url).await
    }
}

pub fn default_strategies(settings: &FetchSettings) -> Vec<Box<dyn FetchStrategy>> {
    vec![
        Box::new(DirectStrategy::new(settings)),
        Box::new(RelayStrategy::new(settings)),
        Box::new(AlternateOriginStrategy::new(settings)),
        Box::new(ReachabilityProbe),
    ]
}

#[derive(Debug, Clone, Copy)]
struct BodyLimits {
    min_exclusive: u64,
    max: u64,
}

impl BodyLimits {
    fn from_settings(settings: &FetchSettings) -> Self {
        Self {
            min_exclusive: settings.min_payload_bytes,
            max: settings.max_bytes,
        }
    }
}

/// Browser-like GET with a referer, retried with linear backoff.
#[derive(Debug, Clone)]
pub struct DirectStrategy {
    user_agent: String,
    referer: String,
    attempts: u32,
    backoff_step: Duration,
    limits: BodyLimits,
}

impl DirectStrategy {
    pub fn new(settings: &FetchSettings) -> Self {
        Self {
            user_agent: settings.user_agent.clone(),
            referer: settings.referer.clone(),
            attempts: settings.direct_attempts.max(1),
            backoff_step: settings.backoff_step,
            limits: BodyLimits::from_settings(settings),
        }
    }
}

#[async_trait::async_trait]
impl FetchStrategy for DirectStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Direct
    }

    async fn attempt(&self, client: &reqwest::Client, url: &str) -> FetchOutcome {
        for attempt in 1..=self.attempts {
            grab_debug!("Direct fetch attempt {}/{} for {}", attempt, self.attempts, url);
            let request = client
                .get(url)
                .header(ACCEPT, MEDIA_ACCEPT)
                .header(USER_AGENT, &self.user_agent)
                .header(REFERER, &self.referer);
            match read_body(request, self.limits).await {
                Ok((bytes, content_type)) => {
                    grab_info!("Direct fetch successful: {} bytes", bytes.len());
                    return FetchOutcome::Success(MediaPayload {
                        bytes,
                        content_type,
                        via: StrategyKind::Direct,
                    });
                }
                Err(reason) => {
                    grab_debug!("Direct fetch attempt {} failed: {}", attempt, reason);
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.backoff_step * attempt).await;
            }
        }
        FetchOutcome::Failure
    }
}

/// Public passthrough relays, each tried once under its own timeout.
#[derive(Debug, Clone)]
pub struct RelayStrategy {
    relays: Vec<String>,
    timeout: Duration,
    limits: BodyLimits,
}

impl RelayStrategy {
    pub fn new(settings: &FetchSettings) -> Self {
        Self {
            relays: settings.relays.clone(),
            timeout: settings.relay_timeout,
            limits: BodyLimits::from_settings(settings),
        }
    }
}

/// `{relay}{percent-encoded target}`.
pub fn relay_url(relay: &str, target: &str) -> String {
    format!("{relay}{}", urlencoding::encode(target))
}

#[async_trait::async_trait]
impl FetchStrategy for RelayStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Relay
    }

    async fn attempt(&self, client: &reqwest::Client, url: &str) -> FetchOutcome {
        for relay in &self.relays {
            grab_debug!("Trying relay: {}", relay);
            let request = client.get(relay_url(relay, url)).header(ACCEPT, MEDIA_ACCEPT);
            match tokio::time::timeout(self.timeout, read_body(request, self.limits)).await {
                Ok(Ok((bytes, content_type))) => {
                    grab_info!("Relay fetch successful via {}: {} bytes", relay, bytes.len());
                    return FetchOutcome::Success(MediaPayload {
                        bytes,
                        content_type,
                        via: StrategyKind::Relay,
                    });
                }
                Ok(Err(reason)) => grab_debug!("Relay {} failed: {}", relay, reason),
                Err(_) => grab_debug!("Relay {} timed out after {:?}", relay, self.timeout),
            }
        }
        FetchOutcome::Failure
    }
}

/// Plain GET announcing the canonical site as origin.
#[derive(Debug, Clone)]
pub struct AlternateOriginStrategy {
    origin: String,
    limits: BodyLimits,
}

impl AlternateOriginStrategy {
    pub fn new(settings: &FetchSettings) -> Self {
        Self {
            origin: settings.origin.clone(),
            limits: BodyLimits::from_settings(settings),
        }
    }
}

#[async_trait::async_trait]
impl FetchStrategy for AlternateOriginStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AlternateOrigin
    }

    async fn attempt(&self, client: &reqwest::Client, url: &str) -> FetchOutcome {
        let request = client
            .get(url)
            .header(ACCEPT, "*/*")
            .header(ORIGIN, &self.origin);
        match read_body(request, self.limits).await {
            Ok((bytes, content_type)) => {
                grab_info!("Alternative fetch successful: {} bytes", bytes.len());
                FetchOutcome::Success(MediaPayload {
                    bytes,
                    content_type,
                    via: StrategyKind::AlternateOrigin,
                })
            }
            Err(reason) => {
                grab_debug!("Alternative fetch failed: {}", reason);
                FetchOutcome::Failure
            }
        }
    }
}

/// HEAD request that can only tell whether the resource answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReachabilityProbe;

#[async_trait::async_trait]
impl FetchStrategy for ReachabilityProbe {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ReachabilityProbe
    }

    async fn attempt(&self, client: &reqwest::Client, url: &str) -> FetchOutcome {
        match client.head(url).header(ACCEPT, "*/*").send().await {
            Ok(response) if response.status().as_u16() < 400 => {
                grab_debug!("{} is reachable but unreadable", url);
                FetchOutcome::OpaqueUnreadable
            }
            Ok(response) => {
                grab_debug!("Probe of {} answered {}", url, response.status());
                FetchOutcome::Failure
            }
            Err(err) => {
                grab_debug!("Probe of {} failed: {}", url, err);
                FetchOutcome::Failure
            }
        }
    }
}

/// Sends `request` and reads the body within `limits`.
async fn read_body(
    request: reqwest::RequestBuilder,
    limits: BodyLimits,
) -> Result<(Bytes, Option<String>), String> {
    let response = request.send().await.map_err(|err| err.to_string())?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("http status {status}"));
    }

    if let Some(content_len) = response.content_length() {
        if content_len > limits.max {
            return Err(format!("response too large ({content_len} bytes)"));
        }
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    let mut body = BytesMut::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| err.to_string())?;
        if body.len() as u64 + chunk.len() as u64 > limits.max {
            return Err("response too large".to_string());
        }
        body.extend_from_slice(&chunk);
    }

    if body.len() as u64 <= limits.min_exclusive {
        return Err(format!("payload too small ({} bytes)", body.len()));
    }

    Ok((body.freeze(), content_type))
}
