//! Resource Loader - concurrent fetch/decode of photos and logos
//!
//! Every reference needed for one render is loaded in its own task with a
//! bounded timeout. The join waits for all of them; failures simply leave no
//! entry in the resulting [`ResourceSet`].

use base64::Engine as _;
use image::{ImageReader, RgbaImage};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::{self, JoinSet};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::descriptor::PhotoRef;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("request failed: {0}")]
    Http(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("resource exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("image has zero dimensions")]
    EmptyImage,

    #[error("decode task failed: {0}")]
    Task(String),
}

/// Byte source for remote images.
pub trait Fetch: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send;
}

/// Fetches over HTTP, routed through the same-origin proxy when one is configured.
pub struct HttpFetcher {
    client: reqwest::Client,
    proxy_endpoint: Option<String>,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &EngineConfig) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(config.resource_timeout())
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LoadError::Http(e.to_string()))?;
        Ok(Self {
            client,
            proxy_endpoint: config.proxy_endpoint.clone(),
            max_bytes: config.max_resource_bytes,
        })
    }

    /// `<proxyEndpoint><percent-encoded url>`, or the URL itself without a proxy.
    pub fn request_url(&self, url: &str) -> String {
        match &self.proxy_endpoint {
            Some(endpoint) => {
                let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
                format!("{endpoint}{encoded}")
            }
            None => url.to_string(),
        }
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let target = self.request_url(url);
        let response = self
            .client
            .get(&target)
            .send()
            .await
            .map_err(|e| LoadError::Http(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status(status.as_u16()));
        }
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(LoadError::TooLarge { limit: self.max_bytes });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| LoadError::Http(e.to_string()))?;
        if bytes.len() > self.max_bytes {
            return Err(LoadError::TooLarge { limit: self.max_bytes });
        }
        Ok(bytes.to_vec())
    }
}

/// Decoded pixels plus natural size.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pixels: Arc<RgbaImage>,
}

impl ResolvedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels: Arc::new(pixels) }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// One reference to load and whether the render depends on it.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub photo: PhotoRef,
    pub required: bool,
}

/// Loaded images keyed by the original reference string.
#[derive(Debug, Default)]
pub struct ResourceSet {
    images: HashMap<String, ResolvedImage>,
    failures: HashMap<String, LoadError>,
}

impl ResourceSet {
    /// Present and drawable; zero-sized images count as absent.
    pub fn get(&self, photo: &PhotoRef) -> Option<&ResolvedImage> {
        self.images.get(photo.as_str()).filter(|image| !image.is_empty())
    }

    pub fn failure(&self, photo: &PhotoRef) -> Option<&LoadError> {
        self.failures.get(photo.as_str())
    }

    pub fn insert(&mut self, photo: &PhotoRef, image: ResolvedImage) {
        self.images.insert(photo.as_str().to_string(), image);
    }

    pub fn loaded(&self) -> usize {
        self.images.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

pub struct ResourceLoader<F: Fetch> {
    fetcher: Arc<F>,
    timeout: Duration,
    max_decoded_pixels: u64,
}

impl<F: Fetch> ResourceLoader<F> {
    pub fn new(fetcher: F, config: &EngineConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            timeout: config.resource_timeout(),
            max_decoded_pixels: config.max_decoded_pixels,
        }
    }

    /// Load a single reference.
    pub async fn load(&self, photo: &PhotoRef) -> Result<ResolvedImage, LoadError> {
        load_one(
            self.fetcher.clone(),
            photo.clone(),
            self.timeout,
            self.max_decoded_pixels,
        )
        .await
    }

    /// Load every request concurrently and wait for all of them.
    pub async fn load_all(&self, requests: Vec<ResourceRequest>) -> ResourceSet {
        let started = Instant::now();
        let mut seen = HashSet::new();
        let mut required = HashSet::new();
        let mut join_set = JoinSet::new();
        for request in requests {
            let key = request.photo.as_str().to_string();
            if request.required {
                required.insert(key.clone());
            }
            if !seen.insert(key.clone()) {
                continue;
            }
            let fetcher = self.fetcher.clone();
            let timeout = self.timeout;
            let max_pixels = self.max_decoded_pixels;
            join_set.spawn(async move {
                let result = load_one(fetcher, request.photo, timeout, max_pixels).await;
                (key, result)
            });
        }

        let requested = seen.len();
        let mut set = ResourceSet::default();
        while let Some(joined) = join_set.join_next().await {
            let (key, result) = match joined {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(error = %err, "resource task aborted");
                    continue;
                }
            };
            match result {
                Ok(image) => {
                    debug!(reference = %short_ref(&key), width = image.width(), height = image.height(), "resource loaded");
                    set.images.insert(key, image);
                }
                Err(err) => {
                    if required.contains(&key) {
                        debug!(reference = %short_ref(&key), error = %err, "required resource failed");
                    } else {
                        warn!(reference = %short_ref(&key), error = %err, "resource load failed, drawing placeholder");
                    }
                    set.failures.insert(key, err);
                }
            }
        }
        debug!(
            requested,
            loaded = set.loaded(),
            missing = set.failed(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "resource load summary"
        );
        set
    }
}

async fn load_one<F: Fetch>(
    fetcher: Arc<F>,
    photo: PhotoRef,
    timeout: Duration,
    max_pixels: u64,
) -> Result<ResolvedImage, LoadError> {
    let work = async {
        let bytes = match &photo {
            PhotoRef::Embedded(data) => decode_data_uri(data)?,
            PhotoRef::Remote(url) | PhotoRef::Proxied { target: url, .. } => fetcher.fetch(url).await?,
        };
        task::spawn_blocking(move || decode_image(&bytes, max_pixels))
            .await
            .map_err(|e| LoadError::Task(e.to_string()))?
    };
    tokio::time::timeout(timeout, work)
        .await
        .map_err(|_| LoadError::Timeout(timeout))?
}

/// Payload of a base64 `data:` URI.
pub fn decode_data_uri(data: &str) -> Result<Vec<u8>, LoadError> {
    let invalid = || LoadError::InvalidReference("expected a base64 data URI".to_string());
    let rest = data.strip_prefix("data:").ok_or_else(invalid)?;
    let (header, payload) = rest.split_once(',').ok_or_else(invalid)?;
    if !header.ends_with(";base64") {
        return Err(invalid());
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| LoadError::Decode(e.to_string()))
}

/// Decode any supported raster format into RGBA, refusing oversized images.
pub fn decode_image(bytes: &[u8], max_pixels: u64) -> Result<ResolvedImage, LoadError> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| LoadError::Decode(e.to_string()))?;
    let max_dim = max_pixels.min(u32::MAX as u64) as u32;
    let mut limits = image::Limits::default();
    limits.max_image_width = Some(max_dim);
    limits.max_image_height = Some(max_dim);
    limits.max_alloc = Some(max_pixels.saturating_mul(4));
    reader.limits(limits);
    let decoded = reader.decode().map_err(|e| LoadError::Decode(e.to_string()))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(LoadError::EmptyImage);
    }
    let pixels = decoded.width() as u64 * decoded.height() as u64;
    if pixels > max_pixels {
        return Err(LoadError::TooLarge {
            limit: max_pixels as usize,
        });
    }
    Ok(ResolvedImage::new(decoded.to_rgba8()))
}

/// Data URIs are long; keep log lines readable.
fn short_ref(reference: &str) -> &str {
    match reference.char_indices().nth(96) {
        Some((idx, _)) => &reference[..idx],
        None => reference,
    }
}
