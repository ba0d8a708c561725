use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::Bitmap;

/// Retrieves an item image and decodes it.
///
/// Implementations perform no retries; the caller decides what a failure
/// means for the item.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Bitmap, FetchError>;
}

impl<F> ImageFetcher for F
where
    F: Fn(&str) -> Result<Bitmap, FetchError> + Send + Sync,
{
    fn fetch(&self, url: &str) -> Result<Bitmap, FetchError> {
        self(url)
    }
}

/// Decodes an encoded image (PNG, JPEG, WebP, GIF, BMP) into an RGBA bitmap.
pub fn decode_image(bytes: &[u8]) -> Result<Bitmap, image::ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Plain HTTP GET fetcher with a bounded request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// Wraps an already configured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn parse_url(url: &str) -> Result<Url, FetchError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(FetchError::MissingUrl);
    }

    let parsed = Url::parse(trimmed).map_err(|e| FetchError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(FetchError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {scheme:?}"),
        }),
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Bitmap, FetchError> {
        let parsed = parse_url(url)?;
        let url = parsed.as_str().to_string();

        let response = self.client.get(parsed).send().map_err(|source| {
            if source.is_timeout() {
                FetchError::Timeout {
                    url: url.clone(),
                    source,
                }
            } else {
                FetchError::Request {
                    url: url.clone(),
                    source,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|source| {
            if source.is_timeout() {
                FetchError::Timeout {
                    url: url.clone(),
                    source,
                }
            } else {
                FetchError::Body {
                    url: url.clone(),
                    source,
                }
            }
        })?;

        let bitmap = decode_image(&bytes).map_err(|source| FetchError::Decode {
            url: url.clone(),
            source,
        })?;

        debug!(
            %url,
            bytes = bytes.len(),
            width = bitmap.width(),
            height = bitmap.height(),
            "Fetched image"
        );

        Ok(bitmap)
    }
}
