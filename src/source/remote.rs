//! Feed retrieval: HTTP with bounded retries, local files, gzip bodies.

use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::thread;
use std::time::Duration;

use super::TokenSource;
use crate::config::FeedConfig;
use crate::dedup::Candidate;
use crate::{Error, Result};

/// Gzip magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Check if data is gzip compressed.
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[..2] == GZIP_MAGIC
}

/// Decode a feed body to text, decompressing gzip when the magic is present.
///
/// Invalid UTF-8 is replaced rather than rejected, so a bad line fails later
/// as a single malformed entry. Only a corrupt gzip stream is an error.
pub fn decode_body(data: &[u8]) -> Result<String> {
    let bytes = if is_gzip(data) {
        let mut decoder = GzDecoder::new(data);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        log::debug!("Decompressed feed: {} -> {} bytes", data.len(), out.len());
        out
    } else {
        data.to_vec()
    };
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// HTTP client with bounded retries and linear backoff.
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
    retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    /// Create a fetcher. `retries` is the number of attempts after the first.
    pub fn new(timeout: Duration, retries: u32, retry_delay: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            retries,
            retry_delay,
        }
    }

    /// Download `url`, retrying on failure.
    ///
    /// Returns [`Error::SourceUnavailable`] carrying the last failure once
    /// all attempts are used up.
    pub fn fetch(&self, name: &str, url: &str) -> Result<Vec<u8>> {
        let attempts = self.retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.try_fetch(url) {
                Ok(body) => {
                    log::info!("Downloaded {}: {} bytes", name, body.len());
                    return Ok(body);
                }
                Err(reason) => {
                    log::warn!(
                        "Failed to download {} (attempt {}/{}): {}",
                        name,
                        attempt,
                        attempts,
                        reason
                    );
                    last_error = reason;
                    if attempt < attempts {
                        thread::sleep(self.retry_delay * attempt);
                    }
                }
            }
        }

        Err(Error::SourceUnavailable {
            name: name.to_string(),
            reason: last_error,
        })
    }

    fn try_fetch(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => format!("HTTP error: {}", code),
            ureq::Error::Transport(t) => format!("Transport error: {}", t),
        })?;

        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| format!("Failed to read response: {}", e))?;
        Ok(body)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 3, Duration::from_secs(2))
    }
}

/// A configured feed: remote URL or local file, in a given format.
pub struct FeedSource {
    feed: FeedConfig,
    fetcher: HttpFetcher,
}

impl FeedSource {
    /// Create a source for `feed`, downloading through `fetcher` when it has a URL.
    pub fn new(feed: FeedConfig, fetcher: HttpFetcher) -> Self {
        Self { feed, fetcher }
    }

    fn unavailable(&self, reason: impl ToString) -> Error {
        Error::SourceUnavailable {
            name: self.feed.name.clone(),
            reason: reason.to_string(),
        }
    }

    fn raw_body(&self) -> Result<Vec<u8>> {
        match (&self.feed.url, &self.feed.path) {
            (Some(url), _) => self.fetcher.fetch(&self.feed.name, url),
            (None, Some(path)) => fs::read(path)
                .map_err(|e| self.unavailable(format!("{}: {}", path.display(), e))),
            (None, None) => Err(Error::Config(format!(
                "feed {} has neither url nor path",
                self.feed.name
            ))),
        }
    }
}

impl TokenSource for FeedSource {
    fn name(&self) -> &str {
        &self.feed.name
    }

    fn candidates(&self) -> Result<Vec<Result<Candidate>>> {
        let raw = self.raw_body()?;
        let text = decode_body(&raw).map_err(|e| self.unavailable(e))?;
        Ok(self.feed.format.parse(&text))
    }
}
