//! Loadability and size check for candidate images.
//!
//! Each address is fetched at most once at a time. The ledger maps an
//! address to a one-shot cell: the first caller runs the fetch inside
//! `OnceCell::get_or_init`, concurrent callers for the same address wait on
//! that same cell, and the filled cell keeps answering until its TTL runs out.
//! The cell is filled exactly once however the transfer ends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::OnceCell;
use url::Url;

use crate::error::ValidationError;
use crate::image_probe::{self, ImageInfo};
use crate::url_resolve::is_data_uri;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10);

/// Stop reading a body that still hasn't told us anything past this point.
const MAX_PROBE_BYTES: usize = 512 * 1024;

pub type Validation = Result<ImageInfo, ValidationError>;

#[derive(Debug)]
struct Completed {
    outcome: Validation,
    at: Instant,
}

type Slot = Arc<OnceCell<Completed>>;

#[derive(Debug)]
pub struct ImageValidator {
    http: reqwest::Client,
    timeout: Duration,
    cache_ttl: Duration,
    ledger: Mutex<HashMap<String, Slot>>,
}

impl ImageValidator {
    #[must_use]
    pub fn new(http: reqwest::Client, timeout: Duration, cache_ttl: Duration) -> Self {
        Self {
            http,
            timeout,
            cache_ttl,
            ledger: Mutex::new(HashMap::new()),
        }
    }

    /// Ledger entries still held (in flight or cached).
    #[must_use]
    pub fn ledger_len(&self) -> usize {
        self.ledger.lock().map_or(0, |l| l.len())
    }

    fn slot_for(&self, address: &str) -> Slot {
        let now = Instant::now();
        let ttl = self.cache_ttl;
        let mut ledger = match self.ledger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Completed entries live for the TTL. Empty ones live while a caller
        // still holds them; a cancelled fetch leaves an empty, unheld cell.
        ledger.retain(|_, slot| match slot.get() {
            Some(done) => now.duration_since(done.at) < ttl,
            None => Arc::strong_count(slot) > 1,
        });
        ledger
            .entry(address.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Check that `address` points to a loadable image and read its size.
    ///
    /// # Errors
    ///
    /// Any [`ValidationError`]; none of them are fatal for a lookup.
    pub async fn validate(&self, address: &str) -> Validation {
        let address = address.trim();
        if is_data_uri(address) {
            return Ok(ImageInfo::loaded(None));
        }
        let url = Url::parse(address)
            .map_err(|e| ValidationError::InvalidUrl(format!("{address}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidUrl(format!(
                "{address}: unsupported scheme {}",
                url.scheme()
            )));
        }

        let slot = self.slot_for(address);
        let done = slot
            .get_or_init(|| async {
                let outcome = self.fetch(&url).await;
                match &outcome {
                    Ok(info) => tracing::debug!(url = %url, dims = ?info.dimensions, "image ok"),
                    Err(e) => tracing::debug!(url = %url, error = %e, "image rejected"),
                }
                Completed {
                    outcome,
                    at: Instant::now(),
                }
            })
            .await;
        done.outcome.clone()
    }

    async fn fetch(&self, url: &Url) -> Validation {
        match tokio::time::timeout(self.timeout, self.probe(url)).await {
            Ok(outcome) => outcome,
            // dropping the probe future aborts the transfer
            Err(_) => Err(ValidationError::Timeout(self.timeout)),
        }
    }

    async fn probe(&self, url: &Url) -> Validation {
        let mut resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ValidationError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ValidationError::Transport(format!("HTTP {status}")));
        }

        let address = url.as_str();
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| ValidationError::Transport(e.to_string()))?
        {
            buf.extend_from_slice(&chunk);
            if image_probe::has_enough(address, &buf) || buf.len() >= MAX_PROBE_BYTES {
                // the rest of the body is abandoned with `resp`
                break;
            }
        }
        image_probe::inspect(address, &buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    fn validator() -> ImageValidator {
        ImageValidator::new(client(), DEFAULT_TIMEOUT, DEFAULT_CACHE_TTL)
    }

    #[tokio::test]
    async fn data_uris_are_accepted_without_fetching() {
        let v = validator();
        let info = v.validate("data:image/png;base64,iVBORw0KGgo=").await.unwrap();
        assert!(info.loaded);
        assert_eq!(info.dimensions, None);
        assert_eq!(v.ledger_len(), 0);
    }

    #[tokio::test]
    async fn malformed_addresses_are_invalid() {
        let v = validator();
        assert!(matches!(
            v.validate("").await,
            Err(ValidationError::InvalidUrl(_))
        ));
        assert!(matches!(
            v.validate("ftp://a.com/x.jpg").await,
            Err(ValidationError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        // bind then drop to get a port nobody listens on
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let v = validator();
        let res = v.validate(&format!("http://127.0.0.1:{port}/a.jpg")).await;
        assert!(matches!(res, Err(ValidationError::Transport(_))));
        assert_eq!(v.ledger_len(), 1);
    }

    #[tokio::test]
    async fn stalled_server_times_out() {
        // accepts but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hold = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });
        let v = ImageValidator::new(
            client(),
            Duration::from_millis(200),
            DEFAULT_CACHE_TTL,
        );
        let res = v.validate(&format!("http://{addr}/slow.png")).await;
        assert!(matches!(res, Err(ValidationError::Timeout(_))));
        hold.abort();
    }

    #[tokio::test]
    async fn cancelled_lookups_do_not_linger() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hold = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });
        let v = Arc::new(validator());

        let mut handles = Vec::new();
        for i in 0..20 {
            let v = Arc::clone(&v);
            let target = format!("http://{addr}/stalled-{i}.png");
            handles.push(tokio::spawn(async move { v.validate(&target).await }));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(v.ledger_len(), 20);
        for h in &handles {
            h.abort();
        }
        for h in handles {
            assert!(h.await.unwrap_err().is_cancelled());
        }

        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let _ = v.validate(&format!("http://127.0.0.1:{port}/a.jpg")).await;
        // only the completed lookup is left
        assert_eq!(v.ledger_len(), 1);
        hold.abort();
    }

    #[tokio::test]
    async fn expired_entries_are_evicted() {
        let v = ImageValidator::new(client(), DEFAULT_TIMEOUT, Duration::ZERO);
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let _ = v.validate(&format!("http://127.0.0.1:{port}/a.jpg")).await;
        let _ = v.validate(&format!("http://127.0.0.1:{port}/b.jpg")).await;
        // the first entry expired as soon as the second lookup came in
        assert_eq!(v.ledger_len(), 1);
    }
}
