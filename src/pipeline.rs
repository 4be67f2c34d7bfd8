//! End-to-end lookup: extract, rank, validate in batches, re-rank by size.
//!
//! Candidates are validated in batches of `batch_size`, most relevant first.
//! Within a batch every fetch runs concurrently; batches run one after the
//! other, which caps outbound image fetches at `batch_size`. The first batch
//! with at least one loadable image decides the winner.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use url::Url;

use crate::candidate::ImageCandidate;
use crate::error::PickError;
use crate::extract::Extractor;
use crate::html::fetch_document;
use crate::score_config::{ScoreConfig, ScoreConfigOverrides};
use crate::scoring::{ScoreHook, Scorer};
use crate::url_resolve::{resolve, root_fallback};
use crate::validate::{DEFAULT_CACHE_TTL, DEFAULT_TIMEOUT, ImageValidator};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Debug, Clone)]
pub struct PickerOptions {
    pub batch_size: usize,
    pub validate_timeout: Duration,
    pub cache_ttl: Duration,
    /// Page and stylesheet fetches.
    pub fetch_timeout: Duration,
    pub user_agent: String,
}

impl Default for PickerOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            validate_timeout: DEFAULT_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent: concat!("imgpick/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Winner plus every intermediate list of a debug lookup.
#[derive(Debug, Clone, Serialize)]
pub struct DebugReport {
    pub image_url: String,
    pub extracted: Vec<ImageCandidate>,
    pub scored: Vec<ImageCandidate>,
    pub size_ranked: Vec<ImageCandidate>,
}

#[derive(Debug, Default)]
struct Trace {
    extracted: Vec<ImageCandidate>,
    scored: Vec<ImageCandidate>,
    size_ranked: Vec<ImageCandidate>,
}

/// Keep the first candidate of every address.
fn dedupe_by_src(candidates: &mut Vec<ImageCandidate>) {
    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.src.clone()));
}

#[derive(Debug)]
pub struct ImagePicker {
    http: reqwest::Client,
    extractor: Extractor,
    validator: Arc<ImageValidator>,
    scorer: Scorer,
    options: PickerOptions,
}

impl ImagePicker {
    /// # Errors
    ///
    /// Returns Err if the HTTP client can't be built (TLS backend init).
    pub fn new(options: PickerOptions, config: ScoreConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(options.user_agent.clone())
            .build()?;
        Ok(Self::with_client(http, options, config))
    }

    /// Build around an existing client; the validator gets its own ledger.
    #[must_use]
    pub fn with_client(
        http: reqwest::Client,
        options: PickerOptions,
        config: ScoreConfig,
    ) -> Self {
        let validator =
            ImageValidator::new(http.clone(), options.validate_timeout, options.cache_ttl);
        Self {
            extractor: Extractor::new(http.clone(), options.fetch_timeout),
            validator: Arc::new(validator),
            scorer: Scorer::new(config),
            http,
            options,
        }
    }

    #[must_use]
    pub const fn score_config(&self) -> &ScoreConfig {
        self.scorer.config()
    }

    /// Replace the weights with the defaults merged with `overrides`.
    /// Returns false, changing nothing, when there is nothing to merge.
    pub fn set_score_config(&mut self, overrides: Option<&ScoreConfigOverrides>) -> bool {
        let Some(o) = overrides else {
            return false;
        };
        self.scorer = Scorer::new(ScoreConfig::default().merged(o));
        true
    }

    /// # Errors
    ///
    /// See [`PickError`].
    pub async fn get_best_image(
        &self,
        url: &str,
        query: Option<&str>,
    ) -> Result<String, PickError> {
        self.lookup(url, query, None, None, None).await
    }

    /// # Errors
    ///
    /// See [`PickError`].
    pub async fn get_best_image_with_hook(
        &self,
        url: &str,
        query: Option<&str>,
        hook: &dyn ScoreHook,
    ) -> Result<String, PickError> {
        self.lookup(url, query, None, Some(hook), None).await
    }

    /// Same as [`Self::get_best_image_with_hook`] with the page body already
    /// in hand; `url` is only used to resolve relative addresses.
    ///
    /// # Errors
    ///
    /// See [`PickError`].
    pub async fn get_best_image_from_html(
        &self,
        url: &str,
        query: Option<&str>,
        html: &str,
        hook: Option<&dyn ScoreHook>,
    ) -> Result<String, PickError> {
        self.lookup(url, query, Some(html), hook, None).await
    }

    /// Single-batch lookup that keeps every intermediate list.
    ///
    /// # Errors
    ///
    /// See [`PickError`].
    pub async fn get_best_image_debug(
        &self,
        url: &str,
        query: Option<&str>,
        html: Option<&str>,
        hook: Option<&dyn ScoreHook>,
    ) -> Result<DebugReport, PickError> {
        let mut trace = Trace::default();
        let image_url = self.lookup(url, query, html, hook, Some(&mut trace)).await?;
        Ok(DebugReport {
            image_url,
            extracted: trace.extracted,
            scored: trace.scored,
            size_ranked: trace.size_ranked,
        })
    }

    fn parse_page_url(url: &str) -> Result<Url, PickError> {
        Url::parse(url.trim())
            .map_err(|e| PickError::DocumentFetch(format!("invalid url {url}: {e}")))
    }

    async fn load(&self, url: &str, html: Option<&str>) -> Result<(Url, String), PickError> {
        let page_url = Self::parse_page_url(url)?;
        let body = match html {
            Some(h) => h.to_string(),
            None => {
                fetch_document(&self.http, page_url.as_str(), self.options.fetch_timeout).await?
            }
        };
        Ok((page_url, body))
    }

    /// Resolve every address against `base`, score, and drop duplicates of
    /// the resolved address.
    #[must_use]
    pub fn rank_candidates(
        &self,
        mut candidates: Vec<ImageCandidate>,
        base: &Url,
        hook: Option<&dyn ScoreHook>,
    ) -> Vec<ImageCandidate> {
        for c in &mut candidates {
            c.raw_src.clone_from(&c.src);
            c.src = resolve(base, &c.src).unwrap_or_default();
        }
        let mut ranked = self.scorer.score(candidates, hook);
        dedupe_by_src(&mut ranked);
        ranked
    }

    /// Extract and content-rank the candidates of a page, without validating
    /// anything.
    ///
    /// # Errors
    ///
    /// [`PickError::DocumentFetch`] when the page can't be loaded.
    pub async fn find_best_images(
        &self,
        url: &str,
        query: Option<&str>,
        html: Option<&str>,
        hook: Option<&dyn ScoreHook>,
    ) -> Result<Vec<ImageCandidate>, PickError> {
        let (page_url, body) = self.load(url, html).await?;
        let extracted = self.extractor.extract(&page_url, &body, query).await;
        Ok(self.rank_candidates(extracted.candidates, &extracted.base, hook))
    }

    async fn lookup(
        &self,
        url: &str,
        query: Option<&str>,
        html: Option<&str>,
        hook: Option<&dyn ScoreHook>,
        mut trace: Option<&mut Trace>,
    ) -> Result<String, PickError> {
        let (page_url, body) = self.load(url, html).await?;
        let extracted = self.extractor.extract(&page_url, &body, query).await;
        if let Some(t) = trace.as_deref_mut() {
            t.extracted.clone_from(&extracted.candidates);
        }

        let ranked = self.rank_candidates(extracted.candidates, &extracted.base, hook);
        if let Some(t) = trace.as_deref_mut() {
            t.scored.clone_from(&ranked);
        }
        if ranked.is_empty() {
            tracing::warn!(url = %page_url, "no image candidates");
            return Err(PickError::NoImagesFound);
        }

        // debug lookups see everything in one batch
        let batch_size = if trace.is_some() {
            ranked.len()
        } else {
            self.options.batch_size.max(1)
        };

        for (n, batch) in ranked.chunks(batch_size).enumerate() {
            let validated = self.validate_batch(batch, &extracted.base).await;
            let survivors = self.consolidate_and_size_rank(validated, hook);
            if let Some(t) = trace.as_deref_mut() {
                t.size_ranked.clone_from(&survivors);
            }
            if let Some(best) = survivors.into_iter().next() {
                tracing::info!(url = %page_url, image = %best.src, batch = n, "image selected");
                return Ok(best.src);
            }
            tracing::debug!(url = %page_url, batch = n, size = batch.len(), "batch exhausted");
        }

        tracing::warn!(url = %page_url, candidates = ranked.len(), "no valid image");
        Err(PickError::NoValidImage)
    }

    /// Validate a batch concurrently. Failures leave a `None` in their slot.
    pub async fn validate_batch(
        &self,
        batch: &[ImageCandidate],
        base: &Url,
    ) -> Vec<Option<ImageCandidate>> {
        let mut set = JoinSet::new();
        for (i, c) in batch.iter().enumerate() {
            let validator = Arc::clone(&self.validator);
            let mut c = c.clone();
            let fallback = root_fallback(base, &c.raw_src);
            set.spawn(async move {
                let mut outcome = validator.validate(&c.src).await;
                if let Err(e) = &outcome
                    && e.is_unreachable()
                    && let Some(alt) = fallback
                {
                    tracing::debug!(from = %c.src, to = %alt, "retrying from origin root");
                    outcome = validator.validate(&alt).await;
                    if outcome.is_ok() {
                        c.src = alt;
                    }
                }
                match outcome {
                    Ok(info) => {
                        c.dimensions = info.dimensions;
                        (i, Some(c))
                    }
                    Err(e) => {
                        tracing::debug!(image = %c.src, error = %e, "candidate dropped");
                        (i, None)
                    }
                }
            });
        }

        let mut slots: Vec<Option<ImageCandidate>> = vec![None; batch.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((i, c)) => slots[i] = c,
                Err(e) => tracing::warn!(error = %e, "validation task failed"),
            }
        }
        slots
    }

    /// Drop failed slots and rank the survivors by size.
    #[must_use]
    pub fn consolidate_and_size_rank(
        &self,
        batch: Vec<Option<ImageCandidate>>,
        hook: Option<&dyn ScoreHook>,
    ) -> Vec<ImageCandidate> {
        let survivors: Vec<ImageCandidate> = batch.into_iter().flatten().collect();
        self.scorer.rank_by_size(survivors, hook)
    }
}
