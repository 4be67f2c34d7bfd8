//! Heuristic ranking of image candidates.
//!
//! Two phases run over the same records. The content phase runs before any
//! network I/O and scores text, format and word-list signals. The size phase
//! runs on a validated batch and folds pixel dimensions into the score. Both
//! phases normalise so the best candidate of the batch sits at exactly 1.0.

use url::Url;

use crate::candidate::{Dimensions, ImageCandidate, ScoreBreakdown};
use crate::score_config::{ScoreConfig, SimilarityWeights};
use crate::url_resolve::{extension, file_name, is_data_uri};

/// Similarity of two strings in `[0, 1]` (Sørensen-Dice over bigrams,
/// case-insensitive). Empty input scores 0.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (a.trim().to_lowercase(), b.trim().to_lowercase());
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::sorensen_dice(&a, &b)
}

/// Helpers handed to user hooks so they can compare the way the scorer does.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookDeps;

impl HookDeps {
    #[must_use]
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        similarity(a, b)
    }

    #[must_use]
    pub fn parse_url(&self, s: &str) -> Option<Url> {
        Url::parse(s).ok()
    }
}

/// Caller-supplied score adjustment.
///
/// Hooks receive the whole batch, already sorted and normalised, and may
/// mutate scores freely; the scorer re-sorts and re-normalises afterwards.
pub trait ScoreHook: Send + Sync {
    /// Content phase.
    fn adjust(&self, candidates: &mut [ImageCandidate], deps: &HookDeps);

    /// Size phase, called after `size_score` is set and before it is folded
    /// into `score`.
    fn adjust_sizes(&self, _candidates: &mut [ImageCandidate], _deps: &HookDeps) {}
}

impl<F> ScoreHook for F
where
    F: Fn(&mut [ImageCandidate], &HookDeps) + Send + Sync,
{
    fn adjust(&self, candidates: &mut [ImageCandidate], deps: &HookDeps) {
        self(candidates, deps);
    }
}

/// Descending by score; equal scores keep their relative order.
pub fn sort_desc(candidates: &mut [ImageCandidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Scale scores so the maximum becomes 1.0.
///
/// With a positive maximum every score is divided by it. When nothing is
/// positive, scores map to `1 / (1 + (max - s))`: the best stays at 1.0,
/// order is kept and everything lands in `(0, 1]`.
pub fn normalize(candidates: &mut [ImageCandidate]) {
    let Some(max) = candidates.iter().map(|c| c.score).reduce(f64::max) else {
        return;
    };
    if max > 0.0 {
        for c in candidates.iter_mut() {
            c.score /= max;
        }
    } else {
        for c in candidates.iter_mut() {
            c.score = 1.0 / (1.0 + (max - c.score));
        }
    }
}

fn words_of(s: &str) -> String {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_ext(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

/// File name stem as space-separated words: `big_red-car.jpg` -> `big red car`.
fn filename_text(src: &str) -> String {
    words_of(strip_ext(file_name(src)))
}

/// Whole path as words, used when an image carries no title or alt text.
fn path_text(src: &str) -> String {
    let path = Url::parse(src).map_or_else(
        |_| src.split(['?', '#']).next().unwrap_or(src).to_string(),
        |u| u.path().to_string(),
    );
    words_of(strip_ext(&path))
}

#[derive(Debug, Clone, Default)]
pub struct Scorer {
    config: ScoreConfig,
}

impl Scorer {
    #[must_use]
    pub const fn new(config: ScoreConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &ScoreConfig {
        &self.config
    }

    fn similarity_term(c: &ImageCandidate, reference: &str, w: &SimilarityWeights) -> f64 {
        if reference.trim().is_empty() || c.is_data_uri() {
            return 0.0;
        }
        let label = c.title.as_deref().or(c.alt_text.as_deref());
        let mut s = match label {
            Some(t) => similarity(t, reference) * w.title,
            None => similarity(&path_text(&c.src), reference) * w.src,
        };
        let stem = filename_text(&c.src);
        if !stem.is_empty() {
            s += similarity(&stem, reference) * w.filename;
        }
        s
    }

    fn format_bonus(&self, src: &str) -> f64 {
        let f = &self.config.formats;
        if is_data_uri(src) {
            let is_image = src
                .get(5..11)
                .is_some_and(|t| t.eq_ignore_ascii_case("image/"));
            return if is_image { f.data_image } else { 0.0 };
        }
        match extension(src).as_deref() {
            Some("jpg" | "jpeg" | "ashx") => f.jpeg,
            Some("gif") => f.gif,
            Some("png") => f.png,
            _ => 0.0,
        }
    }

    /// Content score of one candidate. Fills `breakdown` and `score`.
    pub fn score_candidate(&self, c: &mut ImageCandidate) {
        let cfg = &self.config;
        let mut b = ScoreBreakdown {
            title_similarity: Self::similarity_term(c, &c.doc_title, &cfg.title),
            query_similarity: c
                .query
                .as_deref()
                .map_or(0.0, |q| Self::similarity_term(c, q, &cfg.query)),
            ..ScoreBreakdown::default()
        };

        if c.is_meta {
            b.meta = cfg.meta_bonus;
        }

        // each field earns the bonus on its own
        let good = &cfg.good_words;
        for field in [Some(c.src.as_str()), c.css_class.as_deref(), c.title.as_deref()]
            .into_iter()
            .flatten()
        {
            if good.matches(field) {
                b.good_words += good.amount;
            }
        }

        if !c.is_data_uri() && cfg.bad_words.matches(&c.src) {
            b.bad_words = cfg.bad_words.amount;
        }

        if cfg.bad_filenames.matches(file_name(&c.src)) {
            b.bad_filename = cfg.bad_filenames.amount;
        }

        b.format = self.format_bonus(&c.src);

        c.score = b.title_similarity
            + b.query_similarity
            + b.meta
            + b.good_words
            + b.bad_words
            + b.bad_filename
            + b.format;
        c.breakdown = b;
    }

    /// Content phase: score, sort, normalise, then let the hook have a go.
    ///
    /// Candidates without an address are dropped.
    #[must_use]
    pub fn score(
        &self,
        candidates: Vec<ImageCandidate>,
        hook: Option<&dyn ScoreHook>,
    ) -> Vec<ImageCandidate> {
        let mut out: Vec<ImageCandidate> = candidates
            .into_iter()
            .filter(ImageCandidate::has_src)
            .collect();
        for c in &mut out {
            self.score_candidate(c);
        }
        sort_desc(&mut out);
        normalize(&mut out);

        if let Some(hook) = hook {
            hook.adjust(&mut out, &HookDeps);
            sort_desc(&mut out);
            normalize(&mut out);
        }
        out
    }

    /// `1 - (ratio penalty + surface penalty)`; 0 without usable dimensions.
    #[must_use]
    pub fn size_score(&self, dims: Option<Dimensions>) -> f64 {
        let Some(d) = dims.filter(|d| d.is_usable()) else {
            return 0.0;
        };
        let pref = &self.config.size;
        let ratio_penalty = (pref.ideal_ratio() - d.ratio()).abs() * pref.ratio_weight;

        let delta = d.surface() - pref.ideal_surface();
        let surface_penalty = if delta > 0.0 {
            delta.ln() * 0.01 * pref.oversize_weight
        } else if delta < 0.0 {
            (-delta).ln() * 0.01 * pref.undersize_weight
        } else {
            0.0
        };

        1.0 - (ratio_penalty + surface_penalty)
    }

    /// Size phase over a validated batch.
    #[must_use]
    pub fn rank_by_size(
        &self,
        mut candidates: Vec<ImageCandidate>,
        hook: Option<&dyn ScoreHook>,
    ) -> Vec<ImageCandidate> {
        for c in &mut candidates {
            c.size_score = Some(self.size_score(c.dimensions));
        }
        if let Some(hook) = hook {
            hook.adjust_sizes(&mut candidates, &HookDeps);
        }
        for c in &mut candidates {
            c.score += c.size_score.unwrap_or(0.0);
        }
        sort_desc(&mut candidates);
        normalize(&mut candidates);
        candidates
    }
}
