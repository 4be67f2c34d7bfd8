//! Weighting table for the scorer.
//!
//! [`ScoreConfig::default`] holds the stock weights. Callers adjust them with a
//! [`ScoreConfigOverrides`], usually deserialized from JSON, whose fields are
//! all optional. Merging replaces only the fields that are present and
//! recurses into nested blocks. Word lists are replaced as a whole.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatBonuses {
    pub data_image: f64,
    pub jpeg: f64,
    pub gif: f64,
    pub png: f64,
}

/// Weights for one similarity reference (document title or query).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityWeights {
    /// Image title or alt text against the reference.
    pub title: f64,
    /// Address path text against the reference, used when there is no title/alt.
    pub src: f64,
    /// File name against the reference.
    pub filename: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordList {
    pub words: Vec<String>,
    /// Added once per matching field; negative for penalties.
    pub amount: f64,
}

impl WordList {
    fn new(words: &[&str], amount: f64) -> Self {
        Self {
            words: words.iter().map(ToString::to_string).collect(),
            amount,
        }
    }

    /// Case-insensitive substring match against any word.
    #[must_use]
    pub fn matches(&self, haystack: &str) -> bool {
        let h = haystack.to_lowercase();
        self.words
            .iter()
            .any(|w| !w.is_empty() && h.contains(&w.to_lowercase()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizePreference {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub ratio_weight: f64,
    pub oversize_weight: f64,
    pub undersize_weight: f64,
}

impl SizePreference {
    #[must_use]
    pub fn ideal_ratio(&self) -> f64 {
        f64::from(self.ideal_width) / f64::from(self.ideal_height.max(1))
    }

    #[must_use]
    pub fn ideal_surface(&self) -> f64 {
        f64::from(self.ideal_width) * f64::from(self.ideal_height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreConfig {
    pub meta_bonus: f64,
    pub formats: FormatBonuses,
    pub title: SimilarityWeights,
    pub query: SimilarityWeights,
    pub good_words: WordList,
    pub bad_words: WordList,
    pub bad_filenames: WordList,
    pub size: SizePreference,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            meta_bonus: 5.0,
            formats: FormatBonuses {
                data_image: 0.4,
                jpeg: 0.3,
                gif: 0.2,
                png: 0.1,
            },
            title: SimilarityWeights {
                title: 1.0,
                src: 0.6,
                filename: 0.5,
            },
            query: SimilarityWeights {
                title: 1.0,
                src: 0.6,
                filename: 0.5,
            },
            good_words: WordList::new(
                &[
                    "article", "content", "main", "hero", "feature", "cover", "post", "story",
                    "photo", "uploads",
                ],
                0.5,
            ),
            bad_words: WordList::new(
                &[
                    "logo", "icon", "sprite", "avatar", "badge", "banner", "button", "advert",
                    "doubleclick", "pixel", "tracking", "spacer", "social", "share", "facebook",
                    "twitter", "gravatar", "emoji",
                ],
                -1.0,
            ),
            bad_filenames: WordList::new(
                &[
                    "1x1", "blank", "spacer", "transparent", "placeholder", "loading", "loader",
                    "default",
                ],
                -1.0,
            ),
            size: SizePreference {
                ideal_width: 1200,
                ideal_height: 630,
                ratio_weight: 0.5,
                oversize_weight: 0.5,
                undersize_weight: 1.0,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatOverrides {
    pub data_image: Option<f64>,
    pub jpeg: Option<f64>,
    pub gif: Option<f64>,
    pub png: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimilarityOverrides {
    pub title: Option<f64>,
    pub src: Option<f64>,
    pub filename: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WordListOverrides {
    pub words: Option<Vec<String>>,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizeOverrides {
    pub ideal_width: Option<u32>,
    pub ideal_height: Option<u32>,
    pub ratio_weight: Option<f64>,
    pub oversize_weight: Option<f64>,
    pub undersize_weight: Option<f64>,
}

/// Partial [`ScoreConfig`]; absent fields inherit the base value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoreConfigOverrides {
    pub meta_bonus: Option<f64>,
    pub formats: Option<FormatOverrides>,
    pub title: Option<SimilarityOverrides>,
    pub query: Option<SimilarityOverrides>,
    pub good_words: Option<WordListOverrides>,
    pub bad_words: Option<WordListOverrides>,
    pub bad_filenames: Option<WordListOverrides>,
    pub size: Option<SizeOverrides>,
}

impl ScoreConfigOverrides {
    /// # Errors
    ///
    /// Returns Err on malformed JSON or unknown keys.
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// # Errors
    ///
    /// Returns Err if the file can't be read or isn't a valid override document.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&raw)?)
    }
}

fn set<T: Clone>(dst: &mut T, src: Option<&T>) {
    if let Some(v) = src {
        dst.clone_from(v);
    }
}

impl FormatBonuses {
    fn apply(&mut self, o: &FormatOverrides) {
        set(&mut self.data_image, o.data_image.as_ref());
        set(&mut self.jpeg, o.jpeg.as_ref());
        set(&mut self.gif, o.gif.as_ref());
        set(&mut self.png, o.png.as_ref());
    }
}

impl SimilarityWeights {
    fn apply(&mut self, o: &SimilarityOverrides) {
        set(&mut self.title, o.title.as_ref());
        set(&mut self.src, o.src.as_ref());
        set(&mut self.filename, o.filename.as_ref());
    }
}

impl WordList {
    fn apply(&mut self, o: &WordListOverrides) {
        set(&mut self.words, o.words.as_ref());
        set(&mut self.amount, o.amount.as_ref());
    }
}

impl SizePreference {
    fn apply(&mut self, o: &SizeOverrides) {
        set(&mut self.ideal_width, o.ideal_width.as_ref());
        set(&mut self.ideal_height, o.ideal_height.as_ref());
        set(&mut self.ratio_weight, o.ratio_weight.as_ref());
        set(&mut self.oversize_weight, o.oversize_weight.as_ref());
        set(&mut self.undersize_weight, o.undersize_weight.as_ref());
    }
}

impl ScoreConfig {
    /// Copy of `self` with `o` layered on top.
    #[must_use]
    pub fn merged(&self, o: &ScoreConfigOverrides) -> Self {
        let mut out = self.clone();
        set(&mut out.meta_bonus, o.meta_bonus.as_ref());
        if let Some(f) = &o.formats {
            out.formats.apply(f);
        }
        if let Some(t) = &o.title {
            out.title.apply(t);
        }
        if let Some(q) = &o.query {
            out.query.apply(q);
        }
        if let Some(w) = &o.good_words {
            out.good_words.apply(w);
        }
        if let Some(w) = &o.bad_words {
            out.bad_words.apply(w);
        }
        if let Some(w) = &o.bad_filenames {
            out.bad_filenames.apply(w);
        }
        if let Some(s) = &o.size {
            out.size.apply(s);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_overrides_keep_defaults() {
        let base = ScoreConfig::default();
        assert_eq!(base.merged(&ScoreConfigOverrides::default()), base);
    }

    #[test]
    fn nested_fields_merge_individually() {
        let o = ScoreConfigOverrides::from_json(
            r#"{ "formats": { "png": 0.9 }, "size": { "ideal_width": 800 } }"#,
        )
        .unwrap();
        let cfg = ScoreConfig::default().merged(&o);
        assert!((cfg.formats.png - 0.9).abs() < f64::EPSILON);
        assert!((cfg.formats.jpeg - 0.3).abs() < f64::EPSILON);
        assert_eq!(cfg.size.ideal_width, 800);
        assert_eq!(cfg.size.ideal_height, 630);
        assert_eq!(cfg.bad_words, ScoreConfig::default().bad_words);
    }

    #[test]
    fn word_lists_are_replaced_whole() {
        let o = ScoreConfigOverrides::from_json(r#"{ "good_words": { "words": ["gallery"] } }"#)
            .unwrap();
        let cfg = ScoreConfig::default().merged(&o);
        assert_eq!(cfg.good_words.words, vec!["gallery".to_string()]);
        assert!((cfg.good_words.amount - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ScoreConfigOverrides::from_json(r#"{ "meta": 1 }"#).is_err());
    }

    #[test]
    fn word_match_is_case_insensitive() {
        let l = WordList::new(&["Logo"], -1.0);
        assert!(l.matches("https://x.com/SITE-LOGO.png"));
        assert!(!l.matches("https://x.com/photo.png"));
    }
}
