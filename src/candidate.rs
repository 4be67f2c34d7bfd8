use serde::Serialize;

use crate::url_resolve::is_data_uri;

/// Where a candidate was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    Meta,
    Inline,
    Stylesheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both sides non-zero.
    #[must_use]
    pub const fn is_usable(self) -> bool {
        self.width > 0 && self.height > 0
    }

    #[must_use]
    pub fn ratio(self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    #[must_use]
    pub fn surface(self) -> f64 {
        f64::from(self.width) * f64::from(self.height)
    }
}

/// Per-factor contributions of the last content scoring pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub title_similarity: f64,
    pub query_similarity: f64,
    pub meta: f64,
    pub good_words: f64,
    pub bad_words: f64,
    pub bad_filename: f64,
    pub format: f64,
}

/// One discovered image reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageCandidate {
    pub src: String,
    /// Address as written in the page, before resolution.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub raw_src: String,
    pub title: Option<String>,
    pub css_class: Option<String>,
    pub alt_text: Option<String>,
    pub is_meta: bool,
    pub source: CandidateSource,
    pub doc_title: String,
    pub query: Option<String>,
    pub score: f64,
    pub size_score: Option<f64>,
    pub dimensions: Option<Dimensions>,
    pub breakdown: ScoreBreakdown,
}

impl ImageCandidate {
    #[must_use]
    pub fn new(src: impl Into<String>, source: CandidateSource) -> Self {
        let src = src.into();
        Self {
            raw_src: src.clone(),
            src,
            title: None,
            css_class: None,
            alt_text: None,
            is_meta: source == CandidateSource::Meta,
            source,
            doc_title: String::new(),
            query: None,
            score: 0.0,
            size_score: None,
            dimensions: None,
            breakdown: ScoreBreakdown::default(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: Option<&str>) -> Self {
        self.title = non_blank(title);
        self
    }

    #[must_use]
    pub fn with_class(mut self, class: Option<&str>) -> Self {
        self.css_class = non_blank(class);
        self
    }

    #[must_use]
    pub fn with_alt(mut self, alt: Option<&str>) -> Self {
        self.alt_text = non_blank(alt);
        self
    }

    /// False for empty or whitespace-only addresses; such candidates are
    /// never scored.
    #[must_use]
    pub fn has_src(&self) -> bool {
        !self.src.trim().is_empty()
    }

    #[must_use]
    pub fn is_data_uri(&self) -> bool {
        is_data_uri(&self.src)
    }
}

fn non_blank(v: Option<&str>) -> Option<String> {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_attributes_are_dropped() {
        let c = ImageCandidate::new("a.jpg", CandidateSource::Inline)
            .with_title(Some("  "))
            .with_alt(Some(" Sunset "))
            .with_class(None);
        assert_eq!(c.title, None);
        assert_eq!(c.alt_text.as_deref(), Some("Sunset"));
        assert!(!c.is_meta);
        assert!(ImageCandidate::new("x", CandidateSource::Meta).is_meta);
    }

    #[test]
    fn whitespace_src_is_not_a_src() {
        assert!(!ImageCandidate::new(" \t", CandidateSource::Inline).has_src());
        let data = ImageCandidate::new("data:image/png;base64,AA", CandidateSource::Inline);
        assert!(data.is_data_uri());
    }

    #[test]
    fn dimension_helpers() {
        let d = Dimensions::new(200, 100);
        assert!(d.is_usable());
        assert!((d.ratio() - 2.0).abs() < f64::EPSILON);
        assert!((d.surface() - 20_000.0).abs() < f64::EPSILON);
        assert!(!Dimensions::new(0, 10).is_usable());
    }
}
