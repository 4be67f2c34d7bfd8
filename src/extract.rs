//! Candidate harvesting: meta tags, `<img>` elements, stylesheet backgrounds.
//!
//! The document is scanned synchronously first (the parsed tree never lives
//! across an await), then every linked stylesheet is fetched concurrently and
//! scanned for `background`/`background-image` URLs. A stylesheet that fails
//! to load or parse is skipped on its own.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tokio::task::JoinSet;
use url::Url;

use crate::candidate::{CandidateSource, ImageCandidate};
use crate::css;
use crate::error::StylesheetError;
use crate::html::{document_title, page_base_url};
use crate::url_resolve::resolve;

/// Recognised curation tags, most authoritative first: (selector, attribute).
const META_SOURCES: &[(&str, &str)] = &[
    (r#"meta[property="og:image"]"#, "content"),
    (r#"meta[property="og:image:url"]"#, "content"),
    (r#"meta[property="og:image:secure_url"]"#, "content"),
    (r#"meta[name="twitter:image"]"#, "content"),
    (r#"meta[name="twitter:image:src"]"#, "content"),
    (r#"meta[property="twitter:image"]"#, "content"),
    (r#"meta[itemprop="image"]"#, "content"),
    (r#"link[rel="image_src"]"#, "href"),
];

const MAX_META: usize = 2;

const LAZY_SRC_ATTRS: &[&str] = &["data-src", "data-original", "data-lazy"];

/// Everything a single synchronous pass over the page yields.
#[derive(Debug, Clone)]
pub struct DocumentScan {
    pub base: Url,
    pub title: Option<String>,
    pub meta: Vec<ImageCandidate>,
    pub inline: Vec<ImageCandidate>,
    /// Absolute stylesheet URLs in document order.
    pub stylesheets: Vec<String>,
    /// Contents of `<style>` elements in document order.
    pub inline_styles: Vec<String>,
}

/// Flat, de-duplicated candidate list plus the base URL used to resolve it.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub base: Url,
    pub doc_title: String,
    pub candidates: Vec<ImageCandidate>,
}

fn non_blank_attr<'a>(el: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn attr_chain<'a>(el: &ElementRef<'a>, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|n| non_blank_attr(el, n))
}

/// First URL of a `srcset` value: `"a.jpg 1x, b.jpg 2x"` -> `a.jpg`.
fn first_srcset_url(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .map(str::trim)
        .find(|p| !p.is_empty())
        .and_then(|p| p.split_whitespace().next())
}

fn meta_images(doc: &Html) -> Vec<ImageCandidate> {
    let mut out = Vec::new();
    for (sel, attr) in META_SOURCES {
        if out.len() >= MAX_META {
            break;
        }
        let Ok(selector) = Selector::parse(sel) else {
            continue;
        };
        if let Some(src) = doc.select(&selector).find_map(|el| non_blank_attr(&el, attr)) {
            out.push(ImageCandidate::new(src, CandidateSource::Meta));
        }
    }
    out
}

fn inline_images(doc: &Html) -> Vec<ImageCandidate> {
    let Ok(sel) = Selector::parse("img") else {
        return Vec::new();
    };
    doc.select(&sel)
        .filter_map(|el| {
            let src = non_blank_attr(&el, "src")
                .or_else(|| non_blank_attr(&el, "srcset").and_then(first_srcset_url))
                .or_else(|| attr_chain(&el, LAZY_SRC_ATTRS))?;
            Some(
                ImageCandidate::new(src, CandidateSource::Inline)
                    .with_title(el.value().attr("title"))
                    .with_class(el.value().attr("class"))
                    .with_alt(el.value().attr("alt")),
            )
        })
        .collect()
}

fn stylesheet_links(doc: &Html, base: &Url) -> Vec<String> {
    let Ok(sel) = Selector::parse(r#"link[rel~="stylesheet"][href]"#) else {
        return Vec::new();
    };
    doc.select(&sel)
        .filter_map(|el| non_blank_attr(&el, "href"))
        .filter_map(|href| resolve(base, href))
        .collect()
}

fn style_blocks(doc: &Html) -> Vec<String> {
    let Ok(sel) = Selector::parse("style") else {
        return Vec::new();
    };
    doc.select(&sel)
        .map(|el| el.text().collect::<String>())
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// Parse `html` and pull out everything that doesn't need the network.
#[must_use]
pub fn scan_document(html: &str, page_url: &Url) -> DocumentScan {
    let doc = Html::parse_document(html);
    let base = page_base_url(&doc, page_url);
    DocumentScan {
        title: document_title(&doc),
        meta: meta_images(&doc),
        inline: inline_images(&doc),
        stylesheets: stylesheet_links(&doc, &base),
        inline_styles: style_blocks(&doc),
        base,
    }
}

/// Background image candidates of one stylesheet, resolved against `sheet_url`.
///
/// # Errors
///
/// [`StylesheetError::Parse`] when the sheet is structurally broken.
pub fn stylesheet_images(
    css_text: &str,
    sheet_url: &Url,
) -> Result<Vec<ImageCandidate>, StylesheetError> {
    Ok(css::background_urls(css_text)?
        .into_iter()
        .filter_map(|raw| resolve(sheet_url, &raw))
        .map(|src| ImageCandidate::new(src, CandidateSource::Stylesheet))
        .collect())
}

/// Merge the three sources, stamp the lookup context, keep the first
/// occurrence of every address.
#[must_use]
pub fn flatten(
    sources: [Vec<ImageCandidate>; 3],
    doc_title: &str,
    query: Option<&str>,
) -> Vec<ImageCandidate> {
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .flatten()
        .filter(ImageCandidate::has_src)
        .filter(|c| seen.insert(c.src.clone()))
        .map(|mut c| {
            c.doc_title = doc_title.to_string();
            c.query = query.map(ToString::to_string);
            c
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Extractor {
    http: reqwest::Client,
    stylesheet_timeout: Duration,
}

impl Extractor {
    #[must_use]
    pub const fn new(http: reqwest::Client, stylesheet_timeout: Duration) -> Self {
        Self {
            http,
            stylesheet_timeout,
        }
    }

    async fn fetch_stylesheet(
        http: reqwest::Client,
        url: String,
        timeout: Duration,
    ) -> Result<String, StylesheetError> {
        let fail = |reason: String| StylesheetError::Fetch {
            url: url.clone(),
            reason,
        };
        let resp = http
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(fail(format!("HTTP {}", resp.status())));
        }
        resp.text().await.map_err(|e| fail(e.to_string()))
    }

    /// Fetch every stylesheet concurrently and collect their background
    /// images in stylesheet order.
    pub async fn stylesheet_candidates(&self, sheets: &[String]) -> Vec<ImageCandidate> {
        let mut set = JoinSet::new();
        for (i, url) in sheets.iter().enumerate() {
            let http = self.http.clone();
            let url = url.clone();
            let timeout = self.stylesheet_timeout;
            set.spawn(async move { (i, Self::fetch_stylesheet(http, url, timeout).await) });
        }

        let mut fetched = Vec::with_capacity(sheets.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(pair) => fetched.push(pair),
                Err(e) => tracing::warn!(error = %e, "stylesheet task failed"),
            }
        }
        fetched.sort_by_key(|(i, _)| *i);

        let mut out = Vec::new();
        for (i, result) in fetched {
            let sheet = &sheets[i];
            let text = match result {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping stylesheet");
                    continue;
                }
            };
            let Ok(sheet_url) = Url::parse(sheet) else {
                continue;
            };
            match stylesheet_images(&text, &sheet_url) {
                Ok(found) => out.extend(found),
                Err(e) => tracing::debug!(url = %sheet, error = %e, "skipping stylesheet"),
            }
        }
        out
    }

    /// Full extraction for one page.
    pub async fn extract(&self, page_url: &Url, html: &str, query: Option<&str>) -> Extracted {
        let scan = scan_document(html, page_url);

        let mut css_images = self.stylesheet_candidates(&scan.stylesheets).await;
        for block in &scan.inline_styles {
            match stylesheet_images(block, &scan.base) {
                Ok(found) => css_images.extend(found),
                Err(e) => tracing::debug!(error = %e, "skipping <style> block"),
            }
        }

        let doc_title = scan
            .title
            .or_else(|| query.map(ToString::to_string))
            .unwrap_or_default();

        tracing::debug!(
            url = %page_url,
            meta = scan.meta.len(),
            inline = scan.inline.len(),
            css = css_images.len(),
            "candidates extracted"
        );

        let candidates = flatten([scan.meta, scan.inline, css_images], &doc_title, query);
        Extracted {
            base: scan.base,
            doc_title,
            candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://news.example.com/world/story.html").unwrap()
    }

    #[test]
    fn meta_images_take_first_two_recognised_tags() {
        let html = r#"<head>
            <meta name="twitter:image" content="/tw.jpg">
            <meta property="og:image" content="/og.jpg">
            <meta property="og:image" content="/og-second.jpg">
            <meta itemprop="image" content="/item.jpg">
        </head>"#;
        let scan = scan_document(html, &page());
        let srcs: Vec<_> = scan.meta.iter().map(|c| c.src.as_str()).collect();
        assert_eq!(srcs, ["/og.jpg", "/tw.jpg"]);
        assert!(scan.meta.iter().all(|c| c.is_meta));
    }

    #[test]
    fn empty_meta_content_is_ignored() {
        let html =
            r#"<meta property="og:image" content=" "><meta itemprop="image" content="/i.jpg">"#;
        let scan = scan_document(html, &page());
        assert_eq!(scan.meta.len(), 1);
        assert_eq!(scan.meta[0].src, "/i.jpg");
    }

    #[test]
    fn inline_images_fall_back_to_srcset_then_lazy_attrs() {
        let html = r#"<body>
            <img src="a.jpg" alt="First" class="hero" title="T">
            <img srcset="b-small.jpg 480w, b-large.jpg 1080w">
            <img data-src="c.jpg">
            <img alt="no address at all">
        </body>"#;
        let scan = scan_document(html, &page());
        let srcs: Vec<_> = scan.inline.iter().map(|c| c.src.as_str()).collect();
        assert_eq!(srcs, ["a.jpg", "b-small.jpg", "c.jpg"]);
        assert_eq!(scan.inline[0].alt_text.as_deref(), Some("First"));
        assert_eq!(scan.inline[0].css_class.as_deref(), Some("hero"));
        assert_eq!(scan.inline[0].title.as_deref(), Some("T"));
    }

    #[test]
    fn stylesheet_links_are_resolved_against_base() {
        let html = r#"<head>
            <base href="https://static.example.com/v2/">
            <link rel="stylesheet" href="site.css">
            <link rel="alternate stylesheet" href="/print.css">
            <link rel="icon" href="favicon.ico">
            <style>.x { background: url(inline.png) }</style>
        </head>"#;
        let scan = scan_document(html, &page());
        assert_eq!(
            scan.stylesheets,
            [
                "https://static.example.com/v2/site.css",
                "https://static.example.com/print.css"
            ]
        );
        assert_eq!(scan.inline_styles.len(), 1);
    }

    #[test]
    fn stylesheet_images_resolve_against_the_sheet() {
        let sheet = Url::parse("https://cdn.example.com/css/main.css").unwrap();
        let found =
            stylesheet_images(".a { background-image: url(../img/bg.jpg) }", &sheet).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].src, "https://cdn.example.com/img/bg.jpg");
        assert_eq!(found[0].source, CandidateSource::Stylesheet);
        assert!(stylesheet_images(".a { background: url(x.jpg)", &sheet).is_err());
    }

    #[test]
    fn flatten_keeps_first_seen_and_stamps_context() {
        let meta = vec![ImageCandidate::new("/a.jpg", CandidateSource::Meta)];
        let inline = vec![
            ImageCandidate::new("/a.jpg", CandidateSource::Inline).with_alt(Some("dup")),
            ImageCandidate::new("/b.jpg", CandidateSource::Inline),
            ImageCandidate::new("  ", CandidateSource::Inline),
        ];
        let css = vec![ImageCandidate::new("/b.jpg", CandidateSource::Stylesheet)];
        let out = flatten([meta, inline, css], "Doc", Some("q"));
        assert_eq!(out.len(), 2);
        assert!(out[0].is_meta);
        assert_eq!(out[0].alt_text, None);
        assert_eq!(out[1].source, CandidateSource::Inline);
        assert!(out.iter().all(|c| c.doc_title == "Doc" && c.query.as_deref() == Some("q")));
    }

    #[tokio::test]
    async fn extract_without_stylesheets_needs_no_network() {
        let html = r#"<html><head><title>Story</title>
            <meta property="og:image" content="https://img.example.com/og.jpg"></head>
            <body><img src="/one.png"><img src="/one.png"><img src="two.gif"></body></html>"#;
        let ex = Extractor::new(reqwest::Client::new(), Duration::from_secs(1));
        let out = ex.extract(&page(), html, None).await;
        assert_eq!(out.doc_title, "Story");
        let srcs: Vec<_> = out.candidates.iter().map(|c| c.src.as_str()).collect();
        assert_eq!(srcs, ["https://img.example.com/og.jpg", "/one.png", "two.gif"]);
    }

    #[tokio::test]
    async fn query_stands_in_for_missing_title() {
        let ex = Extractor::new(reqwest::Client::new(), Duration::from_secs(1));
        let out = ex
            .extract(&page(), "<body><img src=a.jpg></body>", Some("volcano"))
            .await;
        assert_eq!(out.doc_title, "volcano");
    }
}
