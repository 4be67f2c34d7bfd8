use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

use crate::error::PickError;

/// GET the page and return its body.
///
/// # Errors
///
/// [`PickError::DocumentFetch`] on transport failure or a non-2xx status.
pub async fn fetch_document(
    http: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<String, PickError> {
    let resp = http
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| PickError::DocumentFetch(format!("request failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(PickError::DocumentFetch(format!(
            "HTTP {} fetching {url}",
            resp.status()
        )));
    }

    resp.text()
        .await
        .map_err(|e| PickError::DocumentFetch(format!("reading body: {e}")))
}

fn squash(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `<title>`, then `og:title`, then the first `<h1>`.
#[must_use]
pub fn document_title(doc: &Html) -> Option<String> {
    if let Ok(sel) = Selector::parse("title")
        && let Some(el) = doc.select(&sel).next()
    {
        let t = squash(&el.text().collect::<String>());
        if !t.is_empty() {
            return Some(t);
        }
    }
    if let Ok(sel) = Selector::parse(r#"meta[property="og:title"]"#)
        && let Some(el) = doc.select(&sel).next()
        && let Some(c) = el.value().attr("content")
    {
        let t = squash(c);
        if !t.is_empty() {
            return Some(t);
        }
    }
    if let Ok(sel) = Selector::parse("h1")
        && let Some(el) = doc.select(&sel).next()
    {
        let t = squash(&el.text().collect::<String>());
        if !t.is_empty() {
            return Some(t);
        }
    }
    None
}

/// Page URL, overridden by `<base href>` when present.
#[must_use]
pub fn page_base_url(doc: &Html, page_url: &Url) -> Url {
    let mut base = page_url.clone();
    if let Ok(sel) = Selector::parse("base[href]")
        && let Some(el) = doc.select(&sel).next()
        && let Some(h) = el.value().attr("href")
        && let Ok(abs) = base.join(h.trim())
    {
        base = abs;
    }
    base
}
