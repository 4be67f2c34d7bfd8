//! Resolution of image references found in a page against the page URL.

use url::Url;

/// Resolve `raw` against `base`.
///
/// Absolute `http(s)` references and `data:` URIs are returned untouched,
/// scheme-relative references inherit the base scheme, everything else goes
/// through standard relative resolution. An empty reference yields the base.
#[must_use]
pub fn resolve(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if is_data_uri(raw) || raw.starts_with("http://") || raw.starts_with("https://") {
        return Some(raw.to_string());
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return Some(format!("{}://{rest}", base.scheme()));
    }
    base.join(raw).ok().map(|u| u.to_string())
}

/// Re-anchor a path-relative reference at the origin root.
///
/// Some sites serve pages through rewrite rules that make `img/a.jpg` resolve
/// to a dead path; `/img/a.jpg` often works. Returns `None` when the reference
/// is not path-relative, or when the rewrite resolves to the same URL.
#[must_use]
pub fn root_fallback(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty()
        || raw.starts_with('/')
        || is_data_uri(raw)
        || Url::parse(raw).is_ok()
    {
        return None;
    }
    let rooted = resolve(base, &format!("/{raw}"))?;
    let plain = resolve(base, raw);
    (plain.as_deref() != Some(rooted.as_str())).then_some(rooted)
}

#[must_use]
pub fn is_data_uri(s: &str) -> bool {
    s.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:"))
}

/// Last path segment of an address, without query or fragment.
#[must_use]
pub fn file_name(address: &str) -> &str {
    if is_data_uri(address) {
        return "";
    }
    let no_q = address.split(['?', '#']).next().unwrap_or(address);
    no_q.rsplit('/').next().unwrap_or(no_q)
}

/// Lowercased extension of the address' file name, if any.
#[must_use]
pub fn extension(address: &str) -> Option<String> {
    let name = file_name(address);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
