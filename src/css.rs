//! Minimal stylesheet reader: rules -> declarations -> property/value.
//!
//! Only what background-image harvesting needs. Selectors and at-rule
//! preludes are skipped, nested blocks (`@media`, `@supports`) are walked,
//! and strings and parentheses are respected so `url(data:...;...)` stays in
//! one piece. Unbalanced braces, unterminated strings and unterminated comments
//! are parse errors.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::StylesheetError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

fn strip_comments(css: &str) -> Result<String, StylesheetError> {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    let mut consumed = 0;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("*/") else {
            return Err(StylesheetError::Parse {
                offset: consumed + start,
                reason: "unterminated comment".into(),
            });
        };
        // keep tokens on either side apart
        out.push(' ');
        consumed += start + 2 + end + 2;
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn push_declaration(buf: &str, out: &mut Vec<Declaration>) {
    let Some((prop, value)) = buf.split_once(':') else {
        return;
    };
    let property = prop.trim().to_ascii_lowercase();
    if property.is_empty() || property.contains(char::is_whitespace) {
        return;
    }
    out.push(Declaration {
        property,
        value: value.trim().to_string(),
    });
}

/// Flatten every declaration block of `css`, in source order.
///
/// # Errors
///
/// Returns [`StylesheetError::Parse`] on structurally broken input.
pub fn parse_declarations(css: &str) -> Result<Vec<Declaration>, StylesheetError> {
    let css = strip_comments(css)?;
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut depth = 0usize;
    let mut parens = 0usize;
    let mut quote: Option<(char, usize)> = None;
    let mut escaped = false;

    for (i, ch) in css.char_indices() {
        if let Some((q, _)) = quote {
            buf.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some((ch, i));
                buf.push(ch);
            }
            '(' => {
                parens += 1;
                buf.push(ch);
            }
            ')' => {
                parens = parens.saturating_sub(1);
                buf.push(ch);
            }
            ';' if parens == 0 => {
                if depth > 0 {
                    push_declaration(&buf, &mut out);
                }
                buf.clear();
            }
            '{' if parens == 0 => {
                depth += 1;
                buf.clear();
            }
            '}' if parens == 0 => {
                if depth == 0 {
                    return Err(StylesheetError::Parse {
                        offset: i,
                        reason: "unexpected '}'".into(),
                    });
                }
                push_declaration(&buf, &mut out);
                depth -= 1;
                buf.clear();
            }
            _ => buf.push(ch),
        }
    }

    if let Some((_, at)) = quote {
        return Err(StylesheetError::Parse {
            offset: at,
            reason: "unterminated string".into(),
        });
    }
    if depth > 0 {
        return Err(StylesheetError::Parse {
            offset: css.len(),
            reason: format!("{depth} unclosed block(s)"),
        });
    }
    Ok(out)
}

static URL_FN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^url\(\s*(?:"([^"]*)"|'([^']*)'|([^'"\s)]*))\s*\)"#).unwrap()
});

/// Address inside a `background`/`background-image` value that starts with
/// `url(...)`.
#[must_use]
pub fn background_url(decl: &Declaration) -> Option<String> {
    if decl.property != "background" && decl.property != "background-image" {
        return None;
    }
    let caps = URL_FN_RE.captures(decl.value.trim_start())?;
    let raw = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
    let url = raw.as_str().trim();
    (!url.is_empty()).then(|| url.to_string())
}

/// Every background image address in a stylesheet, in source order.
///
/// # Errors
///
/// Propagates [`parse_declarations`] failures.
pub fn background_urls(css: &str) -> Result<Vec<String>, StylesheetError> {
    Ok(parse_declarations(css)?
        .iter()
        .filter_map(background_url)
        .collect())
}
