/// Placeholder reinjection
///
/// Swaps every placeholder token left by [`crate::extractor`] for an inert
/// math container: `<span class="math-inline" data-math="..."></span>`.
/// The expression travels percent-encoded in `data-math` and is typeset
/// later by a [`crate::hydrate::MathTypesetter`].
use crate::dom::{escape_attr, escape_text};
use crate::extractor::{ExpressionRecord, PlaceholderTable, PLACEHOLDER_REGEX};
use once_cell::sync::Lazy;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::ops::Range;
use thiserror::Error;

static CODE_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(/?)(?:pre|code)\b[^>]*>").expect("valid code tag regex"));

/// Everything but `A-Z a-z 0-9 - _ . ! ~ * ' ( )`, as `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Error)]
pub enum ReinjectError {
    #[error("placeholder tokens lost during parsing: {}", .0.join(", "))]
    MissingTokens(Vec<String>),

    #[error("math expression is not valid percent-encoded UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),
}

pub fn encode_expression(content: &str) -> String {
    utf8_percent_encode(content, COMPONENT).to_string()
}

pub fn decode_expression(encoded: &str) -> Result<String, ReinjectError> {
    Ok(percent_decode_str(encoded).decode_utf8()?.into_owned())
}

/// Markup for one math container.
pub fn math_container(record: &ExpressionRecord) -> String {
    format!(
        "<span class=\"{}\" data-math=\"{}\"></span>",
        record.kind.container_class(),
        encode_expression(&record.content)
    )
}

/// Replace every token of `table` found in `html` with its container.
///
/// Tokens that ended up inside a tag (an attribute value such as a link
/// title) or inside `pre`/`code` are restored as their delimited source
/// text instead.
pub fn reinject(html: &str, table: &PlaceholderTable) -> Result<String, ReinjectError> {
    if table.is_empty() {
        return Ok(html.to_string());
    }

    let missing: Vec<String> = table
        .iter()
        .filter(|entry| !html.contains(&entry.token))
        .map(|entry| entry.token.clone())
        .collect();
    if !missing.is_empty() {
        log::warn!("{} placeholder token(s) missing after parse", missing.len());
        return Err(ReinjectError::MissingTokens(missing));
    }

    let records: HashMap<&str, &ExpressionRecord> = table
        .iter()
        .map(|entry| (entry.token.as_str(), &entry.record))
        .collect();

    let code = code_ranges(html);

    let output = PLACEHOLDER_REGEX.replace_all(html, |caps: &Captures| {
        let Some(found) = caps.get(0) else {
            return String::new();
        };
        let Some(record) = records.get(found.as_str()) else {
            return found.as_str().to_string();
        };
        if inside_tag(html, found.start()) {
            escape_attr(&delimited(record))
        } else if code.iter().any(|range| range.contains(&found.start())) {
            escape_text(&delimited(record))
        } else {
            math_container(record)
        }
    });

    Ok(output.into_owned())
}

fn delimited(record: &ExpressionRecord) -> String {
    let delimiter = record.kind.delimiter();
    format!("{}{}{}", delimiter, record.content, delimiter)
}

/// Byte ranges of `html` enclosed by `pre` or `code` elements.
fn code_ranges(html: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for caps in CODE_TAG_REGEX.captures_iter(html) {
        let Some(tag) = caps.get(0) else {
            continue;
        };
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        if closing {
            if depth == 1 {
                ranges.push(start..tag.start());
            }
            depth = depth.saturating_sub(1);
        } else {
            if depth == 0 {
                start = tag.end();
            }
            depth += 1;
        }
    }
    if depth > 0 {
        ranges.push(start..html.len());
    }
    ranges
}

fn inside_tag(html: &str, pos: usize) -> bool {
    let before = &html[..pos];
    match (before.rfind('<'), before.rfind('>')) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        _ => false,
    }
}
