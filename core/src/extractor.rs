/// Math expression extraction
///
/// Pulls `$$display$$` and `$inline$` expressions out of raw Markdown before
/// the grammar pass sees them, leaving opaque placeholder tokens behind.
/// The tokens survive Markdown parsing untouched and are turned back into
/// math containers by [`crate::reinject`].
///
/// Display expressions are consumed first: `$$` is a superset pattern of `$`
/// and would otherwise be mis-read as two empty inline spans. Literal regions
/// (code blocks, inline code spans, link destinations) are skipped by both
/// passes.
///
/// Token strings that already occur in the source are never handed out, so
/// every generated token is unique within the rewritten text.
use crate::config::MarkdownOptions;
use crate::parser::markdown_options;
use crate::scanner::{code_regions, RegionCursor};
use once_cell::sync::Lazy;
use pulldown_cmark::Options;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub(crate) static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"⟦MATH:(?:DISPLAY|INLINE):[0-9]+⟧").expect("valid placeholder regex")
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionKind {
    Inline,
    Display,
}

impl ExpressionKind {
    fn code(&self) -> &'static str {
        match self {
            ExpressionKind::Inline => "INLINE",
            ExpressionKind::Display => "DISPLAY",
        }
    }

    /// Class carried by the reinjected container.
    pub fn container_class(&self) -> &'static str {
        match self {
            ExpressionKind::Inline => "math-inline",
            ExpressionKind::Display => "math-display",
        }
    }

    pub fn delimiter(&self) -> &'static str {
        match self {
            ExpressionKind::Inline => "$",
            ExpressionKind::Display => "$$",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpressionRecord {
    pub kind: ExpressionKind,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Placeholder {
    pub token: String,
    #[serde(flatten)]
    pub record: ExpressionRecord,
}

/// Placeholder token -> expression, in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PlaceholderTable {
    entries: Vec<Placeholder>,
}

impl PlaceholderTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Placeholder> {
        self.entries.iter()
    }

    pub fn get(&self, token: &str) -> Option<&ExpressionRecord> {
        self.entries
            .iter()
            .find(|entry| entry.token == token)
            .map(|entry| &entry.record)
    }

    pub fn records_of(&self, kind: ExpressionKind) -> impl Iterator<Item = &ExpressionRecord> {
        self.entries
            .iter()
            .map(|entry| &entry.record)
            .filter(move |record| record.kind == kind)
    }

    fn push(&mut self, token: String, record: ExpressionRecord) {
        self.entries.push(Placeholder { token, record });
    }
}

impl<'a> IntoIterator for &'a PlaceholderTable {
    type Item = &'a Placeholder;
    type IntoIter = std::slice::Iter<'a, Placeholder>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    original: String,
    rewritten: String,
    table: PlaceholderTable,
}

impl Extraction {
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn rewritten_text(&self) -> &str {
        &self.rewritten
    }

    pub fn table(&self) -> &PlaceholderTable {
        &self.table
    }

    pub fn into_parts(self) -> (String, PlaceholderTable) {
        (self.rewritten, self.table)
    }
}

/// Extract math expressions from `text` with the default Markdown options.
/// Each call numbers its tokens from zero.
pub fn extract(text: &str) -> Extraction {
    extract_with(text, &MarkdownOptions::default())
}

/// Extract math expressions, locating literal regions with the same grammar
/// options the parser stage will use.
pub fn extract_with(text: &str, markdown: &MarkdownOptions) -> Extraction {
    Extractor::new(markdown_options(markdown), text).extract(text)
}

/// Placeholder tokens present in `text`.
pub fn find_placeholders(text: &str) -> Vec<&str> {
    PLACEHOLDER_REGEX
        .find_iter(text)
        .map(|m| m.as_str())
        .collect()
}

#[derive(Debug)]
struct Extractor {
    options: Options,
    counter: usize,
    reserved: HashSet<String>,
    table: PlaceholderTable,
}

impl Extractor {
    fn new(options: Options, source: &str) -> Self {
        let reserved: HashSet<String> = find_placeholders(source)
            .into_iter()
            .map(str::to_string)
            .collect();
        if !reserved.is_empty() {
            log::debug!("{} token-like string(s) already in source", reserved.len());
        }
        Self {
            options,
            counter: 0,
            reserved,
            table: PlaceholderTable::default(),
        }
    }

    fn extract(mut self, text: &str) -> Extraction {
        if !text.contains('$') {
            return Extraction {
                original: text.to_string(),
                rewritten: text.to_string(),
                table: self.table,
            };
        }

        let without_display = self.replace_display(text);
        let rewritten = self.replace_inline(&without_display);

        log::trace!(
            "extracted {} math expression(s) from {} bytes",
            self.table.len(),
            text.len()
        );

        Extraction {
            original: text.to_string(),
            rewritten,
            table: self.table,
        }
    }

    fn replace_display(&mut self, text: &str) -> String {
        let regions = code_regions(text, self.options);
        let mut cursor = RegionCursor::new(&regions);
        let bytes = text.as_bytes();

        let mut output = String::with_capacity(text.len());
        let mut last = 0usize;
        let mut i = 0usize;

        while i < bytes.len() {
            if let Some(end) = cursor.skip_to(i) {
                i = end;
                continue;
            }
            if !is_display_marker(bytes, i) {
                i += 1;
                continue;
            }
            if is_escaped(bytes, i) {
                i += 1;
                continue;
            }

            let limit = cursor.next_start(i).unwrap_or(bytes.len());
            if let Some(close) = find_display_close(bytes, i + 2, limit) {
                let content = text[i + 2..close].trim();
                if !content.is_empty() {
                    output.push_str(&text[last..i]);
                    let token = self.next_token(ExpressionKind::Display, content);
                    output.push_str(&token);
                    i = close + 2;
                    last = i;
                    continue;
                }
            }
            // Unclosed or empty: both markers stay literal.
            i += 2;
        }

        output.push_str(&text[last..]);
        output
    }

    fn replace_inline(&mut self, text: &str) -> String {
        let regions = code_regions(text, self.options);
        let mut cursor = RegionCursor::new(&regions);
        let bytes = text.as_bytes();

        let mut output = String::with_capacity(text.len());
        let mut last = 0usize;
        let mut i = 0usize;

        while i < bytes.len() {
            if let Some(end) = cursor.skip_to(i) {
                i = end;
                continue;
            }
            if bytes[i] != b'$' || is_escaped(bytes, i) {
                i += 1;
                continue;
            }
            match bytes.get(i + 1) {
                Some(next) if !next.is_ascii_whitespace() && *next != b'$' => {}
                _ => {
                    i += 1;
                    continue;
                }
            }

            let limit = cursor.next_start(i).unwrap_or(bytes.len());
            if let Some(close) = find_inline_close(bytes, i + 1, limit) {
                let content = text[i + 1..close].trim();
                output.push_str(&text[last..i]);
                let token = self.next_token(ExpressionKind::Inline, content);
                output.push_str(&token);
                i = close + 1;
                last = i;
                continue;
            }
            i += 1;
        }

        output.push_str(&text[last..]);
        output
    }

    fn next_token(&mut self, kind: ExpressionKind, content: &str) -> String {
        let token = loop {
            let candidate = format!("⟦MATH:{}:{}⟧", kind.code(), self.counter);
            self.counter += 1;
            if !self.reserved.contains(&candidate) {
                break candidate;
            }
        };
        self.table.push(
            token.clone(),
            ExpressionRecord {
                kind,
                content: content.to_string(),
            },
        );
        token
    }
}

fn is_display_marker(bytes: &[u8], i: usize) -> bool {
    bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'$')
}

/// An odd run of backslashes escapes the byte at `i`.
fn is_escaped(bytes: &[u8], i: usize) -> bool {
    let run = bytes[..i].iter().rev().take_while(|b| **b == b'\\').count();
    run % 2 == 1
}

fn find_display_close(bytes: &[u8], from: usize, limit: usize) -> Option<usize> {
    let mut j = from;
    while j + 1 < limit {
        if is_display_marker(bytes, j) {
            if !is_escaped(bytes, j) {
                return Some(j);
            }
            j += 2;
            continue;
        }
        j += 1;
    }
    None
}

fn find_inline_close(bytes: &[u8], from: usize, limit: usize) -> Option<usize> {
    let mut j = from;
    while j < limit {
        match bytes[j] {
            b'\n' => return None,
            b'$' if !is_escaped(bytes, j) => return Some(j),
            _ => j += 1,
        }
    }
    None
}
