/// Search term highlighting over rendered HTML
///
/// Text nodes outside code-like subtrees get every literal occurrence of the
/// query wrapped in a `<mark>`. Matches are numbered from 1 in document order
/// and the active one is tagged so the host can scroll it into view.
use crate::config::SearchMarkers;
use crate::dom::{escape_attr, escape_text, rewrite, Element, Rewrite, Rewriter};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Subtrees never searched.
const SKIPPED_ELEMENTS: &[&str] = &["code", "pre", "script", "style", "textarea"];

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQuery {
    pub text: String,
    pub case_sensitive: bool,
    /// 1-based; 0 means no match is active
    pub active_index: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn active(mut self, index: usize) -> Self {
        self.active_index = index;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Literal matcher for the query text.
    pub fn matcher(&self) -> Result<Regex, SearchError> {
        Ok(RegexBuilder::new(&regex::escape(&self.text))
            .case_insensitive(!self.case_sensitive)
            .build()?)
    }
}

/// Byte offsets of one match within a text node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
}

pub fn find_matches(text: &str, matcher: &Regex) -> Vec<MatchSpan> {
    matcher
        .find_iter(text)
        .filter(|m| !m.as_str().is_empty())
        .map(|m| MatchSpan {
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlighted {
    pub html: String,
    pub match_count: usize,
}

pub fn highlight(
    html: &str,
    query: &SearchQuery,
    markers: &SearchMarkers,
) -> Result<Highlighted, SearchError> {
    if query.is_empty() {
        return Ok(Highlighted {
            html: html.to_string(),
            match_count: 0,
        });
    }

    let mut marker = MatchMarker {
        matcher: query.matcher()?,
        markers,
        active_index: query.active_index,
        count: 0,
    };
    let html = rewrite(html, &mut marker);

    if query.active_index > marker.count {
        log::debug!(
            "active match {} out of range ({} matches)",
            query.active_index,
            marker.count
        );
    }

    Ok(Highlighted {
        html,
        match_count: marker.count,
    })
}

struct MatchMarker<'a> {
    matcher: Regex,
    markers: &'a SearchMarkers,
    active_index: usize,
    count: usize,
}

impl MatchMarker<'_> {
    fn open_tag(&self) -> String {
        if self.count == self.active_index {
            format!(
                "<mark class=\"{} {}\" id=\"{}\">",
                escape_attr(&self.markers.marker_class),
                escape_attr(&self.markers.active_class),
                escape_attr(&self.markers.active_id)
            )
        } else {
            format!("<mark class=\"{}\">", escape_attr(&self.markers.marker_class))
        }
    }
}

impl Rewriter for MatchMarker<'_> {
    fn element(&mut self, element: &mut Element) -> Rewrite {
        if SKIPPED_ELEMENTS.iter().any(|tag| element.is(tag)) {
            Rewrite::Verbatim
        } else {
            Rewrite::Descend
        }
    }

    fn text(&mut self, text: &str, out: &mut String) {
        let mut last = 0usize;
        for span in find_matches(text, &self.matcher) {
            self.count += 1;
            out.push_str(&escape_text(&text[last..span.start]));
            out.push_str(&self.open_tag());
            out.push_str(&escape_text(&text[span.start..span.end]));
            out.push_str("</mark>");
            last = span.end;
        }
        out.push_str(&escape_text(&text[last..]));
    }
}
