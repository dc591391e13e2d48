/// Rendering pipeline orchestration
///
/// `extract -> parse -> reinject -> highlight (query only) -> sanitize`
use crate::config::RendererConfig;
use crate::extractor::{extract_with, PlaceholderTable};
use crate::parser;
use crate::reinject::{reinject, ReinjectError};
use crate::sanitizer::sanitize;
use crate::search::{self, SearchError, SearchQuery};
use crate::syntax::{SyntaxHighlighter, SyntectHighlighter};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

static DEFAULT_RENDERER: Lazy<Renderer> = Lazy::new(Renderer::default);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("reinjection failed: {0}")]
    Reinject(#[from] ReinjectError),

    #[error("search failed: {0}")]
    Search(#[from] SearchError),
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Extract,
    Parse,
    Reinject,
    Highlight,
    Sanitize,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 5] = [
        PipelineStage::Extract,
        PipelineStage::Parse,
        PipelineStage::Reinject,
        PipelineStage::Highlight,
        PipelineStage::Sanitize,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Extract => "extract",
            PipelineStage::Parse => "parse",
            PipelineStage::Reinject => "reinject",
            PipelineStage::Highlight => "highlight",
            PipelineStage::Sanitize => "sanitize",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PipelineStage::Extract => {
                "Replaces $inline$ and $$display$$ math outside code with placeholder tokens."
            }
            PipelineStage::Parse => {
                "Renders GFM to HTML with syntax highlighting and diagram passthrough."
            }
            PipelineStage::Reinject => "Swaps placeholder tokens for math containers.",
            PipelineStage::Highlight => {
                "Wraps search matches outside code in <mark>; skipped for empty queries."
            }
            PipelineStage::Sanitize => "Strips everything outside the allow-list.",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RenderResult {
    /// Sanitized HTML, safe to inject as trusted markup
    pub html: String,
    /// Math expressions for the typesetting collaborator
    pub expressions: PlaceholderTable,
    pub match_count: usize,
}

pub struct Renderer {
    config: RendererConfig,
    highlighter: Box<dyn SyntaxHighlighter>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self::with_highlighter(config, Box::new(SyntectHighlighter::new()))
    }

    pub fn with_highlighter(config: RendererConfig, highlighter: Box<dyn SyntaxHighlighter>) -> Self {
        Self {
            config,
            highlighter,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn render(&self, markdown: &str, query: &SearchQuery) -> Result<RenderResult, RenderError> {
        log::trace!("{}: {} bytes", PipelineStage::Extract, markdown.len());
        let (rewritten, expressions) = extract_with(markdown, &self.config.markdown).into_parts();

        log::trace!("{}: {} expression(s) held out", PipelineStage::Parse, expressions.len());
        let parsed = parser::parse(&rewritten, self.highlighter.as_ref(), &self.config);

        log::trace!("{}: {} bytes of HTML", PipelineStage::Reinject, parsed.len());
        let html = reinject(&parsed, &expressions)?;

        let (html, match_count) = if query.is_empty() {
            (html, 0)
        } else {
            log::trace!("{}: query of {} bytes", PipelineStage::Highlight, query.text.len());
            let highlighted = search::highlight(&html, query, &self.config.search)?;
            (highlighted.html, highlighted.match_count)
        };

        log::trace!("{}: {} bytes", PipelineStage::Sanitize, html.len());
        let html = sanitize(&html);

        log::debug!(
            "rendered {} bytes of markdown: {} expression(s), {} match(es)",
            markdown.len(),
            expressions.len(),
            match_count
        );

        Ok(RenderResult {
            html,
            expressions,
            match_count,
        })
    }
}

/// Render with the default configuration and highlighter.
pub fn render(markdown: &str, query: &SearchQuery) -> Result<RenderResult, RenderError> {
    DEFAULT_RENDERER.render(markdown, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::PlainHighlighter;

    #[test]
    fn test_stage_order() {
        let names: Vec<_> = PipelineStage::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["extract", "parse", "reinject", "highlight", "sanitize"]);
        assert!(PipelineStage::ALL.iter().all(|s| !s.description().is_empty()));
    }

    #[test]
    fn test_render_plain_markdown() {
        let result = render("# Hello\n\nWorld", &SearchQuery::default()).unwrap();

        assert_eq!(result.html, "<h1>Hello</h1>\n<p>World</p>\n");
        assert!(result.expressions.is_empty());
        assert_eq!(result.match_count, 0);
    }

    #[test]
    fn test_render_math_containers() {
        let result = render("Euler: $e^{i\\pi} + 1 = 0$", &SearchQuery::default()).unwrap();

        assert_eq!(result.expressions.len(), 1);
        assert!(result
            .html
            .contains("<span class=\"math-inline\" data-math=\"e%5E%7Bi%5Cpi%7D%20%2B%201%20%3D%200\"></span>"));
    }

    #[test]
    fn test_render_with_query() {
        let query = SearchQuery::new("cat").active(1);
        let result = render("A cat and a Cat.", &query).unwrap();

        assert_eq!(result.match_count, 2);
        assert!(result.html.contains("id=\"active-search-match\""));
    }

    #[test]
    fn test_custom_renderer() {
        let mut config = RendererConfig::default();
        config.diagram_language = "dot".into();
        let renderer = Renderer::with_highlighter(config, Box::new(PlainHighlighter));

        let result = renderer
            .render("```dot\ndigraph { a -> b }\n```\n\n```rust\nfn x() {}\n```", &SearchQuery::default())
            .unwrap();
        assert!(result.html.contains("<code class=\"language-dot\">digraph { a -&gt; b }"));
        assert!(result.html.contains("<code class=\"language-rust\">fn x() {}"));
        assert_eq!(renderer.config().diagram_language, "dot");
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = render("$x$ x", &SearchQuery::new("x")).unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["matchCount"], 1);
        assert_eq!(json["expressions"][0]["content"], "x");
    }
}
