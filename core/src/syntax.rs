/// Syntax highlighting for fenced code blocks
use once_cell::sync::Lazy;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use thiserror::Error;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

/// Token classes are emitted as `hljs-<scope>` so existing highlight.js
/// themes apply to the output.
const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hljs-" };

#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("highlighter failed: {0}")]
    Engine(String),
}

/// A language-aware highlighter producing an HTML fragment for the inside
/// of a `<code>` element.
pub trait SyntaxHighlighter: Send + Sync {
    /// Whether `language` is registered with this highlighter.
    fn supports(&self, language: &str) -> bool;

    fn highlight(&self, code: &str, language: &str) -> Result<String, HighlightError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SyntectHighlighter;

impl SyntectHighlighter {
    pub fn new() -> Self {
        Self
    }
}

impl SyntaxHighlighter for SyntectHighlighter {
    fn supports(&self, language: &str) -> bool {
        !language.is_empty() && SYNTAX_SET.find_syntax_by_token(language).is_some()
    }

    fn highlight(&self, code: &str, language: &str) -> Result<String, HighlightError> {
        let syntax = SYNTAX_SET
            .find_syntax_by_token(language)
            .ok_or_else(|| HighlightError::UnsupportedLanguage(language.to_string()))?;

        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, CLASS_STYLE);
        for line in LinesWithEndings::from(code) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .map_err(|e| HighlightError::Engine(e.to_string()))?;
        }
        Ok(generator.finalize())
    }
}

/// Highlighter that recognizes nothing; every block renders as escaped text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainHighlighter;

impl SyntaxHighlighter for PlainHighlighter {
    fn supports(&self, _language: &str) -> bool {
        false
    }

    fn highlight(&self, _code: &str, language: &str) -> Result<String, HighlightError> {
        Err(HighlightError::UnsupportedLanguage(language.to_string()))
    }
}
