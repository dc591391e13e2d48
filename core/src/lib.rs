pub mod config;
pub mod dom;
pub mod extractor;
pub mod hydrate;
pub mod parser;
pub mod pipeline;
pub mod print;
pub mod reinject;
pub mod sanitizer;
pub mod scanner;
pub mod search;
pub mod syntax;

#[cfg(test)]
mod integration_tests;

pub use config::{
    ConfigError, HighlightOptions, MarkdownOptions, PrintOptions, RendererConfig, SearchMarkers,
};
pub use extractor::{
    extract, extract_with, ExpressionKind, ExpressionRecord, Extraction, Placeholder,
    PlaceholderTable,
};
pub use hydrate::{
    diagram_id, DiagramRenderer, HydrateError, HydrationCache, Hydrator, MathTypesetter,
};
pub use pipeline::{render, PipelineStage, RenderError, RenderResult, Renderer};
pub use print::{
    print_file_name, print_markdown, print_markdown_to, write_print_file, PrintDocument,
    PrintError,
};
pub use reinject::{decode_expression, encode_expression, reinject, ReinjectError};
pub use sanitizer::sanitize;
pub use search::{find_matches, highlight, Highlighted, MatchSpan, SearchError, SearchQuery};
pub use syntax::{HighlightError, PlainHighlighter, SyntaxHighlighter, SyntectHighlighter};
