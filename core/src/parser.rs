/// Markdown to HTML with a custom fenced-code handler
///
/// Wraps pulldown-cmark's event stream:
/// - code blocks are buffered and rendered by [`render_code_block`]
///   (diagram passthrough, syntax highlighting, or escaped text)
/// - soft breaks become hard breaks when `breaks` is on
/// - bare URLs in text become links when `autolink` is on
use crate::config::{MarkdownOptions, RendererConfig};
use crate::dom::{escape_attr, escape_text};
use crate::syntax::SyntaxHighlighter;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, TextMergeStream};
use regex::Regex;

static BARE_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:https?://|www\.)[^\s<>⟦]+").expect("valid bare url regex")
});

pub fn markdown_options(markdown: &MarkdownOptions) -> Options {
    let mut options = Options::empty();
    if markdown.tables {
        options.insert(Options::ENABLE_TABLES);
    }
    if markdown.strikethrough {
        options.insert(Options::ENABLE_STRIKETHROUGH);
    }
    if markdown.tasklists {
        options.insert(Options::ENABLE_TASKLISTS);
    }
    if markdown.footnotes {
        options.insert(Options::ENABLE_FOOTNOTES);
    }
    options
}

/// Render Markdown to (unsanitized) HTML.
pub fn parse(markdown: &str, highlighter: &dyn SyntaxHighlighter, config: &RendererConfig) -> String {
    let parser = TextMergeStream::new(Parser::new_ext(
        markdown,
        markdown_options(&config.markdown),
    ));
    let events = rewrite_events(parser, highlighter, config);

    let mut output = String::with_capacity(markdown.len() + markdown.len() / 2);
    html::push_html(&mut output, events.into_iter());
    output
}

fn rewrite_events<'a>(
    parser: impl Iterator<Item = Event<'a>>,
    highlighter: &dyn SyntaxHighlighter,
    config: &RendererConfig,
) -> Vec<Event<'a>> {
    let mut events = Vec::new();
    let mut code_block: Option<(Option<String>, String)> = None;
    let mut link_depth = 0usize;

    for event in parser {
        if code_block.is_some() {
            match event {
                Event::Text(text) => {
                    if let Some((_, buffer)) = code_block.as_mut() {
                        buffer.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((language, buffer)) = code_block.take() {
                        let html =
                            render_code_block(language.as_deref(), &buffer, highlighter, config);
                        events.push(Event::Html(CowStr::from(html)));
                    }
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                code_block = Some((code_language(&kind), String::new()));
            }
            Event::Start(Tag::Link { .. }) | Event::Start(Tag::Image { .. }) => {
                link_depth += 1;
                events.push(event);
            }
            Event::End(TagEnd::Link) | Event::End(TagEnd::Image) => {
                link_depth = link_depth.saturating_sub(1);
                events.push(event);
            }
            Event::SoftBreak if config.markdown.breaks => events.push(Event::HardBreak),
            Event::Text(text) if config.markdown.autolink && link_depth == 0 => {
                linkify(text, &mut events);
            }
            other => events.push(other),
        }
    }

    events
}

fn code_language(kind: &CodeBlockKind<'_>) -> Option<String> {
    match kind {
        CodeBlockKind::Fenced(info) => info.split_whitespace().next().map(str::to_string),
        CodeBlockKind::Indented => None,
    }
}

/// HTML for one code block. `code` is raw, unescaped text.
pub fn render_code_block(
    language: Option<&str>,
    code: &str,
    highlighter: &dyn SyntaxHighlighter,
    config: &RendererConfig,
) -> String {
    let Some(language) = language else {
        return format!("<pre><code>{}</code></pre>\n", escape_text(code));
    };

    if language == config.diagram_language {
        return plain_code_block(language, code);
    }

    if config.highlight.enabled && highlighter.supports(language) {
        match highlighter.highlight(code, language) {
            Ok(highlighted) => {
                return format!(
                    "<pre><code class=\"hljs language-{}\">{}</code></pre>\n",
                    escape_attr(language),
                    highlighted
                );
            }
            Err(error) => {
                log::warn!("highlighting {} block failed: {}", language, error);
            }
        }
    }

    plain_code_block(language, code)
}

fn plain_code_block(language: &str, code: &str) -> String {
    format!(
        "<pre><code class=\"language-{}\">{}</code></pre>\n",
        escape_attr(language),
        escape_text(code)
    )
}

fn linkify<'a>(text: CowStr<'a>, events: &mut Vec<Event<'a>>) {
    if !text.contains("http") && !text.contains("www.") {
        events.push(Event::Text(text));
        return;
    }

    let mut last = 0usize;
    for found in BARE_URL_REGEX.find_iter(&text) {
        let start = found.start();
        if !starts_autolink(&text[..start]) {
            continue;
        }
        let url = trim_url(found.as_str());
        if matches!(url, "http://" | "https://" | "www.") {
            continue;
        }

        if start > last {
            events.push(Event::Text(CowStr::from(text[last..start].to_string())));
        }
        let href = if url.starts_with("www.") {
            format!("http://{url}")
        } else {
            url.to_string()
        };
        events.push(Event::InlineHtml(CowStr::from(format!(
            "<a href=\"{}\">{}</a>",
            escape_attr(&href),
            escape_text(url)
        ))));
        last = start + url.len();
    }

    if last == 0 {
        events.push(Event::Text(text));
    } else if last < text.len() {
        events.push(Event::Text(CowStr::from(text[last..].to_string())));
    }
}

fn starts_autolink(before: &str) -> bool {
    match before.chars().last() {
        None => true,
        Some(c) => c.is_whitespace() || matches!(c, '*' | '_' | '~' | '(' | '⟧'),
    }
}

fn trim_url(url: &str) -> &str {
    let mut end = url.len();
    while let Some(last) = url[..end].chars().last() {
        let trimmed = &url[..end];
        let unbalanced_paren =
            last == ')' && trimmed.matches(')').count() > trimmed.matches('(').count();
        if unbalanced_paren
            || matches!(last, '?' | '!' | '.' | ',' | ':' | ';' | '*' | '_' | '~' | '\'' | '"')
        {
            end -= last.len_utf8();
        } else {
            break;
        }
    }
    &url[..end]
}
