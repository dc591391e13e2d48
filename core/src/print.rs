/// Printable document export
///
/// Wraps rendered HTML in a standalone page with print styles and writes it
/// to a rotating directory of print files.
use crate::dom::escape_text;
use crate::pipeline::{RenderError, Renderer};
use crate::search::SearchQuery;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

const PRINT_CSS: &str = include_str!("../assets/print.css");
const PRINT_BOOTSTRAP: &str = include_str!("../assets/print-bootstrap.js");

const KATEX_VERSION: &str = "0.16.9";
const MERMAID_VERSION: &str = "10";

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintDocument {
    pub title: String,
    /// Sanitized body markup, embedded as-is
    pub body_html: String,
    /// Load KaTeX and Mermaid in the page and hydrate on load
    pub client_renderers: bool,
}

impl PrintDocument {
    pub fn new(title: impl Into<String>, body_html: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body_html: body_html.into(),
            client_renderers: true,
        }
    }

    pub fn with_client_renderers(mut self, enabled: bool) -> Self {
        self.client_renderers = enabled;
        self
    }

    pub fn to_html(&self) -> String {
        let mut head = String::new();
        if self.client_renderers {
            head.push_str(&format!(
                "  <link rel=\"stylesheet\" href=\"https://cdn.jsdelivr.net/npm/katex@{KATEX_VERSION}/dist/katex.min.css\">\n\
                 \x20 <script src=\"https://cdn.jsdelivr.net/npm/katex@{KATEX_VERSION}/dist/katex.min.js\"></script>\n\
                 \x20 <script src=\"https://cdn.jsdelivr.net/npm/mermaid@{MERMAID_VERSION}/dist/mermaid.min.js\"></script>\n"
            ));
        }

        let bootstrap = if self.client_renderers {
            format!("  <script>\n{PRINT_BOOTSTRAP}  </script>\n")
        } else {
            String::new()
        };

        format!(
            "<!DOCTYPE html>\n\
             <html lang=\"en\">\n\
             <head>\n\
             \x20 <meta charset=\"UTF-8\">\n\
             \x20 <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
             \x20 <title>{title}</title>\n\
             {head}\
             \x20 <style>\n{css}  </style>\n\
             </head>\n\
             <body>\n\
             \x20 <div class=\"markdown-content\">\n{body}\n  </div>\n\
             {bootstrap}\
             </body>\n\
             </html>\n",
            title = escape_text(&self.title),
            css = PRINT_CSS,
            body = self.body_html,
        )
    }
}

/// `<title with non-alphanumerics and spaces as _>_<timestamp>.html`
pub fn print_file_name(title: &str, timestamp: i64) -> String {
    let safe_title: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("{safe_title}_{timestamp}.html")
}

/// Write `document` into `dir`, keeping at most `retain` print files.
pub fn write_print_file(
    dir: &Path,
    document: &PrintDocument,
    retain: usize,
    now: DateTime<Utc>,
) -> Result<PathBuf, PrintError> {
    fs::create_dir_all(dir)?;
    prune_print_files(dir, retain)?;

    let path = dir.join(print_file_name(&document.title, now.timestamp()));
    let html = document.to_html();
    fs::write(&path, &html)?;
    log::info!("wrote print file {} ({} bytes)", path.display(), html.len());
    Ok(path)
}

/// Remove the oldest `.html` files until fewer than `retain` remain.
fn prune_print_files(dir: &Path, retain: usize) -> Result<(), PrintError> {
    let mut files: Vec<(Option<SystemTime>, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "html"))
        .map(|path| {
            let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
            (modified, path)
        })
        .collect();
    files.sort();

    let excess = (files.len() + 1).saturating_sub(retain.max(1));
    for (_, path) in files.into_iter().take(excess) {
        match fs::remove_file(&path) {
            Ok(()) => log::debug!("removed old print file {}", path.display()),
            Err(e) => log::warn!("failed to remove old print file {}: {}", path.display(), e),
        }
    }
    Ok(())
}

/// Render `markdown` and write it as a print file in the configured directory.
pub fn print_markdown(renderer: &Renderer, markdown: &str, title: &str) -> Result<PathBuf, PrintError> {
    print_markdown_to(renderer, markdown, title, &renderer.config().print.directory())
}

pub fn print_markdown_to(
    renderer: &Renderer,
    markdown: &str,
    title: &str,
    dir: &Path,
) -> Result<PathBuf, PrintError> {
    let result = renderer.render(markdown, &SearchQuery::default())?;
    let options = &renderer.config().print;
    let document = PrintDocument::new(title, result.html).with_client_renderers(options.client_renderers);
    write_print_file(dir, &document, options.retain_files, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn html_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".html"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_print_file_name() {
        assert_eq!(print_file_name("My Notes", 1700000000), "My_Notes_1700000000.html");
        assert_eq!(print_file_name("a/b: c?", 5), "a_b__c__5.html");
        assert_eq!(print_file_name("Résumé 2", 1), "Résumé_2_1.html");
    }

    #[test]
    fn test_document_structure() {
        let html = PrintDocument::new("A <b> & c", "<p>body</p>").to_html();

        assert!(html.starts_with("<!DOCTYPE html>\n<html lang=\"en\">"));
        assert!(html.contains("<title>A &lt;b&gt; &amp; c</title>"));
        assert!(html.contains("<div class=\"markdown-content\">\n<p>body</p>\n  </div>"));
        assert!(html.contains("@page"));
        assert!(html.contains("katex@0.16.9/dist/katex.min.js"));
        assert!(html.contains("mermaid@10/dist/mermaid.min.js"));
        assert!(html.contains("data-math-rendered"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_document_without_client_renderers() {
        let html = PrintDocument::new("t", "<p>x</p>")
            .with_client_renderers(false)
            .to_html();

        assert!(!html.contains("<script"));
        assert!(!html.contains("katex"));
        assert!(html.contains(".mermaid-container"));
    }

    #[test]
    fn test_write_print_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("prints");
        let document = PrintDocument::new("Notes", "<p>x</p>");

        let path = write_print_file(&target, &document, 10, at(1000)).unwrap();
        assert_eq!(path, target.join("Notes_1000.html"));
        assert_eq!(fs::read_to_string(&path).unwrap(), document.to_html());
    }

    #[test]
    fn test_retention_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), "not a print file").unwrap();
        let document = PrintDocument::new("Doc", "<p>x</p>");

        for second in 1000..1012 {
            write_print_file(dir.path(), &document, 3, at(second)).unwrap();
        }

        assert_eq!(
            html_files(dir.path()),
            vec!["Doc_1009.html", "Doc_1010.html", "Doc_1011.html"]
        );
        assert!(dir.path().join("keep.txt").exists());
    }

    #[test]
    fn test_print_markdown_to() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::default();

        let path = print_markdown_to(&renderer, "# Title\n\n$x$", "Report", dir.path()).unwrap();
        let html = fs::read_to_string(path).unwrap();

        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("class=\"math-inline\" data-math=\"x\""));
    }
}
