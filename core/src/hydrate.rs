/// Math and diagram hydration
///
/// Fills the inert containers left by the pipeline using external
/// collaborators: a [`MathTypesetter`] for `span.math-inline` /
/// `span.math-display` and a [`DiagramRenderer`] for diagram code blocks.
/// Results are cached per generation so re-running a pass over the same
/// HTML never calls a collaborator twice for the same source.
use crate::config::RendererConfig;
use crate::dom::{escape_attr, escape_text, rewrite, Element, Rewrite, Rewriter};
use crate::extractor::ExpressionKind;
use crate::reinject::decode_expression;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use thiserror::Error;

const RENDERED_ATTR: &str = "data-math-rendered";
const MATH_ERROR_CLASS: &str = "math-error";
const DIAGRAM_CONTAINER_CLASS: &str = "mermaid-container";
const DIAGRAM_ERROR_CLASS: &str = "mermaid-error";

#[derive(Debug, Error)]
pub enum HydrateError {
    #[error("math typesetting failed: {0}")]
    Math(String),

    #[error("diagram rendering failed: {0}")]
    Diagram(String),
}

pub trait MathTypesetter: Send + Sync {
    /// HTML for one expression.
    fn typeset(&self, expression: &str, display: bool) -> Result<String, HydrateError>;
}

pub trait DiagramRenderer: Send + Sync {
    /// SVG (or other HTML) for one diagram. `id` is stable for a given source.
    fn render(&self, id: &str, source: &str) -> Result<String, HydrateError>;
}

/// `mermaid-<12 hex digits of sha256(source)>`
pub fn diagram_id(source: &str) -> String {
    let digest = hex::encode(Sha256::digest(source.as_bytes()));
    format!("mermaid-{}", &digest[..12])
}

#[derive(Debug, Default)]
pub struct HydrationCache {
    generation: u64,
    entries: HashMap<String, Result<String, String>>,
}

impl HydrationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop every entry when `generation` differs from the current one.
    pub fn sync(&mut self, generation: u64) {
        if generation != self.generation {
            log::debug!(
                "hydration generation {} -> {}, dropping {} cached result(s)",
                self.generation,
                generation,
                self.entries.len()
            );
            self.entries.clear();
            self.generation = generation;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(kind: &str, source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update([0u8]);
        hasher.update(source.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn resolve(
        &mut self,
        key: String,
        produce: impl FnOnce() -> Result<String, HydrateError>,
    ) -> Result<String, String> {
        self.entries
            .entry(key)
            .or_insert_with(|| produce().map_err(|e| e.to_string()))
            .clone()
    }
}

pub struct Hydrator {
    diagram_language: String,
    cache: HydrationCache,
}

impl Hydrator {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            diagram_language: config.diagram_language.clone(),
            cache: HydrationCache::new(),
        }
    }

    pub fn cache(&self) -> &HydrationCache {
        &self.cache
    }

    /// Start a new generation; cached results from older ones are dropped.
    pub fn sync(&mut self, generation: u64) {
        self.cache.sync(generation);
    }

    pub fn hydrate_math(&mut self, html: &str, typesetter: &dyn MathTypesetter) -> String {
        let mut pass = MathPass {
            typesetter,
            cache: &mut self.cache,
            failed: 0,
        };
        let output = rewrite(html, &mut pass);
        if pass.failed > 0 {
            log::warn!("{} math expression(s) failed to typeset", pass.failed);
        }
        output
    }

    pub fn hydrate_diagrams(&mut self, html: &str, renderer: &dyn DiagramRenderer) -> String {
        let mut pass = DiagramPass {
            renderer,
            code_class: format!("language-{}", self.diagram_language),
            cache: &mut self.cache,
            failed: 0,
        };
        let output = rewrite(html, &mut pass);
        if pass.failed > 0 {
            log::warn!("{} diagram(s) failed to render", pass.failed);
        }
        output
    }

    pub fn hydrate(
        &mut self,
        html: &str,
        typesetter: &dyn MathTypesetter,
        renderer: &dyn DiagramRenderer,
    ) -> String {
        let html = self.hydrate_math(html, typesetter);
        self.hydrate_diagrams(&html, renderer)
    }
}

struct MathPass<'a> {
    typesetter: &'a dyn MathTypesetter,
    cache: &'a mut HydrationCache,
    failed: usize,
}

impl Rewriter for MathPass<'_> {
    fn element(&mut self, element: &mut Element) -> Rewrite {
        if !element.is("span") || element.attr(RENDERED_ATTR).is_some() {
            return Rewrite::Descend;
        }
        let kind = if element.has_class(ExpressionKind::Display.container_class()) {
            ExpressionKind::Display
        } else if element.has_class(ExpressionKind::Inline.container_class()) {
            ExpressionKind::Inline
        } else {
            return Rewrite::Descend;
        };
        let Some(encoded) = element.attr("data-math") else {
            return Rewrite::Descend;
        };

        let expression = match decode_expression(encoded) {
            Ok(expression) => expression,
            Err(error) => {
                log::warn!("undecodable math expression: {}", error);
                encoded.to_string()
            }
        };

        let typesetter = self.typesetter;
        let display = kind == ExpressionKind::Display;
        let key = HydrationCache::key(kind.container_class(), &expression);
        let inner = match self
            .cache
            .resolve(key, || typesetter.typeset(&expression, display))
        {
            Ok(html) => html,
            Err(message) => {
                log::debug!("typesetting {:?} failed: {}", expression, message);
                self.failed += 1;
                element.add_class(MATH_ERROR_CLASS);
                let delimiter = kind.delimiter();
                escape_text(&format!("{delimiter}{expression}{delimiter}"))
            }
        };

        element.set_attr(RENDERED_ATTR, "true");
        Rewrite::Replace(element.wrap(&inner))
    }
}

struct DiagramPass<'a> {
    renderer: &'a dyn DiagramRenderer,
    code_class: String,
    cache: &'a mut HydrationCache,
    failed: usize,
}

impl Rewriter for DiagramPass<'_> {
    fn element(&mut self, element: &mut Element) -> Rewrite {
        if !element.is("pre") || element.has_class(DIAGRAM_ERROR_CLASS) {
            return Rewrite::Descend;
        }
        let Some(code) = element
            .child_elements()
            .into_iter()
            .find(|child| child.is("code") && child.has_class(&self.code_class))
        else {
            return Rewrite::Descend;
        };

        let source = code.text_content();
        let id = diagram_id(&source);
        let renderer = self.renderer;
        let key = HydrationCache::key(&self.code_class, &source);

        match self.cache.resolve(key, || renderer.render(&id, &source)) {
            Ok(svg) => Rewrite::Replace(format!(
                "<div class=\"{}\" id=\"{}\">{}</div>",
                DIAGRAM_CONTAINER_CLASS,
                escape_attr(&id),
                svg
            )),
            Err(message) => {
                log::debug!("diagram {} failed: {}", id, message);
                self.failed += 1;
                element.add_class(DIAGRAM_ERROR_CLASS);
                Rewrite::Verbatim
            }
        }
    }
}
