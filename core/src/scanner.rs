/// Literal region scanner for raw Markdown
///
/// Locates the parts of a document that the Markdown grammar will not treat
/// as prose, so that text-rewriting passes running *before* the parser can
/// leave them alone:
/// - Code blocks, fenced or indented, at any nesting depth
/// - Inline code spans
/// - Link and image destinations, titles and reference definitions
///
/// The regions come from pulldown-cmark's own offset iterator, so they agree
/// with the block structure the parser stage sees.
use pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Block,
    Span,
    LinkTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRegion {
    pub kind: RegionKind,
    pub range: Range<usize>,
}

struct OpenLink {
    range: Range<usize>,
    cursor: usize,
    depth: usize,
    opaque: bool,
}

/// Byte ranges of every literal region in `text`, sorted and non-overlapping.
pub fn code_regions(text: &str, options: Options) -> Vec<CodeRegion> {
    let parser = Parser::new_ext(text, options);
    let mut regions: Vec<CodeRegion> = parser
        .reference_definitions()
        .iter()
        .map(|(_, definition)| CodeRegion {
            kind: RegionKind::LinkTarget,
            range: definition.span.clone(),
        })
        .collect();

    let mut links: Vec<OpenLink> = Vec::new();

    for (event, range) in parser.into_offset_iter() {
        // Anything between the direct children of a link is link syntax.
        if let Some(link) = links.last_mut() {
            if link.depth == 0 && !matches!(event, Event::End(_)) {
                if range.start > link.cursor {
                    regions.push(CodeRegion {
                        kind: RegionKind::LinkTarget,
                        range: link.cursor..range.start,
                    });
                }
                link.cursor = link.cursor.max(range.end);
            }
        }

        match event {
            Event::Start(Tag::CodeBlock(_)) => regions.push(CodeRegion {
                kind: RegionKind::Block,
                range,
            }),
            Event::Code(_) => regions.push(CodeRegion {
                kind: RegionKind::Span,
                range,
            }),
            Event::Start(Tag::Link { link_type, .. }) | Event::Start(Tag::Image { link_type, .. }) => {
                links.push(OpenLink {
                    cursor: range.start,
                    range,
                    depth: 0,
                    opaque: matches!(link_type, LinkType::Autolink | LinkType::Email),
                });
            }
            Event::End(TagEnd::Link) | Event::End(TagEnd::Image) => {
                if let Some(link) = links.pop() {
                    if link.opaque {
                        regions.push(CodeRegion {
                            kind: RegionKind::LinkTarget,
                            range: link.range,
                        });
                    } else if link.cursor < link.range.end {
                        regions.push(CodeRegion {
                            kind: RegionKind::LinkTarget,
                            range: link.cursor..link.range.end,
                        });
                    }
                }
            }
            Event::Start(_) => {
                if let Some(link) = links.last_mut() {
                    link.depth += 1;
                }
            }
            Event::End(_) => {
                if let Some(link) = links.last_mut() {
                    link.depth = link.depth.saturating_sub(1);
                }
            }
            _ => {}
        }
    }

    merge(regions)
}

fn merge(mut regions: Vec<CodeRegion>) -> Vec<CodeRegion> {
    regions.retain(|region| !region.range.is_empty());
    regions.sort_by_key(|region| (region.range.start, std::cmp::Reverse(region.range.end)));

    let mut merged: Vec<CodeRegion> = Vec::with_capacity(regions.len());
    for region in regions {
        match merged.last_mut() {
            Some(last) if region.range.start < last.range.end => {
                last.range.end = last.range.end.max(region.range.end);
            }
            _ => merged.push(region),
        }
    }
    merged
}

/// Walks sorted regions alongside a byte cursor.
pub(crate) struct RegionCursor<'a> {
    regions: &'a [CodeRegion],
    next: usize,
}

impl<'a> RegionCursor<'a> {
    pub(crate) fn new(regions: &'a [CodeRegion]) -> Self {
        Self { regions, next: 0 }
    }

    /// End of the region containing `pos`, if any.
    pub(crate) fn skip_to(&mut self, pos: usize) -> Option<usize> {
        while self.next < self.regions.len() && self.regions[self.next].range.end <= pos {
            self.next += 1;
        }
        self.regions
            .get(self.next)
            .filter(|region| region.range.start <= pos)
            .map(|region| region.range.end)
    }

    /// Start of the first region beginning at or after `pos`.
    pub(crate) fn next_start(&self, pos: usize) -> Option<usize> {
        self.regions[self.next..]
            .iter()
            .map(|region| region.range.start)
            .find(|start| *start >= pos)
    }
}
