/// HTML sanitization
///
/// ammonia's default allow-list, extended with the containers and markers the
/// pipeline inserts itself (math spans, search marks, task list checkboxes,
/// highlighted code classes).
use ammonia::Builder;
use once_cell::sync::Lazy;

static SANITIZER: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();
    builder
        .add_tags(&["span", "mark", "input", "pre", "code"])
        .add_generic_attributes(&["class", "id"])
        .add_tag_attributes("span", &["data-math", "data-math-rendered"])
        .add_tag_attributes("input", &["type", "checked", "disabled"])
        .link_rel(None);
    builder
});

/// Strip everything outside the allow-list. Idempotent.
pub fn sanitize(html: &str) -> String {
    SANITIZER.clean(html).to_string()
}
