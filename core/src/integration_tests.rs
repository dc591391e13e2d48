/// Integration tests for the rendering pipeline
/// Exercises the stages together, from extraction to sanitized output

#[cfg(test)]
mod tests {
    use crate::config::RendererConfig;
    use crate::extractor::{extract, ExpressionKind};
    use crate::parser::parse;
    use crate::pipeline::{render, Renderer};
    use crate::reinject::reinject;
    use crate::sanitizer::sanitize;
    use crate::search::{highlight, SearchQuery};
    use crate::syntax::SyntectHighlighter;

    fn plain(markdown: &str) -> String {
        render(markdown, &SearchQuery::default()).unwrap().html
    }

    // ============================================
    // Math extraction through the full pipeline
    // ============================================

    #[test]
    fn test_no_dollar_no_containers() {
        let result = render("Just *text* and `code`.", &SearchQuery::default()).unwrap();
        assert!(result.expressions.is_empty());
        assert!(!result.html.contains("math-"));
    }

    #[test]
    fn test_display_expression_single_record() {
        let result = render("$$X$$", &SearchQuery::default()).unwrap();

        let records: Vec<_> = result.expressions.iter().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record.kind, ExpressionKind::Display);
        assert_eq!(records[0].record.content, "X");
        assert!(result
            .html
            .contains("<span class=\"math-display\" data-math=\"X\"></span>"));
    }

    #[test]
    fn test_escaped_dollar_renders_literally() {
        let result = render("Price is \\$50", &SearchQuery::default()).unwrap();
        assert!(result.expressions.is_empty());
        // the backslash escape is consumed by the Markdown grammar
        assert!(result.html.contains("Price is $50"));
    }

    #[test]
    fn test_inline_and_display_records() {
        let result = render("Inline $a$ and display $$b$$ math.", &SearchQuery::default()).unwrap();

        assert_eq!(result.expressions.len(), 2);
        assert!(result.html.contains("<span class=\"math-inline\" data-math=\"a\"></span>"));
        assert!(result.html.contains("<span class=\"math-display\" data-math=\"b\"></span>"));
    }

    #[test]
    fn test_malformed_triple_marker_characterization() {
        let result = render("$a$b$", &SearchQuery::default()).unwrap();

        let records: Vec<_> = result.expressions.iter().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record.kind, ExpressionKind::Inline);
        assert_eq!(records[0].record.content, "a");
        assert!(result.html.contains("</span>b$"));
    }

    #[test]
    fn test_math_markup_is_encoded_not_parsed() {
        let html = plain("$x < y > z \\text{\"q\"}$");

        assert!(html.contains("data-math=\"x%20%3C%20y%20%3E%20z%20%5Ctext%7B%22q%22%7D\""));
        assert!(!html.contains("<y"));
    }

    #[test]
    fn test_emphasis_markers_inside_math_survive() {
        let result = render("$a_1 * b_2 * c$", &SearchQuery::default()).unwrap();
        let html = result.html;

        assert!(!html.contains("<em>"));
        assert!(html.contains("data-math=\"a_1%20*%20b_2%20*%20c\""));
    }

    // ============================================
    // Code fence isolation
    // ============================================

    #[test]
    fn test_code_fence_isolation() {
        let markdown = "```typescript\nconst label = `cost: ${amount}$`;\n```\n\nThe total is $5.00$ today.";
        let result = render(markdown, &SearchQuery::default()).unwrap();

        let records: Vec<_> = result.expressions.iter().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record.content, "5.00");

        assert!(result.html.contains(
            "<pre><code class=\"language-typescript\">const label = `cost: ${amount}$`;\n</code></pre>"
        ));
    }

    #[test]
    fn test_inline_code_keeps_dollars() {
        let html = plain("Use `$PATH$` then $y$.");
        assert!(html.contains("<code>$PATH$</code>"));
        assert!(html.contains("data-math=\"y\""));
    }

    #[test]
    fn test_diagram_cannot_break_out() {
        let html = plain("```mermaid\ngraph TD\nA[\"</code></pre><img src=x onerror=alert(1)>\"]\n```");

        assert!(html.starts_with("<pre><code class=\"language-mermaid\">"));
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;/code&gt;&lt;/pre&gt;&lt;img"));
    }

    #[test]
    fn test_highlighted_code_survives_sanitizer() {
        let html = plain("```rust\nlet x = \"<b>\";\n```");

        assert!(html.starts_with("<pre><code class=\"hljs language-rust\">"));
        assert!(html.contains("class=\"hljs-"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_fence_in_list_item_stays_verbatim() {
        let result = render(
            "- item\n\n    ```\n    let a = 1;\n\n    total $x$ done\n    ```\n",
            &SearchQuery::default(),
        )
        .unwrap();

        assert!(result.expressions.is_empty());
        assert!(result.html.contains("total $x$ done"));
        assert!(!result.html.contains("math-inline"));
    }

    #[test]
    fn test_fence_in_blockquote_stays_verbatim() {
        let result = render(
            "> ```\n> a `b\n>\n> c $x$ d\n> ```\n\nafter $y$",
            &SearchQuery::default(),
        )
        .unwrap();

        let records: Vec<_> = result.expressions.iter().collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record.content, "y");
        assert!(result.html.contains("c $x$ d"));
    }

    #[test]
    fn test_indented_code_stays_verbatim() {
        let html = plain("para\n\n    echo $HOME$\n");
        assert!(html.contains("<pre><code>echo $HOME$\n</code></pre>"));
        assert!(!html.contains("math-inline"));
    }

    #[test]
    fn test_raw_pre_block_restores_source() {
        let html = plain("<pre>\nraw $x$\n</pre>");
        assert!(html.contains("raw $x$"));
        assert!(!html.contains("math-inline"));
    }

    #[test]
    fn test_dollars_in_link_destination() {
        let result = render("See [docs](https://e.com/?a=$x$) now", &SearchQuery::default()).unwrap();

        assert!(result.expressions.is_empty());
        assert!(result.html.contains("<a href=\"https://e.com/?a=$x$\">docs</a>"));
    }

    #[test]
    fn test_dollars_in_reference_definition() {
        let result = render(
            "[docs][ref] and $y$\n\n[ref]: https://e.com/?a=$x$\n",
            &SearchQuery::default(),
        )
        .unwrap();

        assert_eq!(result.expressions.len(), 1);
        assert!(result.html.contains("href=\"https://e.com/?a=$x$\""));
        assert!(result.html.contains("data-math=\"y\""));
    }

    #[test]
    fn test_math_in_link_text_is_rendered() {
        let html = plain("[area $r^2$](https://e.com/$x$)");
        assert!(html.contains("data-math=\"r%5E2\""));
        assert!(html.contains("href=\"https://e.com/$x$\""));
    }

    #[test]
    fn test_token_text_in_source_is_not_a_placeholder() {
        let result = render("literal ⟦MATH:INLINE:0⟧ then $x$", &SearchQuery::default()).unwrap();

        assert_eq!(result.expressions.len(), 1);
        assert_eq!(result.html.matches("math-inline").count(), 1);
        assert!(result.html.contains(
            "literal ⟦MATH:INLINE:0⟧ then <span class=\"math-inline\" data-math=\"x\"></span>"
        ));
    }

    #[test]
    fn test_escaped_backslash_before_math() {
        let html = plain(r"path \\$x$ end");
        assert!(html.contains("path \\<span class=\"math-inline\" data-math=\"x\"></span> end"));
    }

    // ============================================
    // Search highlighting
    // ============================================

    #[test]
    fn test_search_skips_code() {
        let markdown = "test prose\n\n```\ntest in code\n```\n\nInline `test` and test again.";
        let result = render(markdown, &SearchQuery::new("test")).unwrap();

        assert_eq!(result.match_count, 2);
        assert_eq!(result.html.matches("<mark").count(), 2);
        assert!(result.html.contains("<pre><code>test in code\n</code></pre>"));
        assert!(result.html.contains("<code>test</code>"));
    }

    #[test]
    fn test_search_does_not_touch_math_attributes() {
        let result = render("$x$ and x", &SearchQuery::new("x")).unwrap();

        assert_eq!(result.match_count, 1);
        assert!(result.html.contains("data-math=\"x\""));
    }

    #[test]
    fn test_active_match_survives_sanitizer() {
        let result = render("one two one", &SearchQuery::new("one").active(2)).unwrap();

        assert!(result.html.contains(
            "<mark class=\"search-highlight active\" id=\"active-search-match\">one</mark>"
        ));
        assert_eq!(result.html.matches("active-search-match").count(), 1);
    }

    #[test]
    fn test_search_query_cannot_inject_markup() {
        let result = render("a &lt;b&gt; c", &SearchQuery::new("<b>")).unwrap();

        assert_eq!(result.match_count, 1);
        assert!(!result.html.contains("<b>"));
        assert!(result
            .html
            .contains("<mark class=\"search-highlight\">&lt;b&gt;</mark>"));
    }

    // ============================================
    // Sanitizer
    // ============================================

    #[test]
    fn test_script_and_handlers_stripped() {
        let markdown = "<div><script>alert(1)</script><img src=\"a.png\" onerror=\"alert(2)\"></div>\n\n\
                        <span class=\"math-inline\" onclick=\"x()\">m</span>";
        let html = plain(markdown);

        assert!(!html.contains("<script"));
        assert!(!html.contains("alert(1)"));
        assert!(!html.contains("onerror"));
        assert!(!html.contains("onclick"));
        assert!(html.contains("src=\"a.png\""));
    }

    #[test]
    fn test_javascript_links_stripped() {
        let html = plain("[click](javascript:alert(1)) and <a href=\"javascript:void(0)\">raw</a>");
        assert!(!html.contains("javascript:"));
    }

    #[test]
    fn test_sanitize_idempotent_on_rendered_output() {
        let markdown = "# T\n\n- [x] done\n\n| a |\n|---|\n| $b$ |\n\n```rust\nfn f() {}\n```\n\n<img src=x onerror=y>";
        let html = render(markdown, &SearchQuery::new("a").active(1)).unwrap().html;
        assert_eq!(sanitize(&html), html);
    }

    #[test]
    fn test_task_list_survives() {
        let html = plain("- [x] done\n- [ ] open");
        assert_eq!(html.matches("type=\"checkbox\"").count(), 2);
        assert_eq!(html.matches("checked=\"\"").count(), 1);
    }

    // ============================================
    // Purity and stage composition
    // ============================================

    #[test]
    fn test_render_is_pure() {
        let markdown = "# Doc\n\n$a$ and $$b$$\n\n```python\nprint('hi')\n```\n\nfind me";
        let query = SearchQuery::new("me").active(1);

        let first = render(markdown, &query).unwrap();
        let second = render(markdown, &query).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tokens_restart_each_call() {
        let first = render("$a$", &SearchQuery::default()).unwrap();
        let second = render("$b$", &SearchQuery::default()).unwrap();

        assert_eq!(
            first.expressions.iter().next().unwrap().token,
            second.expressions.iter().next().unwrap().token
        );
    }

    #[test]
    fn test_stages_compose_manually() {
        let config = RendererConfig::default();
        let markdown = "Value $v$ here";

        let (rewritten, table) = extract(markdown).into_parts();
        let parsed = parse(&rewritten, &SyntectHighlighter::new(), &config);
        let reinjected = reinject(&parsed, &table).unwrap();
        let searched = highlight(&reinjected, &SearchQuery::new("here"), &config.search).unwrap();
        let html = sanitize(&searched.html);

        let piped = Renderer::new(config)
            .render(markdown, &SearchQuery::new("here"))
            .unwrap();
        assert_eq!(html, piped.html);
        assert_eq!(searched.match_count, piped.match_count);
    }
}
