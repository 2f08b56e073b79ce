//! HTML-to-Markdown conversion and cleanup passes.
//!
//! Converts fetched article HTML to clean Markdown using the `htmd` crate, then
//! applies a series of cleanup passes to normalize headings, whitespace, code
//! blocks, and links.

mod cleanup;
mod title;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use mdharvest_shared::{HarvestError, Result};

pub use title::{extract_title, filename_stem, to_snake_case};

/// Elements dropped entirely during conversion.
const SKIP_TAGS: [&str; 10] = [
    "script", "style", "nav", "iframe", "noscript", "svg", "footer", "aside", "form", "button",
];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of converting an HTML page to Markdown.
#[derive(Debug, Clone)]
pub struct ConvertResult {
    /// The final Markdown content (with frontmatter when enabled).
    pub markdown: String,
    /// The cleaned Markdown body without frontmatter.
    pub body: String,
    /// Extracted or inferred article title.
    pub title: String,
    /// Approximate word count of the Markdown body.
    pub word_count: usize,
}

/// Options for the HTML-to-Markdown conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Source URL used for resolving relative links and frontmatter.
    pub source_url: String,
    /// Title used when the body has no clean H1 (typically the HTML `<title>`).
    pub fallback_title: Option<String>,
    /// ISO 8601 timestamp for the `fetched_at` frontmatter field.
    pub fetched_at: Option<String>,
    /// Whether to prepend YAML frontmatter.
    pub frontmatter: bool,
}

impl ConvertOptions {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            fallback_title: None,
            fetched_at: None,
            frontmatter: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Convert article HTML to clean Markdown.
///
/// 1. Extracts the main content HTML (`<article>`, `<main>`, ... or `<body>`)
/// 2. Pre-processes HTML tables into markdown tables
/// 3. Converts HTML → Markdown via `htmd` (ATX headings, `*` bullets)
/// 4. Runs the cleanup pipeline
/// 5. Picks a title and optionally prepends YAML frontmatter
#[instrument(skip(html), fields(url = %opts.source_url))]
pub fn convert(html: &str, opts: &ConvertOptions) -> Result<ConvertResult> {
    let content_html = extract_content_html(html);
    let content_html = preprocess_tables(&content_html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIP_TAGS.to_vec())
        .build();

    let raw_markdown = converter
        .convert(&content_html)
        .map_err(|e| HarvestError::Conversion(format!("htmd conversion failed: {e}")))?;

    debug!(raw_len = raw_markdown.len(), "htmd conversion complete");

    let base_url = Url::parse(&opts.source_url).ok();
    let body = cleanup::run_pipeline(&raw_markdown, base_url.as_ref());

    let title = extract_title(&body, opts.fallback_title.as_deref());
    let word_count = count_words(&body);

    let markdown = if opts.frontmatter {
        let frontmatter = build_frontmatter(&opts.source_url, &title, opts.fetched_at.as_deref());
        format!("{frontmatter}\n{body}")
    } else {
        body.clone()
    };

    debug!(
        title = %title,
        word_count,
        final_len = markdown.len(),
        "conversion complete"
    );

    Ok(ConvertResult {
        markdown,
        body,
        title,
        word_count,
    })
}

// ---------------------------------------------------------------------------
// Table pre-processing
// ---------------------------------------------------------------------------

/// Convert HTML `<table>` elements to markdown table syntax before htmd conversion.
///
/// `htmd` 0.1 doesn't support table conversion, so we handle it manually.
fn preprocess_tables(html: &str) -> String {
    static TABLE_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("table").expect("valid selector"));

    let doc = Html::parse_fragment(html);

    if doc.select(&TABLE_SEL).next().is_none() {
        return html.to_string();
    }

    let mut result = html.to_string();

    for table_el in doc.select(&TABLE_SEL) {
        let table_html = table_el.html();
        let md_table = html_table_to_markdown(&table_el);
        result = result.replacen(&table_html, &md_table, 1);
    }

    result
}

/// Convert a single HTML table element to a markdown table string.
fn html_table_to_markdown(table: &scraper::ElementRef) -> String {
    static TR_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
    static TH_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("th").expect("valid selector"));
    static TD_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("td").expect("valid selector"));

    let cell_text = |cell: scraper::ElementRef| {
        cell.text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .replace('|', "\\|")
    };

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut has_header = false;

    for tr in table.select(&TR_SEL) {
        let ths: Vec<String> = tr.select(&TH_SEL).map(cell_text).collect();
        if !ths.is_empty() {
            has_header = true;
            rows.push(ths);
            continue;
        }

        let tds: Vec<String> = tr.select(&TD_SEL).map(cell_text).collect();
        if !tds.is_empty() {
            rows.push(tds);
        }
    }

    let col_count = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    if col_count == 0 {
        return String::new();
    }

    for row in &mut rows {
        row.resize(col_count, String::new());
    }

    let mut md = String::from("\n\n");

    // Without a <th> row the first data row doubles as the header.
    let header = &rows[0];
    md.push_str("| ");
    md.push_str(&header.join(" | "));
    md.push_str(" |\n");

    md.push_str("| ");
    md.push_str(&vec!["---"; col_count].join(" | "));
    md.push_str(" |\n");

    let data_start = if has_header { 1 } else { 0 };
    for row in &rows[data_start..] {
        md.push_str("| ");
        md.push_str(&row.join(" | "));
        md.push_str(" |\n");
    }

    md.push('\n');
    md
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Extract the main article HTML, falling back to `<body>`.
fn extract_content_html(html: &str) -> String {
    static CONTENT_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
        [
            "article",
            "main",
            "[role=\"main\"]",
            ".post-content",
            ".entry-content",
            ".article-body",
            ".content",
            "body",
        ]
        .iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
    });

    let doc = Html::parse_document(html);

    for selector in CONTENT_SELECTORS.iter() {
        if let Some(el) = doc.select(selector).next() {
            return el.inner_html();
        }
    }

    html.to_string()
}

/// Count words in the Markdown body (excluding code blocks).
fn count_words(md: &str) -> usize {
    static CODE_BLOCK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));

    let without_code = CODE_BLOCK_RE.replace_all(md, "");
    without_code
        .split_whitespace()
        .filter(|w| !w.starts_with('#') || w.len() > 2)
        .count()
}

/// Build a YAML frontmatter block.
fn build_frontmatter(source_url: &str, title: &str, fetched_at: Option<&str>) -> String {
    let mut fm = String::from("---\n");
    fm.push_str(&format!("source_url: \"{}\"\n", escape_yaml_string(source_url)));
    fm.push_str(&format!("title: \"{}\"\n", escape_yaml_string(title)));
    if let Some(ts) = fetched_at {
        fm.push_str(&format!("fetched_at: \"{ts}\"\n"));
    }
    fm.push_str("---\n");
    fm
}

/// Escape special characters in a YAML string value.
fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_opts(url: &str) -> ConvertOptions {
        ConvertOptions::new(url)
    }

    #[test]
    fn convert_simple_html() {
        let html = "<html><body><main><h1>Hello World</h1><p>Some text.</p></main></body></html>";
        let result = convert(html, &make_opts("https://example.com/page")).unwrap();

        assert!(result.markdown.contains("# Hello World"));
        assert!(result.markdown.contains("Some text."));
        assert_eq!(result.title, "Hello World");
        assert!(result.word_count > 0);
    }

    #[test]
    fn convert_without_frontmatter_by_default() {
        let html = "<html><body><article><h1>Plain</h1><p>Body</p></article></body></html>";
        let result = convert(html, &make_opts("https://example.com/plain")).unwrap();
        assert!(!result.markdown.starts_with("---"));
        assert_eq!(result.markdown, result.body);
    }

    #[test]
    fn convert_includes_frontmatter() {
        let html = "<html><body><main><h1>Test</h1><p>Body</p></main></body></html>";
        let result = convert(
            html,
            &ConvertOptions {
                source_url: "https://example.com/test".into(),
                fallback_title: None,
                fetched_at: Some("2024-01-15T10:30:00Z".into()),
                frontmatter: true,
            },
        )
        .unwrap();

        assert!(result.markdown.starts_with("---\n"));
        assert!(result.markdown.contains("source_url: \"https://example.com/test\""));
        assert!(result.markdown.contains("title: \"Test\""));
        assert!(result.markdown.contains("fetched_at: \"2024-01-15T10:30:00Z\""));
        assert!(!result.body.starts_with("---"));
    }

    #[test]
    fn convert_prefers_article_over_page_chrome() {
        let html = r#"<html><body>
            <nav><a href="/">Home</a></nav>
            <div class="sidebar">Trending now</div>
            <article><h1>Content</h1><p>Important text.</p></article>
            <footer><p>Copyright 2024</p></footer>
        </body></html>"#;

        let result = convert(html, &make_opts("https://example.com/")).unwrap();
        assert!(result.markdown.contains("Important text."));
        assert!(!result.markdown.contains("Copyright 2024"));
        assert!(!result.markdown.contains("Trending now"));
    }

    #[test]
    fn convert_body_fallback_drops_nav_and_footer() {
        let html = r#"<html><body>
            <nav><a href="/">Home</a></nav>
            <h1>Direct Body</h1><p>Content in body.</p>
            <footer><p>Copyright 2024</p></footer>
        </body></html>"#;

        let result = convert(html, &make_opts("https://example.com/plain")).unwrap();
        assert!(result.markdown.contains("Direct Body"));
        assert!(result.markdown.contains("Content in body."));
        assert!(!result.markdown.contains("Copyright 2024"));
    }

    #[test]
    fn convert_strips_scripts() {
        let html = r#"<html><body><article>
            <h1>Story</h1>
            <script>window.analytics = {};</script>
            <p>Paragraph.</p>
        </article></body></html>"#;

        let result = convert(html, &make_opts("https://example.com/story")).unwrap();
        assert!(!result.markdown.contains("analytics"));
        assert!(result.markdown.contains("Paragraph."));
    }

    #[test]
    fn convert_preserves_code_blocks() {
        let html = r#"<html><body><main>
            <h1>Code Example</h1>
            <pre><code class="language-rust">fn main() {
    println!("hello");
}</code></pre>
        </main></body></html>"#;

        let result = convert(html, &make_opts("https://example.com/code")).unwrap();
        assert!(result.markdown.contains("```rust"));
        assert!(result.markdown.contains("println!"));
    }

    #[test]
    fn convert_preserves_tables() {
        let html = r#"<html><body><main>
            <h1>Data</h1>
            <table>
                <thead><tr><th>Name</th><th>Value</th></tr></thead>
                <tbody>
                    <tr><td>foo</td><td>bar</td></tr>
                    <tr><td>baz</td><td>qux</td></tr>
                </tbody>
            </table>
        </main></body></html>"#;

        let result = convert(html, &make_opts("https://example.com/data")).unwrap();
        assert!(result.markdown.contains("| Name | Value |"));
        assert!(result.markdown.contains("| foo | bar |"));
    }

    #[test]
    fn convert_resolves_relative_links() {
        let html = r#"<html><body><article>
            <h1>Links</h1>
            <p>See <a href="/about">about us</a>.</p>
        </article></body></html>"#;

        let result = convert(html, &make_opts("https://example.com/posts/1")).unwrap();
        assert!(result.markdown.contains("(https://example.com/about)"));
    }

    #[test]
    fn convert_no_html_tags_in_output() {
        let html = r#"<html><body><main>
            <h1>Clean Output</h1>
            <p>This should be <strong>clean</strong> markdown.</p>
            <div class="note"><p>A note.</p></div>
        </main></body></html>"#;

        let result = convert(html, &make_opts("https://example.com/clean")).unwrap();
        assert!(!result.body.contains("<p>"), "output contains <p> tags");
        assert!(!result.body.contains("<h1>"), "output contains <h1> tags");
    }

    #[test]
    fn convert_uses_fallback_title_without_h1() {
        let html = "<html><body><article><p>Just a paragraph of text.</p></article></body></html>";
        let mut opts = make_opts("https://example.com/no-h1");
        opts.fallback_title = Some("Page Title From Head".into());

        let result = convert(html, &opts).unwrap();
        assert_eq!(result.title, "Page Title From Head");
    }

    #[test]
    fn convert_empty_html() {
        let html = "<html><body></body></html>";
        let result = convert(html, &make_opts("https://example.com/empty")).unwrap();
        assert_eq!(result.title, "Untitled");
        assert!(result.body.trim().is_empty());
    }

    #[test]
    fn word_count_excludes_code_blocks() {
        let html = r#"<html><body><main>
            <h1>Title</h1>
            <p>One two three.</p>
            <pre><code>lots of code words that should not be counted</code></pre>
        </main></body></html>"#;

        let result = convert(html, &make_opts("https://example.com/wc")).unwrap();
        assert!(result.word_count < 10, "word_count={} should exclude code", result.word_count);
    }

    #[test]
    fn frontmatter_escapes_quotes() {
        let fm = build_frontmatter("https://example.com/", "Say \"hi\"", None);
        assert!(fm.contains("title: \"Say \\\"hi\\\"\""));
        assert!(!fm.contains("fetched_at"));
    }
}
