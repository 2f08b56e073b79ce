//! Post-conversion cleanup pipeline for Markdown output.
//!
//! Each pass is a function `&str -> String` applied in sequence. Every pass
//! except link resolution leaves fenced code blocks alone.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

/// Run the full cleanup pipeline on raw Markdown text.
pub(crate) fn run_pipeline(md: &str, base_url: Option<&Url>) -> String {
    let mut result = md.replace("\r\n", "\n");

    result = demote_extra_h1(&result);
    result = collapse_blank_lines(&result);
    result = fix_code_fence_languages(&result);
    result = strip_layout_tags(&result);
    result = unwrap_wiki_links(&result);
    result = resolve_links(&result, base_url);
    result = trim_trailing_whitespace(&result);
    result = ensure_trailing_newline(&result);

    result
}

/// Apply `f` to every line outside fenced code blocks.
fn map_prose_lines(md: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut in_fence = false;
    md.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return line.to_string();
            }
            if in_fence {
                line.to_string()
            } else {
                f(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Headings
// ---------------------------------------------------------------------------

/// Keep the first H1; later H1s become H2.
fn demote_extra_h1(md: &str) -> String {
    let mut seen_h1 = false;
    map_prose_lines(md, |line| match line.strip_prefix("# ") {
        Some(text) if seen_h1 => format!("## {text}"),
        Some(_) => {
            seen_h1 = true;
            line.to_string()
        }
        None => line.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ blank lines into exactly 2.
fn collapse_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{4,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Code fences
// ---------------------------------------------------------------------------

/// Strip class-name prefixes from fence info strings (`language-js` → `js`).
fn fix_code_fence_languages(md: &str) -> String {
    static LANG_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^```(?:language-|lang-|highlight-)([\w+#-]+)").expect("valid regex")
    });

    LANG_PREFIX_RE.replace_all(md, "```$1").to_string()
}

// ---------------------------------------------------------------------------
// Leftover HTML
// ---------------------------------------------------------------------------

/// Remove layout tags htmd passed through, keeping their text.
fn strip_layout_tags(md: &str) -> String {
    static LAYOUT_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"</?(?:div|span|section|article|header|figure|figcaption|details|summary|picture|source)(?:\s[^>]*)?/?>",
        )
        .expect("valid regex")
    });

    map_prose_lines(md, |line| LAYOUT_TAG_RE.replace_all(line, "").to_string())
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Turn wiki-style `[[text]](href)` into a plain Markdown link.
///
/// Some sites wrap anchor text in brackets, which Obsidian would otherwise
/// read as an internal wiki link.
fn unwrap_wiki_links(md: &str) -> String {
    static WIKI_LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[\[(.*?)\]\](\(.*?\))").expect("valid regex"));

    map_prose_lines(md, |line| WIKI_LINK_RE.replace_all(line, "[$1]$2").to_string())
}

/// Resolve relative URLs in Markdown links and images against a base URL.
fn resolve_links(md: &str, base_url: Option<&Url>) -> String {
    let Some(base) = base_url else {
        return md.to_string();
    };

    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(!?)\[([^\]]*)\]\(([^)\s]+)([^)]*)\)").expect("valid regex"));

    map_prose_lines(md, |line| {
        LINK_RE
            .replace_all(line, |caps: &Captures| {
                let bang = &caps[1];
                let text = &caps[2];
                let href = &caps[3];
                let rest = &caps[4];

                if is_absolute_or_local(href) {
                    return caps[0].to_string();
                }

                match base.join(href) {
                    Ok(resolved) => format!("{bang}[{text}]({resolved}{rest})"),
                    Err(_) => caps[0].to_string(),
                }
            })
            .to_string()
    })
}

fn is_absolute_or_local(href: &str) -> bool {
    href.starts_with('#')
        || href.starts_with("http://")
        || href.starts_with("https://")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
}

// ---------------------------------------------------------------------------
// Whitespace
// ---------------------------------------------------------------------------

/// Trim trailing whitespace on every line.
fn trim_trailing_whitespace(md: &str) -> String {
    md.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Ensure the file ends with exactly one newline.
fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_end_matches('\n');
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demotes_duplicate_h1() {
        let input = "# Title\n\nSome text\n\n# Another Title\n\nMore text";
        assert_eq!(
            demote_extra_h1(input),
            "# Title\n\nSome text\n\n## Another Title\n\nMore text"
        );
    }

    #[test]
    fn h1_inside_code_fence_is_not_a_heading() {
        let input = "# Title\n\n```bash\n# a shell comment\n```\n\n# Second";
        let result = demote_extra_h1(input);
        assert!(result.contains("# a shell comment"));
        assert!(!result.contains("## a shell comment"));
        assert!(result.ends_with("## Second"));
    }

    #[test]
    fn collapses_excess_blank_lines() {
        assert_eq!(collapse_blank_lines("Line 1\n\n\n\n\nLine 2"), "Line 1\n\n\nLine 2");
        assert_eq!(collapse_blank_lines("Line 1\n\nLine 2"), "Line 1\n\nLine 2");
    }

    #[test]
    fn strips_language_prefix() {
        let input = "```language-javascript\nconsole.log('hi');\n```";
        assert!(fix_code_fence_languages(input).starts_with("```javascript"));

        let plain = "```rust\nfn main() {}\n```";
        assert_eq!(fix_code_fence_languages(plain), plain);
    }

    #[test]
    fn strips_layout_tags_outside_code() {
        let input = "<div class=\"note\">Important info</div>\n\n```html\n<div>Preserved</div>\n```";
        let result = strip_layout_tags(input);
        assert!(result.starts_with("Important info"));
        assert!(result.contains("<div>Preserved</div>"));
    }

    #[test]
    fn unwraps_wiki_links() {
        let input = "Read [[the docs]](https://example.com/docs) now";
        assert_eq!(
            unwrap_wiki_links(input),
            "Read [the docs](https://example.com/docs) now"
        );
    }

    #[test]
    fn plain_links_untouched_by_wiki_pass() {
        let input = "[ok](https://example.com/)";
        assert_eq!(unwrap_wiki_links(input), input);
    }

    #[test]
    fn resolves_relative_links_and_images() {
        let base = Url::parse("https://blog.example.com/posts/intro").unwrap();
        let input = "[Next](/posts/next) and ![chart](img/chart.png \"Chart\")";
        let result = resolve_links(input, Some(&base));
        assert!(result.contains("[Next](https://blog.example.com/posts/next)"));
        assert!(result.contains("![chart](https://blog.example.com/posts/img/chart.png \"Chart\")"));
    }

    #[test]
    fn leaves_absolute_and_anchor_links() {
        let base = Url::parse("https://example.com/page").unwrap();
        let input = "[A](https://other.com/x) [B](#section-1) [C](mailto:me@example.com)";
        assert_eq!(resolve_links(input, Some(&base)), input);
    }

    #[test]
    fn without_base_links_are_unchanged() {
        assert_eq!(resolve_links("[x](/y)", None), "[x](/y)");
    }

    #[test]
    fn whitespace_passes() {
        assert_eq!(trim_trailing_whitespace("Line 1   \nLine 2\t"), "Line 1\nLine 2");
        assert_eq!(ensure_trailing_newline("Content"), "Content\n");
        assert_eq!(ensure_trailing_newline("Content\n\n\n"), "Content\n");
    }

    #[test]
    fn full_pipeline_cleans_markdown() {
        let input = "# Title\r\n\n\n\n\n\n## Section\n\n<div>Some content</div>\n\n[[wiki]](/w)\n\n```language-python\nprint('hi')\n```\n\nEnd   ";
        let base = Url::parse("https://example.com/page").unwrap();
        let result = run_pipeline(input, Some(&base));

        assert!(!result.contains("\n\n\n\n"));
        assert!(!result.contains('\r'));
        assert!(result.contains("```python"));
        assert!(!result.contains("<div>"));
        assert!(result.contains("Some content"));
        assert!(result.contains("[wiki](https://example.com/w)"));
        assert!(result.ends_with("End\n"));
    }
}
