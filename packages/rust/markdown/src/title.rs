//! Title extraction and filename slugs.

use std::sync::LazyLock;

use regex::Regex;

/// Lines scanned from the top of the body when looking for a title.
const TITLE_SCAN_LINES: usize = 20;

/// Longest filename stem produced by [`filename_stem`], in characters.
const MAX_STEM_CHARS: usize = 100;

/// Pick the article title from converted Markdown.
///
/// Order: the first `# ` heading without link brackets within the first
/// lines, then `fallback` (usually the HTML `<title>`), then the first
/// non-empty line free of link brackets, then `"Untitled"`.
pub fn extract_title(md: &str, fallback: Option<&str>) -> String {
    let lines: Vec<&str> = md.lines().take(TITLE_SCAN_LINES).collect();

    for line in &lines {
        if let Some(heading) = line.strip_prefix("# ") {
            let heading = heading.trim();
            if !heading.is_empty() && !heading.contains('[') {
                return heading.to_string();
            }
        }
    }

    if let Some(title) = fallback.map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }

    lines
        .iter()
        .map(|line| line.trim().trim_start_matches('#').trim())
        .find(|line| !line.is_empty() && !line.contains('[') && !line.contains(']'))
        .map(String::from)
        .unwrap_or_else(|| "Untitled".to_string())
}

/// Convert a title to `snake_case`: drop punctuation, join words with `_`, lowercase.
pub fn to_snake_case(title: &str) -> String {
    static PUNCT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
    static SEP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-\s]+").expect("valid regex"));

    let cleaned = PUNCT_RE.replace_all(title.trim(), "");
    SEP_RE
        .replace_all(cleaned.trim(), "_")
        .trim_matches('_')
        .to_lowercase()
}

/// Filename stem (without extension) for a document title.
pub fn filename_stem(title: &str) -> String {
    let snake = to_snake_case(title);
    let truncated: String = snake.chars().take(MAX_STEM_CHARS).collect();
    let truncated = truncated.trim_end_matches('_');

    if truncated.is_empty() {
        "untitled".to_string()
    } else {
        truncated.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_from_first_clean_h1() {
        let md = "[Skip to content](#main)\n\n# The Real Title\n\nBody text.";
        assert_eq!(extract_title(md, Some("Site Name")), "The Real Title");
    }

    #[test]
    fn h1_with_link_is_ignored() {
        let md = "# [Home](https://example.com/)\n\nIntro paragraph here.";
        assert_eq!(extract_title(md, Some("Head Title")), "Head Title");
    }

    #[test]
    fn plain_line_fallback_skips_links() {
        let md = "[Login](/login)\n\nA plain opening line\n\nMore.";
        assert_eq!(extract_title(md, None), "A plain opening line");
    }

    #[test]
    fn untitled_when_nothing_usable() {
        assert_eq!(extract_title("", None), "Untitled");
        assert_eq!(extract_title("[a](b)\n[c](d)", Some("   ")), "Untitled");
    }

    #[test]
    fn h1_beyond_scan_window_is_not_used() {
        let mut md = String::new();
        for i in 0..25 {
            md.push_str(&format!("[link {i}](/{i})\n"));
        }
        md.push_str("# Too Late\n");
        assert_eq!(extract_title(&md, Some("Fallback")), "Fallback");
    }

    #[test]
    fn snake_case_basic() {
        assert_eq!(to_snake_case("Hello, World!"), "hello_world");
        assert_eq!(to_snake_case("Rust -- Fearless   Concurrency"), "rust_fearless_concurrency");
        assert_eq!(to_snake_case("  Already_snake  "), "already_snake");
    }

    #[test]
    fn snake_case_keeps_unicode_letters() {
        assert_eq!(to_snake_case("Café au lait"), "café_au_lait");
    }

    #[test]
    fn stem_truncates_and_defaults() {
        assert_eq!(filename_stem("!!!"), "untitled");
        let long = "word ".repeat(60);
        let stem = filename_stem(&long);
        assert!(stem.chars().count() <= MAX_STEM_CHARS);
        assert!(!stem.ends_with('_'));
    }

    #[test]
    fn stem_has_no_path_separators() {
        let stem = filename_stem("../../etc/passwd");
        assert!(!stem.contains('/'));
        assert!(!stem.contains('.'));
    }
}
