//! Regex-based HTML minification.

use regex::Regex;
use std::sync::LazyLock;

static COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));
static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\n\r\t]+").expect("valid line break regex"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid space regex"));
static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("valid tag gap regex"));
static PRESERVED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(pre|textarea|script|style)\b.*?</(pre|textarea|script|style)>")
        .expect("valid preserved block regex")
});

/// Strip comments and collapse whitespace.
///
/// `<pre>`, `<textarea>`, `<script>` and `<style>` blocks are left as they
/// are.
pub fn minify_html(html: &str) -> String {
    let mut preserved = Vec::new();
    let masked = PRESERVED.replace_all(html, |caps: &regex::Captures<'_>| {
        preserved.push(caps[0].to_string());
        format!("<\u{1}{}\u{1}>", preserved.len() - 1)
    });

    let mut out = collapse(&masked);
    for (index, block) in preserved.iter().enumerate() {
        out = out.replacen(&format!("<\u{1}{}\u{1}>", index), block, 1);
    }
    out.trim().to_string()
}

fn collapse(fragment: &str) -> String {
    let text = COMMENTS.replace_all(fragment, "");
    let text = LINE_BREAKS.replace_all(&text, " ");
    let text = SPACES.replace_all(&text, " ");
    BETWEEN_TAGS.replace_all(&text, "><").into_owned()
}
