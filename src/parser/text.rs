use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

static MULTI_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());
static BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

/// Text content of an HTML fragment, entities decoded.
pub fn strip_html(fragment: &str) -> String {
    Html::parse_fragment(fragment)
        .root_element()
        .text()
        .collect()
}

/// Replace newlines with spaces and collapse runs of spaces.
pub fn flatten(s: &str) -> String {
    let joined = s.replace("\r\n", " ").replace(['\n', '\r'], " ");
    MULTI_SPACE_RE.replace_all(&joined, " ").trim().to_string()
}

/// Drop newlines entirely (titles and requisite lines).
pub fn remove_newlines(s: &str) -> String {
    s.replace(['\n', '\r'], "")
}

/// Split markup on `<br>`, `<br/>`, and `<br />`.
pub fn split_line_breaks(html: &str) -> Vec<String> {
    BR_RE.split(html).map(str::to_string).collect()
}
