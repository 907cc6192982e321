//! TC-002: Code-fence stripping for streamed model output.
//!
//! Removes Markdown fence markers. Opening and closing markers are matched
//! alike: three backticks, an optional language tag, then an optional
//! newline, which is removed with the marker. Everything else is kept in
//! order. `strip` is idempotent:
//! removing a marker never joins two fragments into a new one, because a
//! leftmost match is never preceded by a backtick outside another match.

use regex::Regex;
use std::sync::LazyLock;

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_+#.\-]*\n?").expect("fence pattern is valid"));

/// Remove every fence marker from `text`.
pub fn strip(text: &str) -> String {
    FENCE.replace_all(text, "").into_owned()
}

/// Whether `text` still holds any fence marker.
pub fn contains_fence(text: &str) -> bool {
    FENCE.is_match(text)
}
