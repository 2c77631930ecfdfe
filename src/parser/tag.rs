//! Inline tag extraction (`#tag`, `#nested/tag`).

use crate::parser::code_block::{find_code_ranges, in_ranges};
use regex::Regex;
use std::sync::LazyLock;

// A tag starts with a letter or underscore after `#` and may contain
// word chars, `/` and `-`. The char before `#` must not be a word
// char or `&` (HTML entities). Rust regex has no lookarounds, so the
// boundary is matched and the trailing char checked afterwards.
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w&])#([a-zA-Z_][\w/-]*)").unwrap());

/// Parse inline tags from a note body, skipping code spans and
/// wikilink interiors. Returned names carry no `#` and keep first-
/// occurrence order without duplicates.
pub fn parse_tags(body: &str) -> Vec<String> {
    let code_ranges = find_code_ranges(body);
    let mut tags: Vec<String> = Vec::new();

    for cap in TAG.captures_iter(body) {
        let Some(tag_match) = cap.get(1) else { continue };
        let hash_pos = tag_match.start() - 1;

        // Trailing word char or `/` means the regex clipped something
        // that is not a tag boundary.
        if let Some(next) = body[tag_match.end()..].chars().next() {
            if next.is_alphanumeric() || next == '_' || next == '/' {
                continue;
            }
        }

        if in_ranges(hash_pos, &code_ranges) || in_wikilink(body, hash_pos) {
            continue;
        }

        let name = tag_match.as_str().to_string();
        if !tags.contains(&name) {
            tags.push(name);
        }
    }

    tags
}

/// Whether a position sits between `[[` and `]]`.
fn in_wikilink(content: &str, pos: usize) -> bool {
    let before = &content[..pos];
    let after = &content[pos..];
    match (before.rfind("[["), before.rfind("]]")) {
        (Some(open), Some(close)) => open > close && after.contains("]]"),
        (Some(_), None) => after.contains("]]"),
        _ => false,
    }
}
