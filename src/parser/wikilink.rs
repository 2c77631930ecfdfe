//! Wikilink and embed extraction (`[[target|display]]`, `![[...]]`).

use crate::parser::code_block::{find_code_ranges, in_ranges};
use regex::Regex;
use std::sync::LazyLock;

// (!)?           optional embed marker
// \[\[           opening brackets
// ([^\]\|]+)     target, possibly with #heading or #^block suffix
// (?:\|([^\]]+))? optional display alias
// \]\]           closing brackets
static WIKILINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?)\[\[([^\]\|]+)(?:\|([^\]]+))?\]\]").unwrap());

/// A wikilink as written in a note. The target keeps any `#heading`
/// or `#^block` suffix; resolution strips it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    /// The full source text, e.g. `[[Note|alias]]`.
    pub raw: String,
    pub target: String,
    pub display: Option<String>,
    pub is_embed: bool,
}

impl WikiLink {
    /// The target with any trailing `#anchor` / `#^block` removed.
    pub fn target_path(&self) -> &str {
        self.target.split('#').next().unwrap_or(&self.target).trim()
    }
}

/// Parse all wikilinks and embeds from a note body, skipping code
/// spans.
pub fn parse_wikilinks(body: &str) -> Vec<WikiLink> {
    let code_ranges = find_code_ranges(body);
    let mut links = Vec::new();

    for cap in WIKILINK.captures_iter(body) {
        let Some(full) = cap.get(0) else { continue };
        if in_ranges(full.start(), &code_ranges) {
            continue;
        }

        let is_embed = cap.get(1).map(|m| !m.as_str().is_empty()).unwrap_or(false);
        let target = cap.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        if target.is_empty() {
            continue;
        }

        links.push(WikiLink {
            raw: full.as_str().to_string(),
            target: target.to_string(),
            display: cap.get(3).map(|m| m.as_str().to_string()),
            is_embed,
        });
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_link() {
        let links = parse_wikilinks("See [[My Note]] for details.");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "My Note");
        assert_eq!(links[0].raw, "[[My Note]]");
        assert!(links[0].display.is_none());
        assert!(!links[0].is_embed);
    }

    #[test]
    fn test_link_with_display() {
        let links = parse_wikilinks("See [[My Note|the note]].");
        assert_eq!(links[0].display.as_deref(), Some("the note"));
    }

    #[test]
    fn test_embed() {
        let links = parse_wikilinks("![[image.png]]");
        assert!(links[0].is_embed);
        assert_eq!(links[0].target, "image.png");
    }

    #[test]
    fn test_anchor_stripping() {
        let links = parse_wikilinks("[[Note#Section]] and [[Other#^block1]]");
        assert_eq!(links[0].target, "Note#Section");
        assert_eq!(links[0].target_path(), "Note");
        assert_eq!(links[1].target_path(), "Other");
    }

    #[test]
    fn test_code_spans_skipped() {
        let links = parse_wikilinks("`[[not a link]]` but [[real]]");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "real");
    }

    #[test]
    fn test_folder_targets() {
        let links = parse_wikilinks("[[projects/Alpha|A]]");
        assert_eq!(links[0].target_path(), "projects/Alpha");
    }
}
