//! Code span detection for skipping tag/link parsing inside code.

use regex::Regex;
use std::sync::LazyLock;

// Opening of a fenced code block: ``` or ~~~ at start of line.
static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(`{3,}|~{3,})").unwrap());

// Inline code spans; the double-backtick form may contain single
// backticks.
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"``(?:[^`]|`[^`])*``|`[^`\n]+`").unwrap());

/// Byte ranges (start inclusive, end exclusive) covered by fenced
/// blocks or inline code.
pub fn find_code_ranges(content: &str) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();

    // Fenced blocks: pair each opening fence with the next line made
    // of at least as many of the same fence character.
    let mut pos = 0;
    while let Some(open) = FENCE_OPEN.find(&content[pos..]) {
        let start = pos + open.start();
        let fence = open.as_str();
        let fence_char = fence.chars().next().unwrap_or('`');

        let body_start = content[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(content.len());

        let mut end = content.len();
        let mut search = body_start;
        while search <= content.len() {
            let line_end = content[search..]
                .find('\n')
                .map(|i| search + i)
                .unwrap_or(content.len());
            let line = content[search..line_end].trim();
            if line.len() >= fence.len() && line.chars().all(|c| c == fence_char) {
                end = line_end;
                break;
            }
            if line_end >= content.len() {
                break;
            }
            search = line_end + 1;
        }

        ranges.push((start, end));
        pos = end.max(start + fence.len());
        if pos >= content.len() {
            break;
        }
    }

    for found in INLINE_CODE.find_iter(content) {
        if !in_ranges(found.start(), &ranges) {
            ranges.push((found.start(), found.end()));
        }
    }

    ranges.sort_unstable();
    ranges
}

/// Whether a byte offset falls inside any of the given ranges.
pub fn in_ranges(pos: usize, ranges: &[(usize, usize)]) -> bool {
    ranges.iter().any(|(start, end)| pos >= *start && pos < *end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block_range() {
        let content = "before\n```rust\nlet x = 1; // #not-a-tag\n```\nafter";
        let ranges = find_code_ranges(content);
        assert_eq!(ranges.len(), 1);
        let tag_pos = content.find("#not-a-tag").unwrap();
        assert!(in_ranges(tag_pos, &ranges));
        assert!(!in_ranges(content.find("after").unwrap(), &ranges));
    }

    #[test]
    fn test_inline_code_range() {
        let content = "text `#inline` more";
        let ranges = find_code_ranges(content);
        assert!(in_ranges(content.find("#inline").unwrap(), &ranges));
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        let content = "```\nnever closed #tag";
        let ranges = find_code_ranges(content);
        assert!(in_ranges(content.find("#tag").unwrap(), &ranges));
    }
}
