//! Markdown-level parsing: frontmatter, wikilinks, inline tags.

pub mod code_block;
pub mod frontmatter;
pub mod tag;
pub mod wikilink;

pub use frontmatter::{parse_frontmatter, split_frontmatter};
pub use tag::parse_tags;
pub use wikilink::{parse_wikilinks, WikiLink};
