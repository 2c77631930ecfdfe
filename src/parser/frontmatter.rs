//! YAML frontmatter extraction and parsing.

use crate::error::Result;
use crate::value::{ObjectMap, Value};

/// Frontmatter extraction result.
#[derive(Debug, Clone)]
pub struct FrontmatterSplit<'a> {
    /// The raw YAML string, without the `---` delimiters.
    pub yaml: Option<&'a str>,
    /// The body after the frontmatter.
    pub body: &'a str,
}

/// Split note content into frontmatter and body. Frontmatter must
/// open with `---` on the very first line and close with a `---`
/// line.
pub fn split_frontmatter(content: &str) -> FrontmatterSplit<'_> {
    let none = FrontmatterSplit {
        yaml: None,
        body: content,
    };

    if !content.starts_with("---") {
        return none;
    }
    let after_delimiter = &content[3..];
    let yaml_start = if let Some(rest) = after_delimiter.strip_prefix("\r\n") {
        content.len() - rest.len()
    } else if let Some(rest) = after_delimiter.strip_prefix('\n') {
        content.len() - rest.len()
    } else {
        return none;
    };

    let rest = &content[yaml_start..];
    let closing = rest
        .find("\n---\n")
        .map(|pos| (pos, pos + 5))
        .or_else(|| rest.find("\n---\r\n").map(|pos| (pos, pos + 6)))
        .or_else(|| {
            rest.strip_suffix("\n---")
                .map(|yaml| (yaml.len(), rest.len()))
        });

    match closing {
        Some((yaml_end, body_offset)) => FrontmatterSplit {
            yaml: Some(&rest[..yaml_end]),
            body: &rest[body_offset.min(rest.len())..],
        },
        None => none,
    }
}

/// Parse frontmatter into an ordered object map. Content without
/// frontmatter, or whose frontmatter is not a mapping, yields an
/// empty map; invalid YAML is an error the caller may downgrade to a
/// warning.
pub fn parse_frontmatter(content: &str) -> Result<ObjectMap> {
    let Some(yaml) = split_frontmatter(content).yaml else {
        return Ok(ObjectMap::new());
    };
    let parsed: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    match Value::from_yaml(&parsed) {
        Value::Object(map) => Ok(map.as_ref().clone()),
        _ => Ok(ObjectMap::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_basic() {
        let content = "---\ntitle: Hello\n---\nBody text\n";
        let split = split_frontmatter(content);
        assert_eq!(split.yaml, Some("title: Hello"));
        assert_eq!(split.body, "Body text\n");
    }

    #[test]
    fn test_split_no_frontmatter() {
        let content = "Just text\n---\nnot frontmatter\n";
        let split = split_frontmatter(content);
        assert!(split.yaml.is_none());
        assert_eq!(split.body, content);
    }

    #[test]
    fn test_split_unclosed() {
        let content = "---\ntitle: Hello\nno closing";
        assert!(split_frontmatter(content).yaml.is_none());
    }

    #[test]
    fn test_split_closing_at_eof() {
        let content = "---\ntitle: Hello\n---";
        let split = split_frontmatter(content);
        assert_eq!(split.yaml, Some("title: Hello"));
        assert_eq!(split.body, "");
    }

    #[test]
    fn test_parse_types_and_order() {
        let content = "---\ntitle: Alpha\ncount: 3\ndone: false\nitems:\n  - a\n  - b\n---\n";
        let map = parse_frontmatter(content).unwrap();
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["title", "count", "done", "items"]);
        assert!(matches!(map.get("count"), Some(Value::Int(3))));
        assert!(matches!(map.get("done"), Some(Value::Bool(false))));
        assert!(matches!(map.get("items"), Some(Value::List(items)) if items.len() == 2));
    }

    #[test]
    fn test_parse_scalar_frontmatter_is_empty_map() {
        let content = "---\njust a string\n---\n";
        let map = parse_frontmatter(content).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_parse_invalid_yaml_is_error() {
        let content = "---\n[unbalanced\n---\n";
        assert!(parse_frontmatter(content).is_err());
    }
}
