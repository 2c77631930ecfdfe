//! Base-file model: the YAML shape describing filters, formulas,
//! properties and views.

use crate::error::{BaseError, Result};
use serde::Deserialize;
use std::fmt;

/// A parsed `.base` file.
#[derive(Debug, Clone, Default)]
pub struct BaseDef {
    pub filters: Option<FilterNode>,
    /// Formula name → expression source, in YAML order.
    pub formulas: Vec<(String, String)>,
    /// Property key → display configuration, in YAML order.
    pub properties: Vec<(String, PropertySpec)>,
    pub views: Vec<ViewDef>,
}

/// Per-property display configuration. Unknown keys are tolerated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertySpec {
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
}

/// One view within a base.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewDef {
    #[serde(rename = "type")]
    pub view_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub limit: Option<f64>,
    #[serde(default)]
    pub filters: Option<FilterNode>,
    #[serde(default)]
    pub order: Option<Vec<String>>,
}

/// A filter tree: a raw expression string, or a compound node whose
/// keys are drawn from `and` / `or` / `not` only.
#[derive(Debug, Clone)]
pub enum FilterNode {
    Expr(String),
    /// `None` means the key was absent (vacuously satisfied), which
    /// is not the same as an empty group: an empty `or` is false.
    Group {
        and: Option<Vec<FilterNode>>,
        or: Option<Vec<FilterNode>>,
        not: Option<Vec<FilterNode>>,
    },
}

impl FilterNode {
    fn from_yaml(yaml: &serde_yaml::Value) -> Result<FilterNode> {
        match yaml {
            serde_yaml::Value::String(s) => Ok(FilterNode::Expr(s.clone())),
            serde_yaml::Value::Mapping(map) => {
                let mut and = None;
                let mut or = None;
                let mut not = None;
                let mut invalid = Vec::new();

                for (key, value) in map {
                    let Some(key) = key.as_str() else {
                        invalid.push(yaml_key_display(key));
                        continue;
                    };
                    match key {
                        "and" => and = Some(Self::group_from_yaml(key, value)?),
                        "or" => or = Some(Self::group_from_yaml(key, value)?),
                        "not" => not = Some(Self::group_from_yaml(key, value)?),
                        other => invalid.push(other.to_string()),
                    }
                }

                if !invalid.is_empty() {
                    return Err(BaseError::Shape(format!(
                        "Invalid filter keys: {} (only \"and\", \"or\" and \"not\" are allowed)",
                        invalid.join(", ")
                    )));
                }

                Ok(FilterNode::Group { and, or, not })
            }
            other => Err(BaseError::Shape(format!(
                "Filter must be a string or an and/or/not mapping, got {}",
                yaml_kind(other)
            ))),
        }
    }

    fn group_from_yaml(key: &str, value: &serde_yaml::Value) -> Result<Vec<FilterNode>> {
        let serde_yaml::Value::Sequence(items) = value else {
            return Err(BaseError::Shape(format!(
                "\"{}\" group must be an array, got {}",
                key,
                yaml_kind(value)
            )));
        };
        items.iter().map(FilterNode::from_yaml).collect()
    }
}

impl<'de> Deserialize<'de> for FilterNode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let yaml = serde_yaml::Value::deserialize(deserializer)?;
        FilterNode::from_yaml(&yaml).map_err(serde::de::Error::custom)
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

fn yaml_key_display(key: &serde_yaml::Value) -> String {
    match key.as_str() {
        Some(s) => s.to_string(),
        None => format!("{:?}", key),
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::Expr(src) => write!(f, "{}", src),
            FilterNode::Group { .. } => write!(f, "<compound filter>"),
        }
    }
}

impl BaseDef {
    /// Parse a base file. The YAML root must be a mapping; the four
    /// recognized keys are shape-checked, anything else is ignored.
    pub fn from_yaml_str(text: &str) -> Result<BaseDef> {
        let root: serde_yaml::Value = serde_yaml::from_str(text)?;
        let serde_yaml::Value::Mapping(map) = &root else {
            return Err(BaseError::Shape(format!(
                "Base file root must be a mapping, got {}",
                yaml_kind(&root)
            )));
        };

        let mut base = BaseDef::default();

        for (key, value) in map {
            match key.as_str() {
                Some("filters") => {
                    if !value.is_null() {
                        base.filters = Some(FilterNode::from_yaml(value)?);
                    }
                }
                Some("formulas") => base.formulas = string_map_entries("formulas", value)?,
                Some("properties") => {
                    let serde_yaml::Value::Mapping(props) = value else {
                        return Err(BaseError::Shape(format!(
                            "\"properties\" must be a mapping, got {}",
                            yaml_kind(value)
                        )));
                    };
                    for (prop_key, spec) in props {
                        let Some(prop_key) = prop_key.as_str() else {
                            return Err(BaseError::Shape(
                                "property keys must be strings".to_string(),
                            ));
                        };
                        let spec: PropertySpec = serde_yaml::from_value(spec.clone())?;
                        base.properties.push((prop_key.to_string(), spec));
                    }
                }
                Some("views") => {
                    base.views = serde_yaml::from_value(value.clone())?;
                }
                _ => {}
            }
        }

        Ok(base)
    }

    /// Display name for a column key: the property's `displayName`
    /// when present and non-empty, the raw key otherwise.
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.properties
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .and_then(|(_, spec)| spec.display_name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or(key)
    }
}

/// Read a YAML mapping of string → string, preserving order.
fn string_map_entries(
    label: &str,
    value: &serde_yaml::Value,
) -> Result<Vec<(String, String)>> {
    let serde_yaml::Value::Mapping(map) = value else {
        return Err(BaseError::Shape(format!(
            "\"{}\" must be a mapping, got {}",
            label,
            yaml_kind(value)
        )));
    };
    let mut entries = Vec::with_capacity(map.len());
    for (key, val) in map {
        let (Some(key), Some(val)) = (key.as_str(), val.as_str()) else {
            return Err(BaseError::Shape(format!(
                "\"{}\" entries must map strings to strings",
                label
            )));
        };
        entries.push((key.to_string(), val.to_string()));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_base() {
        let base = BaseDef::from_yaml_str(
            r#"
filters: file.hasTag("project")
formulas:
  shouting: note.title.toUpperCase()
views:
  - type: table
    name: Tagged notes
    order:
      - note.title
      - formula.shouting
"#,
        )
        .unwrap();

        assert!(matches!(base.filters, Some(FilterNode::Expr(_))));
        assert_eq!(base.formulas.len(), 1);
        assert_eq!(base.formulas[0].0, "shouting");
        assert_eq!(base.views.len(), 1);
        assert_eq!(base.views[0].name.as_deref(), Some("Tagged notes"));
        assert_eq!(
            base.views[0].order.as_deref(),
            Some(&["note.title".to_string(), "formula.shouting".to_string()][..])
        );
    }

    #[test]
    fn test_non_mapping_root_rejected() {
        let err = BaseDef::from_yaml_str("- just\n- a list\n").unwrap_err();
        assert!(err.to_string().contains("must be a mapping"));
    }

    #[test]
    fn test_compound_filter_tree() {
        let base = BaseDef::from_yaml_str(
            r#"
filters:
  and:
    - note.status == "open"
    - or:
        - file.hasTag("a")
        - file.hasTag("b")
  not:
    - file.inFolder("archive")
views:
  - type: table
"#,
        )
        .unwrap();

        match base.filters.unwrap() {
            FilterNode::Group { and, or, not } => {
                let and = and.unwrap();
                assert_eq!(and.len(), 2);
                assert!(or.is_none());
                assert_eq!(not.unwrap().len(), 1);
                assert!(matches!(
                    &and[1],
                    FilterNode::Group { or: Some(inner), .. } if inner.len() == 2
                ));
            }
            other => panic!("Expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_group_must_be_array() {
        let err = BaseDef::from_yaml_str(
            r#"
filters:
  and:
    left: right
views: []
"#,
        )
        .unwrap_err();
        assert!(
            err.to_string().contains("\"and\" group must be an array"),
            "unexpected message: {}",
            err
        );
    }

    #[test]
    fn test_unknown_filter_key_rejected() {
        let err = BaseDef::from_yaml_str(
            r#"
filters:
  nand:
    - "1 == 1"
views: []
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Invalid filter keys: nand"));
    }

    #[test]
    fn test_properties_preserve_order_and_display_names() {
        let base = BaseDef::from_yaml_str(
            r#"
properties:
  note.title:
    displayName: Title
  file.name: {}
  formula.total:
    displayName: ""
views:
  - type: table
"#,
        )
        .unwrap();

        let keys: Vec<&str> = base.properties.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["note.title", "file.name", "formula.total"]);
        assert_eq!(base.display_name("note.title"), "Title");
        assert_eq!(base.display_name("file.name"), "file.name");
        // Empty displayName falls back to the key.
        assert_eq!(base.display_name("formula.total"), "formula.total");
        assert_eq!(base.display_name("unlisted"), "unlisted");
    }

    #[test]
    fn test_unknown_top_level_keys_ignored() {
        let base = BaseDef::from_yaml_str(
            r#"
something_else: 42
views:
  - type: table
"#,
        )
        .unwrap();
        assert_eq!(base.views.len(), 1);
    }
}
