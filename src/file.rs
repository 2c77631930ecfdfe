//! File descriptors: the per-note record the evaluation core consumes.

use crate::value::{ObjectMap, Value};
use chrono::{DateTime, Utc};
use std::rc::Rc;

/// Everything the evaluator may ask about one vault file. Built by
/// the vault loader (or directly in tests); immutable afterwards.
#[derive(Debug)]
pub struct FileRecord {
    /// Absolute path on disk.
    pub path: String,
    /// Vault-relative path with forward slashes.
    pub relative_path: String,
    /// Basename without extension.
    pub name: String,
    pub ext: String,
    /// Vault-relative directory; `"."` for vault-root files.
    pub folder: String,
    pub size: i64,
    pub birthtime: Option<DateTime<Utc>>,
    pub mtime: Option<DateTime<Utc>>,
    pub ctime: Option<DateTime<Utc>>,
    pub frontmatter: Rc<ObjectMap>,
    /// Effective merged properties; initially equals frontmatter.
    pub properties: Rc<ObjectMap>,
    /// Tag names without the leading `#`.
    pub tags: Vec<String>,
    /// Link objects: `{raw, target, display?, isEmbed, resolvedPath?}`.
    pub links: Rc<Vec<Value>>,
    pub embeds: Rc<Vec<Value>>,
    /// Relative paths of files that link here.
    pub backlinks: Vec<String>,
}

impl FileRecord {
    /// A blank record for the given relative path. Used by tests and
    /// as the starting point for the vault loader.
    pub fn stub(relative_path: &str) -> Self {
        let basename = relative_path.rsplit('/').next().unwrap_or(relative_path);
        let (name, ext) = match basename.rsplit_once('.') {
            Some((stem, ext)) => (stem.to_string(), ext.to_string()),
            None => (basename.to_string(), String::new()),
        };
        let folder = match relative_path.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => ".".to_string(),
        };
        FileRecord {
            path: format!("/{}", relative_path),
            relative_path: relative_path.to_string(),
            name,
            ext,
            folder,
            size: 0,
            birthtime: None,
            mtime: None,
            ctime: None,
            frontmatter: Rc::new(ObjectMap::new()),
            properties: Rc::new(ObjectMap::new()),
            tags: Vec::new(),
            links: Rc::new(Vec::new()),
            embeds: Rc::new(Vec::new()),
            backlinks: Vec::new(),
        }
    }

    /// `ctime` as exposed to expressions: `birthtime ?? ctime`.
    pub fn effective_ctime(&self) -> Option<DateTime<Utc>> {
        self.birthtime.or(self.ctime)
    }
}

/// Method names dispatched on file values.
pub const FILE_METHODS: &[&str] = &["asLink", "hasLink", "hasProperty", "hasTag", "inFolder"];

/// Field lookup on a file value. `file` resolves to the same record,
/// which is what makes `file.file.name` work without any cyclic
/// ownership.
pub fn field_value(record: &Rc<FileRecord>, name: &str) -> Option<Value> {
    let value = match name {
        "backlinks" => Value::list(
            record
                .backlinks
                .iter()
                .map(|p| Value::string(p.clone()))
                .collect(),
        ),
        "ctime" => record
            .effective_ctime()
            .map(Value::Date)
            .unwrap_or(Value::Null),
        "embeds" => Value::List(record.embeds.clone()),
        "ext" => Value::string(record.ext.clone()),
        "file" => Value::File(record.clone()),
        "folder" => Value::string(record.folder.clone()),
        "links" => Value::List(record.links.clone()),
        "mtime" => record.mtime.map(Value::Date).unwrap_or(Value::Null),
        "name" => Value::string(record.name.clone()),
        "path" => Value::string(record.path.clone()),
        "properties" => Value::Object(record.properties.clone()),
        "size" => Value::Int(record.size),
        "tags" => Value::list(record.tags.iter().map(|t| Value::string(t.clone())).collect()),
        _ => return None,
    };
    Some(value)
}

/// Normalize a `hasLink` argument to a lowercase comparable:
/// `x.path ?? x.target ?? x.relativePath ?? x.name ?? x` for strings.
fn link_comparable(value: &Value) -> Option<String> {
    let raw = match value {
        Value::Str(s) => s.clone(),
        Value::File(f) => f.relative_path.clone(),
        Value::Object(map) => {
            let key = ["path", "target", "relativePath", "name"]
                .iter()
                .find_map(|k| map.get(k));
            match key {
                Some(Value::Str(s)) => s.clone(),
                Some(other) => other.to_display_string(),
                None => return None,
            }
        }
        _ => return None,
    };
    Some(raw.trim().to_lowercase())
}

/// Dispatch one of [`FILE_METHODS`] against a record.
pub fn call_method(record: &Rc<FileRecord>, name: &str, args: &[Value]) -> Option<Value> {
    match name {
        "asLink" => {
            let mut link = ObjectMap::new();
            link.insert("path".to_string(), Value::string(record.relative_path.clone()));
            if let Some(display) = args.first() {
                if !display.is_nullish() {
                    link.insert("display".to_string(), Value::string(display.to_display_string()));
                }
            }
            link.insert("isEmbed".to_string(), Value::Bool(false));
            Some(Value::object(link))
        }
        "hasLink" => {
            let Some(wanted) = args.first().and_then(link_comparable) else {
                return Some(Value::Bool(false));
            };
            let hit = record.links.iter().chain(record.embeds.iter()).any(|link| {
                let Value::Object(map) = link else { return false };
                ["target", "resolvedPath"].iter().any(|key| {
                    matches!(map.get(key), Some(Value::Str(s))
                        if s.trim().to_lowercase() == wanted)
                })
            });
            Some(Value::Bool(hit))
        }
        "hasProperty" => {
            let key = args.first().map(Value::to_display_string).unwrap_or_default();
            Some(Value::Bool(record.properties.contains_key(&key)))
        }
        "hasTag" => {
            if args.is_empty() {
                return Some(Value::Bool(false));
            }
            let hit = args.iter().any(|arg| {
                let wanted = arg
                    .to_display_string()
                    .trim_start_matches('#')
                    .to_lowercase();
                record.tags.iter().any(|t| t.to_lowercase() == wanted)
            });
            Some(Value::Bool(hit))
        }
        "inFolder" => {
            let prefix = args.first().map(Value::to_display_string).unwrap_or_default();
            let hit = record.folder == prefix
                || record.folder.starts_with(&format!("{}/", prefix));
            Some(Value::Bool(hit))
        }
        _ => None,
    }
}
