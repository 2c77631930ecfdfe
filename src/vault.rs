//! Vault discovery, walking, and file-record construction.

use crate::error::{BaseError, Result};
use crate::file::FileRecord;
use crate::parser::{frontmatter, tag, wikilink};
use crate::value::{ObjectMap, Value};
use chrono::{DateTime, Utc};
use glob::glob;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// An Obsidian-style vault rooted at a directory.
#[derive(Debug, Clone)]
pub struct Vault {
    pub root: PathBuf,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(BaseError::VaultNotFound(root));
        }
        Ok(Self { root })
    }

    /// Infer the vault root from a base-file path by walking ancestor
    /// directories until one contains a `.obsidian` folder.
    pub fn discover(base_path: &Path) -> Result<Self> {
        let absolute = std::fs::canonicalize(base_path).map_err(|source| BaseError::Read {
            path: base_path.to_path_buf(),
            source,
        })?;
        let start = if absolute.is_file() {
            absolute.parent().map(Path::to_path_buf).unwrap_or(absolute.clone())
        } else {
            absolute.clone()
        };

        let mut current = Some(start.as_path());
        while let Some(dir) = current {
            if dir.join(".obsidian").is_dir() {
                return Vault::new(dir);
            }
            current = dir.parent();
        }
        Err(BaseError::VaultUndiscoverable(absolute))
    }

    /// Walk the vault and build a record per regular file, with the
    /// backlink post-pass applied. Records come back sorted by
    /// relative path. Unreadable entries are warned about and
    /// skipped.
    pub fn load_files(&self, quiet: bool) -> Result<Vec<Rc<FileRecord>>> {
        let pattern = self.root.join("**/*");
        let mut raw_files = Vec::new();

        for entry in glob(&pattern.to_string_lossy())? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    if !quiet {
                        eprintln!("Warning: skipping unreadable entry: {}", e);
                    }
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            // Hidden files and directories (.obsidian included) are
            // not part of the note corpus.
            if relative
                .components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
            {
                continue;
            }

            match self.read_raw(&path, relative, quiet) {
                Ok(raw) => raw_files.push(raw),
                Err(e) => {
                    if !quiet {
                        eprintln!("Warning: skipping {}: {}", relative.display(), e);
                    }
                }
            }
        }

        raw_files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(link_pass(raw_files))
    }

    fn read_raw(&self, path: &Path, relative: &Path, quiet: bool) -> Result<RawFile> {
        let metadata = std::fs::metadata(path)?;
        let relative_path = relative.to_string_lossy().replace('\\', "/");

        let (stem, ext) = match relative.file_name().map(|n| n.to_string_lossy()) {
            Some(name) => match name.rsplit_once('.') {
                Some((stem, ext)) => (stem.to_string(), ext.to_string()),
                None => (name.to_string(), String::new()),
            },
            None => (relative_path.clone(), String::new()),
        };
        let folder = match relative_path.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => ".".to_string(),
        };

        let mut frontmatter_map = ObjectMap::new();
        let mut tags = Vec::new();
        let mut links = Vec::new();

        if ext.eq_ignore_ascii_case("md") {
            let content = std::fs::read_to_string(path)?;
            match frontmatter::parse_frontmatter(&content) {
                Ok(map) => frontmatter_map = map,
                Err(e) => {
                    if !quiet {
                        eprintln!("Warning: invalid frontmatter in {}: {}", relative_path, e);
                    }
                }
            }
            let body = frontmatter::split_frontmatter(&content).body;
            tags = frontmatter_tags(&frontmatter_map);
            for inline in tag::parse_tags(body) {
                if !tags.contains(&inline) {
                    tags.push(inline);
                }
            }
            links = wikilink::parse_wikilinks(body);
        }

        Ok(RawFile {
            path: path.to_string_lossy().to_string(),
            relative_path,
            name: stem,
            ext,
            folder,
            size: metadata.len() as i64,
            birthtime: metadata.created().ok().map(DateTime::<Utc>::from),
            mtime: metadata.modified().ok().map(DateTime::<Utc>::from),
            ctime: ctime_of(&metadata),
            frontmatter: frontmatter_map,
            tags,
            links,
        })
    }
}

#[cfg(unix)]
fn ctime_of(metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    use std::os::unix::fs::MetadataExt;
    DateTime::from_timestamp(metadata.ctime(), metadata.ctime_nsec() as u32)
}

#[cfg(not(unix))]
fn ctime_of(_metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    None
}

struct RawFile {
    path: String,
    relative_path: String,
    name: String,
    ext: String,
    folder: String,
    size: i64,
    birthtime: Option<DateTime<Utc>>,
    mtime: Option<DateTime<Utc>>,
    ctime: Option<DateTime<Utc>>,
    frontmatter: ObjectMap,
    tags: Vec<String>,
    links: Vec<wikilink::WikiLink>,
}

/// Tags declared in frontmatter: a sequence of strings, or one
/// comma-separated string.
fn frontmatter_tags(map: &ObjectMap) -> Vec<String> {
    let mut tags = Vec::new();
    let mut push = |raw: &str| {
        let name = raw.trim().trim_start_matches('#').to_string();
        if !name.is_empty() && !tags.contains(&name) {
            tags.push(name);
        }
    };
    match map.get("tags") {
        Some(Value::List(items)) => {
            for item in items.iter() {
                if let Value::Str(s) = item {
                    push(s);
                }
            }
        }
        Some(Value::Str(s)) => {
            for part in s.split(',') {
                push(part);
            }
        }
        _ => {}
    }
    tags
}

/// Resolve link targets against the vault and populate backlinks.
fn link_pass(raw_files: Vec<RawFile>) -> Vec<Rc<FileRecord>> {
    // Lowercased path and bare-name indexes; first hit wins, and the
    // input is already path-sorted so "first" is deterministic.
    let mut by_path: HashMap<String, usize> = HashMap::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (index, raw) in raw_files.iter().enumerate() {
        by_path.entry(raw.relative_path.to_lowercase()).or_insert(index);
        by_name.entry(raw.name.to_lowercase()).or_insert(index);
    }

    let resolve = |clean: &str, source_folder: &str| -> Option<usize> {
        if clean.is_empty() {
            return None;
        }
        let lower = clean.to_lowercase();

        let candidates = |base: &str| [base.to_string(), format!("{}.md", base)];

        if clean.contains('/') {
            for candidate in candidates(&lower) {
                if let Some(&index) = by_path.get(&candidate) {
                    return Some(index);
                }
            }
        }
        if source_folder != "." {
            let scoped = format!("{}/{}", source_folder.to_lowercase(), lower);
            for candidate in candidates(&scoped) {
                if let Some(&index) = by_path.get(&candidate) {
                    return Some(index);
                }
            }
        } else {
            for candidate in candidates(&lower) {
                if let Some(&index) = by_path.get(&candidate) {
                    return Some(index);
                }
            }
        }
        let bare = lower.strip_suffix(".md").unwrap_or(&lower);
        by_name.get(bare).copied()
    };

    // Resolve every link, recording backlink edges as we go.
    let mut backlinks: Vec<Vec<String>> = vec![Vec::new(); raw_files.len()];
    let mut resolved_links: Vec<Vec<(wikilink::WikiLink, Option<String>)>> =
        Vec::with_capacity(raw_files.len());

    for (source_index, raw) in raw_files.iter().enumerate() {
        let mut out = Vec::with_capacity(raw.links.len());
        for link in &raw.links {
            let resolved = resolve(link.target_path(), &raw.folder);
            if let Some(target_index) = resolved {
                if target_index != source_index {
                    let source_path = raw.relative_path.clone();
                    if !backlinks[target_index].contains(&source_path) {
                        backlinks[target_index].push(source_path);
                    }
                }
            }
            let resolved_path = resolved.map(|i| raw_files[i].relative_path.clone());
            out.push((link.clone(), resolved_path));
        }
        resolved_links.push(out);
    }

    raw_files
        .into_iter()
        .zip(resolved_links)
        .zip(backlinks)
        .map(|((raw, links), backlinks)| {
            let mut link_values = Vec::new();
            let mut embed_values = Vec::new();
            for (link, resolved_path) in links {
                let value = link_object(&link, resolved_path);
                if link.is_embed {
                    embed_values.push(value);
                } else {
                    link_values.push(value);
                }
            }

            let frontmatter = Rc::new(raw.frontmatter);
            Rc::new(FileRecord {
                path: raw.path,
                relative_path: raw.relative_path,
                name: raw.name,
                ext: raw.ext,
                folder: raw.folder,
                size: raw.size,
                birthtime: raw.birthtime,
                mtime: raw.mtime,
                ctime: raw.ctime,
                properties: frontmatter.clone(),
                frontmatter,
                tags: raw.tags,
                links: Rc::new(link_values),
                embeds: Rc::new(embed_values),
                backlinks,
            })
        })
        .collect()
}

fn link_object(link: &wikilink::WikiLink, resolved_path: Option<String>) -> Value {
    let mut object = ObjectMap::new();
    object.insert("raw".to_string(), Value::string(link.raw.clone()));
    object.insert("target".to_string(), Value::string(link.target.clone()));
    if let Some(display) = &link.display {
        object.insert("display".to_string(), Value::string(display.clone()));
    }
    object.insert("isEmbed".to_string(), Value::Bool(link.is_embed));
    if let Some(resolved) = resolved_path {
        object.insert("resolvedPath".to_string(), Value::string(resolved));
    }
    Value::object(object)
}
