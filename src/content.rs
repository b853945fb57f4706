// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Content Ingestion
//!
//! Reads the content directory into a [`ContentIndex`]: one typed
//! [`ContentItem`] per Markdown or HTML file, in a deterministic discovery
//! order (directory walk sorted by file name).
//!
//! Front matter is YAML between `---` fences. Optional fields are defaulted
//! here, once, so the rest of the crate never checks for their absence:
//!
//! - `draft` defaults to `false`
//! - `tags` defaults to an empty list, and a single string becomes one tag
//! - `date` defaults to the file's creation time; the keywords
//!   `Last Modified` and `Created` select a file timestamp explicitly
//! - `permalink` is either an output path or `false` (render, don't write)

use crate::collections::Glob;
use crate::core::error::{BlogError, Result};
use crate::dates::parse_date;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// File extensions ingested as content.
pub const CONTENT_EXTENSIONS: &[&str] = &["md", "markdown", "html"];

/// How the body of an item is turned into HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Rendered through the Markdown renderer.
    Markdown,
    /// Used as-is.
    Html,
}

/// Where an item is written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Permalink {
    /// Derived from the input path.
    #[default]
    Default,
    /// Explicit output path from front matter.
    Path(String),
    /// `permalink: false`: available to collections, never written.
    Disabled,
}

/// One page or post.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    /// Path relative to the content directory, `/`-separated.
    pub input_path: String,
    /// Publication timestamp.
    pub date: DateTime<Utc>,
    /// Drafts are hidden from production builds.
    pub draft: bool,
    /// Declared tags, in front matter order.
    pub tags: Vec<String>,
    /// Page title.
    pub title: Option<String>,
    /// Short description.
    pub description: Option<String>,
    /// Layout name, possibly an alias.
    pub layout: Option<String>,
    /// Output location rule.
    pub permalink: Permalink,
    /// Remaining front matter fields.
    pub data: Map<String, JsonValue>,
    /// Source text after the front matter.
    pub body: String,
    /// Markdown or HTML.
    pub kind: ContentKind,
}

/// Timestamps of the file an item was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileDates {
    /// Last modification time.
    pub modified: DateTime<Utc>,
    /// Creation time, or the modification time where unavailable.
    pub created: DateTime<Utc>,
}

impl FileDates {
    /// Reads the timestamps of `path`.
    pub fn of(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)
            .map_err(|e| BlogError::io_error(path.to_path_buf(), e))?;
        let modified = metadata
            .modified()
            .map_err(|e| BlogError::io_error(path.to_path_buf(), e))?;
        let created = metadata.created().unwrap_or(modified);
        Ok(Self {
            modified: DateTime::<Utc>::from(modified),
            created: DateTime::<Utc>::from(created),
        })
    }

    /// Both timestamps set to `date`.
    pub fn fixed(date: DateTime<Utc>) -> Self {
        Self {
            modified: date,
            created: date,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    date: Option<JsonValue>,
    #[serde(default)]
    draft: Option<bool>,
    #[serde(default)]
    tags: Option<TagsField>,
    #[serde(default)]
    layout: Option<String>,
    #[serde(default)]
    permalink: Option<PermalinkField>,
    #[serde(flatten)]
    extra: Map<String, JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TagsField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PermalinkField {
    Path(String),
    Flag(bool),
}

/// Splits `source` into its front matter block (without fences) and body.
///
/// Sources that do not open with a `---` line, or never close the block,
/// have no front matter.
pub fn split_front_matter(source: &str) -> (Option<&str>, &str) {
    let rest = match source
        .strip_prefix("---\n")
        .or_else(|| source.strip_prefix("---\r\n"))
    {
        Some(rest) => rest,
        None => return (None, source),
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            let front = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(front), body);
        }
        offset += line.len();
    }

    (None, source)
}

impl ContentItem {
    /// Creates a Markdown item with an empty body and no front matter.
    pub fn new<S: Into<String>>(input_path: S, date: DateTime<Utc>) -> Self {
        let input_path = input_path.into();
        let kind = kind_for_path(&input_path);
        Self {
            input_path,
            date,
            draft: false,
            tags: Vec::new(),
            title: None,
            description: None,
            layout: None,
            permalink: Permalink::Default,
            data: Map::new(),
            body: String::new(),
            kind,
        }
    }

    /// Sets the draft flag.
    pub fn with_draft(mut self, draft: bool) -> Self {
        self.draft = draft;
        self
    }

    /// Sets the tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Parses a content file.
    ///
    /// `input_path` is the path relative to the content directory and is
    /// used for error messages, globbing, and output paths.
    pub fn from_source(
        input_path: &str,
        source: &str,
        file_dates: FileDates,
    ) -> Result<Self> {
        let (front, body) = split_front_matter(source);
        let front: FrontMatter = match front {
            Some(block) if !block.trim().is_empty() => {
                serde_yml::from_str(block).map_err(|e| {
                    BlogError::front_matter_error(
                        e.to_string(),
                        PathBuf::from(input_path),
                    )
                })?
            }
            _ => FrontMatter::default(),
        };

        let date = resolve_date(input_path, front.date.as_ref(), file_dates)?;
        let tags = match front.tags {
            None => Vec::new(),
            Some(TagsField::One(tag)) => vec![tag],
            Some(TagsField::Many(tags)) => tags,
        };
        let permalink = match front.permalink {
            None | Some(PermalinkField::Flag(true)) => Permalink::Default,
            Some(PermalinkField::Flag(false)) => Permalink::Disabled,
            Some(PermalinkField::Path(path)) => Permalink::Path(path),
        };

        Ok(Self {
            input_path: input_path.to_string(),
            date,
            draft: front.draft.unwrap_or(false),
            tags,
            title: front.title,
            description: front.description,
            layout: front.layout,
            permalink,
            data: front.extra,
            body: body.to_string(),
            kind: kind_for_path(input_path),
        })
    }

    /// Output path relative to the output directory, or `None` when the item
    /// is not written.
    ///
    /// `index.md` becomes `index.html`, `posts/hello.md` becomes
    /// `posts/hello/index.html`, and explicit permalinks ending in `/` gain
    /// an `index.html`.
    pub fn output_path(&self) -> Option<PathBuf> {
        match &self.permalink {
            Permalink::Disabled => None,
            Permalink::Path(path) => {
                let trimmed = path.trim_start_matches('/');
                if trimmed.is_empty() || trimmed.ends_with('/') {
                    Some(PathBuf::from(format!("{trimmed}index.html")))
                } else {
                    Some(PathBuf::from(trimmed))
                }
            }
            Permalink::Default => {
                let stem = self
                    .input_path
                    .rsplit_once('.')
                    .map_or(self.input_path.as_str(), |(stem, _)| stem);
                let (dir, name) = match stem.rsplit_once('/') {
                    Some((dir, name)) => (Some(dir), name),
                    None => (None, stem),
                };
                let page_dir = match (dir, name) {
                    (None, "index") => String::new(),
                    (Some(dir), "index") => format!("{dir}/"),
                    (_, _) => format!("{stem}/"),
                };
                Some(PathBuf::from(format!("{page_dir}index.html")))
            }
        }
    }

    /// Public URL of the item, or `None` when it is not written.
    pub fn url(&self) -> Option<String> {
        let output = self.output_path()?;
        let output = output.to_string_lossy().replace('\\', "/");
        Some(match output.strip_suffix("index.html") {
            Some(dir) => format!("/{dir}"),
            None => format!("/{output}"),
        })
    }
}

fn kind_for_path(input_path: &str) -> ContentKind {
    if input_path.ends_with(".html") {
        ContentKind::Html
    } else {
        ContentKind::Markdown
    }
}

fn resolve_date(
    input_path: &str,
    value: Option<&JsonValue>,
    file_dates: FileDates,
) -> Result<DateTime<Utc>> {
    match value {
        None | Some(JsonValue::Null) => Ok(file_dates.created),
        Some(JsonValue::String(s)) => match s.as_str() {
            "Last Modified" => Ok(file_dates.modified),
            "Created" => Ok(file_dates.created),
            other => parse_date(other).ok_or_else(|| {
                BlogError::front_matter_error(
                    format!("invalid date `{other}`"),
                    PathBuf::from(input_path),
                )
            }),
        },
        Some(other) => Err(BlogError::front_matter_error(
            format!("invalid date `{other}`"),
            PathBuf::from(input_path),
        )),
    }
}

/// Every content item of a site, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct ContentIndex {
    items: Vec<ContentItem>,
}

impl ContentIndex {
    /// Wraps already-built items, keeping their order.
    pub fn from_items(items: Vec<ContentItem>) -> Self {
        Self { items }
    }

    /// Walks `content_dir` and parses every content file.
    ///
    /// Directories listed in `exclude_dirs` (typically the output and
    /// template directories) are skipped, as is any file or directory whose
    /// name starts with `_` or `.`, and any file matching an `ignore` glob.
    pub fn load(
        content_dir: &Path,
        exclude_dirs: &[PathBuf],
        ignore: &[Glob],
    ) -> Result<Self> {
        let excluded: Vec<PathBuf> = exclude_dirs
            .iter()
            .filter_map(|dir| fs::canonicalize(dir).ok())
            .collect();

        let mut items = Vec::new();
        let walker = WalkDir::new(content_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_skipped(entry, &excluded));

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                BlogError::io_error(path, e.into())
            })?;
            if !entry.file_type().is_file() || !has_content_extension(entry.path()) {
                continue;
            }

            let input_path = relative_input_path(content_dir, entry.path())?;
            if ignore.iter().any(|glob| glob.is_match(&input_path)) {
                debug!("Ignoring {}", input_path);
                continue;
            }

            let source = fs::read_to_string(entry.path())
                .map_err(|e| BlogError::io_error(entry.path().to_path_buf(), e))?;
            let item = ContentItem::from_source(
                &input_path,
                &source,
                FileDates::of(entry.path())?,
            )?;
            debug!("Ingested {} ({})", item.input_path, item.date);
            items.push(item);
        }

        if items.is_empty() {
            warn!("No content found in {}", content_dir.display());
        }
        Ok(Self { items })
    }

    /// All items in discovery order.
    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when no content was found.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn is_skipped(entry: &DirEntry, excluded: &[PathBuf]) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('_') || name.starts_with('.') {
        return true;
    }
    entry.file_type().is_dir()
        && fs::canonicalize(entry.path())
            .map(|path| excluded.contains(&path))
            .unwrap_or(false)
}

fn has_content_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CONTENT_EXTENSIONS.contains(&ext))
}

fn relative_input_path(content_dir: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(content_dir).map_err(|e| {
        BlogError::content_processing_error(
            format!("Failed to determine relative path of {}", path.display()),
            Some(Box::new(e)),
        )
    })?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
