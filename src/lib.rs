// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Blogsmith Library
//!
//! Blogsmith builds a personal blog from a directory of Markdown posts with
//! YAML front matter. It derives the site's collections (published posts,
//! the public tag list, one collection per tag), renders Markdown with
//! heading anchors and footnotes, applies Handlebars layouts, and writes the
//! output tree. A preview server answers unmatched requests with the
//! generated `404.html`.
//!
//! Draft and future-dated posts are visible in preview builds and hidden in
//! production builds; the [`BuildMode`](core::config::BuildMode) is decided
//! once and passed explicitly through the build.

#![doc = include_str!("../README.md")]
#![doc(html_root_url = "https://docs.rs/blogsmith")]

use crate::collections::{Collections, Glob};
use crate::content::{ContentIndex, ContentItem, ContentKind};
use crate::core::config::Config;
use crate::core::error::{BlogError, Result};
use crate::generators::html::HtmlGenerator;
use crate::template::{date_value, page_data, HandlebarsRenderer};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde_json::{json, Map, Value as JsonValue};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Configuration and error handling.
pub mod core;

/// Command-line interface.
pub mod cli;

/// Collections, publication filtering, and tags.
pub mod collections;

/// Content ingestion.
pub mod content;

/// Date formatting.
pub mod dates;

/// Output generation.
pub mod generators;

/// Content processors.
pub mod processors;

/// Preview server.
pub mod serve;

/// Template rendering.
pub mod template;

/// Theme toggle.
pub mod theme;

/// Trait for content processing implementations.
///
/// Implementations of this trait turn an item body into HTML.
pub trait ContentProcessor: Send + Sync + std::fmt::Debug {
    /// Processes the provided content with an optional context.
    ///
    /// # Arguments
    /// * `content` - The content to be processed.
    /// * `context` - An optional context for additional processing.
    ///
    /// # Returns
    /// * `Result<String>` - The processed content, or an error if processing fails.
    fn process(
        &self,
        content: &str,
        context: Option<&JsonValue>,
    ) -> Result<String>;

    /// Validates the content without processing.
    fn validate(&self, content: &str) -> Result<()>;
}

/// Trait for template rendering implementations.
pub trait TemplateRenderer: Send + Sync + std::fmt::Debug {
    /// Renders a template with the specified context.
    ///
    /// # Arguments
    /// * `template` - The template name.
    /// * `context` - The context data for rendering the template.
    fn render(&self, template: &str, context: &JsonValue) -> Result<String>;

    /// Validates the template against the context.
    fn validate(&self, template: &str, context: &JsonValue) -> Result<()>;
}

/// Trait for output generation implementations.
pub trait OutputGenerator: Send + Sync + std::fmt::Debug {
    /// Writes `content` to `path`.
    ///
    /// # Arguments
    /// * `content` - The content to be output.
    /// * `path` - The output file path.
    /// * `options` - Optional settings for generation.
    fn generate(
        &self,
        content: &str,
        path: &Path,
        options: Option<&JsonValue>,
    ) -> Result<()>;

    /// Validates the path and options for output generation.
    fn validate(&self, path: &Path, options: Option<&JsonValue>) -> Result<()>;
}

/// What a build produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Pages written to the output tree.
    pub pages_written: usize,
    /// Items not written: unpublished in production, or `permalink: false`.
    pub pages_skipped: usize,
    /// Passthrough files copied.
    pub files_copied: usize,
}

/// The build pipeline for one site.
#[derive(Debug)]
pub struct Site {
    config: Config,
    generator: HtmlGenerator,
}

impl Site {
    /// Creates a site from a validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let generator =
            HtmlGenerator::new().with_minification(config.output.minify);
        Ok(Self { config, generator })
    }

    /// The site configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reads and parses every content file.
    pub fn load_content(&self) -> Result<ContentIndex> {
        let ignore = self
            .config
            .ignore
            .iter()
            .map(|pattern| Glob::new(pattern))
            .collect::<Result<Vec<_>>>()?;
        ContentIndex::load(
            &self.config.content_dir,
            &[
                self.config.output_dir.clone(),
                self.config.template_dir.clone(),
            ],
            &ignore,
        )
    }

    /// Derives the collections of `index` as of `now`.
    pub fn collections<'a>(
        &self,
        index: &'a ContentIndex,
        now: &DateTime<Utc>,
    ) -> Result<Collections<'a>> {
        let posts_glob = Glob::new(&self.config.posts_glob)?;
        Ok(Collections::build(index, &posts_glob, self.config.mode, now))
    }

    /// Builds the site into the output directory.
    ///
    /// `now` is the build time the publication filter compares post dates
    /// against.
    pub fn build(&self, now: DateTime<Utc>) -> Result<BuildReport> {
        let mode = self.config.mode;
        info!(
            "Building {} site from {} into {}",
            mode,
            self.config.content_dir.display(),
            self.config.output_dir.display()
        );

        let index = self.load_content()?;
        let collections = self.collections(&index, &now)?;
        info!(
            "Loaded {} items, {} visible, {} posts, {} tags",
            index.len(),
            collections.all().len(),
            collections.posts().len(),
            collections.tag_list().len()
        );

        let markdown = processors::processor_for(ContentKind::Markdown)?;
        let html_passthrough = processors::processor_for(ContentKind::Html)?;
        let mut bodies = HashMap::with_capacity(collections.all().len());
        for item in collections.all() {
            let processor = match item.kind {
                ContentKind::Markdown => &markdown,
                ContentKind::Html => &html_passthrough,
            };
            let html = processor.process(&item.body, None).map_err(|e| {
                BlogError::content_processing_error(
                    format!("Failed to render {}", item.input_path),
                    Some(Box::new(e)),
                )
            })?;
            let _ = bodies.insert(item.input_path.as_str(), html);
        }

        let renderer = HandlebarsRenderer::new(
            &self.config.template_dir,
            mode,
            now,
        )?;
        let collections_data = collections_data(&collections, &bodies);
        let site_data = self.config.site_data();

        let mut report = BuildReport {
            pages_skipped: index.len() - collections.all().len(),
            ..BuildReport::default()
        };
        let mut written: HashMap<PathBuf, &str> = HashMap::new();

        for item in collections.all() {
            let Some(relative) = item.output_path() else {
                debug!("Not writing {} (permalink: false)", item.input_path);
                report.pages_skipped += 1;
                continue;
            };
            if let Some(previous) =
                written.insert(relative.clone(), item.input_path.as_str())
            {
                return Err(BlogError::output_generation_error(
                    format!(
                        "{} and {} both write to this path",
                        previous, item.input_path
                    ),
                    relative,
                    None,
                ));
            }

            let body = bodies
                .get(item.input_path.as_str())
                .map(String::as_str)
                .unwrap_or_default();
            let context = page_context(
                item,
                body,
                &collections_data,
                &site_data,
                &self.config,
            );
            let html = match &item.layout {
                Some(layout) => renderer
                    .render(self.config.resolve_layout(layout), &context)?,
                None => body.to_string(),
            };

            self.generator.generate(
                &html,
                &self.config.output_dir.join(&relative),
                None,
            )?;
            report.pages_written += 1;
        }

        for copy in &self.config.passthrough {
            report.files_copied += self.generator.copy_passthrough(
                &self.config.content_dir,
                &self.config.output_dir,
                copy,
            )?;
        }

        if self.config.output.theme_script {
            self.generator.write_file(
                &self.config.output_dir.join(theme::SCRIPT_PATH),
                theme::client_script().as_bytes(),
            )?;
        }

        info!(
            "Wrote {} pages ({} skipped), copied {} files",
            report.pages_written, report.pages_skipped, report.files_copied
        );
        Ok(report)
    }
}

fn collection_value(
    items: &[&ContentItem],
    bodies: &HashMap<&str, String>,
) -> JsonValue {
    JsonValue::Array(
        items
            .iter()
            .map(|item| {
                let mut page = page_data(item);
                if let Some(object) = page.as_object_mut() {
                    let content = bodies
                        .get(item.input_path.as_str())
                        .cloned()
                        .unwrap_or_default();
                    let _ = object.insert(
                        "content".to_string(),
                        JsonValue::String(content),
                    );
                }
                page
            })
            .collect(),
    )
}

/// The `collections` template value: `all`, `posts`, `tagList`, and one
/// entry per tag.
fn collections_data(
    collections: &Collections<'_>,
    bodies: &HashMap<&str, String>,
) -> JsonValue {
    let mut data = Map::new();
    for tag in collections.tags() {
        let _ = data.insert(
            tag.to_string(),
            collection_value(collections.tagged(tag), bodies),
        );
    }
    let _ = data.insert(
        "all".to_string(),
        collection_value(collections.all(), bodies),
    );
    let _ = data.insert(
        "posts".to_string(),
        collection_value(collections.posts(), bodies),
    );
    let _ = data.insert(
        "tagList".to_string(),
        JsonValue::from(collections.tag_list().to_vec()),
    );
    JsonValue::Object(data)
}

/// Template context of one page. Extra front-matter keys sit at the top
/// level, below the fixed keys.
fn page_context(
    item: &ContentItem,
    body: &str,
    collections: &JsonValue,
    site: &JsonValue,
    config: &Config,
) -> JsonValue {
    let mut context = item.data.clone();
    let fixed = [
        ("content", JsonValue::String(body.to_string())),
        ("title", json!(item.title)),
        ("description", json!(item.description)),
        ("tags", json!(item.tags)),
        ("date", date_value(&item.date)),
        ("page", page_data(item)),
        ("collections", collections.clone()),
        ("site", site.clone()),
        ("buildMode", JsonValue::String(config.mode.to_string())),
    ];
    for (key, value) in fixed {
        let _ = context.insert(key.to_string(), value);
    }
    JsonValue::Object(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{BuildMode, PassthroughCopy};
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("posts")).unwrap();
        fs::create_dir_all(root.join("_includes/layouts")).unwrap();
        fs::create_dir_all(root.join("img")).unwrap();

        fs::write(
            root.join("_includes/layouts/post.hbs"),
            "<article><h1>{{title}}</h1><time datetime=\"{{htmlDateString date}}\">{{readableDate date}}</time>{{{content}}}<ul>{{#each (filterTagList tags)}}<li>{{this}}</li>{{/each}}</ul></article>",
        )
        .unwrap();
        fs::write(
            root.join("_includes/home.hbs"),
            "<h1>{{site.title}}</h1>{{#each collections.posts}}<a href=\"{{url}}\">{{title}}</a>{{/each}}|{{#each collections.tagList}}{{this}};{{/each}}",
        )
        .unwrap();

        fs::write(
            root.join("index.md"),
            "---\nlayout: home\ntitle: Home\ndate: 2023-12-01\n---\n",
        )
        .unwrap();
        fs::write(
            root.join("posts/a.md"),
            "---\ntitle: Alpha\ndate: 2024-01-01\ntags: [posts, rust]\nlayout: post\n---\n# Alpha\n\nBody.\n",
        )
        .unwrap();
        fs::write(
            root.join("posts/b.md"),
            "---\ntitle: Future\ndate: 2024-02-01\ntags: [posts, later]\nlayout: post\n---\nSoon.\n",
        )
        .unwrap();
        fs::write(
            root.join("posts/c.md"),
            "---\ntitle: Draft\ndate: 2024-01-02\ndraft: true\ntags: posts\nlayout: post\n---\nWip.\n",
        )
        .unwrap();
        fs::write(
            root.join("404.md"),
            "---\npermalink: 404.html\ndate: 2023-12-01\n---\nNot found.\n",
        )
        .unwrap();
        fs::write(root.join("img/logo.svg"), "<svg/>").unwrap();
        dir
    }

    fn config(root: &Path, mode: BuildMode) -> Config {
        let mut config = Config {
            content_dir: root.to_path_buf(),
            output_dir: root.join("_site"),
            template_dir: root.join("_includes"),
            mode,
            ..Config::default()
        };
        config.passthrough.push(PassthroughCopy {
            from: PathBuf::from("img"),
            to: None,
        });
        let _ = config.site.insert(
            "title".to_string(),
            toml::Value::String("My Blog".to_string()),
        );
        config
    }

    #[test]
    fn test_production_build_hides_drafts_and_future_posts() {
        let dir = fixture();
        let root = dir.path();
        let site = Site::new(config(root, BuildMode::Production)).unwrap();

        let report = site.build(now()).unwrap();
        assert_eq!(
            report,
            BuildReport {
                pages_written: 3,
                pages_skipped: 2,
                files_copied: 1,
            }
        );

        let out = root.join("_site");
        assert!(out.join("posts/a/index.html").is_file());
        assert!(!out.join("posts/b/index.html").exists());
        assert!(!out.join("posts/c/index.html").exists());
        assert!(out.join("404.html").is_file());
        assert!(out.join("img/logo.svg").is_file());
        assert!(out.join("js/theme.js").is_file());

        let home = fs::read_to_string(out.join("index.html")).unwrap();
        assert_eq!(
            home,
            "<h1>My Blog</h1><a href=\"/posts/a/\">Alpha</a>|rust;"
        );
    }

    #[test]
    fn test_post_layout_and_markdown() {
        let dir = fixture();
        let root = dir.path();
        let site = Site::new(config(root, BuildMode::Production)).unwrap();
        let _ = site.build(now()).unwrap();

        let post =
            fs::read_to_string(root.join("_site/posts/a/index.html")).unwrap();
        assert!(post.starts_with("<article><h1>Alpha</h1>"));
        assert!(post.contains(
            "<time datetime=\"2024-01-01\">Monday, 1 January 2024</time>"
        ));
        assert!(post.contains(r#"<h1 id="alpha">"#));
        assert!(post.contains("<ul><li>rust</li></ul>"));
    }

    #[test]
    fn test_preview_build_shows_everything() {
        let dir = fixture();
        let root = dir.path();
        let site = Site::new(config(root, BuildMode::Preview)).unwrap();

        let report = site.build(now()).unwrap();
        assert_eq!(report.pages_written, 5);
        assert_eq!(report.pages_skipped, 0);

        let home =
            fs::read_to_string(root.join("_site/index.html")).unwrap();
        assert!(home.contains("Alpha"));
        assert!(home.contains("Future"));
        assert!(home.contains("Draft"));
        assert!(home.ends_with("|rust;later;"));
    }

    #[test]
    fn test_item_without_layout_is_written_as_body() {
        let dir = fixture();
        let root = dir.path();
        let site = Site::new(config(root, BuildMode::Production)).unwrap();
        let _ = site.build(now()).unwrap();

        let page = fs::read_to_string(root.join("_site/404.html")).unwrap();
        assert_eq!(page, "<p>Not found.</p>\n");
    }

    #[test]
    fn test_missing_layout_is_an_error() {
        let dir = fixture();
        let root = dir.path();
        fs::write(
            root.join("about.md"),
            "---\nlayout: nowhere\n---\nAbout.\n",
        )
        .unwrap();
        let site = Site::new(config(root, BuildMode::Preview)).unwrap();

        assert!(matches!(
            site.build(now()),
            Err(BlogError::TemplateRendering { .. })
        ));
    }

    #[test]
    fn test_duplicate_output_paths_are_rejected() {
        let dir = fixture();
        let root = dir.path();
        fs::write(
            root.join("other.md"),
            "---\npermalink: 404.html\n---\nClash.\n",
        )
        .unwrap();
        let site = Site::new(config(root, BuildMode::Preview)).unwrap();

        assert!(matches!(
            site.build(now()),
            Err(BlogError::OutputGeneration { .. })
        ));
    }

    #[test]
    fn test_permalink_false_is_not_written() {
        let dir = fixture();
        let root = dir.path();
        fs::write(
            root.join("hidden.md"),
            "---\npermalink: false\n---\nHidden.\n",
        )
        .unwrap();
        let site = Site::new(config(root, BuildMode::Preview)).unwrap();

        let report = site.build(now()).unwrap();
        assert_eq!(report.pages_skipped, 1);
        assert!(!root.join("_site/hidden").exists());
    }

    #[test]
    fn test_new_rejects_missing_content_dir() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            content_dir: dir.path().join("absent"),
            ..Config::default()
        };
        assert!(matches!(Site::new(config), Err(BlogError::Config { .. })));
    }
}
