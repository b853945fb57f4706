// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Template Rendering Module
//!
//! Handlebars layouts and the helpers templates use to present posts.
//!
//! ## Features
//!
//! - Recursive loading of `*.hbs` files, named by relative path without the
//!   extension (`_includes/layouts/post.hbs` is `layouts/post`)
//! - Every template doubles as a partial (`{{> layouts/base}}`)
//! - Value-returning helpers usable in subexpressions:
//!   `readableDate`, `htmlDateString`, `head`, `min`, `filterTagList`,
//!   `publishedPosts`
//!
//! ```handlebars
//! {{#each (head (publishedPosts collections.posts) -3)}}
//!   <time datetime="{{htmlDateString date}}">{{readableDate date}}</time>
//! {{/each}}
//! ```

use crate::collections::{filter_tag_list, is_published};
use crate::content::ContentItem;
use crate::core::config::BuildMode;
use crate::core::error::{BlogError, Result};
use crate::dates::{html_date_string, parse_date, readable_date};
use crate::TemplateRenderer;
use chrono::{DateTime, SecondsFormat, Utc};
use handlebars::{
    Context, Handlebars, Helper, HelperDef, RenderContext, RenderError,
    RenderErrorReason, ScopedJson,
};
use log::debug;
use parking_lot::RwLock;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Template file extension.
pub const TEMPLATE_EXTENSION: &str = "hbs";

/// A value-returning template helper.
pub trait TemplateHelper: Send + Sync {
    /// Computes the helper's value from its positional parameters.
    fn execute(
        &self,
        params: &[JsonValue],
        context: &JsonValue,
    ) -> Result<JsonValue>;

    /// Name the helper is registered under.
    fn name(&self) -> &str;
}

/// Adapts a [`TemplateHelper`] to Handlebars so its result can feed
/// subexpressions and block helpers, not only output.
struct HelperBridge<H>(H);

impl<H: TemplateHelper> HelperDef for HelperBridge<H> {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> std::result::Result<ScopedJson<'rc>, RenderError> {
        let params: Vec<JsonValue> =
            h.params().iter().map(|p| p.value().clone()).collect();
        let value = self.0.execute(&params, ctx.data()).map_err(|e| {
            RenderError::from(RenderErrorReason::Other(e.to_string()))
        })?;
        Ok(ScopedJson::Derived(value))
    }
}

/// Renderer for Handlebars templates with the site helpers registered.
#[derive(Clone)]
pub struct HandlebarsRenderer {
    engine: Arc<RwLock<Handlebars<'static>>>, // Handlebars engine
    template_dir: PathBuf,                    // Directory for templates
    template_cache: Arc<RwLock<HashMap<String, String>>>, // Loaded sources by name
    strict_mode: bool,
}

impl std::fmt::Debug for HandlebarsRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlebarsRenderer")
            .field("template_dir", &self.template_dir)
            .field("templates", &self.template_cache.read().len())
            .field("strict_mode", &self.strict_mode)
            .finish()
    }
}

impl HandlebarsRenderer {
    /// Creates a renderer loading every template under `template_dir`.
    ///
    /// A missing template directory yields a renderer with no templates;
    /// pages are then written as their rendered body.
    pub fn new(
        template_dir: &Path,
        mode: BuildMode,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::html_escape);

        let renderer = Self {
            engine: Arc::new(RwLock::new(handlebars)),
            template_dir: template_dir.to_path_buf(),
            template_cache: Arc::new(RwLock::new(HashMap::new())),
            strict_mode: false,
        }
        .with_helper(helpers::ReadableDateHelper)
        .with_helper(helpers::HtmlDateStringHelper)
        .with_helper(helpers::HeadHelper)
        .with_helper(helpers::MinHelper)
        .with_helper(helpers::FilterTagListHelper)
        .with_helper(helpers::PublishedPostsHelper { mode, now });

        renderer.load_templates()?;
        Ok(renderer)
    }

    /// Enables or disables strict mode, making missing variables an error.
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self.engine.write().set_strict_mode(strict);
        self
    }

    /// Registers a custom helper with the renderer.
    pub fn with_helper<H>(self, helper: H) -> Self
    where
        H: TemplateHelper + 'static,
    {
        let name = helper.name().to_string();
        self.engine
            .write()
            .register_helper(&name, Box::new(HelperBridge(helper)));
        self
    }

    /// Registers a template from a string under `name`.
    pub fn with_template(self, name: &str, source: &str) -> Result<Self> {
        self.register(name, source)?;
        Ok(self)
    }

    /// Returns `true` if a template named `name` is loaded.
    pub fn has_template(&self, name: &str) -> bool {
        self.template_cache.read().contains_key(name)
    }

    /// Names of all loaded templates, sorted.
    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.template_cache.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn register(&self, name: &str, source: &str) -> Result<()> {
        self.engine
            .write()
            .register_template_string(name, source)
            .map_err(|e| {
                BlogError::template_rendering_error(
                    format!("Failed to register template: {}", e),
                    name.to_string(),
                    Some(Box::new(e)),
                )
            })?;
        let _ = self
            .template_cache
            .write()
            .insert(name.to_string(), source.to_string());
        Ok(())
    }

    /// Loads every template under the template directory.
    fn load_templates(&self) -> Result<()> {
        if !self.template_dir.is_dir() {
            debug!(
                "Template directory {} not found, no layouts loaded",
                self.template_dir.display()
            );
            return Ok(());
        }

        for entry in WalkDir::new(&self.template_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                BlogError::template_rendering_error(
                    format!("Failed to read template directory: {}", e),
                    String::new(),
                    Some(Box::new(e)),
                )
            })?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|s| s.to_str())
                    != Some(TEMPLATE_EXTENSION)
            {
                continue;
            }

            let name = template_name(&self.template_dir, path)
                .ok_or_else(|| {
                    BlogError::template_rendering_error(
                        "Invalid template filename",
                        path.display().to_string(),
                        None,
                    )
                })?;
            let source = std::fs::read_to_string(path)
                .map_err(|e| BlogError::io_error(path.to_path_buf(), e))?;

            self.register(&name, &source)?;
            debug!("Loaded template {} from {}", name, path.display());
        }
        Ok(())
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn render(
        &self,
        template: &str,
        context: &JsonValue,
    ) -> Result<String> {
        self.validate(template, context)?;
        self.engine.read().render(template, context).map_err(|e| {
            BlogError::template_rendering_error(
                format!("Template rendering failed: {}", e),
                template.to_string(),
                Some(Box::new(e)),
            )
        })
    }

    fn validate(
        &self,
        template: &str,
        context: &JsonValue,
    ) -> Result<()> {
        if !self.has_template(template) {
            return Err(BlogError::template_rendering_error(
                format!("Template '{}' not found", template),
                template.to_string(),
                None,
            ));
        }
        if !context.is_object() {
            return Err(BlogError::template_rendering_error(
                "Template context must be an object",
                template.to_string(),
                None,
            ));
        }
        Ok(())
    }
}

/// Template name of `path`: its path relative to `root`, `/`-separated,
/// without the extension.
fn template_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let parts: Option<Vec<&str>> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect();
    let name = parts?.join("/");
    (!name.is_empty()).then_some(name)
}

/// Serialises a timestamp the way templates receive dates.
pub fn date_value(date: &DateTime<Utc>) -> JsonValue {
    JsonValue::String(date.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Describes an item as a template value.
///
/// Extra front-matter keys appear under `data`.
pub fn page_data(item: &ContentItem) -> JsonValue {
    json!({
        "url": item.url(),
        "inputPath": item.input_path,
        "outputPath": item
            .output_path()
            .map(|p| p.to_string_lossy().replace('\\', "/")),
        "date": date_value(&item.date),
        "draft": item.draft,
        "tags": item.tags,
        "title": item.title,
        "description": item.description,
        "data": item.data,
    })
}

/// Built-in helpers for template processing.
pub mod helpers {
    use super::*;

    fn date_param(name: &str, params: &[JsonValue]) -> Result<DateTime<Utc>> {
        let value = params.first().and_then(JsonValue::as_str).ok_or_else(
            || {
                BlogError::template_rendering_error(
                    format!("{name} requires a date parameter"),
                    String::new(),
                    None,
                )
            },
        )?;
        parse_date(value).ok_or_else(|| {
            BlogError::template_rendering_error(
                format!("{name}: invalid date `{value}`"),
                String::new(),
                None,
            )
        })
    }

    /// `{{readableDate date}}` → `Wednesday, 10 January 2024`.
    #[derive(Debug, Clone, Copy)]
    pub struct ReadableDateHelper;

    impl TemplateHelper for ReadableDateHelper {
        fn execute(
            &self,
            params: &[JsonValue],
            _context: &JsonValue,
        ) -> Result<JsonValue> {
            let date = date_param(self.name(), params)?;
            Ok(JsonValue::String(readable_date(&date)))
        }

        fn name(&self) -> &str {
            "readableDate"
        }
    }

    /// `{{htmlDateString date}}` → `2024-01-10`.
    #[derive(Debug, Clone, Copy)]
    pub struct HtmlDateStringHelper;

    impl TemplateHelper for HtmlDateStringHelper {
        fn execute(
            &self,
            params: &[JsonValue],
            _context: &JsonValue,
        ) -> Result<JsonValue> {
            let date = date_param(self.name(), params)?;
            Ok(JsonValue::String(html_date_string(&date)))
        }

        fn name(&self) -> &str {
            "htmlDateString"
        }
    }

    /// `(head items n)`: the first `n` elements, or the last `-n` for a
    /// negative `n`. Non-arrays and empty arrays give `[]`.
    #[derive(Debug, Clone, Copy)]
    pub struct HeadHelper;

    impl TemplateHelper for HeadHelper {
        fn execute(
            &self,
            params: &[JsonValue],
            _context: &JsonValue,
        ) -> Result<JsonValue> {
            let items = match params.first() {
                Some(JsonValue::Array(items)) => items,
                _ => return Ok(JsonValue::Array(Vec::new())),
            };
            let n = params.get(1).and_then(JsonValue::as_i64).ok_or_else(
                || {
                    BlogError::template_rendering_error(
                        "head requires a numeric count",
                        String::new(),
                        None,
                    )
                },
            )?;

            let len = items.len();
            let count = usize::try_from(n.unsigned_abs())
                .unwrap_or(usize::MAX)
                .min(len);
            let slice = if n < 0 {
                &items[len - count..]
            } else {
                &items[..count]
            };
            Ok(JsonValue::Array(slice.to_vec()))
        }

        fn name(&self) -> &str {
            "head"
        }
    }

    /// `(min a b c)`: the smallest numeric parameter, `null` with none.
    #[derive(Debug, Clone, Copy)]
    pub struct MinHelper;

    impl TemplateHelper for MinHelper {
        fn execute(
            &self,
            params: &[JsonValue],
            _context: &JsonValue,
        ) -> Result<JsonValue> {
            let mut smallest: Option<(f64, &JsonValue)> = None;
            for param in params {
                let n = param.as_f64().ok_or_else(|| {
                    BlogError::template_rendering_error(
                        format!("min expects numbers, got `{param}`"),
                        String::new(),
                        None,
                    )
                })?;
                if smallest.map_or(true, |(current, _)| n < current) {
                    smallest = Some((n, param));
                }
            }
            Ok(smallest.map_or(JsonValue::Null, |(_, value)| value.clone()))
        }

        fn name(&self) -> &str {
            "min"
        }
    }

    /// `(filterTagList tags)`: drops the reserved collection tags.
    #[derive(Debug, Clone, Copy)]
    pub struct FilterTagListHelper;

    impl TemplateHelper for FilterTagListHelper {
        fn execute(
            &self,
            params: &[JsonValue],
            _context: &JsonValue,
        ) -> Result<JsonValue> {
            let tags: Vec<String> = match params.first() {
                Some(JsonValue::Array(values)) => values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
                _ => Vec::new(),
            };
            Ok(json!(filter_tag_list(&tags)))
        }

        fn name(&self) -> &str {
            "filterTagList"
        }
    }

    /// `(publishedPosts items)`: applies the publication filter of the
    /// current build to a list of page values.
    #[derive(Debug, Clone, Copy)]
    pub struct PublishedPostsHelper {
        /// Build mode of the current build.
        pub mode: BuildMode,
        /// Build time of the current build.
        pub now: DateTime<Utc>,
    }

    impl PublishedPostsHelper {
        fn keeps(&self, page: &JsonValue) -> bool {
            let date = page
                .get("date")
                .and_then(JsonValue::as_str)
                .and_then(parse_date);
            let Some(date) = date else {
                return false;
            };
            let draft = page
                .get("draft")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false);
            let path = page
                .get("inputPath")
                .and_then(JsonValue::as_str)
                .unwrap_or_default();
            is_published(
                &ContentItem::new(path, date).with_draft(draft),
                &self.now,
            )
        }
    }

    impl TemplateHelper for PublishedPostsHelper {
        fn execute(
            &self,
            params: &[JsonValue],
            _context: &JsonValue,
        ) -> Result<JsonValue> {
            let pages = match params.first() {
                Some(JsonValue::Array(pages)) => pages,
                _ => return Ok(JsonValue::Array(Vec::new())),
            };
            if !self.mode.is_production() {
                return Ok(JsonValue::Array(pages.clone()));
            }
            Ok(JsonValue::Array(
                pages.iter().filter(|p| self.keeps(p)).cloned().collect(),
            ))
        }

        fn name(&self) -> &str {
            "publishedPosts"
        }
    }
}
