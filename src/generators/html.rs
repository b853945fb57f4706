// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # HTML Output Generation
//!
//! Writes rendered pages into the output tree and copies passthrough files
//! next to them.
//!
//! # Features
//!
//! - Parent directories created on demand
//! - Optional minification through `minify-html`
//! - Passthrough copy of single files or whole directories
//!
//! ```rust,no_run
//! use blogsmith::generators::html::HtmlGenerator;
//! use blogsmith::OutputGenerator;
//! use std::path::Path;
//!
//! let generator = HtmlGenerator::new().with_minification(true);
//! generator
//!     .generate("<p>Hello</p>", Path::new("_site/index.html"), None)
//!     .unwrap();
//! ```

use crate::core::config::PassthroughCopy;
use crate::core::error::{BlogError, Result};
use crate::OutputGenerator;
use log::{debug, warn};
use minify_html::{minify, Cfg};
use serde_json::Value as JsonValue;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Writes pages and static files into the output tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlGenerator {
    minify: bool,
}

impl HtmlGenerator {
    /// Creates a generator that writes pages unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables HTML minification.
    pub fn with_minification(mut self, enable: bool) -> Self {
        self.minify = enable;
        self
    }

    /// Returns `true` if pages are minified before writing.
    pub fn minifies(&self) -> bool {
        self.minify
    }

    /// Minifies HTML content using the `minify-html` crate.
    fn minify_html(&self, content: &str, path: &Path) -> Result<String> {
        let cfg = Cfg {
            minify_css: true,
            minify_js: true,
            ..Cfg::default()
        };
        String::from_utf8(minify(content.as_bytes(), &cfg)).map_err(|e| {
            BlogError::output_generation_error(
                "HTML minification failed",
                path.to_path_buf(),
                Some(Box::new(e)),
            )
        })
    }

    /// Writes raw bytes to `path`, creating parent directories.
    pub fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| BlogError::io_error(parent.to_path_buf(), e))?;
        }
        let file = File::create(path)
            .map_err(|e| BlogError::io_error(path.to_path_buf(), e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(bytes)
            .and_then(|()| writer.flush())
            .map_err(|e| BlogError::io_error(path.to_path_buf(), e))
    }

    /// Copies one passthrough entry from `root` into `output_dir`.
    ///
    /// Directories are copied recursively. A missing source is skipped with
    /// a warning. Returns the number of files copied.
    pub fn copy_passthrough(
        &self,
        root: &Path,
        output_dir: &Path,
        copy: &PassthroughCopy,
    ) -> Result<usize> {
        let source = root.join(&copy.from);
        let target = output_dir.join(copy.to.as_ref().unwrap_or(&copy.from));

        if !source.exists() {
            warn!("Passthrough source {} does not exist", source.display());
            return Ok(0);
        }

        if source.is_file() {
            self.copy_file(&source, &target)?;
            return Ok(1);
        }

        let mut copied = 0;
        for entry in WalkDir::new(&source).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                BlogError::output_generation_error(
                    "Failed to read passthrough directory",
                    source.clone(),
                    Some(Box::new(e)),
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&source).map_err(|e| {
                BlogError::output_generation_error(
                    "Invalid passthrough path",
                    entry.path().to_path_buf(),
                    Some(Box::new(e)),
                )
            })?;
            self.copy_file(entry.path(), &target.join(relative))?;
            copied += 1;
        }
        Ok(copied)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| BlogError::io_error(parent.to_path_buf(), e))?;
        }
        let _ = fs::copy(from, to)
            .map_err(|e| BlogError::io_error(from.to_path_buf(), e))?;
        debug!("Copied {} to {}", from.display(), to.display());
        Ok(())
    }
}

impl OutputGenerator for HtmlGenerator {
    fn generate(
        &self,
        content: &str,
        path: &Path,
        options: Option<&JsonValue>,
    ) -> Result<()> {
        self.validate(path, options)?;

        let minify = options
            .and_then(|o| o.get("minify"))
            .and_then(JsonValue::as_bool)
            .unwrap_or(self.minify);
        let output = if minify {
            self.minify_html(content, path)?
        } else {
            content.to_string()
        };

        self.write_file(path, output.as_bytes())?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    fn validate(
        &self,
        path: &Path,
        _options: Option<&JsonValue>,
    ) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(BlogError::output_generation_error(
                "Output path is empty",
                PathBuf::new(),
                None,
            ));
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(BlogError::output_generation_error(
                "Output path must not contain `..`",
                path.to_path_buf(),
                None,
            ));
        }
        if path.is_dir() {
            return Err(BlogError::output_generation_error(
                "Output path is a directory",
                path.to_path_buf(),
                None,
            ));
        }
        Ok(())
    }
}
