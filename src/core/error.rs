// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Error Handling for Blogsmith
//!
//! This module defines the error type shared by every stage of a site
//! build: configuration, content ingestion, Markdown rendering, templating,
//! output generation, and the preview server. The `thiserror` crate is used
//! to keep the variants and their messages in one place.

use std::path::PathBuf;
use thiserror::Error;

/// A unified result type for the Blogsmith library.
pub type Result<T> = std::result::Result<T, BlogError>;

/// The main error type for Blogsmith, encompassing all potential error cases.
#[derive(Error, Debug)]
pub enum BlogError {
    /// Error related to configuration loading or validation.
    #[error("Configuration error: {message}.")]
    Config {
        /// Detailed description of the configuration error.
        message: String,
        /// Optional path of the configuration file or directory involved.
        path: Option<PathBuf>,
    },

    /// Front matter of a content file could not be parsed.
    #[error("Front matter error in `{path:?}`: {message}.")]
    FrontMatter {
        /// Description of the parse failure.
        message: String,
        /// Content file whose front matter is invalid.
        path: PathBuf,
    },

    /// Error encountered while processing content.
    #[error("Content processing error: {message}.")]
    ContentProcessing {
        /// Detailed description of the content processing error.
        message: String,
        /// Optional source error providing additional context, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error related to template rendering.
    #[error("Template rendering error: {message} in template `{template}`.")]
    TemplateRendering {
        /// Description of the template rendering error.
        message: String,
        /// The template associated with the error.
        template: String,
        /// Optional source error providing additional context, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error in output generation.
    #[error("Output generation error: {message} at {path:?}.")]
    OutputGeneration {
        /// Description of the output generation error.
        message: String,
        /// Path associated with the error.
        path: PathBuf,
        /// Optional source error providing additional context, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// IO error encountered during file operations.
    #[error("File IO error at `{path:?}`: {source}")]
    Io {
        /// Path associated with the IO error.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The preview server could not start or answer a request.
    #[error("Serve error: {0}")]
    Serve(String),

    /// General internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for BlogError {
    /// Converts a standard IO error into a `BlogError::Io` with an empty path.
    fn from(source: std::io::Error) -> Self {
        BlogError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl BlogError {
    /// Creates a `Config` error with a specific message.
    pub fn config_error<S: Into<String>>(
        message: S,
        path: Option<PathBuf>,
    ) -> Self {
        BlogError::Config {
            message: message.into(),
            path,
        }
    }

    /// Creates a `FrontMatter` error for the given content file.
    pub fn front_matter_error<S: Into<String>>(
        message: S,
        path: PathBuf,
    ) -> Self {
        BlogError::FrontMatter {
            message: message.into(),
            path,
        }
    }

    /// Creates a `ContentProcessing` error with a message and optional source.
    pub fn content_processing_error<S: Into<String>>(
        message: S,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        BlogError::ContentProcessing {
            message: message.into(),
            source,
        }
    }

    /// Creates an `OutputGeneration` error with a message, path, and optional source.
    pub fn output_generation_error<S: Into<String>>(
        message: S,
        path: PathBuf,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        BlogError::OutputGeneration {
            message: message.into(),
            path,
            source,
        }
    }

    /// Creates a `TemplateRendering` error with a message, template name, and optional source.
    pub fn template_rendering_error<S: Into<String>>(
        message: S,
        template: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        BlogError::TemplateRendering {
            message: message.into(),
            template,
            source,
        }
    }

    /// Wraps an IO error as an `Io` variant with the specified path.
    pub fn io_error(path: PathBuf, source: std::io::Error) -> Self {
        BlogError::Io { path, source }
    }

    /// Creates a `Serve` error with a custom message.
    pub fn serve_error<S: Into<String>>(message: S) -> Self {
        BlogError::Serve(message.into())
    }

    /// Creates a general internal error with a custom message.
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        BlogError::Internal(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error_conversion_keeps_source() {
        let err: BlogError =
            io::Error::new(io::ErrorKind::NotFound, "gone").into();
        match err {
            BlogError::Io { path, source } => {
                assert_eq!(path, PathBuf::new());
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_front_matter_error_names_file() {
        let err = BlogError::front_matter_error(
            "expected a mapping",
            PathBuf::from("posts/broken.md"),
        );
        let message = err.to_string();
        assert!(message.contains("posts/broken.md"));
        assert!(message.contains("expected a mapping"));
    }

    #[test]
    fn test_config_error_display() {
        let err = BlogError::config_error("bad glob", None);
        assert_eq!(err.to_string(), "Configuration error: bad glob.");
    }
}
