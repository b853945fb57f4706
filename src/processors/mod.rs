// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Content Processors
//!
//! Turns the body of a [`ContentItem`](crate::content::ContentItem) into
//! HTML. Each processor implements [`ContentProcessor`]:
//!
//! - [`markdown`]: Markdown bodies, rendered with heading anchors and
//!   footnotes
//! - [`HtmlPassthrough`]: `.html` bodies, emitted unchanged
//!
//! ```rust
//! use blogsmith::processors::processor_for;
//! use blogsmith::content::ContentKind;
//!
//! let processor = processor_for(ContentKind::Html).unwrap();
//! let html = processor.process("<p>hi</p>", None).unwrap();
//! assert_eq!(html, "<p>hi</p>");
//! ```

use crate::content::ContentKind;
use crate::core::error::Result;
use crate::ContentProcessor;
use serde_json::Value as JsonValue;

/// Markdown processing functionality.
pub mod markdown;

pub use markdown::MarkdownRenderer;

/// Processor for bodies that are already HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlPassthrough;

impl ContentProcessor for HtmlPassthrough {
    fn process(
        &self,
        content: &str,
        _context: Option<&JsonValue>,
    ) -> Result<String> {
        Ok(content.to_string())
    }

    fn validate(&self, _content: &str) -> Result<()> {
        Ok(())
    }
}

/// Returns the processor responsible for a body of the given kind.
pub fn processor_for(kind: ContentKind) -> Result<Box<dyn ContentProcessor>> {
    Ok(match kind {
        ContentKind::Markdown => Box::new(MarkdownRenderer::new()?),
        ContentKind::Html => Box::new(HtmlPassthrough),
    })
}
