// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Markdown Rendering
//!
//! Converts post bodies to HTML with `pulldown-cmark`, configured once:
//!
//! - raw HTML passes through untouched
//! - single line breaks become `<br />`
//! - bare `http(s)://` and `www.` URLs become links
//! - smart punctuation (curly quotes, en and em dashes)
//! - tables, strikethrough and footnotes
//!
//! Two rendering rules are replaced on top of the event stream:
//!
//! - **Heading anchors**: every heading gets an `id` slug and a trailing
//!   `<a class="direct-link" href="#slug">#</a>` permalink.
//! - **Footnote references**: footnotes are numbered by first reference. Each
//!   reference renders as `<sup class="footnote-ref">` linking to `#fnN`,
//!   labelled `N`. Repeated references to one footnote get the ids
//!   `fnrefN`, `fnrefN:2`, `fnrefN:3`, ... and the footnote list links back
//!   to every one of them.
//!
//! Rendering never fails on malformed input; anything the grammar cannot
//! parse comes out as literal text.
//!
//! ```rust
//! use blogsmith::processors::markdown::MarkdownRenderer;
//!
//! let renderer = MarkdownRenderer::new().unwrap();
//! let html = renderer.render("# Hello\n\nA note.[^1]\n\n[^1]: Footnote.\n");
//! assert!(html.contains(r#"<h1 id="hello">"#));
//! assert!(html.contains(r##"<a href="#fn1" id="fnref1">1</a>"##));
//! ```

use crate::core::error::{BlogError, Result};
use crate::ContentProcessor;
use handlebars::html_escape;
use pulldown_cmark::{
    html, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd,
    TextMergeStream,
};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

/// Maximum accepted size of a Markdown source in bytes (10MB).
pub const MAX_CONTENT_SIZE: usize = 10 * 1024 * 1024;

/// Bare URLs eligible for linkification.
const BARE_URL_PATTERN: &str = r#"(?i)\b(?:https?://|www\.)[^\s<>"']+"#;

/// Back-link glyph used in the footnote list.
const FOOTNOTE_BACKREF: &str = "\u{21a9}\u{fe0e}";

/// Markdown to HTML renderer with the site's fixed options.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
    bare_url: Regex,
}

impl MarkdownRenderer {
    /// Creates the renderer.
    pub fn new() -> Result<Self> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);

        let bare_url = Regex::new(BARE_URL_PATTERN).map_err(|e| {
            BlogError::internal_error(format!(
                "Failed to compile URL pattern: {}",
                e
            ))
        })?;

        Ok(Self { options, bare_url })
    }

    /// Renders `source` to HTML.
    pub fn render(&self, source: &str) -> String {
        let events: Vec<Event<'_>> =
            TextMergeStream::new(Parser::new_ext(source, self.options))
                .collect();
        let (body, definitions) = split_footnote_definitions(events);

        let mut state = RenderState {
            bare_url: &self.bare_url,
            definitions: &definitions,
            numbers: HashMap::new(),
            order: Vec::new(),
            ref_counts: Vec::new(),
            slugs: HashSet::new(),
        };

        let body = state.transform(body);
        let mut html_output = String::with_capacity(source.len() * 2);
        html::push_html(&mut html_output, body.into_iter());
        state.push_footnotes(&mut html_output);
        html_output
    }
}

impl ContentProcessor for MarkdownRenderer {
    fn process(
        &self,
        content: &str,
        _context: Option<&JsonValue>,
    ) -> Result<String> {
        self.validate(content)?;
        Ok(self.render(content))
    }

    fn validate(&self, content: &str) -> Result<()> {
        if content.len() > MAX_CONTENT_SIZE {
            return Err(BlogError::content_processing_error(
                format!(
                    "Content exceeds maximum size of {} bytes",
                    MAX_CONTENT_SIZE
                ),
                None,
            ));
        }
        Ok(())
    }
}

/// Slug used for heading ids: trimmed, lowercased, whitespace runs
/// replaced by `-`, then URI-component encoded.
pub fn slugify(text: &str) -> String {
    let joined = text
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");

    let mut slug = String::with_capacity(joined.len());
    for c in joined.chars() {
        if c.is_ascii_alphanumeric() || "-_.!~*'()".contains(c) {
            slug.push(c);
        } else {
            slug.push_str(&urlencoding::encode(c.encode_utf8(&mut [0; 4])));
        }
    }
    slug
}

/// Element id of the `occurrence`-th (1-based) reference to footnote
/// `number`.
pub fn footnote_ref_id(number: usize, occurrence: usize) -> String {
    if occurrence <= 1 {
        format!("fnref{number}")
    } else {
        format!("fnref{number}:{occurrence}")
    }
}

type Definitions<'a> = HashMap<String, Vec<Event<'a>>>;

fn split_footnote_definitions<'a>(
    events: Vec<Event<'a>>,
) -> (Vec<Event<'a>>, Definitions<'a>) {
    let mut body = Vec::with_capacity(events.len());
    let mut definitions = HashMap::new();
    let mut current: Option<(String, Vec<Event<'a>>)> = None;

    for event in events {
        match event {
            Event::Start(Tag::FootnoteDefinition(label)) => {
                current = Some((label.to_lowercase(), Vec::new()));
            }
            Event::End(TagEnd::FootnoteDefinition) => {
                if let Some((label, inner)) = current.take() {
                    let _ = definitions.entry(label).or_insert(inner);
                }
            }
            other => match current.as_mut() {
                Some((_, inner)) => inner.push(other),
                None => body.push(other),
            },
        }
    }

    (body, definitions)
}

fn is_anchor_open(html: &str) -> bool {
    let tag = html.trim_start().to_ascii_lowercase();
    tag.starts_with("<a ") || tag.starts_with("<a>") || tag.starts_with("<a\n")
}

fn is_anchor_close(html: &str) -> bool {
    html.trim().eq_ignore_ascii_case("</a>")
}

struct HeadingBuffer<'a> {
    level: HeadingLevel,
    text: String,
    events: Vec<Event<'a>>,
}

struct RenderState<'r, 'a> {
    bare_url: &'r Regex,
    definitions: &'r Definitions<'a>,
    numbers: HashMap<String, usize>,
    order: Vec<String>,
    ref_counts: Vec<usize>,
    slugs: HashSet<String>,
}

impl<'a> RenderState<'_, 'a> {
    fn transform(&mut self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        let mut out = Vec::with_capacity(events.len());
        let mut heading: Option<HeadingBuffer<'a>> = None;
        let mut link_depth = 0usize;
        let mut in_code_block = false;

        for event in events {
            let mapped = match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    heading = Some(HeadingBuffer {
                        level,
                        text: String::new(),
                        events: Vec::new(),
                    });
                    continue;
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some(buffer) = heading.take() {
                        self.close_heading(buffer, &mut out);
                    }
                    continue;
                }
                Event::Start(Tag::Link { .. } | Tag::Image { .. }) => {
                    link_depth += 1;
                    vec![event]
                }
                Event::End(TagEnd::Link | TagEnd::Image) => {
                    link_depth = link_depth.saturating_sub(1);
                    vec![event]
                }
                Event::InlineHtml(raw) => {
                    if is_anchor_open(&raw) {
                        link_depth += 1;
                    } else if is_anchor_close(&raw) {
                        link_depth = link_depth.saturating_sub(1);
                    }
                    vec![Event::InlineHtml(raw)]
                }
                Event::Start(Tag::CodeBlock(_)) => {
                    in_code_block = true;
                    vec![event]
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    vec![event]
                }
                Event::SoftBreak => vec![Event::HardBreak],
                Event::FootnoteReference(label) => {
                    match self.reference(&label) {
                        Some(markup) => vec![Event::InlineHtml(markup.into())],
                        None => {
                            vec![Event::Text(format!("[^{label}]").into())]
                        }
                    }
                }
                Event::Text(text) => {
                    if let Some(buffer) = heading.as_mut() {
                        buffer.text.push_str(&text);
                    }
                    if link_depth == 0 && !in_code_block {
                        self.linkify(text)
                    } else {
                        vec![Event::Text(text)]
                    }
                }
                Event::Code(code) => {
                    if let Some(buffer) = heading.as_mut() {
                        buffer.text.push_str(&code);
                    }
                    vec![Event::Code(code)]
                }
                other => vec![other],
            };

            match heading.as_mut() {
                Some(buffer) => buffer.events.extend(mapped),
                None => out.extend(mapped),
            }
        }

        out
    }

    fn close_heading(
        &mut self,
        buffer: HeadingBuffer<'a>,
        out: &mut Vec<Event<'a>>,
    ) {
        let slug = self.unique_slug(&buffer.text);
        let level = buffer.level;
        out.push(Event::Html(format!("<{level} id=\"{slug}\">").into()));
        out.extend(buffer.events);
        out.push(Event::Html(
            format!(
                " <a class=\"direct-link\" href=\"#{slug}\">#</a></{level}>\n"
            )
            .into(),
        ));
    }

    fn unique_slug(&mut self, text: &str) -> String {
        let slug = slugify(text);
        let mut candidate = slug.clone();
        let mut suffix = 2;
        while self.slugs.contains(&candidate) {
            candidate = format!("{slug}-{suffix}");
            suffix += 1;
        }
        let _ = self.slugs.insert(candidate.clone());
        candidate
    }

    /// Markup for one footnote reference, or `None` for an undefined label.
    fn reference(&mut self, label: &str) -> Option<String> {
        let key = label.to_lowercase();
        if !self.definitions.contains_key(&key) {
            return None;
        }

        let number = match self.numbers.get(&key) {
            Some(number) => *number,
            None => {
                self.order.push(key.clone());
                self.ref_counts.push(0);
                let number = self.order.len();
                let _ = self.numbers.insert(key, number);
                number
            }
        };

        let count = &mut self.ref_counts[number - 1];
        *count += 1;
        let ref_id = footnote_ref_id(number, *count);

        Some(format!(
            "<sup class=\"footnote-ref\"><a href=\"#fn{number}\" id=\"{ref_id}\">{number}</a></sup>"
        ))
    }

    fn linkify(&self, text: CowStr<'a>) -> Vec<Event<'a>> {
        if !self.bare_url.is_match(&text) {
            return vec![Event::Text(text)];
        }

        let mut events = Vec::new();
        let mut last = 0;
        for found in self.bare_url.find_iter(&text) {
            let url = found.as_str().trim_end_matches(|c: char| {
                matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')')
            });
            let start = found.start();
            // The domain part of an email address stays text.
            if url.is_empty() || text[..start].ends_with('@') {
                continue;
            }
            if start > last {
                events.push(Event::Text(text[last..start].to_string().into()));
            }
            let href = if url.to_lowercase().starts_with("www.") {
                format!("http://{url}")
            } else {
                url.to_string()
            };
            events.push(Event::InlineHtml(
                format!(
                    "<a href=\"{}\">{}</a>",
                    html_escape(&href),
                    html_escape(url)
                )
                .into(),
            ));
            last = start + url.len();
        }
        if last < text.len() {
            events.push(Event::Text(text[last..].to_string().into()));
        }
        events
    }

    fn push_footnotes(&mut self, html_output: &mut String) {
        if self.order.is_empty() {
            return;
        }

        // Definitions may reference further footnotes, growing `order` and
        // `ref_counts`, so back-links wait until every body is rendered.
        let mut bodies = Vec::new();
        while bodies.len() < self.order.len() {
            let definition = self
                .definitions
                .get(&self.order[bodies.len()])
                .cloned()
                .unwrap_or_default();
            let events = self.transform(definition);

            let mut body = String::new();
            html::push_html(&mut body, events.into_iter());
            bodies.push(body);
        }

        let mut items = String::new();
        for (index, body) in bodies.iter().enumerate() {
            let number = index + 1;
            let backrefs = (1..=self.ref_counts[index])
                .map(|occurrence| {
                    format!(
                        "<a href=\"#{}\" class=\"footnote-backref\">{}</a>",
                        footnote_ref_id(number, occurrence),
                        FOOTNOTE_BACKREF
                    )
                })
                .collect::<Vec<_>>()
                .join(" ");

            let body = match body.strip_suffix("</p>\n") {
                Some(paragraph) => format!("{paragraph} {backrefs}</p>\n"),
                None => format!("{body}{backrefs}\n"),
            };
            items.push_str(&format!(
                "<li id=\"fn{number}\" class=\"footnote-item\">{body}</li>\n"
            ));
        }

        html_output.push_str(
            "<hr class=\"footnotes-sep\" />\n<section class=\"footnotes\">\n<ol class=\"footnotes-list\">\n",
        );
        html_output.push_str(&items);
        html_output.push_str("</ol>\n</section>\n");
    }
}
