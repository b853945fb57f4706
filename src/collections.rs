// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Collections
//!
//! Decides which content is visible and groups it for templates.
//!
//! - [`is_published`] / [`published`]: the publication filter. Drafts and
//!   future-dated items are hidden in [`BuildMode::Production`] and shown in
//!   [`BuildMode::Preview`].
//! - [`tag_list`]: unique tags in first-seen order, minus structural tags.
//! - [`Glob`] / [`select_by_glob`]: path-pattern selection that keeps the
//!   content index's discovery order.
//! - [`Collections`]: the named collections handed to templates.
//!
//! Nothing here sorts by date; ordering by date is a template concern.

use crate::content::{ContentIndex, ContentItem};
use crate::core::config::BuildMode;
use crate::core::error::{BlogError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

/// Tags that group content structurally and never appear in the tag list.
pub const TAG_DENYLIST: [&str; 4] = ["all", "nav", "post", "posts"];

/// Returns `true` when `item` is dated at or before `now` and is not a draft.
pub fn is_published(item: &ContentItem, now: &DateTime<Utc>) -> bool {
    item.date <= *now && !item.draft
}

/// Applies the publication filter.
///
/// In production only published items are kept, in their original relative
/// order. In preview the input is returned unchanged.
pub fn published<'a>(
    items: &[&'a ContentItem],
    mode: BuildMode,
    now: &DateTime<Utc>,
) -> Vec<&'a ContentItem> {
    match mode {
        BuildMode::Production => items
            .iter()
            .copied()
            .filter(|item| is_published(item, now))
            .collect(),
        BuildMode::Preview => items.to_vec(),
    }
}

/// Removes structural tags from one item's tags.
pub fn filter_tag_list(tags: &[String]) -> Vec<String> {
    tags.iter()
        .filter(|tag| !TAG_DENYLIST.contains(&tag.as_str()))
        .cloned()
        .collect()
}

/// Collects the unique tags of `items` in order of first appearance,
/// excluding [`TAG_DENYLIST`]. Tags compare byte for byte.
pub fn tag_list(items: &[&ContentItem]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut ordered: Vec<String> = Vec::new();

    for item in items {
        for tag in &item.tags {
            if seen.insert(tag.as_str()) {
                ordered.push(tag.clone());
            }
        }
    }

    filter_tag_list(&ordered)
}

/// A compiled path glob.
///
/// Supports `**` (any number of directories), `*` (anything but `/`), `?`
/// (one character but `/`), and `{a,b}` alternatives. A leading `./` is
/// ignored on both the pattern and the matched path.
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    /// Compiles `pattern`.
    pub fn new(pattern: &str) -> Result<Self> {
        let source = glob_to_regex(pattern)?;
        let regex = Regex::new(&source).map_err(|e| {
            BlogError::config_error(
                format!("Invalid glob `{}`: {}", pattern, e),
                None,
            )
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Tests a `/`-separated path relative to the content directory.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path.trim_start_matches("./"))
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

fn glob_to_regex(pattern: &str) -> Result<String> {
    let unclosed = || {
        BlogError::config_error(
            format!("Invalid glob `{}`: unbalanced braces", pattern),
            None,
        )
    };

    let mut out = String::from("^");
    let mut in_group = false;
    let mut chars = pattern.trim_start_matches("./").chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                let _ = chars.next();
                if chars.peek() == Some(&'/') {
                    let _ = chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '{' if in_group => return Err(unclosed()),
            '{' => {
                in_group = true;
                out.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            '}' => return Err(unclosed()),
            ',' if in_group => out.push('|'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }

    if in_group {
        return Err(unclosed());
    }
    out.push('$');
    Ok(out)
}

/// Selects the items whose input path matches `glob`, in index order.
pub fn select_by_glob<'a>(
    glob: &Glob,
    items: &'a [ContentItem],
) -> Vec<&'a ContentItem> {
    items
        .iter()
        .filter(|item| glob.is_match(&item.input_path))
        .collect()
}

/// The named collections of one build.
///
/// Every collection has been through the publication filter, so in
/// production no draft or future-dated item (and none of their tags) shows
/// up anywhere here.
#[derive(Debug, Clone)]
pub struct Collections<'a> {
    all: Vec<&'a ContentItem>,
    posts: Vec<&'a ContentItem>,
    tag_list: Vec<String>,
    by_tag: BTreeMap<String, Vec<&'a ContentItem>>,
}

impl<'a> Collections<'a> {
    /// Derives every collection from the content index.
    pub fn build(
        index: &'a ContentIndex,
        posts_glob: &Glob,
        mode: BuildMode,
        now: &DateTime<Utc>,
    ) -> Self {
        let everything: Vec<&'a ContentItem> = index.items().iter().collect();
        let all = published(&everything, mode, now);
        let posts = published(
            &select_by_glob(posts_glob, index.items()),
            mode,
            now,
        );
        let public_tags = tag_list(&all);

        let mut by_tag: BTreeMap<String, Vec<&'a ContentItem>> =
            BTreeMap::new();
        for item in &all {
            let mut seen = HashSet::new();
            for tag in &item.tags {
                if seen.insert(tag.as_str()) {
                    by_tag.entry(tag.clone()).or_default().push(*item);
                }
            }
        }

        Self {
            all,
            posts,
            tag_list: public_tags,
            by_tag,
        }
    }

    /// Every visible item.
    pub fn all(&self) -> &[&'a ContentItem] {
        &self.all
    }

    /// Visible items matching the posts glob.
    pub fn posts(&self) -> &[&'a ContentItem] {
        &self.posts
    }

    /// Public tag list.
    pub fn tag_list(&self) -> &[String] {
        &self.tag_list
    }

    /// Visible items carrying `tag`, structural tags included.
    pub fn tagged(&self, tag: &str) -> &[&'a ContentItem] {
        self.by_tag.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every tag that has a collection, in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_tag.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ymd(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn item(path: &str, date: DateTime<Utc>) -> ContentItem {
        ContentItem::new(path, date)
    }

    #[test]
    fn test_draft_hidden_in_production() {
        let now = ymd(2024, 1, 10);
        let draft = item("posts/a.md", ymd(2024, 1, 1)).with_draft(true);
        assert!(published(&[&draft], BuildMode::Production, &now).is_empty());
        assert_eq!(published(&[&draft], BuildMode::Preview, &now), vec![&draft]);
    }

    #[test]
    fn test_future_dated_hidden_only_in_production() {
        let now = ymd(2024, 1, 10);
        let future = item("posts/b.md", ymd(2024, 2, 1));
        assert!(published(&[&future], BuildMode::Production, &now).is_empty());
        assert_eq!(
            published(&[&future], BuildMode::Preview, &now),
            vec![&future]
        );
    }

    #[test]
    fn test_published_keeps_order_and_boundary() {
        let now = ymd(2024, 1, 10);
        let a = item("posts/a.md", ymd(2024, 1, 1));
        let b = item("posts/b.md", ymd(2024, 2, 1));
        let c = item("posts/c.md", now);
        let result = published(&[&c, &a, &b], BuildMode::Production, &now);
        assert_eq!(result, vec![&c, &a]);
        assert!(is_published(&c, &now));
    }

    #[test]
    fn test_published_example() {
        let now = ymd(2024, 1, 10);
        let a = item("posts/a.md", ymd(2024, 1, 1));
        let b = item("posts/b.md", ymd(2024, 2, 1));
        assert_eq!(
            published(&[&a, &b], BuildMode::Production, &now),
            vec![&a]
        );
    }

    #[test]
    fn test_tag_list_example() {
        let date = ymd(2024, 1, 1);
        let first = item("a.md", date).with_tags(["x", "nav"]);
        let second = item("b.md", date).with_tags(["y", "x"]);
        let untagged = item("c.md", date);
        let items = [&first, &second, &untagged];
        assert_eq!(tag_list(&items), vec!["x", "y"]);
        assert_eq!(tag_list(&items), tag_list(&items));
    }

    #[test]
    fn test_tag_list_excludes_denylist_and_is_case_sensitive() {
        let date = ymd(2024, 1, 1);
        let first = item("a.md", date)
            .with_tags(["all", "posts", "Rust", "post", "nav"]);
        let second = item("b.md", date).with_tags(["rust", " rust"]);
        let tags = tag_list(&[&first, &second]);
        assert_eq!(tags, vec!["Rust", "rust", " rust"]);
        for denied in TAG_DENYLIST {
            assert!(!tags.iter().any(|t| t == denied));
        }
    }

    #[test]
    fn test_filter_tag_list() {
        let tags = vec!["post".to_string(), "rust".to_string()];
        assert_eq!(filter_tag_list(&tags), vec!["rust"]);
    }

    #[test]
    fn test_glob_matching() {
        let glob = Glob::new("posts/**/*.md").unwrap();
        assert!(glob.is_match("posts/a.md"));
        assert!(glob.is_match("posts/2024/a.md"));
        assert!(glob.is_match("./posts/a.md"));
        assert!(!glob.is_match("posts/a.html"));
        assert!(!glob.is_match("drafts/posts/a.md"));
        assert!(!glob.is_match("posts.md"));

        let glob = Glob::new("./{about,uses}/*.md").unwrap();
        assert!(glob.is_match("about/index.md"));
        assert!(glob.is_match("uses/index.md"));
        assert!(!glob.is_match("about/team/index.md"));

        let glob = Glob::new("notes/?.md").unwrap();
        assert!(glob.is_match("notes/a.md"));
        assert!(!glob.is_match("notes/ab.md"));

        let glob = Glob::new("a+b(c).md").unwrap();
        assert!(glob.is_match("a+b(c).md"));
        assert_eq!(glob.as_str(), "a+b(c).md");
    }

    #[test]
    fn test_glob_rejects_unbalanced_braces() {
        assert!(Glob::new("posts/{a,b").is_err());
        assert!(Glob::new("posts/a}").is_err());
    }

    #[test]
    fn test_select_by_glob_keeps_discovery_order() {
        let items = vec![
            item("posts/z.md", ymd(2024, 1, 1)),
            item("about.md", ymd(2024, 1, 2)),
            item("posts/a.md", ymd(2023, 1, 1)),
        ];
        let glob = Glob::new("posts/**/*.md").unwrap();
        let selected: Vec<&str> = select_by_glob(&glob, &items)
            .iter()
            .map(|i| i.input_path.as_str())
            .collect();
        assert_eq!(selected, vec!["posts/z.md", "posts/a.md"]);
    }

    #[test]
    fn test_collections_hide_unpublished_tags() {
        let now = ymd(2024, 1, 10);
        let index = ContentIndex::from_items(vec![
            item("posts/a.md", ymd(2024, 1, 1)).with_tags(["post", "rust"]),
            item("posts/b.md", ymd(2024, 1, 2))
                .with_tags(["post", "secret"])
                .with_draft(true),
            item("posts/c.md", ymd(2024, 3, 1)).with_tags(["post", "later"]),
            item("about.md", ymd(2024, 1, 1)).with_tags(["nav"]),
        ]);
        let glob = Glob::new("posts/**/*.md").unwrap();

        let production =
            Collections::build(&index, &glob, BuildMode::Production, &now);
        assert_eq!(production.posts().len(), 1);
        assert_eq!(production.all().len(), 2);
        assert_eq!(production.tag_list(), ["rust".to_string()]);
        assert_eq!(production.tagged("post").len(), 1);
        assert_eq!(production.tagged("nav").len(), 1);
        assert!(production.tagged("secret").is_empty());
        assert_eq!(
            production.tags().collect::<Vec<_>>(),
            vec!["nav", "post", "rust"]
        );

        let preview =
            Collections::build(&index, &glob, BuildMode::Preview, &now);
        assert_eq!(preview.posts().len(), 3);
        assert_eq!(preview.tag_list(), ["rust", "secret", "later"]);
    }
}
