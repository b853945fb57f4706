// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn blog() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("posts")).unwrap();
    fs::create_dir_all(root.join("_includes/layouts")).unwrap();

    fs::write(
        root.join("_includes/layouts/post.hbs"),
        "<article>{{title}}{{{content}}}</article>",
    )
    .unwrap();
    fs::write(
        root.join("posts/published.md"),
        "---\ntitle: Published\ndate: 2020-05-01\ntags: [posts, rust]\nlayout: post\n---\nHello.\n",
    )
    .unwrap();
    fs::write(
        root.join("posts/draft.md"),
        "---\ntitle: Draft\ndate: 2020-05-02\ndraft: true\ntags: [posts, wip]\nlayout: post\n---\nLater.\n",
    )
    .unwrap();
    fs::write(
        root.join("posts/future.md"),
        "---\ntitle: Future\ndate: 2999-01-01\ntags: [posts, someday]\nlayout: post\n---\nSoon.\n",
    )
    .unwrap();
    fs::write(
        root.join("404.md"),
        "---\npermalink: 404.html\ndate: 2020-01-01\n---\nLost.\n",
    )
    .unwrap();
    dir
}

fn blogsmith(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("blogsmith").unwrap();
    let _ = cmd
        .current_dir(dir)
        .env_remove("BLOGSMITH_ENV")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn prints_version() {
    let dir = TempDir::new().unwrap();
    let _ = blogsmith(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn requires_a_subcommand() {
    let dir = TempDir::new().unwrap();
    let _ = blogsmith(dir.path()).assert().failure();
}

#[test]
fn preview_build_writes_every_post() {
    let dir = blog();
    let _ = blogsmith(dir.path())
        .arg("build")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 4 pages"));

    let out = dir.path().join("_site");
    assert!(out.join("posts/published/index.html").is_file());
    assert!(out.join("posts/draft/index.html").is_file());
    assert!(out.join("posts/future/index.html").is_file());
    assert!(out.join("404.html").is_file());
    assert!(out.join("js/theme.js").is_file());
}

#[test]
fn production_flag_hides_unpublished_posts() {
    let dir = blog();
    let _ = blogsmith(dir.path())
        .args(["build", "--production"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 pages"));

    let out = dir.path().join("_site");
    let post =
        fs::read_to_string(out.join("posts/published/index.html")).unwrap();
    assert_eq!(post, "<article>Published<p>Hello.</p>\n</article>");
    assert!(!out.join("posts/draft").exists());
    assert!(!out.join("posts/future").exists());
}

#[test]
fn environment_selects_production() {
    let dir = blog();
    let _ = blogsmith(dir.path())
        .env("BLOGSMITH_ENV", "production")
        .arg("build")
        .assert()
        .success();

    assert!(!dir.path().join("_site/posts/draft").exists());
}

#[test]
fn output_flag_changes_destination() {
    let dir = blog();
    let _ = blogsmith(dir.path())
        .args(["build", "--output", "public"])
        .assert()
        .success();

    assert!(dir.path().join("public/posts/published/index.html").is_file());
    assert!(!dir.path().join("_site").exists());
}

#[test]
fn tags_lists_public_tags() {
    let dir = blog();
    let _ = blogsmith(dir.path())
        .args(["tags", "--production"])
        .assert()
        .success()
        .stdout("rust\n");

    let _ = blogsmith(dir.path())
        .arg("tags")
        .assert()
        .success()
        .stdout("wip\nsomeday\nrust\n");
}

#[test]
fn config_file_is_read() {
    let dir = blog();
    fs::write(
        dir.path().join("blogsmith.toml"),
        "output_dir = \"dist\"\n\n[output]\ntheme_script = false\n",
    )
    .unwrap();

    let _ = blogsmith(dir.path()).arg("build").assert().success();

    assert!(dir.path().join("dist/404.html").is_file());
    assert!(!dir.path().join("dist/js/theme.js").exists());
}

#[test]
fn missing_content_dir_fails() {
    let dir = TempDir::new().unwrap();
    let _ = blogsmith(dir.path())
        .args(["build", "--content", "nowhere"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn unknown_layout_fails() {
    let dir = blog();
    fs::write(
        dir.path().join("about.md"),
        "---\nlayout: missing\ndate: 2020-01-01\n---\nAbout.\n",
    )
    .unwrap();

    let _ = blogsmith(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));
}
