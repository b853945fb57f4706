// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Configuration Module
//!
//! Layered configuration for a Blogsmith site. Values come from, in order of
//! increasing precedence: built-in defaults, a TOML file, `BLOGSMITH_*`
//! environment variables, an explicit [`BuildMode`], and programmatic
//! overrides (the CLI flags).
//!
//! The build mode is resolved here once and then passed explicitly to the
//! build; nothing downstream reads the process environment.
//!
//! ## Example
//!
//! ```rust,no_run
//! use blogsmith::core::config::{BuildMode, ConfigBuilder};
//!
//! let config = ConfigBuilder::new()
//!     .with_file("blogsmith.toml")
//!     .with_env_prefix("BLOGSMITH_")
//!     .with_mode(BuildMode::Production)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.read().mode, BuildMode::Production);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use toml::Value as TomlValue;

use crate::collections::Glob;
use crate::core::error::{BlogError, Result};

/// Name of the configuration file looked up by the CLI when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "blogsmith.toml";

/// Prefix of the environment variables that override configuration keys.
///
/// `BLOGSMITH_ENV=production` selects [`BuildMode::Production`].
pub const ENV_PREFIX: &str = "BLOGSMITH_";

/// Whether unpublished content is hidden.
///
/// Production hides drafts and future-dated items from every collection and
/// from the output tree. Preview shows everything.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Public build: only published content.
    Production,
    /// Local or staging build: all content, drafts included.
    #[default]
    Preview,
}

impl BuildMode {
    /// Maps an environment value to a mode. Only `production` selects
    /// [`BuildMode::Production`]; anything else is a preview build.
    pub fn from_env_value(value: &str) -> Self {
        if value.trim() == "production" {
            BuildMode::Production
        } else {
            BuildMode::Preview
        }
    }

    /// Returns `true` for [`BuildMode::Production`].
    pub fn is_production(self) -> bool {
        self == BuildMode::Production
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Production => f.write_str("production"),
            BuildMode::Preview => f.write_str("preview"),
        }
    }
}

/// Represents the main configuration of a site build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_content_dir")]
    /// Input directory scanned for content files.
    pub content_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    /// Directory the generated site is written to.
    pub output_dir: PathBuf,

    #[serde(default = "default_template_dir")]
    /// Directory containing Handlebars layouts and partials.
    pub template_dir: PathBuf,

    #[serde(default)]
    /// Production or preview.
    pub mode: BuildMode,

    #[serde(default = "default_posts_glob")]
    /// Glob selecting the `posts` collection, relative to `content_dir`.
    pub posts_glob: String,

    #[serde(default = "default_ignore")]
    /// Globs of content files that are never ingested.
    pub ignore: Vec<String>,

    #[serde(default = "default_layout_aliases")]
    /// Short layout names mapped to template names.
    pub layout_aliases: BTreeMap<String, String>,

    #[serde(default)]
    /// Files and directories copied verbatim into the output.
    pub passthrough: Vec<PassthroughCopy>,

    #[serde(default)]
    /// Free-form site data exposed to templates as `site`.
    pub site: HashMap<String, TomlValue>,

    #[serde(default)]
    /// Output generation settings.
    pub output: OutputConfig,

    #[serde(default)]
    /// Preview server settings.
    pub serve: ServeConfig,
}

/// A passthrough copy rule, relative to the content directory and the output
/// directory respectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassthroughCopy {
    /// Source file or directory.
    pub from: PathBuf,
    /// Destination inside the output directory. Defaults to `from`.
    #[serde(default)]
    pub to: Option<PathBuf>,
}

/// Configuration settings for output generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    /// Minify generated HTML.
    pub minify: bool,

    #[serde(default = "default_true")]
    /// Write the theme toggle script to `js/theme.js`.
    pub theme_script: bool,
}

/// Configuration settings for the preview server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ServeConfig {
    #[serde(default = "default_port")]
    /// TCP port the preview server binds on localhost.
    pub port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            minify: false,
            theme_script: default_true(),
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Builds a `Config` from a file, the environment, and explicit overrides.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<PathBuf>,
    env_prefix: Option<String>,
    mode: Option<BuildMode>,
    overrides: Vec<(String, TomlValue)>,
}

impl ConfigBuilder {
    /// Initialises a new `ConfigBuilder` instance with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a TOML configuration file to the builder.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Reads overrides from environment variables starting with `prefix`.
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Forces the build mode, taking precedence over file and environment.
    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Adds a key-value pair applied after every other source.
    ///
    /// Keys are top-level field names (`output_dir`) or `section.key`
    /// (`serve.port`, `site.title`).
    pub fn with_override<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<TomlValue>,
    {
        self.overrides.push((key.into(), value.into()));
        self
    }

    /// Builds and validates the final configuration.
    pub fn build(self) -> Result<Arc<RwLock<Config>>> {
        let mut config = if let Some(path) = self.config_file {
            load_from_file(&path)?
        } else {
            Config::default()
        };

        if let Some(prefix) = self.env_prefix {
            apply_env_overrides(
                &mut config,
                &prefix,
                utf8_vars(env::vars_os()),
            )?;
        }

        if let Some(mode) = self.mode {
            config.mode = mode;
        }

        for (key, value) in &self.overrides {
            apply_config_value(&mut config, key, value)?;
        }

        validate_config(&config)?;
        debug!("Resolved configuration: {:?}", config);

        Ok(Arc::new(RwLock::new(config)))
    }
}

impl Config {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        validate_config(self)
    }

    /// Site data converted to JSON for templates.
    pub fn site_data(&self) -> serde_json::Value {
        serde_json::to_value(&self.site)
            .unwrap_or(serde_json::Value::Null)
    }

    /// Resolves a layout name through the alias table.
    pub fn resolve_layout<'a>(&'a self, layout: &'a str) -> &'a str {
        self.layout_aliases
            .get(layout)
            .map_or(layout, String::as_str)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            output_dir: default_output_dir(),
            template_dir: default_template_dir(),
            mode: BuildMode::default(),
            posts_glob: default_posts_glob(),
            ignore: default_ignore(),
            layout_aliases: default_layout_aliases(),
            passthrough: Vec::new(),
            site: HashMap::new(),
            output: OutputConfig::default(),
            serve: ServeConfig::default(),
        }
    }
}

// Internal helper functions

fn load_from_file(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| {
        BlogError::config_error(
            format!("Failed to read config file: {}", e),
            Some(path.to_path_buf()),
        )
    })?;

    toml::from_str(&content).map_err(|e| {
        BlogError::config_error(
            format!("Failed to parse config file: {}", e),
            Some(path.to_path_buf()),
        )
    })
}

fn apply_env_overrides<I>(
    config: &mut Config,
    prefix: &str,
    vars: I,
) -> Result<()>
where
    I: IntoIterator<Item = (String, String)>,
{
    // `BLOGSMITH_ENV` is applied last so it wins over `BLOGSMITH_MODE`
    // whatever the order of the process environment.
    let mut env_mode = None;
    for (key, value) in vars {
        let Some(stripped) = key.strip_prefix(prefix) else {
            continue;
        };
        let config_key = stripped.trim_start_matches('_').to_lowercase();
        if !is_known_key(&config_key) {
            warn!("Ignoring unknown configuration variable {}", key);
            continue;
        }
        if config_key == "env" {
            env_mode = Some(value);
            continue;
        }
        apply_config_value(
            config,
            &config_key,
            &TomlValue::String(value),
        )?;
    }
    if let Some(value) = env_mode {
        apply_config_value(config, "env", &TomlValue::String(value))?;
    }
    Ok(())
}

/// Keeps the variables whose name and value are valid UTF-8.
fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter().filter_map(|(key, value)| {
        match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                debug!(
                    "Skipping non UTF-8 environment variable {:?}",
                    key
                );
                None
            }
        }
    })
}

fn is_known_key(key: &str) -> bool {
    matches!(
        key,
        "content_dir"
            | "output_dir"
            | "template_dir"
            | "env"
            | "mode"
            | "posts_glob"
            | "output_minify"
            | "serve_port"
    )
}

fn validate_config(config: &Config) -> Result<()> {
    if !config.content_dir.is_dir() {
        return Err(BlogError::config_error(
            format!(
                "content directory does not exist: {}",
                config.content_dir.display()
            ),
            Some(config.content_dir.clone()),
        ));
    }

    if config.template_dir.exists() && !config.template_dir.is_dir() {
        return Err(BlogError::config_error(
            format!(
                "template path is not a directory: {}",
                config.template_dir.display()
            ),
            Some(config.template_dir.clone()),
        ));
    }

    if config.output_dir.exists() && !config.output_dir.is_dir() {
        return Err(BlogError::config_error(
            format!(
                "output path is not a directory: {}",
                config.output_dir.display()
            ),
            Some(config.output_dir.clone()),
        ));
    }

    let _ = Glob::new(&config.posts_glob)?;
    for pattern in &config.ignore {
        let _ = Glob::new(pattern)?;
    }

    Ok(())
}

fn apply_config_value(
    config: &mut Config,
    key: &str,
    value: &TomlValue,
) -> Result<()> {
    let value_str = match value {
        TomlValue::String(s) => s.clone(),
        other => other.to_string(),
    };
    match key {
        "content_dir" => config.content_dir = PathBuf::from(value_str),
        "output_dir" => config.output_dir = PathBuf::from(value_str),
        "template_dir" => config.template_dir = PathBuf::from(value_str),
        "env" | "mode" => {
            config.mode = BuildMode::from_env_value(&value_str)
        }
        "posts_glob" => config.posts_glob = value_str,
        // Environment variables cannot carry dots.
        "output_minify" => {
            apply_config_value(config, "output.minify", value)?
        }
        "serve_port" => apply_config_value(config, "serve.port", value)?,
        _ => {
            let Some((section, key)) = key.split_once('.') else {
                return Err(BlogError::config_error(
                    format!("Unknown configuration key: {}", key),
                    None,
                ));
            };
            match (section, key) {
                ("output", "minify") => {
                    config.output.minify =
                        parse_value(key, &value_str)?
                }
                ("output", "theme_script") => {
                    config.output.theme_script =
                        parse_value(key, &value_str)?
                }
                ("serve", "port") => {
                    config.serve.port = parse_value(key, &value_str)?
                }
                ("site", _) => {
                    let _ =
                        config.site.insert(key.to_string(), value.clone());
                }
                ("layout_aliases", _) => {
                    let _ = config
                        .layout_aliases
                        .insert(key.to_string(), value_str);
                }
                _ => {
                    return Err(BlogError::config_error(
                        format!(
                            "Unknown configuration key: {}.{}",
                            section, key
                        ),
                        None,
                    ));
                }
            }
        }
    }
    Ok(())
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e| {
        BlogError::config_error(
            format!("Invalid {} value '{}': {}", key, value, e),
            None,
        )
    })
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_content_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("_site")
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("_includes")
}

fn default_posts_glob() -> String {
    "posts/**/*.md".to_string()
}

fn default_ignore() -> Vec<String> {
    vec!["README.md".to_string(), "node_modules/**".to_string()]
}

fn default_layout_aliases() -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    let _ = aliases.insert("post".to_string(), "layouts/post".to_string());
    aliases
}

fn default_port() -> u16 {
    8080
}

/// Tests for the configuration module.
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_mode_is_preview() {
        assert_eq!(BuildMode::default(), BuildMode::Preview);
        assert_eq!(Config::default().mode, BuildMode::Preview);
    }

    #[test]
    fn test_build_mode_from_env_value() {
        assert_eq!(
            BuildMode::from_env_value("production"),
            BuildMode::Production
        );
        assert_eq!(
            BuildMode::from_env_value("development"),
            BuildMode::Preview
        );
        assert_eq!(BuildMode::from_env_value(""), BuildMode::Preview);
        assert_eq!(
            BuildMode::from_env_value("Production"),
            BuildMode::Preview
        );
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("blogsmith.toml");
        fs::write(
            &config_file,
            r#"
output_dir = "public"
mode = "production"

[site]
title = "Notes"

[[passthrough]]
from = "img"

[serve]
port = 9000
"#,
        )
        .unwrap();

        let config = load_from_file(&config_file).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("public"));
        assert_eq!(config.mode, BuildMode::Production);
        assert_eq!(config.serve.port, 9000);
        assert_eq!(config.passthrough[0].from, PathBuf::from("img"));
        assert!(config.passthrough[0].to.is_none());
        assert_eq!(config.site_data()["title"], "Notes");
        assert_eq!(config.resolve_layout("post"), "layouts/post");
        assert_eq!(config.posts_glob, "posts/**/*.md");
    }

    #[test]
    fn test_missing_content_dir_validation() {
        let config = Config {
            content_dir: PathBuf::from("missing_content"),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_posts_glob_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            content_dir: temp_dir.path().to_path_buf(),
            posts_glob: "posts/{a,b".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(BlogError::Config { .. })
        ));
    }

    #[test]
    fn test_env_overrides_select_production() {
        let mut config = Config::default();
        let vars = vec![
            ("BLOGSMITH_ENV".to_string(), "production".to_string()),
            ("BLOGSMITH_OUTPUT_DIR".to_string(), "dist".to_string()),
            ("BLOGSMITH_SERVE_PORT".to_string(), "4000".to_string()),
            ("BLOGSMITH_UNKNOWN".to_string(), "x".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ];

        apply_env_overrides(&mut config, ENV_PREFIX, vars).unwrap();
        assert_eq!(config.mode, BuildMode::Production);
        assert_eq!(config.output_dir, PathBuf::from("dist"));
        assert_eq!(config.serve.port, 4000);
    }

    #[test]
    fn test_env_wins_over_mode_in_any_order() {
        for vars in [
            vec![
                ("BLOGSMITH_ENV".to_string(), "production".to_string()),
                ("BLOGSMITH_MODE".to_string(), "preview".to_string()),
            ],
            vec![
                ("BLOGSMITH_MODE".to_string(), "preview".to_string()),
                ("BLOGSMITH_ENV".to_string(), "production".to_string()),
            ],
        ] {
            let mut config = Config::default();
            apply_env_overrides(&mut config, ENV_PREFIX, vars).unwrap();
            assert_eq!(config.mode, BuildMode::Production);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (
                OsString::from("BLOGSMITH_OUTPUT_DIR"),
                OsString::from_vec(vec![0x66, 0xff, 0x6f]),
            ),
            (OsString::from_vec(vec![0xfe]), OsString::from("x")),
            (OsString::from("BLOGSMITH_ENV"), OsString::from("production")),
        ];

        let mut config = Config::default();
        apply_env_overrides(&mut config, ENV_PREFIX, utf8_vars(vars))
            .unwrap();
        assert_eq!(config.mode, BuildMode::Production);
        assert_eq!(config.output_dir, Config::default().output_dir);
    }

    #[test]
    fn test_explicit_mode_beats_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("blogsmith.toml");
        fs::write(
            &config_file,
            format!(
                "mode = \"production\"\ncontent_dir = {:?}\n",
                temp_dir.path().display().to_string()
            ),
        )
        .unwrap();

        let config = ConfigBuilder::new()
            .with_file(&config_file)
            .with_mode(BuildMode::Preview)
            .with_override("site.author", "Ada")
            .build()
            .unwrap();

        let config = config.read();
        assert_eq!(config.mode, BuildMode::Preview);
        assert_eq!(config.site_data()["author"], "Ada");
    }

    #[test]
    fn test_invalid_override_value() {
        let mut config = Config::default();
        let result = apply_config_value(
            &mut config,
            "serve.port",
            &TomlValue::String("not-a-port".to_string()),
        );
        assert!(result.is_err());
        assert!(apply_config_value(
            &mut config,
            "bogus",
            &TomlValue::Boolean(true)
        )
        .is_err());
    }
}
