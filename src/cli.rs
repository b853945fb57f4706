// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command-line interface for Blogsmith
//!
//! This module provides the command-line interface: argument parsing,
//! configuration resolution, and command execution.
//!
//! # Examples
//!
//! ```
//! use blogsmith::cli;
//!
//! let matches = cli::build().get_matches_from(vec![
//!     "blogsmith",
//!     "build",
//!     "--production",
//!     "--output",
//!     "public",
//! ]);
//!
//! let build_cmd = matches.subcommand_matches("build").unwrap();
//! assert!(build_cmd.get_flag("production"));
//! ```

use crate::core::config::{
    BuildMode, Config, ConfigBuilder, DEFAULT_CONFIG_FILE, ENV_PREFIX,
};
use crate::core::error::{BlogError, Result};
use crate::serve::DevServer;
use crate::Site;
use chrono::Utc;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{debug, info};
use std::path::{Path, PathBuf};

/// The current version of Blogsmith, as defined in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds and configures the Blogsmith command-line interface.
pub fn build() -> Command {
    Command::new("blogsmith")
        .author("Blogsmith Contributors")
        .about("Builds and previews a personal blog.")
        .version(VERSION)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (-v, -vv, -vvv)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("build")
                .about("Build the site into the output directory")
                .args(site_args()),
        )
        .subcommand(
            Command::new("serve")
                .about("Build the site and serve it locally")
                .args(site_args())
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .help("Port to serve on [default: 8080]")
                        .value_parser(value_parser!(u16)),
                ),
        )
        .subcommand(
            Command::new("tags")
                .about("Print the public tag list, one tag per line")
                .args(site_args()),
        )
        .after_help(
            "\x1b[1;4mEnvironment:\x1b[0m\n\n  BLOGSMITH_ENV=production  hide drafts and future-dated posts\n  RUST_LOG                  log filter\n\n\
             \x1b[1;4mLicense:\x1b[0m\n  The project is licensed under the terms of \
             both the MIT license and the Apache License (Version 2.0).",
        )
}

/// Arguments shared by every subcommand that loads the site.
fn site_args() -> [Arg; 6] {
    [
        Arg::new("config")
            .long("config")
            .help("Configuration file [default: blogsmith.toml if present]")
            .value_parser(value_parser!(PathBuf)),
        Arg::new("content")
            .short('c')
            .long("content")
            .help("Content directory")
            .value_parser(value_parser!(PathBuf)),
        Arg::new("output")
            .short('o')
            .long("output")
            .help("Output directory")
            .value_parser(value_parser!(PathBuf)),
        Arg::new("templates")
            .short('t')
            .long("templates")
            .help("Template directory")
            .value_parser(value_parser!(PathBuf)),
        Arg::new("production")
            .long("production")
            .help("Hide drafts and future-dated posts")
            .action(ArgAction::SetTrue),
        Arg::new("minify")
            .short('m')
            .long("minify")
            .help("Minify output")
            .action(ArgAction::SetTrue),
    ]
}

/// Initialises `env_logger`. `RUST_LOG` wins over the verbosity flag.
pub fn init_logging(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter),
    )
    .format_timestamp(None)
    .try_init();
}

/// Executes already parsed arguments.
pub fn execute_matches(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("build", sub_matches)) => {
            let site = Site::new(resolve_config(sub_matches)?)?;
            let report = site.build(Utc::now())?;
            println!(
                "Wrote {} pages to {} ({} skipped, {} files copied)",
                report.pages_written,
                site.config().output_dir.display(),
                report.pages_skipped,
                report.files_copied
            );
            Ok(())
        }
        Some(("serve", sub_matches)) => {
            let site = Site::new(resolve_config(sub_matches)?)?;
            let _ = site.build(Utc::now())?;
            let server = DevServer::new(
                &site.config().output_dir,
                site.config().serve.port,
            )?;
            println!("Serving at http://{}", server.addr());
            server.run()
        }
        Some(("tags", sub_matches)) => {
            let site = Site::new(resolve_config(sub_matches)?)?;
            let index = site.load_content()?;
            let collections = site.collections(&index, &Utc::now())?;
            for tag in collections.tag_list() {
                println!("{}", tag);
            }
            Ok(())
        }
        _ => Err(BlogError::internal_error("Unknown command")),
    }
}

/// Resolves the configuration from the file, the environment, and flags.
pub fn resolve_config(matches: &ArgMatches) -> Result<Config> {
    let mut builder = ConfigBuilder::new().with_env_prefix(ENV_PREFIX);

    match matches.get_one::<PathBuf>("config") {
        Some(path) => builder = builder.with_file(path),
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            builder = builder.with_file(DEFAULT_CONFIG_FILE);
        }
        None => {}
    }

    if matches.get_flag("production") {
        builder = builder.with_mode(BuildMode::Production);
    }

    for (arg, key) in [
        ("content", "content_dir"),
        ("output", "output_dir"),
        ("templates", "template_dir"),
    ] {
        if let Some(path) = matches.get_one::<PathBuf>(arg) {
            builder = builder
                .with_override(key, path.to_string_lossy().into_owned());
        }
    }

    if matches.get_flag("minify") {
        builder = builder.with_override("output.minify", true);
    }

    if let Ok(Some(port)) = matches.try_get_one::<u16>("port") {
        builder = builder.with_override("serve.port", i64::from(*port));
    }

    let config = builder.build()?.read().clone();
    debug!("Using {} configuration", config.mode);
    info!(
        "Content {}, templates {}, output {}",
        config.content_dir.display(),
        config.template_dir.display(),
        config.output_dir.display()
    );
    Ok(config)
}
