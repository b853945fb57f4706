// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Blogsmith CLI
//!
//! Entry point of the `blogsmith` binary. Parses the command line,
//! initialises the logger, and runs the requested command.

use anyhow::Context;
use blogsmith::cli;

fn run() -> anyhow::Result<()> {
    let matches = cli::build().get_matches();
    cli::init_logging(matches.get_count("verbose"));

    let command = matches.subcommand_name().unwrap_or("blogsmith").to_string();
    cli::execute_matches(&matches)
        .with_context(|| format!("`{}` failed", command))
}

/// The main entry point for the Blogsmith CLI.
fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
