// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Build script checking the minimum supported Rust version.

/// Minimum `rustc` version, kept in step with `rust-version` in `Cargo.toml`.
const MIN_VERSION: &str = "1.80.0";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    match version_check::is_min_version(MIN_VERSION) {
        Some(true) => {}
        Some(false) => {
            eprintln!(
                "blogsmith requires rustc {} or newer, found {}",
                MIN_VERSION,
                version_check::Version::read()
                    .map_or_else(|| "an unknown version".to_string(), |v| v.to_string())
            );
            std::process::exit(1);
        }
        None => {
            println!("cargo:warning=Unable to determine the rustc version");
        }
    }
}
