// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Output Generators
//!
//! Everything that touches the output tree: rendered pages, passthrough
//! copies, and the theme script.

/// HTML page and static file output.
pub mod html;

pub use html::HtmlGenerator;
