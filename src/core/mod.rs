// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

/// The `config` module provides configuration handling
pub mod config;

/// The `error` module provides error handling
pub mod error;
