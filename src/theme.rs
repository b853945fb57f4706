// Copyright © 2024 Blogsmith. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Theme Toggle
//!
//! The dark/light preference state machine that runs in the reader's
//! browser, modelled over three small capabilities so it can run anywhere:
//!
//! - [`PreferenceStore`]: persisted key/value storage (`localStorage`)
//! - [`ColorSchemeQuery`]: the OS colour-scheme preference
//! - [`ClassList`]: the class list of the document root
//!
//! A stored `"dark"` or `"light"` wins; without one the OS preference
//! decides. [`client_script`] is the browser rendition written into the
//! output tree.
//!
//! ```rust
//! use blogsmith::theme::{ClassSet, DarkMode, FixedScheme, MemoryStore, Theme};
//!
//! let mut dark_mode = DarkMode::new(
//!     MemoryStore::default(),
//!     FixedScheme::new(true),
//!     ClassSet::default(),
//! );
//! assert_eq!(dark_mode.init(), Theme::Dark);
//!
//! dark_mode.save(false);
//! assert_eq!(dark_mode.saved(), Some(Theme::Light));
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Storage key of the persisted preference.
pub const STORAGE_KEY: &str = "darkModePreference";

/// Class set on the document root while the dark theme is active.
pub const DARK_CLASS: &str = "dark";

/// Output path of the browser script, relative to the output directory.
pub const SCRIPT_PATH: &str = "js/theme.js";

/// The two colour themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Theme {
    /// Dark colours.
    Dark,
    /// Light colours.
    Light,
}

impl Theme {
    /// Theme for a boolean "prefers dark" flag.
    pub fn from_dark(dark: bool) -> Self {
        if dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    /// Parses a stored value; anything but `"dark"` or `"light"` is `None`.
    pub fn from_stored(value: &str) -> Option<Self> {
        match value {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }

    /// Value persisted for this theme.
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    /// Returns `true` for [`Theme::Dark`].
    pub fn is_dark(self) -> bool {
        self == Theme::Dark
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent string storage.
pub trait PreferenceStore {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;
    /// Stores `value` under `key`.
    fn set(&mut self, key: &str, value: &str);
}

/// Source of the OS colour-scheme preference.
pub trait ColorSchemeQuery {
    /// Returns `true` if the OS prefers a dark colour scheme.
    fn prefers_dark(&self) -> bool;
}

/// The class list of the document root.
pub trait ClassList {
    /// Adds `class` when `present` is true and removes it otherwise.
    fn toggle(&mut self, class: &str, present: bool);
    /// Returns `true` if `class` is present.
    fn contains(&self, class: &str) -> bool;
}

/// In-memory [`PreferenceStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        let _ = self.values.insert(key.to_string(), value.to_string());
    }
}

/// A fixed OS preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedScheme {
    dark: bool,
}

impl FixedScheme {
    /// An OS that prefers dark when `dark` is true.
    pub fn new(dark: bool) -> Self {
        Self { dark }
    }
}

impl ColorSchemeQuery for FixedScheme {
    fn prefers_dark(&self) -> bool {
        self.dark
    }
}

/// In-memory [`ClassList`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassSet {
    classes: BTreeSet<String>,
}

impl ClassList for ClassSet {
    fn toggle(&mut self, class: &str, present: bool) {
        if present {
            let _ = self.classes.insert(class.to_string());
        } else {
            let _ = self.classes.remove(class);
        }
    }

    fn contains(&self, class: &str) -> bool {
        self.classes.contains(class)
    }
}

/// The theme toggle state machine.
#[derive(Debug, Clone)]
pub struct DarkMode<S, Q, C> {
    store: S,
    scheme: Q,
    classes: C,
    status: Theme,
}

impl<S, Q, C> DarkMode<S, Q, C>
where
    S: PreferenceStore,
    Q: ColorSchemeQuery,
    C: ClassList,
{
    /// Creates the state machine. Call [`DarkMode::init`] to resolve and
    /// apply the theme.
    pub fn new(store: S, scheme: Q, classes: C) -> Self {
        Self {
            store,
            scheme,
            classes,
            status: Theme::Light,
        }
    }

    /// The stored preference, if it is a recognised value.
    pub fn saved(&self) -> Option<Theme> {
        self.store
            .get(STORAGE_KEY)
            .as_deref()
            .and_then(Theme::from_stored)
    }

    /// The OS preference.
    pub fn os(&self) -> Theme {
        Theme::from_dark(self.scheme.prefers_dark())
    }

    /// The current theme.
    pub fn status(&self) -> Theme {
        self.status
    }

    /// Resolves the theme from storage, falling back to the OS, and
    /// applies it.
    pub fn init(&mut self) -> Theme {
        self.status = self.saved().unwrap_or_else(|| self.os());
        self.toggle();
        self.status
    }

    /// Applies the current theme to the class list.
    pub fn toggle(&mut self) {
        self.classes.toggle(DARK_CLASS, self.status.is_dark());
    }

    /// Persists an explicit choice and applies it.
    pub fn save(&mut self, prefers_dark: bool) {
        self.status = Theme::from_dark(prefers_dark);
        self.store.set(STORAGE_KEY, self.status.as_str());
        self.toggle();
    }

    /// The class list.
    pub fn classes(&self) -> &C {
        &self.classes
    }

    /// Releases the capabilities, for example to simulate a page reload.
    pub fn into_parts(self) -> (S, Q, C) {
        (self.store, self.scheme, self.classes)
    }
}

const CLIENT_SCRIPT: &str = r#"(function () {
  var darkMode = {
    key: '__KEY__',
    get saved() {
      try {
        return window.localStorage.getItem(this.key);
      } catch (e) {
        return null;
      }
    },
    get os() {
      return window.matchMedia &&
        window.matchMedia('(prefers-color-scheme: dark)').matches
        ? 'dark'
        : 'light';
    },
    status: false,
    init: function () {
      var saved = this.saved;
      this.status = saved === 'dark' || (saved !== 'light' && this.os === 'dark');
      this.toggle();
    },
    toggle: function () {
      document.documentElement.classList.toggle('__CLASS__', this.status);
    },
    save: function (status) {
      this.status = !!status;
      try {
        window.localStorage.setItem(this.key, this.status ? 'dark' : 'light');
      } catch (e) {}
      this.toggle();
    }
  };
  window.darkMode = darkMode;
  darkMode.init();
})();
"#;

/// The browser script implementing the same state machine.
pub fn client_script() -> String {
    CLIENT_SCRIPT
        .replace("__KEY__", STORAGE_KEY)
        .replace("__CLASS__", DARK_CLASS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dark_mode(
        store: MemoryStore,
        os_dark: bool,
    ) -> DarkMode<MemoryStore, FixedScheme, ClassSet> {
        DarkMode::new(store, FixedScheme::new(os_dark), ClassSet::default())
    }

    fn stored(value: &str) -> MemoryStore {
        let mut store = MemoryStore::default();
        store.set(STORAGE_KEY, value);
        store
    }

    #[test]
    fn test_os_preference_without_saved_value() {
        let mut dark = dark_mode(MemoryStore::default(), true);
        assert_eq!(dark.init(), Theme::Dark);
        assert!(dark.classes().contains(DARK_CLASS));

        let mut light = dark_mode(MemoryStore::default(), false);
        assert_eq!(light.init(), Theme::Light);
        assert!(!light.classes().contains(DARK_CLASS));
    }

    #[test]
    fn test_saved_value_overrides_os() {
        assert_eq!(dark_mode(stored("light"), true).init(), Theme::Light);
        assert_eq!(dark_mode(stored("dark"), false).init(), Theme::Dark);
    }

    #[test]
    fn test_unrecognised_saved_value_falls_back_to_os() {
        let mut dark_mode = dark_mode(stored("sepia"), true);
        assert_eq!(dark_mode.saved(), None);
        assert_eq!(dark_mode.init(), Theme::Dark);
    }

    #[test]
    fn test_save_persists_across_reload() {
        let mut first = dark_mode(MemoryStore::default(), true);
        assert_eq!(first.init(), Theme::Dark);

        first.save(false);
        assert_eq!(first.status(), Theme::Light);
        assert!(!first.classes().contains(DARK_CLASS));

        let (store, _, _) = first.into_parts();
        assert_eq!(store.get(STORAGE_KEY).as_deref(), Some("light"));

        let mut reloaded = dark_mode(store, true);
        assert_eq!(reloaded.init(), Theme::Light);
    }

    #[test]
    fn test_theme_values() {
        assert_eq!(Theme::Dark.to_string(), "dark");
        assert_eq!(Theme::from_stored("light"), Some(Theme::Light));
        assert_eq!(Theme::from_stored("Dark"), None);
        assert_eq!(Theme::from_dark(true), Theme::Dark);
    }

    #[test]
    fn test_client_script() {
        let script = client_script();
        assert!(script.contains("key: 'darkModePreference'"));
        assert!(script.contains("classList.toggle('dark', this.status)"));
        assert!(script.contains("prefers-color-scheme: dark"));
        assert!(!script.contains("__"));
    }
}
