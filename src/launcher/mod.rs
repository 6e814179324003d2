//! The three events a launcher host delivers, wired to the router, executor
//! and preference store.

use serde_json::Value;
use std::sync::Arc;

use crate::config::{ConfigError, PreferenceStore, Preferences};
use crate::executor::{self, Outcome};
use crate::menu::MenuEntry;
use crate::remote::Remote;
use crate::router;

pub struct Launcher<R: Remote> {
    remote: R,
    store: PreferenceStore,
}

impl<R: Remote> Launcher<R> {
    pub fn new(remote: R, store: PreferenceStore) -> Self {
        Launcher { remote, store }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn preferences(&self) -> Arc<Preferences> {
        self.store.current()
    }

    /// Query text changed. A leading keyword is dropped before routing.
    pub async fn on_query(&self, text: &str) -> Vec<MenuEntry> {
        let prefs = self.store.current();
        let argument = strip_keyword(text, prefs.keyword());
        router::route(&self.remote, &prefs, argument).await
    }

    /// An entry carrying a custom payload was selected
    pub async fn on_select(&self, payload: Value) -> Outcome {
        let prefs = self.store.current();
        executor::execute_value(&self.remote, &prefs, payload).await
    }

    pub fn on_preference_change(&self, key: &str, old: &str, new: &str) -> Result<(), ConfigError> {
        log::debug!("Preference change notification for '{}'", key);
        self.store.apply_change(key, old, new)
    }
}

fn strip_keyword<'a>(text: &'a str, keyword: &str) -> &'a str {
    let trimmed = text.trim_start();
    match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) if first == keyword => rest.trim_start(),
        None if trimmed == keyword => "",
        _ => text,
    }
}
