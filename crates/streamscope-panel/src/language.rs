//! Display-language preference, the only datum the panel persists.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use crate::error::{PanelError, Result};

/// Storage key of the user's explicit language choice.
pub const LANGUAGE_KEY: &str = "customLanguage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    En,
    ZhCn,
    Ja,
    Fr,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::ZhCn => "zh_CN",
            Language::Ja => "ja",
            Language::Fr => "fr",
        }
    }

    /// Map a UI locale such as `zh-CN` or `en_US`. Unknown locales map to English.
    pub fn from_ui_locale(locale: &str) -> Self {
        match locale.replacen('-', "_", 1).as_str() {
            "zh_CN" | "zh" => Language::ZhCn,
            "en" | "en_US" => Language::En,
            "ja" => Language::Ja,
            "fr" => Language::Fr,
            _ => Language::En,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "en" => Ok(Language::En),
            "zh_CN" => Ok(Language::ZhCn),
            "ja" => Ok(Language::Ja),
            "fr" => Ok(Language::Fr),
            other => Err(PanelError::UnknownLanguage(other.to_string())),
        }
    }
}

/// Key-value storage for panel preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .values
            .lock()
            .map(|values| values.get(key).cloned())
            .unwrap_or_default())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// Preferences kept as one JSON object in a file. A missing file reads as empty.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Map::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.load().await?;
        Ok(values.get(key).and_then(Value::as_str).map(str::to_string))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.load().await?;
        values.insert(key.to_string(), Value::String(value.to_string()));
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(&values)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

/// The stored choice if there is a usable one, otherwise the UI locale mapping.
pub async fn resolve_language(store: &dyn PreferenceStore, ui_locale: &str) -> Language {
    match store.get(LANGUAGE_KEY).await {
        Ok(Some(stored)) if !stored.is_empty() => match stored.parse() {
            Ok(language) => return language,
            Err(err) => tracing::warn!(error = %err, "ignoring stored language"),
        },
        Ok(_) => {}
        Err(err) => tracing::warn!(error = %err, "failed to get custom language"),
    }
    Language::from_ui_locale(ui_locale)
}

pub async fn set_language(store: &dyn PreferenceStore, language: Language) -> Result<()> {
    store.set(LANGUAGE_KEY, language.as_str()).await?;
    tracing::info!(language = %language, "display language set");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_locale_mapping() {
        assert_eq!(Language::from_ui_locale("zh-CN"), Language::ZhCn);
        assert_eq!(Language::from_ui_locale("zh"), Language::ZhCn);
        assert_eq!(Language::from_ui_locale("en-US"), Language::En);
        assert_eq!(Language::from_ui_locale("ja"), Language::Ja);
        assert_eq!(Language::from_ui_locale("fr"), Language::Fr);
        assert_eq!(Language::from_ui_locale("de-DE"), Language::En);
        assert_eq!(Language::from_ui_locale("zh-TW"), Language::En);
    }

    #[tokio::test]
    async fn test_stored_choice_wins() {
        let store = MemoryPreferenceStore::new();
        assert_eq!(resolve_language(&store, "ja").await, Language::Ja);

        set_language(&store, Language::Fr).await.unwrap();
        assert_eq!(resolve_language(&store, "ja").await, Language::Fr);
        assert_eq!(store.get(LANGUAGE_KEY).await.unwrap().as_deref(), Some("fr"));
    }

    #[tokio::test]
    async fn test_unknown_stored_value_falls_back() {
        let store = MemoryPreferenceStore::new();
        store.set(LANGUAGE_KEY, "klingon").await.unwrap();
        assert_eq!(resolve_language(&store, "zh-CN").await, Language::ZhCn);
    }
}
