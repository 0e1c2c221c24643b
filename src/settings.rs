//! Settings persistence - API key, user prompt templates, default counts.
//!
//! Values live in a single JSON file under the user config directory.
//! The core pipeline only ever reads; mutation happens through the popup
//! UI calling the add/update/delete operations here.
//!
//! Two invariants are enforced on write: at most [`MAX_CUSTOM_PROMPTS`]
//! templates, and a serialized-size cap inherited from the browser
//! sync-storage quota the original data lived under.

use crate::error::GenerationError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const MAX_CUSTOM_PROMPTS: usize = 5;
const STORAGE_LIMIT_BYTES: usize = 100 * 1024;

/// A named, user-configurable prompt definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    pub prompt_text: String,
    pub response_count: u8,
    pub enabled: bool,
}

/// Everything the store persists. Unknown or missing fields deserialize
/// to defaults, which is all the migration the old storage formats need.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_key: String,
    pub custom_prompts: Vec<PromptTemplate>,
    pub default_response_count: u8,
    pub default_beautify_response_count: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            custom_prompts: Vec::new(),
            default_response_count: 3,
            default_beautify_response_count: 3,
        }
    }
}

/// Partial update applied over the current settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub api_key: Option<String>,
    pub default_response_count: Option<u8>,
    pub default_beautify_response_count: Option<u8>,
}

/// Fields accepted when creating or editing a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptTemplateInput {
    pub name: Option<String>,
    pub prompt_text: Option<String>,
    pub response_count: Option<u8>,
    pub enabled: Option<bool>,
}

pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store at the default per-user config location.
    pub fn open() -> Self {
        let path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("redraft")
            .join("settings.json");
        Self { path }
    }

    /// Store at an explicit path - tests point this at a temp dir.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load current settings. A missing or unreadable file yields defaults.
    pub fn settings(&self) -> Settings {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("[SETTINGS] Invalid settings file, using defaults: {}", e);
                Settings::default()
            }),
            Err(_) => Settings::default(),
        }
    }

    /// Templates shown in the context menu.
    pub fn get_enabled_prompts(&self) -> Vec<PromptTemplate> {
        self.settings()
            .custom_prompts
            .into_iter()
            .filter(|p| p.enabled)
            .collect()
    }

    /// Apply a partial update over the stored settings.
    pub fn update(&self, patch: SettingsPatch) -> Result<(), GenerationError> {
        let mut settings = self.settings();
        if let Some(api_key) = patch.api_key {
            settings.api_key = api_key;
        }
        if let Some(n) = patch.default_response_count {
            settings.default_response_count = clamp_count(n);
        }
        if let Some(n) = patch.default_beautify_response_count {
            settings.default_beautify_response_count = clamp_count(n);
        }
        self.save(&settings)
    }

    /// Create a new template. Fails when the per-installation cap is hit.
    pub fn add_prompt(
        &self,
        input: PromptTemplateInput,
    ) -> Result<PromptTemplate, GenerationError> {
        let mut settings = self.settings();
        if settings.custom_prompts.len() >= MAX_CUSTOM_PROMPTS {
            return Err(GenerationError::Unknown(format!(
                "Maximum of {} custom prompts allowed.",
                MAX_CUSTOM_PROMPTS
            )));
        }

        let template = PromptTemplate {
            id: generate_id(),
            name: input.name.unwrap_or_else(|| "Unnamed Prompt".to_string()),
            prompt_text: input.prompt_text.unwrap_or_default(),
            response_count: clamp_count(
                input
                    .response_count
                    .unwrap_or(settings.default_response_count),
            ),
            enabled: input.enabled.unwrap_or(true),
        };

        settings.custom_prompts.push(template.clone());
        self.save(&settings)?;
        log::info!("[SETTINGS] Added prompt '{}' ({})", template.name, template.id);
        Ok(template)
    }

    /// Edit an existing template. Returns false when the id is unknown.
    pub fn update_prompt(
        &self,
        id: &str,
        input: PromptTemplateInput,
    ) -> Result<bool, GenerationError> {
        let mut settings = self.settings();
        let Some(template) = settings.custom_prompts.iter_mut().find(|p| p.id == id) else {
            log::warn!("[SETTINGS] Prompt with id {} not found", id);
            return Ok(false);
        };
        if let Some(name) = input.name {
            template.name = name;
        }
        if let Some(text) = input.prompt_text {
            template.prompt_text = text;
        }
        if let Some(n) = input.response_count {
            template.response_count = clamp_count(n);
        }
        if let Some(enabled) = input.enabled {
            template.enabled = enabled;
        }
        self.save(&settings)?;
        Ok(true)
    }

    /// Delete a template. Returns false when the id is unknown.
    pub fn delete_prompt(&self, id: &str) -> Result<bool, GenerationError> {
        let mut settings = self.settings();
        let before = settings.custom_prompts.len();
        settings.custom_prompts.retain(|p| p.id != id);
        if settings.custom_prompts.len() == before {
            log::warn!("[SETTINGS] Prompt with id {} not found", id);
            return Ok(false);
        }
        self.save(&settings)?;
        Ok(true)
    }

    fn save(&self, settings: &Settings) -> Result<(), GenerationError> {
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| GenerationError::Unknown(format!("serialize settings: {}", e)))?;

        if json.len() > STORAGE_LIMIT_BYTES {
            return Err(GenerationError::Unknown(
                "Storage limit exceeded. Please reduce the number or length of your \
                 custom prompts."
                    .to_string(),
            ));
        }

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| GenerationError::Unknown(format!("create config dir: {}", e)))?;
        }
        std::fs::write(&self.path, json)
            .map_err(|e| GenerationError::Unknown(format!("write settings: {}", e)))?;
        log::info!("[SETTINGS] Saved to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Keep response counts inside the template invariant.
fn clamp_count(n: u8) -> u8 {
    n.clamp(1, 5)
}

/// Opaque template id: millisecond timestamp plus a session counter.
fn generate_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("{}-{}", millis, COUNTER.fetch_add(1, Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &tempfile::TempDir) -> SettingsStore {
        SettingsStore::at_path(dir.path().join("settings.json"))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = store_in(&dir).settings();
        assert_eq!(settings.api_key, "");
        assert!(settings.custom_prompts.is_empty());
        assert_eq!(settings.default_response_count, 3);
        assert_eq!(settings.default_beautify_response_count, 3);
    }

    #[test]
    fn legacy_file_with_only_api_key_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"apiKey": "old-key"}"#).unwrap();

        let settings = SettingsStore::at_path(&path).settings();
        assert_eq!(settings.api_key, "old-key");
        assert_eq!(settings.default_response_count, 3);
    }

    #[test]
    fn add_update_delete_round_trip() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        let created = store
            .add_prompt(PromptTemplateInput {
                name: Some("Congratulate".into()),
                prompt_text: Some("Write a short congratulation.".into()),
                response_count: Some(2),
                enabled: Some(true),
            })
            .unwrap();
        assert_eq!(created.response_count, 2);

        assert!(store
            .update_prompt(
                &created.id,
                PromptTemplateInput {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .unwrap());
        assert!(store.get_enabled_prompts().is_empty());

        assert!(store.delete_prompt(&created.id).unwrap());
        assert!(!store.delete_prompt(&created.id).unwrap());
    }

    #[test]
    fn unknown_id_updates_return_false() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        assert!(!store
            .update_prompt("nope", PromptTemplateInput::default())
            .unwrap());
    }

    #[test]
    fn cap_at_five_templates() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        for i in 0..MAX_CUSTOM_PROMPTS {
            store
                .add_prompt(PromptTemplateInput {
                    name: Some(format!("p{}", i)),
                    ..Default::default()
                })
                .unwrap();
        }
        assert!(store.add_prompt(PromptTemplateInput::default()).is_err());
        assert_eq!(store.settings().custom_prompts.len(), MAX_CUSTOM_PROMPTS);
    }

    #[test]
    fn response_counts_are_clamped() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let created = store
            .add_prompt(PromptTemplateInput {
                response_count: Some(9),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(created.response_count, 5);

        store
            .update(SettingsPatch {
                default_response_count: Some(0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.settings().default_response_count, 1);
    }

    #[test]
    fn oversized_settings_are_rejected() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let err = store
            .add_prompt(PromptTemplateInput {
                prompt_text: Some("x".repeat(STORAGE_LIMIT_BYTES + 1)),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, GenerationError::Unknown(msg) if msg.contains("Storage limit")));
        // Nothing was persisted.
        assert!(store.settings().custom_prompts.is_empty());
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
    }
}
