/// User settings: reminder toggle, interval and per-category flags

use crate::category::CategoryTable;
use crate::error::StoreError;
use crate::storage::{get_or_empty, set_with_retry, KeyValueStore};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const REMINDERS_ENABLED_KEY: &str = "remindersEnabled";
pub const REMINDER_INTERVAL_KEY: &str = "reminderInterval";
pub const ENABLED_CATEGORIES_KEY: &str = "enabledCategories";

/// Minutes on a site before the reminder fires
pub const DEFAULT_REMINDER_INTERVAL: u32 = 10;

/// Categories that get a default flag when none is stored
pub const KNOWN_CATEGORIES: [&str; 5] =
    ["social", "education", "entertainment", "productivity", "news"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub reminders_enabled: bool,
    pub reminder_interval: u32,
    pub enabled_categories: BTreeMap<String, bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            reminders_enabled: true,
            reminder_interval: DEFAULT_REMINDER_INTERVAL,
            enabled_categories: KNOWN_CATEGORIES
                .iter()
                .map(|key| (key.to_string(), true))
                .collect(),
        }
    }
}

impl Settings {
    /// Build settings from stored values, defaulting each missing field
    pub fn from_stored(stored: &Map<String, Value>) -> Self {
        let defaults = Settings::default();

        let reminders_enabled = stored
            .get(REMINDERS_ENABLED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(defaults.reminders_enabled);

        let reminder_interval = stored
            .get(REMINDER_INTERVAL_KEY)
            .and_then(Value::as_u64)
            .filter(|minutes| *minutes > 0)
            .and_then(|minutes| u32::try_from(minutes).ok())
            .unwrap_or(defaults.reminder_interval);

        let mut enabled_categories = defaults.enabled_categories;
        if let Some(Value::Object(flags)) = stored.get(ENABLED_CATEGORIES_KEY) {
            for (key, flag) in flags {
                if let Some(flag) = flag.as_bool() {
                    enabled_categories.insert(key.clone(), flag);
                }
            }
        }

        Settings {
            reminders_enabled,
            reminder_interval,
            enabled_categories,
        }
    }

    /// Whether reminders apply to sites in `category`; unlisted categories
    /// (including "other") never get reminders
    pub fn is_category_enabled(&self, category: &str) -> bool {
        self.enabled_categories.get(category).copied().unwrap_or(false)
    }

    /// Give every table category without a stored flag the default of enabled
    pub fn enable_table_categories(&mut self, table: &CategoryTable) {
        for key in table.keys() {
            self.enabled_categories.entry(key.to_string()).or_insert(true);
        }
    }

    fn to_stored(&self) -> Map<String, Value> {
        let mut items = Map::new();
        items.insert(REMINDERS_ENABLED_KEY.to_string(), Value::Bool(self.reminders_enabled));
        items.insert(REMINDER_INTERVAL_KEY.to_string(), Value::from(self.reminder_interval));
        items.insert(
            ENABLED_CATEGORIES_KEY.to_string(),
            Value::Object(
                self.enabled_categories
                    .iter()
                    .map(|(key, flag)| (key.clone(), Value::Bool(*flag)))
                    .collect(),
            ),
        );
        items
    }
}

/// Raw state of the settings panel form
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsForm {
    pub reminders_enabled: bool,
    pub reminder_interval: String,
    /// (category key, label, checked) in table order
    pub categories: Vec<(String, String, bool)>,
}

impl SettingsForm {
    /// Populate the form from current settings, one checkbox per table category
    pub fn from_settings(settings: &Settings, table: &CategoryTable) -> Self {
        SettingsForm {
            reminders_enabled: settings.reminders_enabled,
            reminder_interval: settings.reminder_interval.to_string(),
            categories: table
                .keys()
                .map(|key| {
                    (
                        key.to_string(),
                        table.label_for_key(key),
                        settings.is_category_enabled(key),
                    )
                })
                .collect(),
        }
    }

    pub fn set_category(&mut self, key: &str, checked: bool) {
        if let Some(entry) = self.categories.iter_mut().find(|(k, _, _)| k == key) {
            entry.2 = checked;
        }
    }

    /// Convert to settings; an unparsable or zero interval becomes the default
    pub fn to_settings(&self) -> Settings {
        let reminder_interval = self
            .reminder_interval
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|minutes| *minutes > 0)
            .unwrap_or(DEFAULT_REMINDER_INTERVAL);

        Settings {
            reminders_enabled: self.reminders_enabled,
            reminder_interval,
            enabled_categories: self
                .categories
                .iter()
                .map(|(key, _, checked)| (key.clone(), *checked))
                .collect(),
        }
    }
}

/// Read persisted settings, defaulting anything missing or unreadable
pub async fn load_settings<S: KeyValueStore>(store: &S) -> Settings {
    let stored = get_or_empty(
        store,
        &[REMINDERS_ENABLED_KEY, REMINDER_INTERVAL_KEY, ENABLED_CATEGORIES_KEY],
    )
    .await;
    let settings = Settings::from_stored(&stored);
    log::debug!("Loaded settings: {:?}", settings);
    settings
}

pub async fn save_settings<S: KeyValueStore>(
    store: &S,
    settings: &Settings,
) -> Result<(), StoreError> {
    set_with_retry(store, settings.to_stored()).await?;
    log::info!(
        "Saved settings: reminders {} at {} min",
        if settings.reminders_enabled { "on" } else { "off" },
        settings.reminder_interval
    );
    Ok(())
}
