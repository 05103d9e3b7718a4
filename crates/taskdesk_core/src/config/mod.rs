use crate::error::AppError;
use crate::ordering::SortOrder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "taskdesk";
const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "TASKDESK_CONFIG_PATH";

pub const DEFAULT_NOTIFICATION_THRESHOLDS: [u32; 3] = [60, 30, 5];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_true")]
    pub show_completed_tasks: bool,
    #[serde(default)]
    pub notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub auto_save: bool,
    /// Minutes before a due date at which a reminder fires.
    #[serde(default = "default_thresholds")]
    pub notification_thresholds: Vec<u32>,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_completed_tasks: true,
            notifications_enabled: false,
            auto_save: true,
            notification_thresholds: default_thresholds(),
            sort_order: SortOrder::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_thresholds() -> Vec<u32> {
    DEFAULT_NOTIFICATION_THRESHOLDS.to_vec()
}

#[derive(Debug, Clone)]
pub struct SettingsLoad {
    pub settings: Settings,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub show_completed_tasks: Option<bool>,
    pub notifications_enabled: Option<bool>,
    pub auto_save: Option<bool>,
    pub notification_thresholds: Option<Vec<u32>>,
    pub sort_order: Option<SortOrder>,
}

/// Per-user directory holding the settings and storage files.
pub fn app_dir() -> Result<PathBuf, AppError> {
    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join(APP_DIR_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home).join(".config").join(APP_DIR_NAME))
    }
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    Ok(app_dir()?.join(CONFIG_FILE_NAME))
}

pub fn load_settings() -> Result<Settings, AppError> {
    let path = config_path()?;
    load_settings_from_path(&path)
}

pub fn load_settings_with_fallback() -> SettingsLoad {
    match config_path() {
        Ok(path) => load_settings_with_fallback_from_path(&path),
        Err(err) => SettingsLoad {
            settings: Settings::default(),
            error: Some(err),
        },
    }
}

fn load_settings_with_fallback_from_path(path: &Path) -> SettingsLoad {
    if !path.exists() {
        return SettingsLoad {
            settings: Settings::default(),
            error: None,
        };
    }

    match load_settings_from_path(path) {
        Ok(settings) => SettingsLoad {
            settings,
            error: None,
        },
        Err(err) => SettingsLoad {
            settings: Settings::default(),
            error: Some(err),
        },
    }
}

fn load_settings_from_path(path: &Path) -> Result<Settings, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let mut settings: Settings = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    settings.notification_thresholds = normalize_thresholds(settings.notification_thresholds);
    Ok(settings)
}

/// Largest first, without duplicates or zeros; an empty list falls back to the defaults.
pub fn normalize_thresholds(mut thresholds: Vec<u32>) -> Vec<u32> {
    thresholds.retain(|minutes| *minutes > 0);
    thresholds.sort_unstable_by(|a, b| b.cmp(a));
    thresholds.dedup();
    if thresholds.is_empty() {
        default_thresholds()
    } else {
        thresholds
    }
}

pub fn merge_overrides(base: &Settings, overrides: &SettingsOverrides) -> Settings {
    let mut merged = base.clone();
    if let Some(value) = overrides.show_completed_tasks {
        merged.show_completed_tasks = value;
    }
    if let Some(value) = overrides.notifications_enabled {
        merged.notifications_enabled = value;
    }
    if let Some(value) = overrides.auto_save {
        merged.auto_save = value;
    }
    if let Some(thresholds) = overrides.notification_thresholds.as_ref() {
        merged.notification_thresholds = normalize_thresholds(thresholds.clone());
    }
    if let Some(order) = overrides.sort_order {
        merged.sort_order = order;
    }
    merged
}
