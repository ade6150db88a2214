use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::remote::indexer::DEFAULT_MAX_PAGES;

/// User-tunable rotation preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationSettings {
    /// Title of the remote container to rotate within.
    pub container_title: String,
    /// Blur strength applied to the chosen image, 0..=100.
    pub blur_intensity: u32,
    /// Listing page cap per refresh.
    pub max_pages: usize,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            container_title: "Wallpapers".into(),
            blur_intensity: 60,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct UserSettings {
    rotation: RotationSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn rotation(&self) -> RotationSettings {
        self.data.read().unwrap().rotation.clone()
    }

    pub fn update_rotation(&self, settings: RotationSettings) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            guard.rotation = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
