use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::error::EngineError;

/// Window sizing. Read by the sampler on every tick, so edits apply to the
/// next frame without restarting playback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SamplingSettings {
    pub frames_per_dispatch: usize,
    pub min_buffer: usize,
    pub max_buffer: usize,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            frames_per_dispatch: 20,
            min_buffer: 15,
            max_buffer: 30,
        }
    }
}

impl SamplingSettings {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.frames_per_dispatch < 1 {
            return Err(EngineError::InvalidSettings(
                "framesPerDispatch must be at least 1".into(),
            ));
        }
        if self.min_buffer < 1 {
            return Err(EngineError::InvalidSettings(
                "minBuffer must be at least 1".into(),
            ));
        }
        if self.max_buffer < self.min_buffer {
            return Err(EngineError::InvalidSettings(format!(
                "maxBuffer ({}) must not be below minBuffer ({})",
                self.max_buffer, self.min_buffer
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserSettings {
    #[serde(default)]
    backend_url: Option<String>,
    #[serde(default)]
    sampling: SamplingSettings,
}

/// Operator settings, optionally backed by a JSON file.
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            let parsed: UserSettings = serde_json::from_str(&contents).unwrap_or_default();
            if parsed.sampling.validate().is_ok() {
                parsed
            } else {
                log::warn!(
                    "Ignoring invalid sampling settings in {}; using defaults",
                    path.display()
                );
                UserSettings {
                    sampling: SamplingSettings::default(),
                    ..parsed
                }
            }
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    /// Settings that live only for this process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(UserSettings::default()),
        }
    }

    pub fn sampling(&self) -> SamplingSettings {
        self.read().sampling
    }

    pub fn backend_url(&self) -> Option<String> {
        self.read().backend_url.clone()
    }

    pub fn update_sampling(&self, sampling: SamplingSettings) -> Result<()> {
        sampling.validate()?;
        let mut guard = self.write();
        guard.sampling = sampling;
        self.persist(&guard)
    }

    pub fn update_backend_url(&self, url: Option<String>) -> Result<()> {
        let mut guard = self.write();
        guard.backend_url = url;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    // A panic while holding the lock cannot leave the settings half-written,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_operator_panel() {
        let store = SettingsStore::in_memory();
        let sampling = store.sampling();
        assert_eq!(sampling.frames_per_dispatch, 20);
        assert_eq!(sampling.min_buffer, 15);
        assert_eq!(sampling.max_buffer, 30);
        assert!(store.backend_url().is_none());
    }

    #[test]
    fn rejects_max_below_min() {
        let store = SettingsStore::in_memory();
        let err = store
            .update_sampling(SamplingSettings {
                frames_per_dispatch: 20,
                min_buffer: 15,
                max_buffer: 10,
            })
            .unwrap_err();
        assert!(err.to_string().contains("maxBuffer"));
        assert_eq!(store.sampling(), SamplingSettings::default());
    }

    #[test]
    fn rejects_zero_dispatch_size() {
        let invalid = SamplingSettings {
            frames_per_dispatch: 0,
            ..SamplingSettings::default()
        };
        assert!(matches!(
            invalid.validate(),
            Err(EngineError::InvalidSettings(_))
        ));
    }

    #[test]
    fn persists_and_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update_sampling(SamplingSettings {
                frames_per_dispatch: 8,
                min_buffer: 4,
                max_buffer: 12,
            })
            .unwrap();
        store
            .update_backend_url(Some("http://localhost:8000".into()))
            .unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.sampling().frames_per_dispatch, 8);
        assert_eq!(
            reloaded.backend_url().as_deref(),
            Some("http://localhost:8000")
        );
    }

    #[test]
    fn invalid_file_falls_back_to_default_sampling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"backendUrl":"http://x","sampling":{"framesPerDispatch":5,"minBuffer":9,"maxBuffer":3}}"#,
        )
        .unwrap();

        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.sampling(), SamplingSettings::default());
        assert_eq!(store.backend_url().as_deref(), Some("http://x"));
    }
}
