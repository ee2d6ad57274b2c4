//! The persisted preference record shared by every conversation flow.

use std::path::{Path, PathBuf};

use {
    serde::{Deserialize, Serialize},
    tracing::{debug, info, warn},
};

use crate::Result;

/// User preferences, stored as pretty JSON with every key always present.
///
/// Absent values serialize as explicit `null`s rather than missing keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub first_boot: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            first_boot: true,
            latitude: None,
            longitude: None,
            given_name: None,
            family_name: None,
            city: None,
            state: None,
        }
    }
}

/// File-backed preference storage with atomic replace-on-write.
///
/// Assumes a single writer: nothing outside this process edits the file.
#[derive(Debug, Clone)]
pub struct PreferencesStore {
    path: PathBuf,
}

impl PreferencesStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load preferences, creating the file with defaults if it is missing or empty.
    ///
    /// A file that no longer parses is moved aside to `.bak` and replaced with
    /// defaults. Files with missing keys are rewritten in normalized form.
    pub fn load(&self) -> Result<Preferences> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "preferences not found, writing defaults");
                return self.write_defaults();
            },
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            debug!(path = %self.path.display(), "preferences empty, writing defaults");
            return self.write_defaults();
        }

        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "preferences unreadable, resetting");
                let _ = std::fs::rename(&self.path, self.path.with_extension("json.bak"));
                return self.write_defaults();
            },
        };

        let complete = value.as_object().is_some_and(|map| {
            PREFERENCE_KEYS.iter().all(|key| map.contains_key(*key))
        });
        let prefs: Preferences = match serde_json::from_value(value) {
            Ok(p) => p,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "preferences invalid, resetting");
                let _ = std::fs::rename(&self.path, self.path.with_extension("json.bak"));
                return self.write_defaults();
            },
        };
        if !complete {
            self.save(&prefs)?;
        }
        Ok(prefs)
    }

    pub fn save(&self, prefs: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(prefs)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json.as_bytes())?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Load, apply `f`, and persist in one step.
    pub fn update(&self, f: impl FnOnce(&mut Preferences)) -> Result<Preferences> {
        let mut prefs = self.load()?;
        f(&mut prefs);
        self.save(&prefs)?;
        Ok(prefs)
    }

    /// Overwrite the stored record with defaults.
    pub fn reset(&self) -> Result<()> {
        info!(path = %self.path.display(), "resetting preferences to defaults");
        self.save(&Preferences::default())
    }

    fn write_defaults(&self) -> Result<Preferences> {
        let prefs = Preferences::default();
        self.save(&prefs)?;
        Ok(prefs)
    }
}

const PREFERENCE_KEYS: &[&str] = &[
    "first_boot",
    "latitude",
    "longitude",
    "given_name",
    "family_name",
    "city",
    "state",
];

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> PreferencesStore {
        PreferencesStore::new(dir.join("prefs.json"))
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let prefs = store.load().unwrap();
        assert_eq!(prefs, Preferences::default());
        assert!(store.path().exists());
    }

    #[test]
    fn empty_file_is_replaced_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        std::fs::write(store.path(), "").unwrap();

        let prefs = store.load().unwrap();
        assert!(prefs.first_boot);
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"first_boot\": true"));
    }

    #[test]
    fn absent_values_are_written_as_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.save(&Preferences::default()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        let map = value.as_object().unwrap();
        for key in PREFERENCE_KEYS {
            assert!(map.contains_key(*key), "missing {key}");
        }
        assert!(map["city"].is_null());
    }

    #[test]
    fn partial_file_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        std::fs::write(store.path(), r#"{"first_boot": false, "city": "Austin"}"#).unwrap();

        let prefs = store.load().unwrap();
        assert!(!prefs.first_boot);
        assert_eq!(prefs.city.as_deref(), Some("Austin"));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"latitude\": null"));
    }

    #[test]
    fn corrupt_file_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        std::fs::write(store.path(), "{not json").unwrap();

        let prefs = store.load().unwrap();
        assert_eq!(prefs, Preferences::default());
        assert!(dir.path().join("prefs.json.bak").exists());
    }

    #[test]
    fn update_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store
            .update(|p| {
                p.given_name = Some("Ada".into());
                p.first_boot = false;
            })
            .unwrap();
        assert_eq!(store.load().unwrap().given_name.as_deref(), Some("Ada"));

        store.reset().unwrap();
        assert_eq!(store.load().unwrap(), Preferences::default());
    }
}
