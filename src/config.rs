use crate::profile::Profile;
use crate::resolve;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Binding of a repository folder to a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderProfile {
    pub path: String,
    pub profile: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
    #[serde(default)]
    pub folder_profiles: Vec<FolderProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Could not determine home directory")]
    NoHomeDir,
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Failed to write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Config {
    /// Read a config document.
    ///
    /// `Ok(None)` means there is no file yet; an unreadable or malformed file
    /// is an error.
    pub fn read_from(path: &Path) -> Result<Option<Self>, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Write the whole document through a sibling temp file and a rename,
    /// so the target is either the old or the new document.
    pub fn write_to(&self, path: &Path) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut content = serde_json::to_string_pretty(self).map_err(StoreError::Serialize)?;
        content.push('\n');

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config.json".to_string());
        let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

        let mut file = fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(content.as_bytes()).map_err(write_err)?;
        // on disk before the rename
        file.sync_all().map_err(write_err)?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }

        if let Err(source) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(write_err(source));
        }

        Ok(())
    }

    /// Insert or overwrite a profile
    pub fn add_profile(&mut self, name: String, profile: Profile) {
        self.profiles.insert(name, profile);
    }

    /// Remove a profile together with its folder associations and default status
    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        self.folder_profiles.retain(|fp| fp.profile != name);
        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }
        self.profiles.remove(name)
    }

    pub fn get_profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn has_profile(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Get all profile names sorted alphabetically
    pub fn profile_names(&self) -> Vec<&String> {
        self.profiles.keys().collect()
    }

    /// Replace any association for `path` with one pointing at `profile`
    pub fn set_folder_profile(&mut self, path: String, profile: String) {
        self.folder_profiles.retain(|fp| fp.path != path);
        self.folder_profiles.push(FolderProfile { path, profile });
    }

    /// Remove the association stored for exactly `path`
    pub fn remove_folder_profile(&mut self, path: &str) -> bool {
        let before = self.folder_profiles.len();
        self.folder_profiles.retain(|fp| fp.path != path);
        self.folder_profiles.len() != before
    }

    /// Profile that applies to `path`, inherited from enclosing folders
    pub fn folder_profile(&self, path: &str) -> Option<&str> {
        resolve::resolve(path, &self.folder_profiles).map(|fp| fp.profile.as_str())
    }

    /// Association stored for exactly `path`, without inheritance
    pub fn folder_association(&self, path: &str) -> Option<&FolderProfile> {
        self.folder_profiles.iter().find(|fp| fp.path == path)
    }

    /// Folders associated with a profile, in stored order
    pub fn folders_for(&self, profile: &str) -> Vec<&str> {
        self.folder_profiles
            .iter()
            .filter(|fp| fp.profile == profile)
            .map(|fp| fp.path.as_str())
            .collect()
    }
}

/// Key under which a folder is stored and matched
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Persistent profile store backed by a single JSON document.
///
/// The document is read once per process and cached; every mutation writes
/// the full document back.
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    cache: Option<Config>,
}

impl ProfileStore {
    /// Store at `path`, or at the default location (~/.gitx/config.json)
    pub fn open(path: Option<PathBuf>) -> Result<Self, StoreError> {
        let path = match path {
            Some(p) => p,
            None => Self::default_path()?,
        };
        Ok(Self::at(path))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: None,
        }
    }

    pub fn default_path() -> Result<PathBuf, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::NoHomeDir)?;
        Ok(home.join(".gitx").join("config.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document. A missing or unreadable file yields an empty one.
    pub fn load(&mut self) -> &Config {
        if self.cache.is_none() {
            let config = match Config::read_from(&self.path) {
                Ok(Some(config)) => {
                    debug!(path = %self.path.display(), "loaded config");
                    config
                }
                Ok(None) => {
                    debug!(path = %self.path.display(), "no config file, starting empty");
                    Config::default()
                }
                Err(e) => {
                    warn!(error = %e, "ignoring unreadable config, starting empty");
                    Config::default()
                }
            };
            self.cache = Some(config);
        }
        self.cache.get_or_insert_with(Config::default)
    }

    /// Persist the whole document and make it the cached state
    pub fn save(&mut self, config: Config) -> Result<(), StoreError> {
        config.write_to(&self.path)?;
        debug!(
            path = %self.path.display(),
            profiles = config.profiles.len(),
            folders = config.folder_profiles.len(),
            "saved config"
        );
        self.cache = Some(config);
        Ok(())
    }

    fn update<T>(&mut self, f: impl FnOnce(&mut Config) -> T) -> Result<T, StoreError> {
        let mut config = self.load().clone();
        let result = f(&mut config);
        self.save(config)?;
        Ok(result)
    }

    pub fn add_profile(&mut self, name: &str, profile: Profile) -> Result<(), StoreError> {
        self.update(|c| c.add_profile(name.to_string(), profile))
    }

    pub fn remove_profile(&mut self, name: &str) -> Result<Option<Profile>, StoreError> {
        self.update(|c| c.remove_profile(name))
    }

    pub fn get_profile(&mut self, name: &str) -> Option<Profile> {
        self.load().get_profile(name).cloned()
    }

    pub fn list_profiles(&mut self) -> BTreeMap<String, Profile> {
        self.load().profiles.clone()
    }

    pub fn set_folder_profile(&mut self, path: &str, profile: &str) -> Result<(), StoreError> {
        self.update(|c| c.set_folder_profile(path.to_string(), profile.to_string()))
    }

    pub fn get_folder_profile(&mut self, path: &str) -> Option<String> {
        self.load().folder_profile(path).map(str::to_string)
    }

    pub fn remove_folder_profile(&mut self, path: &str) -> Result<bool, StoreError> {
        self.update(|c| c.remove_folder_profile(path))
    }

    pub fn set_default_profile(&mut self, name: &str) -> Result<(), StoreError> {
        self.update(|c| c.default_profile = Some(name.to_string()))
    }

    pub fn get_default_profile(&mut self) -> Option<String> {
        self.load().default_profile.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn profile(name: &str, email: &str) -> Profile {
        Profile::new(name.to_string(), email.to_string(), None, None)
    }

    fn store_in(dir: &TempDir) -> ProfileStore {
        ProfileStore::at(dir.path().join("gitx").join("config.json"))
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.default_profile = Some("personal".to_string());
        config.add_profile("personal".to_string(), profile("John Doe", "john@example.com"));
        config.set_folder_profile("/home/john/oss".to_string(), "personal".to_string());

        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"defaultProfile\": \"personal\""));
        assert!(json.contains("\"folderProfiles\""));
        assert!(json.contains("\"path\": \"/home/john/oss\""));
    }

    #[test]
    fn test_config_deserialization() {
        let json = r#"{
  "profiles": {
    "work": {
      "name": "John Doe",
      "email": "john@company.com",
      "sshKey": "/home/john/.ssh/id_ed25519_work",
      "signingKey": "ABCD1234"
    }
  },
  "folderProfiles": [{ "path": "/home/john/work", "profile": "work" }],
  "defaultProfile": "work"
}"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.default_profile, Some("work".to_string()));
        let profile = config.get_profile("work").unwrap();
        assert_eq!(profile.signing_key, Some("ABCD1234".to_string()));
        assert_eq!(config.folder_profile("/home/john/work/api"), Some("work"));
    }

    #[test]
    fn test_missing_fields_default() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_remove_profile_clears_everything() {
        let mut config = Config::default();
        config.add_profile("work".to_string(), profile("A", "a@work.com"));
        config.add_profile("home".to_string(), profile("A", "a@home.com"));
        config.set_folder_profile("/w".to_string(), "work".to_string());
        config.set_folder_profile("/w/x".to_string(), "work".to_string());
        config.set_folder_profile("/h".to_string(), "home".to_string());
        config.default_profile = Some("work".to_string());

        let removed = config.remove_profile("work");
        assert!(removed.is_some());
        assert!(config.get_profile("work").is_none());
        assert!(config.folder_profiles.iter().all(|fp| fp.profile != "work"));
        assert_eq!(config.folder_profiles.len(), 1);
        assert_eq!(config.default_profile, None);
    }

    #[test]
    fn test_remove_profile_keeps_other_default() {
        let mut config = Config::default();
        config.add_profile("work".to_string(), profile("A", "a@work.com"));
        config.add_profile("home".to_string(), profile("A", "a@home.com"));
        config.default_profile = Some("home".to_string());

        config.remove_profile("work");
        assert_eq!(config.default_profile.as_deref(), Some("home"));
    }

    #[test]
    fn test_set_folder_profile_replaces_by_path() {
        let mut config = Config::default();
        config.set_folder_profile("/r".to_string(), "p1".to_string());
        config.set_folder_profile("/other".to_string(), "p1".to_string());
        config.set_folder_profile("/r".to_string(), "p2".to_string());

        let for_r: Vec<_> = config
            .folder_profiles
            .iter()
            .filter(|fp| fp.path == "/r")
            .collect();
        assert_eq!(for_r.len(), 1);
        assert_eq!(for_r[0].profile, "p2");
        assert_eq!(config.folder_profiles.len(), 2);
    }

    #[test]
    fn test_remove_folder_profile_is_exact() {
        let mut config = Config::default();
        config.set_folder_profile("/r".to_string(), "p1".to_string());
        config.set_folder_profile("/r/sub".to_string(), "p2".to_string());

        assert!(!config.remove_folder_profile("/r/sub/deep"));
        assert!(config.remove_folder_profile("/r/sub"));
        assert_eq!(config.folder_profile("/r/sub/deep"), Some("p1"));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert_eq!(store.load(), &Config::default());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_load_corrupt_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Config::read_from(&path),
            Err(StoreError::Parse { .. })
        ));

        let mut store = ProfileStore::at(&path);
        assert_eq!(store.load(), &Config::default());
    }

    #[test]
    fn test_save_creates_directory_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store
            .add_profile("work", profile("John", "john@company.com"))
            .unwrap();
        store.set_folder_profile("/home/john/work", "work").unwrap();
        store.set_default_profile("work").unwrap();

        assert!(store.path().exists());

        let mut reopened = ProfileStore::at(store.path());
        assert_eq!(reopened.get_default_profile().as_deref(), Some("work"));
        assert_eq!(
            reopened.get_folder_profile("/home/john/work/api").as_deref(),
            Some("work")
        );
        assert_eq!(
            reopened.get_profile("work").map(|p| p.email),
            Some("john@company.com".to_string())
        );
    }

    #[test]
    fn test_load_is_cached() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.add_profile("work", profile("John", "j@c.com")).unwrap();

        fs::write(store.path(), "{}").unwrap();
        assert!(store.get_profile("work").is_some());

        let mut fresh = ProfileStore::at(store.path());
        assert!(fresh.get_profile("work").is_none());
    }

    #[test]
    fn test_store_remove_profile_persists_all_effects() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.add_profile("work", profile("John", "j@c.com")).unwrap();
        store.set_folder_profile("/w", "work").unwrap();
        store.set_default_profile("work").unwrap();

        store.remove_profile("work").unwrap();

        let mut reopened = ProfileStore::at(store.path());
        let config = reopened.load();
        assert!(config.profiles.is_empty());
        assert!(config.folder_profiles.is_empty());
        assert_eq!(config.default_profile, None);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let mut store = ProfileStore::at(dir.path().join("config.json"));
        store.add_profile("work", profile("John", "j@c.com")).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["config.json".to_string()]);
    }

    #[test]
    fn test_write_replaces_whole_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut big = Config::default();
        for i in 0..20 {
            big.add_profile(format!("p{}", i), profile("John", "j@c.com"));
        }
        big.write_to(&path).unwrap();

        let mut small = Config::default();
        small.add_profile("work".to_string(), profile("Jane", "jane@acme.io"));
        small.write_to(&path).unwrap();

        let on_disk = fs::read_to_string(&path).unwrap();
        assert!(on_disk.ends_with("}\n"));
        assert_eq!(Config::read_from(&path).unwrap(), Some(small));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_save_error_propagates() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let mut store = ProfileStore::at(blocker.join("config.json"));
        let result = store.add_profile("work", profile("John", "j@c.com"));
        assert!(matches!(result, Err(StoreError::Write { .. })));
    }
}
