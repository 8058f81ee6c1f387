use crate::config::Config;
use crate::git::{ConfigScope, ConfigStore, GitError};
use crate::profile::Profile;
use tracing::{debug, warn};

const USER_NAME: &str = "user.name";
const USER_EMAIL: &str = "user.email";
const SIGNING_KEY: &str = "user.signingkey";
const GPG_SIGN: &str = "commit.gpgsign";

const IDENTITY_KEYS: [&str; 4] = [USER_NAME, USER_EMAIL, SIGNING_KEY, GPG_SIGN];

/// Identity fields currently set in one config scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub name: Option<String>,
    pub email: Option<String>,
    pub signing_key: Option<String>,
    pub gpg_sign: bool,
}

impl Identity {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }

    /// Whether this identity is the profile's name and email
    pub fn matches(&self, profile: &Profile) -> bool {
        self.name.as_deref() == Some(profile.name.as_str())
            && self.email.as_deref() == Some(profile.email.as_str())
    }

    /// Name of the stored profile with this name and email, if any
    pub fn matching_profile<'a>(&self, config: &'a Config) -> Option<&'a str> {
        config
            .profiles
            .iter()
            .find(|(_, profile)| self.matches(profile))
            .map(|(name, _)| name.as_str())
    }
}

/// Read the identity keys of a scope; unset keys come back as `None`
pub fn read(git: &impl ConfigStore, scope: ConfigScope) -> Result<Identity, GitError> {
    let gpg_sign = git
        .get(GPG_SIGN, scope)?
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "yes" | "on" | "1"))
        .unwrap_or(false);

    Ok(Identity {
        name: git.get(USER_NAME, scope)?,
        email: git.get(USER_EMAIL, scope)?,
        signing_key: git.get(SIGNING_KEY, scope)?,
        gpg_sign,
    })
}

/// Write a profile's identity to a scope.
///
/// Signing settings left by a previous profile are cleared when this profile
/// has no signing key.
pub fn apply(git: &impl ConfigStore, profile: &Profile, scope: ConfigScope) -> Result<(), GitError> {
    git.set(USER_NAME, &profile.name, scope)?;
    git.set(USER_EMAIL, &profile.email, scope)?;

    if let Some(key) = profile.signing_key.as_deref() {
        git.set(SIGNING_KEY, key, scope)?;
        git.set(GPG_SIGN, "true", scope)?;
    } else {
        unset_keys(git, &[SIGNING_KEY, GPG_SIGN], scope);
    }

    debug!(%scope, email = %profile.email, "applied identity");
    Ok(())
}

/// Whether the scope already carries the profile's name and email
pub fn is_applied(
    git: &impl ConfigStore,
    profile: &Profile,
    scope: ConfigScope,
) -> Result<bool, GitError> {
    let name = git.get(USER_NAME, scope)?;
    let email = git.get(USER_EMAIL, scope)?;
    Ok(name.as_deref() == Some(profile.name.as_str())
        && email.as_deref() == Some(profile.email.as_str()))
}

/// Apply the profile unless it is already active. Returns whether anything was written.
pub fn apply_if_needed(
    git: &impl ConfigStore,
    profile: &Profile,
    scope: ConfigScope,
) -> Result<bool, GitError> {
    if is_applied(git, profile, scope)? {
        debug!(%scope, email = %profile.email, "identity already applied");
        return Ok(false);
    }
    apply(git, profile, scope)?;
    Ok(true)
}

/// Clear every identity key of a scope, returning the keys that were removed.
///
/// Each key is attempted on its own; a failure on one does not stop the rest.
pub fn unset(git: &impl ConfigStore, scope: ConfigScope) -> Vec<&'static str> {
    unset_keys(git, &IDENTITY_KEYS, scope)
}

fn unset_keys(git: &impl ConfigStore, keys: &[&'static str], scope: ConfigScope) -> Vec<&'static str> {
    let mut removed = Vec::new();
    for &key in keys {
        match git.unset(key, scope) {
            Ok(true) => removed.push(key),
            Ok(false) => {}
            Err(e) => warn!(key, %scope, error = %e, "could not unset git config key"),
        }
    }
    removed
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    /// In-memory git config that counts writes
    #[derive(Default)]
    pub(crate) struct FakeConfig {
        values: RefCell<HashMap<(ConfigScope, String), String>>,
        pub writes: Cell<usize>,
        pub broken_key: Option<&'static str>,
    }

    impl FakeConfig {
        pub fn with(entries: &[(ConfigScope, &str, &str)]) -> Self {
            let fake = FakeConfig::default();
            for (scope, key, value) in entries {
                fake.values
                    .borrow_mut()
                    .insert((*scope, key.to_string()), value.to_string());
            }
            fake
        }

        pub fn value(&self, scope: ConfigScope, key: &str) -> Option<String> {
            self.values.borrow().get(&(scope, key.to_string())).cloned()
        }
    }

    impl ConfigStore for FakeConfig {
        fn get(&self, key: &str, scope: ConfigScope) -> Result<Option<String>, GitError> {
            Ok(self.value(scope, key))
        }

        fn set(&self, key: &str, value: &str, scope: ConfigScope) -> Result<(), GitError> {
            self.writes.set(self.writes.get() + 1);
            self.values
                .borrow_mut()
                .insert((scope, key.to_string()), value.to_string());
            Ok(())
        }

        fn unset(&self, key: &str, scope: ConfigScope) -> Result<bool, GitError> {
            if self.broken_key == Some(key) {
                return Err(GitError::Command {
                    command: format!("config --unset {key}"),
                    message: "could not lock config file".to_string(),
                });
            }
            self.writes.set(self.writes.get() + 1);
            Ok(self
                .values
                .borrow_mut()
                .remove(&(scope, key.to_string()))
                .is_some())
        }
    }

    fn work() -> Profile {
        Profile::new("Jane Doe".to_string(), "jane@acme.io".to_string(), None, None)
    }

    fn signing() -> Profile {
        Profile::new(
            "Jane Doe".to_string(),
            "jane@oss.dev".to_string(),
            None,
            Some("ABCD1234".to_string()),
        )
    }

    #[test]
    fn test_apply_sets_name_and_email() {
        let git = FakeConfig::default();
        apply(&git, &work(), ConfigScope::Local).unwrap();

        assert_eq!(git.value(ConfigScope::Local, USER_NAME).as_deref(), Some("Jane Doe"));
        assert_eq!(git.value(ConfigScope::Local, USER_EMAIL).as_deref(), Some("jane@acme.io"));
        assert_eq!(git.value(ConfigScope::Local, SIGNING_KEY), None);
        assert_eq!(git.value(ConfigScope::Global, USER_NAME), None);
    }

    #[test]
    fn test_apply_with_signing_key() {
        let git = FakeConfig::default();
        apply(&git, &signing(), ConfigScope::Global).unwrap();

        let identity = read(&git, ConfigScope::Global).unwrap();
        assert_eq!(identity.signing_key.as_deref(), Some("ABCD1234"));
        assert!(identity.gpg_sign);
    }

    #[test]
    fn test_apply_without_signing_key_clears_previous_signing() {
        let git = FakeConfig::with(&[
            (ConfigScope::Local, SIGNING_KEY, "OLDKEY"),
            (ConfigScope::Local, GPG_SIGN, "true"),
        ]);
        apply(&git, &work(), ConfigScope::Local).unwrap();

        let identity = read(&git, ConfigScope::Local).unwrap();
        assert_eq!(identity.signing_key, None);
        assert!(!identity.gpg_sign);
    }

    #[test]
    fn test_read_tolerates_missing_keys() {
        let git = FakeConfig::with(&[(ConfigScope::Local, USER_EMAIL, "jane@acme.io")]);
        let identity = read(&git, ConfigScope::Local).unwrap();

        assert_eq!(identity.name, None);
        assert_eq!(identity.email.as_deref(), Some("jane@acme.io"));
        assert!(!identity.is_empty());
        assert!(read(&git, ConfigScope::Global).unwrap().is_empty());
    }

    #[test]
    fn test_already_applied_performs_no_writes() {
        let git = FakeConfig::with(&[
            (ConfigScope::Local, USER_NAME, "Jane Doe"),
            (ConfigScope::Local, USER_EMAIL, "jane@acme.io"),
        ]);

        assert!(!apply_if_needed(&git, &work(), ConfigScope::Local).unwrap());
        assert_eq!(git.writes.get(), 0);
    }

    #[test]
    fn test_apply_if_needed_writes_when_email_differs() {
        let git = FakeConfig::with(&[
            (ConfigScope::Local, USER_NAME, "Jane Doe"),
            (ConfigScope::Local, USER_EMAIL, "jane@home.net"),
        ]);

        assert!(apply_if_needed(&git, &work(), ConfigScope::Local).unwrap());
        assert!(is_applied(&git, &work(), ConfigScope::Local).unwrap());
    }

    #[test]
    fn test_global_identity_does_not_count_as_local() {
        let git = FakeConfig::with(&[
            (ConfigScope::Global, USER_NAME, "Jane Doe"),
            (ConfigScope::Global, USER_EMAIL, "jane@acme.io"),
        ]);
        assert!(!is_applied(&git, &work(), ConfigScope::Local).unwrap());
    }

    #[test]
    fn test_unset_clears_present_keys_only() {
        let git = FakeConfig::with(&[
            (ConfigScope::Local, USER_NAME, "Jane Doe"),
            (ConfigScope::Local, USER_EMAIL, "jane@acme.io"),
            (ConfigScope::Global, USER_NAME, "Global Jane"),
        ]);

        let removed = unset(&git, ConfigScope::Local);
        assert_eq!(removed, vec![USER_NAME, USER_EMAIL]);
        assert!(read(&git, ConfigScope::Local).unwrap().is_empty());
        assert_eq!(
            git.value(ConfigScope::Global, USER_NAME).as_deref(),
            Some("Global Jane")
        );
    }

    #[test]
    fn test_unset_continues_past_failing_key() {
        let mut git = FakeConfig::with(&[
            (ConfigScope::Local, USER_NAME, "Jane Doe"),
            (ConfigScope::Local, USER_EMAIL, "jane@acme.io"),
            (ConfigScope::Local, GPG_SIGN, "true"),
        ]);
        git.broken_key = Some(USER_EMAIL);

        let removed = unset(&git, ConfigScope::Local);
        assert_eq!(removed, vec![USER_NAME, GPG_SIGN]);
    }

    #[test]
    fn test_matching_profile() {
        let mut config = Config::default();
        config.add_profile("work".to_string(), work());
        config.add_profile("oss".to_string(), signing());

        let identity = Identity {
            name: Some("Jane Doe".to_string()),
            email: Some("jane@oss.dev".to_string()),
            ..Identity::default()
        };
        assert_eq!(identity.matching_profile(&config), Some("oss"));
        assert_eq!(Identity::default().matching_profile(&config), None);
    }
}
