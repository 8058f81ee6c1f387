use crate::config::{path_key, Config};
use crate::git::{ConfigScope, ConfigStore, Git, GitError};
use crate::identity::{self, Identity};
use anyhow::Result;
use colored::Colorize;

/// Get the current profile name based on git config.
///
/// The local identity wins when it is set; otherwise the global one is used.
pub fn get_current_profile(config: &Config, git: &impl ConfigStore) -> Result<Option<String>, GitError> {
    let local = identity::read(git, ConfigScope::Local)?;
    let active = if local.is_empty() {
        identity::read(git, ConfigScope::Global)?
    } else {
        local
    };
    Ok(active.matching_profile(config).map(str::to_string))
}

/// Output current profile for shell prompt (porcelain mode)
pub fn output_porcelain(config: &Config) -> Result<()> {
    let git = Git::new();
    // --local fails outside a repository
    let current = if git.is_repo() {
        get_current_profile(config, &git)?
    } else {
        identity::read(&git, ConfigScope::Global)?
            .matching_profile(config)
            .map(str::to_string)
    };

    if let Some(profile_name) = current {
        println!("{}", profile_name);
    }
    Ok(())
}

fn print_identity(id: &Identity) {
    match (&id.name, &id.email) {
        (None, None) => println!("  {}", "not set".dimmed()),
        (name, email) => {
            println!("  Name:  {}", name.as_deref().unwrap_or("-"));
            println!("  Email: {}", email.as_deref().unwrap_or("-"));
            if let Some(key) = &id.signing_key {
                let state = if id.gpg_sign { "on" } else { "off" };
                println!("  Signing key: {} (signing {})", key, state);
            }
        }
    }
}

fn profile_label(id: &Identity, config: &Config) -> String {
    match id.matching_profile(config) {
        Some(name) => name.cyan().bold().to_string(),
        None if id.is_empty() => "none".dimmed().to_string(),
        None => "no matching profile".yellow().to_string(),
    }
}

/// Output current profile with formatting (human-readable mode)
pub fn output_human(config: &Config) -> Result<()> {
    let git = Git::new();

    if git.is_repo() {
        let root = git.repo_root()?;
        let local = identity::read(&git, ConfigScope::Local)?;

        println!("{} {}", "Local:".bold(), profile_label(&local, config));
        print_identity(&local);
        match config.folder_profile(&path_key(&root)) {
            Some(folder) => println!("  Folder profile: {}", folder.cyan()),
            None => println!("  Folder profile: {}", "none".dimmed()),
        }
        println!();
    } else {
        println!("{}", "Not in a git repository".dimmed());
        println!();
    }

    let global = identity::read(&git, ConfigScope::Global)?;
    println!("{} {}", "Global:".bold(), profile_label(&global, config));
    print_identity(&global);
    if let Some(default) = &config.default_profile {
        println!("  Default profile: {}", default.cyan());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::tests::FakeConfig;
    use crate::profile::Profile;

    fn config() -> Config {
        let mut config = Config::default();
        config.add_profile(
            "work".to_string(),
            Profile::new("Jane Doe".to_string(), "jane@acme.io".to_string(), None, None),
        );
        config.add_profile(
            "personal".to_string(),
            Profile::new("Jane".to_string(), "jane@home.dev".to_string(), None, None),
        );
        config
    }

    #[test]
    fn test_local_identity_wins() {
        let git = FakeConfig::with(&[
            (ConfigScope::Local, "user.name", "Jane Doe"),
            (ConfigScope::Local, "user.email", "jane@acme.io"),
            (ConfigScope::Global, "user.name", "Jane"),
            (ConfigScope::Global, "user.email", "jane@home.dev"),
        ]);
        assert_eq!(
            get_current_profile(&config(), &git).unwrap().as_deref(),
            Some("work")
        );
    }

    #[test]
    fn test_falls_back_to_global() {
        let git = FakeConfig::with(&[
            (ConfigScope::Global, "user.name", "Jane"),
            (ConfigScope::Global, "user.email", "jane@home.dev"),
        ]);
        assert_eq!(
            get_current_profile(&config(), &git).unwrap().as_deref(),
            Some("personal")
        );
    }

    #[test]
    fn test_name_must_match_too() {
        let git = FakeConfig::with(&[
            (ConfigScope::Local, "user.name", "Someone Else"),
            (ConfigScope::Local, "user.email", "jane@acme.io"),
        ]);
        assert_eq!(get_current_profile(&config(), &git).unwrap(), None);
    }
}
