use crate::config::{path_key, ProfileStore};
use crate::git::{ConfigScope, ConfigStore, Git, GitError};
use crate::identity;
use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What happened when applying the folder's profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoApply {
    NoAssociation,
    /// The folder points at a profile that no longer exists
    MissingProfile(String),
    AlreadyApplied(String),
    Applied(String),
}

/// Apply the profile associated with `repo_root` to its local config, if needed
pub fn apply_folder_profile(
    store: &mut ProfileStore,
    git: &impl ConfigStore,
    repo_root: &Path,
) -> Result<AutoApply, GitError> {
    let Some(profile_name) = store.get_folder_profile(&path_key(repo_root)) else {
        return Ok(AutoApply::NoAssociation);
    };
    let Some(profile) = store.get_profile(&profile_name) else {
        return Ok(AutoApply::MissingProfile(profile_name));
    };

    if identity::apply_if_needed(git, &profile, ConfigScope::Local)? {
        Ok(AutoApply::Applied(profile_name))
    } else {
        Ok(AutoApply::AlreadyApplied(profile_name))
    }
}

/// Profile for a repository without an association: the stored profile whose
/// email equals the repository's local `user.email`
fn detect_from_local_email(store: &mut ProfileStore, git: &impl ConfigStore) -> Result<Option<String>> {
    let local = identity::read(git, ConfigScope::Local)?;
    let Some(email) = local.email else {
        return Ok(None);
    };

    Ok(store
        .list_profiles()
        .into_iter()
        .find(|(_, profile)| profile.email == email)
        .map(|(name, _)| name))
}

pub fn cmd_auto(
    store: &mut ProfileStore,
    path: Option<PathBuf>,
    disable: bool,
    apply: bool,
) -> Result<()> {
    let (git, root) = Git::work_tree(path)?;
    let key = path_key(&root);

    if disable {
        if store.remove_folder_profile(&key)? {
            println!(
                "{} Automatic profile disabled for {}",
                "Success:".green().bold(),
                root.display()
            );
        } else {
            println!("No automatic profile was set for {}", root.display());
            if let Some(inherited) = store.get_folder_profile(&key) {
                println!(
                    "  Profile '{}' still applies through a parent folder",
                    inherited.cyan()
                );
            }
        }
        return Ok(());
    }

    if apply {
        report_auto_apply(&apply_folder_profile(store, &git, &root)?, false);
        return Ok(());
    }

    let profile_name = match store.get_folder_profile(&key) {
        Some(name) => Some(name),
        None => detect_from_local_email(store, &git)?,
    };

    let Some(profile_name) = profile_name else {
        println!(
            "{} No profile found for this folder",
            "Warning:".yellow().bold()
        );
        println!("Run {} to pick one", "gitx switch <profile>".yellow());
        return Ok(());
    };

    store.set_folder_profile(&key, &profile_name)?;
    println!("{} Automatic profile enabled", "Success:".green().bold());
    println!("  Folder:  {}", root.display());
    println!("  Profile: {}", profile_name.cyan());
    Ok(())
}

pub fn cmd_hook(store: &mut ProfileStore, silent: bool) -> Result<()> {
    let git = Git::new();
    if !git.is_repo() {
        debug!("hook outside a repository");
        return Ok(());
    }
    let root = git.repo_root()?;
    report_auto_apply(&apply_folder_profile(store, &git, &root)?, silent);
    Ok(())
}

/// Print the outcome of an automatic application
pub fn report_auto_apply(outcome: &AutoApply, silent: bool) {
    match outcome {
        AutoApply::Applied(name) => {
            if !silent {
                println!("Profile '{}' applied automatically", name.cyan());
            }
        }
        AutoApply::AlreadyApplied(name) => {
            debug!(profile = %name, "profile already active");
            if !silent {
                println!("Profile '{}' is already active", name.cyan());
            }
        }
        AutoApply::NoAssociation => {
            if !silent {
                println!("No profile associated with this folder");
            }
        }
        AutoApply::MissingProfile(name) => {
            eprintln!(
                "{} Folder is linked to profile '{}', which does not exist",
                "Warning:".yellow().bold(),
                name
            );
        }
    }
}
