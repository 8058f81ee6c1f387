use crate::config::{path_key, ProfileStore};
use crate::git::{ConfigScope, Git};
use crate::identity;
use crate::profile::{Profile, Provider};
use anyhow::{bail, Context, Result};
use colored::Colorize;
use inquire::{Confirm, Select};
use std::path::{Path, PathBuf};

/// Rewrite a remote URL so it goes through the profile's SSH host alias.
///
/// `git@github.com:acme/repo.git` and `https://github.com/acme/repo.git` both
/// become `git@github.com-<profile>:acme/repo.git` (same for gitlab.com). A URL
/// that already uses an alias gets its suffix replaced. Anything else is
/// returned unchanged.
pub fn rewrite_url(url: &str, profile: &str) -> String {
    for provider in Provider::ALL {
        let ssh_prefix = format!("git@{}:", provider.host());
        if let Some(rest) = url.strip_prefix(&ssh_prefix) {
            return format!("git@{}:{}", provider.host_alias(profile), rest);
        }
    }

    for provider in Provider::ALL {
        let https_prefix = format!("https://{}/", provider.host());
        if let Some(rest) = url.strip_prefix(&https_prefix) {
            return format!("git@{}:{}", provider.host_alias(profile), rest);
        }
    }

    replace_alias_suffix(url, profile).unwrap_or_else(|| url.to_string())
}

fn is_alias_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Swap the profile part of the first `<host>-<profile>` alias in the URL
fn replace_alias_suffix(url: &str, profile: &str) -> Option<String> {
    let (start, host) = Provider::ALL
        .iter()
        .filter_map(|p| {
            let marker = format!("{}-", p.host());
            url.find(&marker).map(|idx| (idx, marker))
        })
        .min_by_key(|(idx, _)| *idx)?;

    let suffix_start = start + host.len();
    let suffix_len = url[suffix_start..]
        .find(|c: char| !is_alias_char(c))
        .unwrap_or(url.len() - suffix_start);
    if suffix_len == 0 {
        return None;
    }

    Some(format!(
        "{}{}{}",
        &url[..suffix_start],
        profile,
        &url[suffix_start + suffix_len..]
    ))
}

/// Directory name `git clone` creates for a URL
pub fn repo_name_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    (!name.is_empty()).then(|| name.to_string())
}

pub fn cmd_remote_add(store: &mut ProfileStore, url: &str, name: &str) -> Result<()> {
    let (git, root) = Git::work_tree(None)?;

    let Some(profile_name) = store.get_folder_profile(&path_key(&root)) else {
        println!(
            "{} No profile associated with this folder; adding remote unchanged",
            "Warning:".yellow().bold()
        );
        git.add_remote(name, url)?;
        return Ok(());
    };

    let rewritten = rewrite_url(url, &profile_name);

    println!("Adding remote with profile '{}'", profile_name.cyan());
    println!("  Remote:    {}", name);
    println!("  Original:  {}", url);
    println!("  Rewritten: {}", rewritten);

    git.add_remote(name, &rewritten)
        .with_context(|| format!("Failed to add remote '{}'", name))?;

    println!();
    println!("{} Added remote '{}'", "Success:".green().bold(), name);
    Ok(())
}

pub fn cmd_remote_fix(store: &mut ProfileStore, yes: bool) -> Result<()> {
    let (git, root) = Git::work_tree(None)?;

    let Some(profile_name) = store.get_folder_profile(&path_key(&root)) else {
        bail!("No profile associated with this folder. Run 'gitx switch <profile>' first.");
    };

    let remotes = git.remotes()?;
    if remotes.is_empty() {
        println!("No remotes configured");
        return Ok(());
    }

    println!(
        "{}",
        format!("Remotes for profile '{}':", profile_name).bold()
    );
    println!();

    let mut updates = Vec::new();
    for remote in &remotes {
        let rewritten = rewrite_url(&remote.url, &profile_name);
        println!("{}:", remote.name.bold());
        println!("  Current: {}", remote.url);
        if rewritten != remote.url {
            println!("  New:     {}", rewritten.cyan());
            updates.push((remote.name.as_str(), rewritten));
        } else {
            println!("  {}", "Already correct".green());
        }
        println!();
    }

    if updates.is_empty() {
        println!("Nothing to update");
        return Ok(());
    }

    if !yes {
        let confirmed = Confirm::new("Update remotes?").with_default(true).prompt()?;
        if !confirmed {
            println!("Cancelled");
            return Ok(());
        }
    }

    for (name, url) in &updates {
        git.set_remote_url(name, url)
            .with_context(|| format!("Failed to update remote '{}'", name))?;
        println!("{} Updated remote '{}'", "Success:".green().bold(), name);
    }

    Ok(())
}

pub fn cmd_clone(
    store: &mut ProfileStore,
    url: &str,
    directory: Option<PathBuf>,
    profile: Option<String>,
) -> Result<()> {
    let profile_name = match profile.or_else(|| store.get_default_profile()) {
        Some(name) => name,
        None => {
            let names: Vec<String> = store.list_profiles().into_keys().collect();
            if names.is_empty() {
                println!(
                    "{} No profiles configured; cloning without a profile",
                    "Warning:".yellow().bold()
                );
                Git::new().clone_repo(url, directory.as_deref())?;
                return Ok(());
            }
            Select::new("Profile for this repository:", names).prompt()?
        }
    };

    let profile = store
        .get_profile(&profile_name)
        .with_context(|| format!("Profile '{}' not found", profile_name))?;

    let rewritten = rewrite_url(url, &profile_name);
    println!("Cloning with profile '{}'", profile_name.cyan());
    println!("  URL: {}", rewritten);

    Git::new().clone_repo(&rewritten, directory.as_deref())?;

    let target = match directory {
        Some(dir) => dir,
        None => PathBuf::from(
            repo_name_from_url(url).context("Could not determine the cloned directory")?,
        ),
    };
    let repo_path = absolute(&target)?;

    store.set_folder_profile(&path_key(&repo_path), &profile_name)?;
    apply_to_clone(&repo_path, &profile)?;

    println!();
    println!(
        "{} Profile '{}' linked to {}",
        "Success:".green().bold(),
        profile_name.cyan(),
        repo_path.display()
    );
    println!("  {}", profile.author());
    Ok(())
}

fn apply_to_clone(repo_path: &Path, profile: &Profile) -> Result<()> {
    let git = Git::in_dir(repo_path);
    identity::apply_if_needed(&git, profile, ConfigScope::Local)?;
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to read current directory")?
            .join(path)
    };
    Ok(joined.canonicalize().unwrap_or(joined))
}
