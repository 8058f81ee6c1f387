use crate::config::{path_key, ProfileStore};
use crate::git::{ConfigScope, Git};
use crate::identity::{self, Identity};
use anyhow::Result;
use colored::Colorize;
use inquire::Confirm;
use std::path::PathBuf;

fn describe(id: &Identity) {
    if let Some(name) = &id.name {
        println!("  Name:  {}", name);
    }
    if let Some(email) = &id.email {
        println!("  Email: {}", email);
    }
    if let Some(key) = &id.signing_key {
        println!("  Signing key: {}", key);
    }
}

fn confirm(question: &str, force: bool) -> Result<bool> {
    if force {
        return Ok(true);
    }
    Ok(Confirm::new(question).with_default(false).prompt()?)
}

pub fn cmd_unlink(
    store: &mut ProfileStore,
    path: Option<PathBuf>,
    force: bool,
    global: bool,
) -> Result<()> {
    if global {
        return unlink_global(force);
    }

    let (git, root) = Git::work_tree(path)?;
    let key = path_key(&root);
    let local = identity::read(&git, ConfigScope::Local)?;
    let association = store.load().folder_association(&key).cloned();

    if local.is_empty() && association.is_none() {
        println!("Nothing to unlink in {}", root.display());
        if let Some(inherited) = store.get_folder_profile(&key) {
            println!(
                "  Profile '{}' applies through a parent folder; unlink that folder instead",
                inherited.cyan()
            );
        }
        return Ok(());
    }

    println!("{} {}", "Repository:".bold(), root.display());
    describe(&local);
    if let Some(fp) = &association {
        println!("  Folder profile: {}", fp.profile.cyan());
    }
    println!();

    if !confirm("Remove the local identity from this repository?", force)? {
        println!("Cancelled");
        return Ok(());
    }

    let removed = identity::unset(&git, ConfigScope::Local);
    let unlinked = store.remove_folder_profile(&key)?;

    println!(
        "{} Unlinked {}",
        "Success:".green().bold(),
        root.display()
    );
    if !removed.is_empty() {
        println!("  Cleared: {}", removed.join(", "));
    }
    if unlinked {
        println!("  Folder association removed");
    }
    if let Some(inherited) = store.get_folder_profile(&key) {
        println!(
            "  Profile '{}' still applies through a parent folder",
            inherited.cyan()
        );
    }
    Ok(())
}

fn unlink_global(force: bool) -> Result<()> {
    let git = Git::new();
    let global = identity::read(&git, ConfigScope::Global)?;

    if global.is_empty() && global.signing_key.is_none() {
        println!("No global identity set");
        return Ok(());
    }

    println!("{}", "Global identity:".bold());
    describe(&global);
    println!();

    if !confirm("Remove the global git identity?", force)? {
        println!("Cancelled");
        return Ok(());
    }

    let removed = identity::unset(&git, ConfigScope::Global);
    println!(
        "{} Global identity removed",
        "Success:".green().bold()
    );
    if !removed.is_empty() {
        println!("  Cleared: {}", removed.join(", "));
    }
    Ok(())
}
