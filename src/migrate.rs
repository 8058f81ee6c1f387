use crate::config::{path_key, ProfileStore};
use crate::git::{ConfigScope, Git};
use crate::identity;
use crate::profile::{suggest_profile_name, validate_profile_name, Profile};
use crate::setup;
use crate::ssh;
use anyhow::{bail, Result};
use colored::Colorize;
use inquire::{Confirm, Select, Text};

const AGENT_KEY_PREFIX: &str = "Use key from agent: ";

/// Import the global git identity as a profile
pub fn cmd_migrate(store: &mut ProfileStore) -> Result<()> {
    let git = Git::new();
    let global = identity::read(&git, ConfigScope::Global)?;

    let (Some(name), Some(email)) = (global.name.clone(), global.email.clone()) else {
        bail!("No global git identity found (user.name and user.email must both be set)");
    };

    println!("{}", "Global git identity:".bold());
    println!("  Name:  {}", name);
    println!("  Email: {}", email);
    if let Some(key) = &global.signing_key {
        println!("  Signing key: {}", key);
    }
    println!();

    let suggested = suggest_profile_name(&email);
    let profile_name = Text::new("Profile name:")
        .with_default(&suggested)
        .with_validator(|input: &str| {
            Ok(match validate_profile_name(input) {
                Ok(()) => inquire::validator::Validation::Valid,
                Err(e) => inquire::validator::Validation::Invalid(e.to_string().into()),
            })
        })
        .prompt()?;

    if store.get_profile(&profile_name).is_some() {
        let overwrite = Confirm::new(&format!("Profile '{}' exists. Overwrite?", profile_name))
            .with_default(false)
            .prompt()?;
        if !overwrite {
            println!("Cancelled");
            return Ok(());
        }
    }

    let ssh_key = choose_key(&profile_name, &email)?;
    let profile = Profile::new(name, email, ssh_key, global.signing_key.clone());
    profile.validate()?;

    store.add_profile(&profile_name, profile)?;
    println!(
        "{} Imported global identity as '{}'",
        "Success:".green().bold(),
        profile_name.cyan()
    );

    if store
        .get_profile(&profile_name)
        .is_some_and(|p| p.ssh_key.is_some())
    {
        let config = store.load().clone();
        setup::resync_ssh_config(&config)?;
    }

    let make_default = Confirm::new("Set as default profile?")
        .with_default(true)
        .prompt()?;
    if make_default {
        store.set_default_profile(&profile_name)?;
        println!("  Default profile: {}", profile_name.cyan());
    }

    if git.is_repo() {
        let root = git.repo_root()?;
        let link = Confirm::new(&format!("Use '{}' for {}?", profile_name, root.display()))
            .with_default(false)
            .prompt()?;
        if link {
            store.set_folder_profile(&path_key(&root), &profile_name)?;
            println!("  Linked {}", root.display());
        }
    }

    Ok(())
}

/// SSH key for the imported profile: full setup, a key the agent already holds, or none
fn choose_key(profile_name: &str, email: &str) -> Result<Option<String>> {
    let ssh_dir = ssh::ssh_dir()?;
    let loaded = setup::agent_key_choices(&ssh_dir);
    if loaded.is_empty() {
        return setup::choose_ssh_key(profile_name, email);
    }

    let mut options: Vec<String> = loaded
        .iter()
        .map(|k| format!("{}{}", AGENT_KEY_PREFIX, k.path_display()))
        .collect();
    options.push("Set up SSH key".to_string());

    let selection = Select::new("SSH key:", options).prompt()?;
    match loaded
        .iter()
        .find(|k| selection == format!("{}{}", AGENT_KEY_PREFIX, k.path_display()))
    {
        Some(key) => Ok(Some(key.path_string())),
        None => setup::choose_ssh_key(profile_name, email),
    }
}
