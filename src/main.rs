mod auto;
mod cli;
mod config;
mod doctor;
mod git;
mod identity;
mod migrate;
mod profile;
mod prompt;
mod remote;
mod resolve;
mod setup;
mod ssh;
mod ssh_keys;
mod unlink;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ProfileCommands, RemoteCommands};
use colored::Colorize;
use config::{path_key, ProfileStore};
use git::{ConfigScope, Git};
use inquire::{Confirm, Select, Text};
use profile::{validate_email, validate_profile_name, Profile, ProfileError, Provider};
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "gitx=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("GITX_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut store = ProfileStore::open(cli.config)?;
    tracing::debug!(path = %store.path().display(), "using profile store");

    match cli.command {
        Commands::Profile(command) => match command {
            ProfileCommands::Add {
                name,
                user_name,
                email,
                ssh_key,
                signing_key,
                no_ssh,
            } => cmd_profile_add(&mut store, name, user_name, email, ssh_key, signing_key, no_ssh),
            ProfileCommands::List => cmd_list(&mut store),
            ProfileCommands::Remove { name, force } => cmd_remove(&mut store, name, force),
            ProfileCommands::Current { porcelain } => cmd_current(&mut store, porcelain),
        },
        Commands::Switch {
            profile,
            global,
            auto,
            no_auto,
        } => cmd_switch(&mut store, profile, global, auto, no_auto),
        Commands::List => cmd_list(&mut store),
        Commands::Auto {
            path,
            enable: _,
            disable,
            apply,
        } => auto::cmd_auto(&mut store, path, disable, apply),
        Commands::Hook { silent } => auto::cmd_hook(&mut store, silent),
        Commands::Doctor { fix } => doctor::cmd_doctor(&mut store, fix),
        Commands::Migrate => migrate::cmd_migrate(&mut store),
        Commands::Unlink {
            path,
            force,
            global,
        } => unlink::cmd_unlink(&mut store, path, force, global),
        Commands::Remote(command) => match command {
            RemoteCommands::Add { url, name } => remote::cmd_remote_add(&mut store, &url, &name),
            RemoteCommands::Fix { yes } => remote::cmd_remote_fix(&mut store, yes),
        },
        Commands::Clone {
            url,
            directory,
            profile,
        } => remote::cmd_clone(&mut store, &url, directory, profile),
        Commands::Commit { message } => cmd_commit(&mut store, &message, false),
        Commands::Publish { message } => cmd_commit(&mut store, &message, true),
        Commands::SshSync => cmd_ssh_sync(&mut store),
    }
}

fn prompt_text(label: &str, help: &str) -> Result<String> {
    Ok(Text::new(label).with_help_message(help).prompt()?)
}

/// Name, user name and email all given as flags: never prompt
fn is_scripted(name: &Option<String>, user_name: &Option<String>, email: &Option<String>) -> bool {
    name.is_some() && user_name.is_some() && email.is_some()
}

fn cmd_profile_add(
    store: &mut ProfileStore,
    name: Option<String>,
    user_name: Option<String>,
    email: Option<String>,
    ssh_key: Option<String>,
    signing_key: Option<String>,
    no_ssh: bool,
) -> Result<()> {
    let scripted = is_scripted(&name, &user_name, &email);

    let name = match name {
        Some(n) => n,
        None => prompt_text("Profile name:", "e.g., 'work', 'personal', 'client-acme'")?,
    };
    validate_profile_name(&name)?;

    if store.get_profile(&name).is_some() {
        bail!(
            "Profile '{}' already exists. Use a different name or remove it first.",
            name
        );
    }

    let user_name = match user_name {
        Some(n) => n,
        None => prompt_text("Git user name:", "This will be used for commit author")?,
    };

    let email = match email {
        Some(e) => e,
        None => prompt_text("Git email:", "This will be used for commit author")?,
    };
    validate_email(&email)?;

    let ssh_key = match ssh_key {
        Some(k) => Some(k),
        None if no_ssh || scripted => None,
        None => setup::choose_ssh_key(&name, &email)?,
    };

    let signing_key = match signing_key {
        Some(k) => Some(k),
        None if scripted => None,
        None => {
            let input = Text::new("Signing key (optional):")
                .with_help_message("Press Enter to skip")
                .prompt()?;
            (!input.trim().is_empty()).then(|| input.trim().to_string())
        }
    };

    let profile = Profile::new(user_name, email, ssh_key, signing_key);
    profile.validate()?;
    let has_key = profile.ssh_key.is_some();

    store.add_profile(&name, profile)?;

    println!();
    println!(
        "{} Added profile '{}'",
        "Success:".green().bold(),
        name.cyan()
    );

    if has_key {
        let config = store.load().clone();
        setup::resync_ssh_config(&config)?;
        for provider in Provider::ALL {
            println!("  {}: git@{}:<owner>/<repo>.git", provider, provider.host_alias(&name));
        }
        if !scripted {
            setup::offer_connection_test(&name)?;
        }
    }

    println!(
        "Run {} to use it in a repository",
        format!("gitx switch {}", name).yellow()
    );
    Ok(())
}

fn select_profile(store: &mut ProfileStore, message: &str) -> Result<String> {
    let names: Vec<String> = store.list_profiles().into_keys().collect();
    if names.is_empty() {
        bail!("No profiles configured. Run 'gitx profile add' first.");
    }
    Ok(Select::new(message, names)
        .with_help_message("Use arrow keys to navigate, Enter to select")
        .prompt()?)
}

fn cmd_remove(store: &mut ProfileStore, name: Option<String>, force: bool) -> Result<()> {
    let name = match name {
        Some(n) => n,
        None => select_profile(store, "Select profile to remove:")?,
    };

    if store.get_profile(&name).is_none() {
        return Err(ProfileError::NotFound(name).into());
    }

    let folders: Vec<String> = store
        .load()
        .folders_for(&name)
        .into_iter()
        .map(str::to_string)
        .collect();

    if !force {
        if !folders.is_empty() {
            println!("Linked folders that will be unlinked:");
            for folder in &folders {
                println!("  {}", folder);
            }
        }
        let confirmed = Confirm::new(&format!("Remove profile '{}'?", name))
            .with_default(false)
            .prompt()?;

        if !confirmed {
            println!("Cancelled");
            return Ok(());
        }
    }

    store.remove_profile(&name)?;
    println!("{} Removed profile '{}'", "Success:".green().bold(), name);

    let config = store.load().clone();
    setup::resync_ssh_config(&config)?;
    Ok(())
}

fn cmd_list(store: &mut ProfileStore) -> Result<()> {
    let config = store.load().clone();

    if config.profiles.is_empty() {
        println!("No profiles configured");
        println!("Run {} to add a profile", "gitx profile add".yellow());
        return Ok(());
    }

    let git = Git::new();
    let current = if git.is_repo() {
        prompt::get_current_profile(&config, &git)?
    } else {
        None
    };

    println!("{}", "Profiles:".bold());
    println!();

    for name in config.profile_names() {
        let Some(profile) = config.get_profile(name) else {
            continue;
        };
        let marker = if current.as_ref() == Some(name) {
            "*".green().bold().to_string()
        } else {
            " ".to_string()
        };

        let default_marker = if config.default_profile.as_ref() == Some(name) {
            " (default)".dimmed().to_string()
        } else {
            String::new()
        };

        println!("{} {}{}", marker, name.cyan().bold(), default_marker);
        println!("    Name:     {}", profile.name);
        println!("    Email:    {}", profile.email);
        if let Some(key) = &profile.ssh_key {
            println!("    SSH Key:  {}", key);
        }
        if let Some(key) = &profile.signing_key {
            println!("    Signing:  {}", key);
        }
        for folder in config.folders_for(name) {
            println!("    Folder:   {}", folder);
        }
        println!();
    }

    Ok(())
}

fn cmd_current(store: &mut ProfileStore, porcelain: bool) -> Result<()> {
    let config = store.load();

    if porcelain {
        prompt::output_porcelain(config)
    } else {
        prompt::output_human(config)
    }
}

fn cmd_switch(
    store: &mut ProfileStore,
    name: Option<String>,
    global: bool,
    auto: bool,
    no_auto: bool,
) -> Result<()> {
    let name = match name {
        Some(n) => n,
        None => select_profile(store, "Select profile:")?,
    };

    let profile = store
        .get_profile(&name)
        .ok_or_else(|| ProfileError::NotFound(name.clone()))?;

    if global {
        identity::apply(&Git::new(), &profile, ConfigScope::Global)?;
        store.set_default_profile(&name)?;
        println!(
            "{} Switched to profile '{}' globally",
            "Success:".green().bold(),
            name.cyan()
        );
        print_profile(&profile);
        println!("  Default profile: {}", name.cyan());
        return Ok(());
    }

    let (git, root) = Git::work_tree(None)
        .context("Use --global to switch outside a repository")?;
    identity::apply(&git, &profile, ConfigScope::Local)?;

    println!(
        "{} Switched to profile '{}' locally",
        "Success:".green().bold(),
        name.cyan()
    );
    print_profile(&profile);

    let key = path_key(&root);
    if store.get_folder_profile(&key).as_deref() == Some(name.as_str()) {
        return Ok(());
    }

    let link = if auto {
        true
    } else if no_auto {
        false
    } else {
        Confirm::new(&format!("Always use '{}' in {}?", name, root.display()))
            .with_default(true)
            .prompt()?
    };

    if link {
        store.set_folder_profile(&key, &name)?;
        println!("  Automatic profile enabled for {}", root.display());
    }
    Ok(())
}

fn print_profile(profile: &Profile) {
    println!("  Name:  {}", profile.name);
    println!("  Email: {}", profile.email);
    if profile.signing_key.is_some() {
        println!("  Commit signing: enabled");
    }
}

fn cmd_commit(store: &mut ProfileStore, message: &str, push: bool) -> Result<()> {
    let (git, root) = Git::work_tree(None)?;
    auto::report_auto_apply(&auto::apply_folder_profile(store, &git, &root)?, true);

    git.add_all()?;
    git.commit(message)?;

    if push {
        git.push()?;
        println!("{} Changes published", "Success:".green().bold());
    }
    Ok(())
}

fn cmd_ssh_sync(store: &mut ProfileStore) -> Result<()> {
    let config = store.load().clone();

    if config.profiles.is_empty() {
        println!("No profiles to sync");
        return Ok(());
    }

    let path = ssh::ssh_config_path()?;
    let (count, was_update) = ssh::sync_ssh_config(&config, &path)?;

    let action = if was_update { "Updated" } else { "Added" };
    println!(
        "{} {} SSH config with {} profile(s)",
        "Success:".green().bold(),
        action,
        count
    );
    println!("  File: {}", path.display());

    println!();
    println!("SSH Host aliases:");
    for (name, profile) in &config.profiles {
        if profile.ssh_key.is_none() {
            continue;
        }
        for provider in Provider::ALL {
            println!("  {} -> {}", provider.host_alias(name).cyan(), provider.host());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn test_profile_add_with_all_flags_is_scripted() {
        assert!(is_scripted(&some("work"), &some("Jane"), &some("jane@acme.io")));
    }

    #[test]
    fn test_profile_add_missing_flag_is_interactive() {
        assert!(!is_scripted(&some("work"), &some("Jane"), &None));
        assert!(!is_scripted(&None, &some("Jane"), &some("jane@acme.io")));
        assert!(!is_scripted(&None, &None, &None));
    }

    #[test]
    fn test_profile_add_flags_parse_without_signing_key() {
        let cli = Cli::parse_from([
            "gitx", "profile", "add", "work", "--user-name", "Jane", "--email", "jane@acme.io",
        ]);
        match cli.command {
            Commands::Profile(ProfileCommands::Add {
                name,
                user_name,
                email,
                signing_key,
                ..
            }) => {
                assert!(is_scripted(&name, &user_name, &email));
                assert_eq!(signing_key, None);
            }
            _ => panic!("expected profile add"),
        }
    }
}
