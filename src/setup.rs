use crate::config::Config;
use crate::profile::Provider;
use crate::ssh::{self, Probe, PROBE_TIMEOUT};
use crate::ssh_keys::{self, SshKey};
use anyhow::{Context, Result};
use colored::Colorize;
use inquire::{Confirm, Select};
use std::path::Path;
use tracing::warn;

const GENERATE: &str = "+ Generate new SSH key";
const SKIP: &str = "Skip SSH setup";

/// Interactive SSH key setup for a profile.
///
/// Offers a dedicated generated key or any key pair already in ~/.ssh, and
/// returns the private key path to store in the profile.
pub fn choose_ssh_key(profile_name: &str, email: &str) -> Result<Option<String>> {
    let ssh_dir = ssh::ssh_dir()?;
    let existing = ssh_keys::discover_keys(&ssh_dir)?;

    let mut options: Vec<String> = vec![GENERATE.to_string()];
    options.extend(
        existing
            .iter()
            .map(|k| format!("{} ({})", k.path_display(), k.key_type)),
    );
    options.push(SKIP.to_string());

    let selection = Select::new("SSH key:", options.clone())
        .with_help_message("Select an existing key or create a new one")
        .prompt()?;

    if selection == SKIP {
        return Ok(None);
    }

    let key = if selection == GENERATE {
        println!("Generating new ed25519 SSH key...");
        let generated = ssh_keys::generate_key(&ssh_dir, profile_name, email)?;
        if generated.created {
            println!(
                "{} Generated SSH key: {}",
                "Success:".green().bold(),
                generated.key.path_display()
            );
        } else {
            println!("Reusing existing key {}", generated.key.path_display());
        }
        generated.key
    } else {
        let idx = options
            .iter()
            .position(|o| o == &selection)
            .context("Unknown SSH key selection")?;
        // options[0] is GENERATE
        existing[idx - 1].clone()
    };

    register_key(&key);
    show_public_key(&key)?;
    Ok(Some(key.path_string()))
}

/// Add the key to the agent; a missing agent is not fatal
fn register_key(key: &SshKey) {
    match ssh_keys::add_to_agent(&key.private_key_path) {
        Ok(()) => println!("  Key loaded in the SSH agent"),
        Err(e) => {
            warn!(error = %e, "could not add key to agent");
            println!(
                "{} Could not add the key to the SSH agent: {}",
                "Warning:".yellow().bold(),
                e
            );
        }
    }
}

fn show_public_key(key: &SshKey) -> Result<()> {
    let public_key = ssh_keys::read_public_key(key)?;
    println!();
    println!("{}", "Public key:".yellow());
    println!("{}", public_key);
    println!();
    println!("Add it to your accounts:");
    for provider in Provider::ALL {
        println!("  {}: {}", provider, provider.ssh_keys_url());
    }
    println!();
    Ok(())
}

/// Regenerate the managed SSH config block after profiles changed
pub fn resync_ssh_config(config: &Config) -> Result<()> {
    let path = ssh::ssh_config_path()?;
    let (count, _) = ssh::sync_ssh_config(config, &path)
        .with_context(|| format!("Failed to update {}", path.display()))?;
    println!("  SSH config updated ({} profile(s) with keys)", count);
    Ok(())
}

/// Offer to probe both providers through the profile's aliases
pub fn offer_connection_test(profile_name: &str) -> Result<()> {
    let test = Confirm::new("Test the SSH connection now?")
        .with_help_message("Only works after the public key was added to your account")
        .with_default(false)
        .prompt()?;
    if !test {
        return Ok(());
    }

    for provider in Provider::ALL {
        let alias = provider.host_alias(profile_name);
        let probe = ssh::test_connection(&alias, PROBE_TIMEOUT);
        print_probe(provider, &alias, &probe);
    }
    Ok(())
}

fn print_probe(provider: Provider, alias: &str, probe: &Probe) {
    if probe.is_authenticated() {
        println!("  {} {} ({})", "ok".green().bold(), provider, alias);
        return;
    }
    let reason = match probe {
        Probe::TimedOut => "timed out".to_string(),
        Probe::Rejected(out) | Probe::Failed(out) => out.lines().last().unwrap_or("").to_string(),
        Probe::Authenticated => String::new(),
    };
    println!(
        "  {} {} ({}): {}",
        "failed".yellow().bold(),
        provider,
        alias,
        reason.dimmed()
    );
}

/// Key pairs on disk that the agent currently holds
pub fn agent_key_choices(ssh_dir: &Path) -> Vec<SshKey> {
    let loaded = match ssh_keys::agent_keys() {
        Ok(keys) => keys,
        Err(e) => {
            warn!(error = %e, "ssh agent not available");
            return Vec::new();
        }
    };
    ssh_keys::discover_keys(ssh_dir)
        .unwrap_or_default()
        .into_iter()
        .filter(|k| ssh_keys::agent_holds(&loaded, k))
        .collect()
}
