use crate::config::{Config, ProfileStore};
use crate::git::{ConfigScope, Git};
use crate::identity;
use crate::profile::Provider;
use crate::ssh::{self, Probe, PROBE_TIMEOUT};
use crate::ssh_keys;
use anyhow::Result;
use colored::{ColoredString, Colorize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warning,
    Error,
}

/// Remedy `--fix` can carry out for a failed check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fix {
    AddKeysToAgent(Vec<PathBuf>),
    RemoveDanglingReferences,
    Hint(String),
}

#[derive(Debug, Clone)]
pub struct Check {
    pub name: &'static str,
    pub status: Status,
    pub message: String,
    pub fix: Option<Fix>,
}

impl Check {
    fn ok(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: Status::Ok,
            message: message.into(),
            fix: None,
        }
    }

    fn warning(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: Status::Warning,
            message: message.into(),
            fix: None,
        }
    }

    fn error(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: Status::Error,
            message: message.into(),
            fix: None,
        }
    }

    fn with_fix(mut self, fix: Fix) -> Self {
        self.fix = Some(fix);
        self
    }

    fn marker(&self) -> ColoredString {
        match self.status {
            Status::Ok => "ok".green().bold(),
            Status::Warning => "warn".yellow().bold(),
            Status::Error => "error".red().bold(),
        }
    }
}

fn check_git_installation(git: &Git) -> Check {
    const NAME: &str = "Git installation";
    match git.version() {
        Ok(version) => Check::ok(NAME, version),
        Err(_) => Check::error(NAME, "git is not installed or not on PATH"),
    }
}

fn check_global_identity(git: &Git) -> Check {
    const NAME: &str = "Global git identity";
    match identity::read(git, ConfigScope::Global) {
        Ok(id) => match (id.name, id.email) {
            (Some(name), Some(email)) => Check::ok(NAME, format!("{} <{}>", name, email)),
            _ => Check::warning(NAME, "user.name or user.email is not set globally").with_fix(
                Fix::Hint("Create a profile with 'gitx profile add', then 'gitx switch <profile> --global'".to_string()),
            ),
        },
        Err(e) => Check::error(NAME, e.to_string()),
    }
}

fn check_ssh_keys(ssh_dir: &Path) -> Check {
    const NAME: &str = "SSH keys";
    let keys = match ssh_keys::discover_keys(ssh_dir) {
        Ok(keys) => keys,
        Err(e) => return Check::error(NAME, e.to_string()),
    };

    if keys.is_empty() {
        return Check::error(NAME, format!("No key pairs found in {}", ssh_dir.display())).with_fix(
            Fix::Hint("Generate one with: ssh-keygen -t ed25519 -C \"you@example.com\"".to_string()),
        );
    }

    match ssh_keys::agent_keys() {
        Ok(loaded) if !loaded.is_empty() => {
            Check::ok(NAME, format!("{} key(s) loaded in the SSH agent", loaded.len()))
        }
        Ok(_) => Check::warning(
            NAME,
            format!("{} key(s) found, none loaded in the SSH agent", keys.len()),
        )
        .with_fix(Fix::AddKeysToAgent(
            keys.into_iter().map(|k| k.private_key_path).collect(),
        )),
        Err(e) => Check::warning(NAME, format!("SSH agent not reachable: {}", e)),
    }
}

/// Hosts to probe for a provider: each profile alias with a key, or the bare host
fn probe_targets(config: &Config, provider: Provider) -> Vec<String> {
    let aliases: Vec<String> = config
        .profiles
        .iter()
        .filter(|(_, p)| p.ssh_key.is_some())
        .map(|(name, _)| provider.host_alias(name))
        .collect();

    if aliases.is_empty() {
        vec![provider.host().to_string()]
    } else {
        aliases
    }
}

fn check_connection(config: &Config, provider: Provider) -> Check {
    let name = match provider {
        Provider::Github => "SSH connection to GitHub",
        Provider::Gitlab => "SSH connection to GitLab",
    };

    let mut failed = Vec::new();
    let targets = probe_targets(config, provider);
    for target in &targets {
        let probe = ssh::test_connection(target, PROBE_TIMEOUT);
        debug!(%target, ?probe, "doctor probe");
        match probe {
            Probe::Authenticated => {}
            Probe::TimedOut => failed.push(format!("{} (timed out)", target)),
            Probe::Rejected(_) | Probe::Failed(_) => failed.push(target.clone()),
        }
    }

    if failed.is_empty() {
        Check::ok(name, format!("Authenticated as {}", targets.join(", ")))
    } else {
        Check::warning(
            name,
            format!(
                "Could not authenticate: {} (expected if you don't use {})",
                failed.join(", "),
                provider
            ),
        )
        .with_fix(Fix::Hint(format!(
            "Add the public key at {}",
            provider.ssh_keys_url()
        )))
    }
}

fn check_gpg() -> Check {
    const NAME: &str = "GPG (commit signing)";
    match Command::new("gpg").arg("--list-secret-keys").output() {
        Ok(output) if output.status.success() && !output.stdout.is_empty() => {
            Check::ok(NAME, "Secret keys available")
        }
        Ok(_) => Check::warning(NAME, "No secret keys found (optional)"),
        Err(_) => Check::warning(NAME, "gpg is not installed (optional)"),
    }
}

/// Problems inside the profile store itself
pub fn store_problems(config: &Config) -> Vec<String> {
    let mut problems = Vec::new();

    if let Some(default) = &config.default_profile {
        if !config.has_profile(default) {
            problems.push(format!("default profile '{}' does not exist", default));
        }
    }

    for fp in &config.folder_profiles {
        if !config.has_profile(&fp.profile) {
            problems.push(format!(
                "{} is linked to missing profile '{}'",
                fp.path, fp.profile
            ));
        }
    }

    for (name, profile) in &config.profiles {
        if let Some(key) = &profile.ssh_key {
            if !Path::new(key).exists() {
                problems.push(format!("profile '{}' uses missing SSH key {}", name, key));
            }
        }
    }

    problems
}

fn check_store(config: &Config) -> Check {
    const NAME: &str = "Profiles";
    let problems = store_problems(config);
    if problems.is_empty() {
        return Check::ok(NAME, format!("{} profile(s) configured", config.profiles.len()));
    }

    let dangling = !config.folder_profiles.iter().all(|fp| config.has_profile(&fp.profile))
        || config
            .default_profile
            .as_ref()
            .is_some_and(|d| !config.has_profile(d));

    let check = Check::warning(NAME, problems.join("; "));
    if dangling {
        check.with_fix(Fix::RemoveDanglingReferences)
    } else {
        check
    }
}

/// Drop associations and the default when they reference missing profiles.
/// Returns how many references were removed.
pub fn remove_dangling_references(config: &mut Config) -> usize {
    let Config {
        profiles,
        folder_profiles,
        default_profile,
    } = config;

    let before = folder_profiles.len();
    folder_profiles.retain(|fp| profiles.contains_key(&fp.profile));
    let mut removed = before - folder_profiles.len();

    if default_profile.as_ref().is_some_and(|d| !profiles.contains_key(d)) {
        *default_profile = None;
        removed += 1;
    }
    removed
}

fn apply_fix(store: &mut ProfileStore, fix: &Fix) -> Result<()> {
    match fix {
        Fix::AddKeysToAgent(paths) => {
            for path in paths {
                ssh_keys::add_to_agent(path)?;
            }
        }
        Fix::RemoveDanglingReferences => {
            let mut config = store.load().clone();
            let removed = remove_dangling_references(&mut config);
            store.save(config)?;
            println!("  Removed {} dangling reference(s)", removed);
        }
        Fix::Hint(hint) => println!("  {}", hint),
    }
    Ok(())
}

pub fn cmd_doctor(store: &mut ProfileStore, fix: bool) -> Result<()> {
    println!("{}", "gitx doctor".bold());
    println!();

    let git = Git::new();
    let ssh_dir = ssh::ssh_dir()?;
    let config = store.load().clone();

    let checks = vec![
        check_git_installation(&git),
        check_global_identity(&git),
        check_ssh_keys(&ssh_dir),
        check_connection(&config, Provider::Github),
        check_connection(&config, Provider::Gitlab),
        check_gpg(),
        check_store(&config),
    ];

    for check in &checks {
        println!("[{}] {}", check.marker(), check.name.bold());
        println!("    {}", check.message.dimmed());
    }

    let has_errors = checks.iter().any(|c| c.status == Status::Error);
    let has_warnings = checks.iter().any(|c| c.status == Status::Warning);

    if fix {
        println!();
        println!("{}", "Applying fixes...".bold());
        for check in checks.iter().filter(|c| c.status != Status::Ok) {
            let Some(remedy) = &check.fix else {
                continue;
            };
            println!("{}:", check.name);
            match apply_fix(store, remedy) {
                Ok(()) => println!("  {}", "done".green()),
                Err(e) => println!("  {} {}", "failed:".red(), e),
            }
        }
    }

    println!();
    if !has_errors && !has_warnings {
        println!("{}", "Everything looks good".green().bold());
    } else if has_errors {
        println!("{}", "Found problems that need attention".red().bold());
        if !fix {
            println!("Run {} to try fixing them", "gitx doctor --fix".yellow());
        }
    } else {
        println!("{}", "Found warnings".yellow().bold());
    }

    Ok(())
}
