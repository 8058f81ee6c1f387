use crate::config::Config;
use crate::profile::Provider;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

const MANAGED_START: &str = "# === GITX MANAGED START ===";
const MANAGED_END: &str = "# === GITX MANAGED END ===";

/// How long a connectivity probe may take before it counts as unreachable
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Banners hosting providers print after a successful `ssh -T`
const AUTH_BANNERS: [&str; 2] = ["successfully authenticated", "Welcome to GitLab"];

#[derive(Debug, Error)]
pub enum SshError {
    #[error("Could not determine home directory")]
    NoHomeDir,
    #[error("Failed to read SSH config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write SSH config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to run {program}. Is OpenSSH installed?")]
    Spawn {
        program: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{program} failed: {message}")]
    Command {
        program: &'static str,
        message: String,
    },
}

/// Get the SSH directory path
pub fn ssh_dir() -> Result<PathBuf, SshError> {
    let home = dirs::home_dir().ok_or(SshError::NoHomeDir)?;
    Ok(home.join(".ssh"))
}

/// Get the SSH config file path
pub fn ssh_config_path() -> Result<PathBuf, SshError> {
    Ok(ssh_dir()?.join("config"))
}

/// Host entry routing the profile's alias for `provider` to the real host
fn host_entry(profile_name: &str, provider: Provider, ssh_key: &str) -> String {
    format!(
        "# {name} - {provider}\nHost {alias}\n  HostName {host}\n  User git\n  IdentityFile {key}\n  IdentitiesOnly yes\n",
        name = profile_name,
        provider = provider,
        alias = provider.host_alias(profile_name),
        host = provider.host(),
        key = ssh_key,
    )
}

/// Generate the managed block content for every profile that has an SSH key
pub fn generate_managed_block(config: &Config) -> String {
    let mut block = String::new();
    block.push_str(MANAGED_START);
    block.push('\n');

    for (name, profile) in &config.profiles {
        let Some(ssh_key) = profile.ssh_key.as_deref() else {
            continue;
        };
        for provider in Provider::ALL {
            block.push_str(&host_entry(name, provider, ssh_key));
            block.push('\n');
        }
    }

    block.push_str(MANAGED_END);
    block
}

/// Replace the managed block in `current`, or append it.
/// Returns the new content and whether an existing block was replaced.
pub fn merge_managed_block(current: &str, block: &str) -> (String, bool) {
    if let (Some(start_idx), Some(end_idx)) =
        (current.find(MANAGED_START), current.find(MANAGED_END))
    {
        if start_idx < end_idx {
            let end_idx = end_idx + MANAGED_END.len();
            let mut new_content = String::with_capacity(current.len() + block.len());
            new_content.push_str(&current[..start_idx]);
            new_content.push_str(block);
            new_content.push_str(&current[end_idx..]);
            return (new_content, true);
        }
    }

    let mut new_content = current.to_string();
    if !new_content.is_empty() && !new_content.ends_with('\n') {
        new_content.push('\n');
    }
    if !new_content.is_empty() {
        new_content.push('\n');
    }
    new_content.push_str(block);
    new_content.push('\n');
    (new_content, false)
}

fn read_ssh_config(path: &Path) -> Result<String, SshError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(source) => Err(SshError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_ssh_config(path: &Path, content: &str) -> Result<(), SshError> {
    let write_err = |source| SshError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        ensure_private_dir(parent).map_err(write_err)?;
    }

    fs::write(path, content).map_err(write_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(write_err)?;
    }

    Ok(())
}

/// Create `dir` (mode 0700 on Unix) if it does not exist
pub fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Sync the SSH config at `path` with all profiles.
/// Returns (profiles with a key, whether an existing block was updated)
pub fn sync_ssh_config(config: &Config, path: &Path) -> Result<(usize, bool), SshError> {
    let current = read_ssh_config(path)?;
    let block = generate_managed_block(config);
    let (content, updated) = merge_managed_block(&current, &block);

    write_ssh_config(path, &content)?;
    debug!(path = %path.display(), updated, "synced ssh config");

    let count = config
        .profiles
        .values()
        .filter(|p| p.ssh_key.is_some())
        .count();
    Ok((count, updated))
}

/// Result of an `ssh -T` connectivity probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Authenticated,
    /// The host answered without an authentication banner
    Rejected(String),
    TimedOut,
    Failed(String),
}

impl Probe {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Probe::Authenticated)
    }
}

/// Whether `ssh -T` output reports a successful login
pub fn is_authenticated_banner(output: &str) -> bool {
    AUTH_BANNERS.iter().any(|banner| output.contains(banner))
}

/// Test SSH authentication against `git@<host>`.
///
/// Hosting providers close `ssh -T` with a non-zero exit even on success, so
/// the outcome is read from the banner, not the status.
pub fn test_connection(host: &str, timeout: Duration) -> Probe {
    let target = format!("git@{}", host);
    let connect_timeout = format!("ConnectTimeout={}", timeout.as_secs().max(1));
    debug!(%target, "probing ssh");

    let child = Command::new("ssh")
        .args([
            "-T",
            "-o",
            "BatchMode=yes",
            "-o",
            "StrictHostKeyChecking=accept-new",
            "-o",
            connect_timeout.as_str(),
            target.as_str(),
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(e) => return Probe::Failed(format!("failed to run ssh: {}", e)),
    };

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_status)) => break,
            Ok(None) if start.elapsed() > timeout => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(%target, "ssh probe timed out");
                return Probe::TimedOut;
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(100)),
            Err(e) => return Probe::Failed(e.to_string()),
        }
    }

    let mut output = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        let _ = stdout.read_to_string(&mut output);
    }
    if let Some(mut stderr) = child.stderr.take() {
        let _ = stderr.read_to_string(&mut output);
    }

    if is_authenticated_banner(&output) {
        Probe::Authenticated
    } else {
        Probe::Rejected(output.trim().to_string())
    }
}
