use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use thiserror::Error;
use tracing::debug;

/// Scope for git config operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigScope {
    Local,
    Global,
}

impl ConfigScope {
    fn flag(&self) -> &str {
        match self {
            ConfigScope::Local => "--local",
            ConfigScope::Global => "--global",
        }
    }
}

impl std::fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigScope::Local => write!(f, "local"),
            ConfigScope::Global => write!(f, "global"),
        }
    }
}

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Failed to execute git. Is it installed?")]
    Spawn(#[source] io::Error),
    #[error("Not a git repository: {}", .0.display())]
    NotARepository(PathBuf),
    #[error("git {command} failed: {message}")]
    Command { command: String, message: String },
}

/// Read/write access to git configuration
pub trait ConfigStore {
    /// `Ok(None)` when the key is not set in that scope
    fn get(&self, key: &str, scope: ConfigScope) -> Result<Option<String>, GitError>;

    fn set(&self, key: &str, value: &str, scope: ConfigScope) -> Result<(), GitError>;

    /// `Ok(false)` when there was nothing to remove
    fn unset(&self, key: &str, scope: ConfigScope) -> Result<bool, GitError>;
}

/// A remote as listed by `git remote -v`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

/// Parse `git remote -v` output, keeping push URLs
pub fn parse_remotes(output: &str) -> Vec<Remote> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            let url = parts.next()?;
            (parts.next()? == "(push)").then(|| Remote {
                name: name.to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}

/// Git CLI bound to a working directory
#[derive(Debug, Clone, Default)]
pub struct Git {
    dir: Option<PathBuf>,
}

impl Git {
    /// Git running in the current directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Git running in `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    fn dir_display(&self) -> PathBuf {
        self.dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default()
    }

    fn command(&self, args: &[&str]) -> Command {
        debug!(?args, dir = ?self.dir, "git");
        let mut cmd = Command::new("git");
        cmd.args(args);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn output(&self, args: &[&str]) -> Result<Output, GitError> {
        self.command(args).output().map_err(GitError::Spawn)
    }

    /// Run git and fail with its stderr on a non-zero exit
    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(command_error(args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run git with the terminal attached, for long-running commands
    fn run_interactive(&self, args: &[&str]) -> Result<(), GitError> {
        let status = self
            .command(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(GitError::Spawn)?;

        if !status.success() {
            return Err(GitError::Command {
                command: args.join(" "),
                message: format!("exited with {}", status),
            });
        }
        Ok(())
    }

    /// Git bound to the work tree containing `dir` (or the current directory), with its root
    pub fn work_tree(dir: Option<PathBuf>) -> Result<(Git, PathBuf), GitError> {
        let git = match dir {
            Some(d) => Git::in_dir(d),
            None => Git::new(),
        };
        if !git.is_repo() {
            return Err(GitError::NotARepository(git.dir_display()));
        }
        let root = git.repo_root()?;
        Ok((git, root))
    }

    /// `git --version`
    pub fn version(&self) -> Result<String, GitError> {
        self.run(&["--version"])
    }

    /// Check if we're inside a git work tree
    pub fn is_repo(&self) -> bool {
        self.output(&["rev-parse", "--is-inside-work-tree"])
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Top-level directory of the work tree
    pub fn repo_root(&self) -> Result<PathBuf, GitError> {
        let output = self.output(&["rev-parse", "--show-toplevel"])?;
        if !output.status.success() {
            return Err(GitError::NotARepository(self.dir_display()));
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(PathBuf::from(root))
    }

    pub fn remotes(&self) -> Result<Vec<Remote>, GitError> {
        self.run(&["remote", "-v"]).map(|out| parse_remotes(&out))
    }

    pub fn add_remote(&self, name: &str, url: &str) -> Result<(), GitError> {
        self.run(&["remote", "add", name, url]).map(drop)
    }

    pub fn set_remote_url(&self, name: &str, url: &str) -> Result<(), GitError> {
        self.run(&["remote", "set-url", name, url]).map(drop)
    }

    /// Clone `url`, streaming git's progress to the terminal
    pub fn clone_repo(&self, url: &str, directory: Option<&Path>) -> Result<(), GitError> {
        let dir = directory.map(|d| d.to_string_lossy().into_owned());
        let mut args = vec!["clone", url];
        if let Some(dir) = dir.as_deref() {
            args.push(dir);
        }
        self.run_interactive(&args)
    }

    /// `git add .`
    pub fn add_all(&self) -> Result<(), GitError> {
        self.run(&["add", "."]).map(drop)
    }

    pub fn commit(&self, message: &str) -> Result<(), GitError> {
        self.run_interactive(&["commit", "-m", message])
    }

    pub fn push(&self) -> Result<(), GitError> {
        self.run_interactive(&["push"])
    }
}

impl ConfigStore for Git {
    fn get(&self, key: &str, scope: ConfigScope) -> Result<Option<String>, GitError> {
        let args = ["config", scope.flag(), "--get", key];
        let output = self.output(&args)?;

        match output.status.code() {
            Some(0) => {
                let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Ok((!value.is_empty()).then_some(value))
            }
            // exit 1: key not set
            Some(1) => Ok(None),
            _ => Err(command_error(&args, &output)),
        }
    }

    fn set(&self, key: &str, value: &str, scope: ConfigScope) -> Result<(), GitError> {
        self.run(&["config", scope.flag(), key, value]).map(drop)
    }

    fn unset(&self, key: &str, scope: ConfigScope) -> Result<bool, GitError> {
        let args = ["config", scope.flag(), "--unset", key];
        let output = self.output(&args)?;

        match output.status.code() {
            Some(0) => Ok(true),
            // exit 5: key not set
            Some(5) => Ok(false),
            _ => Err(command_error(&args, &output)),
        }
    }
}

fn command_error(args: &[&str], output: &Output) -> GitError {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let message = if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    };
    GitError::Command {
        command: args.join(" "),
        message,
    }
}
