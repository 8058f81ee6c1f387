use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gitx")]
#[command(author, version, about = "Per-folder Git identities with SSH host aliases for GitHub and GitLab")]
pub struct Cli {
    /// Path to the profile store (defaults to ~/.gitx/config.json)
    #[arg(long, global = true, env = "GITX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Show debug logs on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage profiles
    #[command(subcommand)]
    Profile(ProfileCommands),

    /// Apply a profile to the current repository (or globally)
    Switch {
        /// Profile name to switch to (interactive if not provided)
        profile: Option<String>,

        /// Apply globally and make it the default profile
        #[arg(short, long)]
        global: bool,

        /// Use this profile automatically for the repository folder
        #[arg(long, conflicts_with_all = ["global", "no_auto"])]
        auto: bool,

        /// Don't ask about automatic use for the repository folder
        #[arg(long)]
        no_auto: bool,
    },

    /// List all configured profiles
    List,

    /// Link the repository folder to a profile for automatic use
    Auto {
        /// Repository path (defaults to the current directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Link the folder to its profile (default action)
        #[arg(long, conflicts_with_all = ["disable", "apply"])]
        enable: bool,

        /// Remove the folder's link
        #[arg(long, conflicts_with = "apply")]
        disable: bool,

        /// Apply the folder's profile now
        #[arg(long)]
        apply: bool,
    },

    /// Apply the folder's profile if needed (for shell hooks)
    Hook {
        /// Print nothing unless something is wrong
        #[arg(short, long)]
        silent: bool,
    },

    /// Check git, SSH and profile health
    Doctor {
        /// Try to fix the problems found
        #[arg(long)]
        fix: bool,
    },

    /// Import the global git identity as a profile
    Migrate,

    /// Remove the identity from a repository (or globally)
    Unlink {
        /// Repository path (defaults to the current directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,

        /// Remove the global identity instead
        #[arg(short, long, conflicts_with = "path")]
        global: bool,
    },

    /// Manage remotes with profile SSH aliases
    #[command(subcommand)]
    Remote(RemoteCommands),

    /// Clone a repository with a profile
    Clone {
        /// Repository URL
        url: String,

        /// Target directory
        directory: Option<PathBuf>,

        /// Profile to use (defaults to the default profile)
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Stage everything and commit with the folder's profile
    Commit {
        /// Commit message
        message: String,
    },

    /// Stage, commit and push with the folder's profile
    Publish {
        /// Commit message
        #[arg(short, long, default_value = "Update")]
        message: String,
    },

    /// Sync SSH config with all profiles
    #[command(name = "ssh-sync")]
    SshSync,
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Add a new profile interactively
    Add {
        /// Profile name (e.g., 'work', 'personal')
        name: Option<String>,

        /// Git user name
        #[arg(long)]
        user_name: Option<String>,

        /// Git email
        #[arg(long)]
        email: Option<String>,

        /// Path to SSH private key
        #[arg(long)]
        ssh_key: Option<String>,

        /// Signing key ID (optional)
        #[arg(long)]
        signing_key: Option<String>,

        /// Don't set up an SSH key
        #[arg(long, conflicts_with = "ssh_key")]
        no_ssh: bool,
    },

    /// List all configured profiles
    #[command(alias = "ls")]
    List,

    /// Remove a profile
    Remove {
        /// Profile name to remove (interactive if not provided)
        name: Option<String>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Show current active profile
    Current {
        /// Machine-readable output for shell prompts
        #[arg(long)]
        porcelain: bool,
    },
}

#[derive(Subcommand)]
pub enum RemoteCommands {
    /// Add a remote through the folder profile's SSH alias
    Add {
        /// Remote URL
        url: String,

        /// Remote name
        #[arg(long, default_value = "origin")]
        name: String,
    },

    /// Rewrite existing remotes to use the folder profile's SSH alias
    Fix {
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_publish_default_message() {
        let cli = Cli::parse_from(["gitx", "publish"]);
        match cli.command {
            Commands::Publish { message } => assert_eq!(message, "Update"),
            _ => panic!("expected publish"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["gitx", "list", "--config", "/tmp/gitx.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/gitx.json")));
    }

    #[test]
    fn test_profile_ls_alias() {
        let cli = Cli::parse_from(["gitx", "profile", "ls"]);
        assert!(matches!(cli.command, Commands::Profile(ProfileCommands::List)));
    }

    #[test]
    fn test_remote_add_default_name() {
        let cli = Cli::parse_from(["gitx", "remote", "add", "git@github.com:a/b.git"]);
        match cli.command {
            Commands::Remote(RemoteCommands::Add { url, name }) => {
                assert_eq!(url, "git@github.com:a/b.git");
                assert_eq!(name, "origin");
            }
            _ => panic!("expected remote add"),
        }
    }
}
