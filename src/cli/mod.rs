use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod daemon;
pub mod error;
pub mod handler;
pub mod output;

/// aria2-capture - Hand browser downloads to an Aria2 daemon
#[derive(Parser, Debug)]
#[command(name = "aria2-capture")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Override config directory path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (TRACE level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daemon: bridge, capture, monitor and notifications until Ctrl+C
    Run,

    /// Send a URL to Aria2
    Add {
        /// URL to download (repeat for mirrors)
        #[arg(required = true)]
        urls: Vec<String>,

        /// Output filename
        #[arg(long)]
        filename: Option<String>,

        /// Server name (default: resolved from the URL)
        #[arg(long)]
        server: Option<String>,

        /// Referrer sent with the request
        #[arg(long)]
        referrer: Option<String>,

        /// Treat every URL as its own task
        #[arg(long)]
        multi: bool,
    },

    /// Poll the configured servers once
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one Aria2 task
    Status {
        /// Task GID
        gid: String,

        /// Server name (default: first configured)
        #[arg(long)]
        server: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Dry-run the capture rules against a download event
    Decide {
        /// JSON file holding a download event (`-` for stdin)
        event: PathBuf,

        /// URL of the active tab
        #[arg(long)]
        tab: Option<String>,
    },

    /// Manage configuration
    Config {
        /// Configuration action
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show all configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the settings file location
    Path,

    /// Write a default settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add_with_mirrors() {
        let cli = Cli::parse_from([
            "aria2-capture",
            "add",
            "http://a/x.iso",
            "http://b/x.iso",
            "--filename",
            "x.iso",
        ]);
        match cli.command {
            Some(Commands::Add { urls, filename, multi, .. }) => {
                assert_eq!(urls.len(), 2);
                assert_eq!(filename.as_deref(), Some("x.iso"));
                assert!(!multi);
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["aria2-capture", "stats", "--json", "-v", "--config", "/tmp/c"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c")));
        assert!(matches!(cli.command, Some(Commands::Stats { json: true })));
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::parse_from(["aria2-capture"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_add_requires_url() {
        assert!(Cli::try_parse_from(["aria2-capture", "add"]).is_err());
    }
}
