use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "hyperctl", about = "Command-line client for the container daemon")]
pub struct CliArgs {
    /// Daemon address, overriding the config file
    #[arg(long, short = 'H', global = true)]
    pub host: Option<String>,
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pull an image from a registry
    Pull { image: String },
    /// Push an image to a registry
    Push { image: String },
    /// Fetch the output of a container
    Logs(LogsArgs),
    /// Keep the pty of an exec session sized to this terminal until Ctrl-C
    AttachResize {
        container: String,
        /// Exec tag; a random one is generated when omitted
        #[arg(long)]
        tag: Option<String>,
    },
    /// Log in to a registry
    Login { server: Option<String> },
    /// Remove stored credentials for a registry
    Logout { server: Option<String> },
    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    pub container: String,
    #[arg(long, short = 'f')]
    pub follow: bool,
    #[arg(long, short = 't')]
    pub timestamps: bool,
    /// Number of lines to show from the end
    #[arg(long, default_value = "all")]
    pub tail: String,
    /// The container runs with a tty, so its output is not multiplexed
    #[arg(long)]
    pub tty: bool,
    /// Exec tag whose pty is kept sized to this terminal while output lasts
    #[arg(long, requires = "tty")]
    pub tag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_host_after_subcommand() {
        let args = CliArgs::parse_from(["hyperctl", "pull", "busybox", "--host", "tcp://h:1"]);
        assert_eq!(args.host.as_deref(), Some("tcp://h:1"));
        assert!(matches!(args.command, Command::Pull { ref image } if image == "busybox"));
    }

    #[test]
    fn logs_defaults() {
        let args = CliArgs::parse_from(["hyperctl", "logs", "pod-1", "-f"]);
        let Command::Logs(logs) = args.command else {
            panic!("expected logs command");
        };
        assert!(logs.follow);
        assert!(!logs.tty);
        assert_eq!(logs.tail, "all");
        assert!(logs.tag.is_none());
    }

    #[test]
    fn logs_tag_needs_tty() {
        assert!(CliArgs::try_parse_from(["hyperctl", "logs", "pod-1", "--tag", "abcd1234"]).is_err());

        let args =
            CliArgs::parse_from(["hyperctl", "logs", "pod-1", "--tty", "--tag", "abcd1234"]);
        let Command::Logs(logs) = args.command else {
            panic!("expected logs command");
        };
        assert_eq!(logs.tag.as_deref(), Some("abcd1234"));
    }
}
