//! Command-line interface for vaani
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Hands-free voice assistant: speak, and hear the answer
#[derive(Parser, Debug)]
#[command(name = "vaani", version, about = "Hands-free voice assistant")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Hide banners and latency figures
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Diagnostic logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device (e.g., hw:0)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Ollama model used for replies
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Speech recognition model file or directory
    #[arg(long, value_name = "PATH")]
    pub stt_model: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}

/// `EnvFilter` directive for a `-v` count.
pub fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["vaani"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.device.is_none());
        assert!(cli.model.is_none());
        assert!(cli.stt_model.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_verbose_repeated_flags() {
        assert_eq!(Cli::try_parse_from(["vaani", "-vv"]).unwrap().verbose, 2);
        assert_eq!(Cli::try_parse_from(["vaani", "-v", "-v", "-v"]).unwrap().verbose, 3);
    }

    #[test]
    fn test_parse_with_options() {
        let cli = Cli::try_parse_from([
            "vaani",
            "--device",
            "hw:0",
            "--model",
            "llama3",
            "--stt-model",
            "/opt/ggml-small.bin",
            "-q",
        ])
        .unwrap();

        assert_eq!(cli.device.as_deref(), Some("hw:0"));
        assert_eq!(cli.model.as_deref(), Some("llama3"));
        assert_eq!(cli.stt_model, Some(PathBuf::from("/opt/ggml-small.bin")));
        assert!(cli.quiet);
    }

    #[test]
    fn test_parse_config_subcommands() {
        let cli = Cli::try_parse_from(["vaani", "config", "show", "--config", "/tmp/c.toml"]).unwrap();
        match cli.command {
            Some(Commands::Config { action }) => assert_eq!(action, ConfigAction::Show),
            other => panic!("expected config show, got {:?}", other),
        }
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));

        let cli = Cli::try_parse_from(["vaani", "config", "path"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Path
            })
        ));
    }

    #[test]
    fn test_unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["vaani", "daemon"]).is_err());
    }

    #[test]
    fn test_log_level_by_verbosity() {
        assert_eq!(log_level(0), "warn");
        assert_eq!(log_level(1), "info");
        assert_eq!(log_level(2), "debug");
        assert_eq!(log_level(7), "trace");
    }
}
