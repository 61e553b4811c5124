use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Marquee: widget dashboard host with persisted, synchronized state.
#[derive(Parser, Debug)]
#[command(name = "marquee", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the host; browser tabs connect over WebSocket as webviews.
    Serve {
        /// Address to listen on, overriding `[server] bind`.
        #[arg(long)]
        bind: Option<String>,

        /// Keep state in memory only.
        #[arg(long)]
        ephemeral: bool,
    },
    /// Print the persisted snapshot of every namespace.
    Recover,
    /// List modes and the widgets each one enables.
    Modes,
    /// Delete all persisted widget state.
    Reset,
    /// Print the effective configuration as JSON.
    Config {
        /// Also write it back to the config file, filling in every default.
        #[arg(long)]
        write: bool,
    },
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_flags_parse() {
        let args = Args::parse_from(["marquee", "--log-level", "debug", "serve", "--bind", "0.0.0.0:9000"]);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        match args.command {
            Command::Serve { bind, ephemeral } => {
                assert_eq!(bind.as_deref(), Some("0.0.0.0:9000"));
                assert!(!ephemeral);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_write_flag_parses() {
        let args = Args::parse_from(["marquee", "--config", "/tmp/marquee.toml", "config", "--write"]);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/marquee.toml")));
        assert!(matches!(args.command, Command::Config { write: true }));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Args::try_parse_from(["marquee"]).is_err());
    }
}
