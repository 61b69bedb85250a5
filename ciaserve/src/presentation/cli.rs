use clap::{ArgAction, Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

use ciaserve_core::config::{DEFAULT_CHUNK_SIZE, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PORT};

/// Without a subcommand the flags are those of `serve`.
#[derive(Parser)]
#[command(
    author,
    version,
    about = "ciaserve: share 3DS homebrew over the LAN with QR codes",
    long_about = None,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub serve: ServeArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve eligible files and keep the catalog live (default)
    Serve(ServeArgs),

    /// Print the files that would be shared and their download URLs
    List(ShareArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ShareArgs {
    /// Directory to share (not recursed into)
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Address to bind and advertise; wins over `ip override.txt` and auto-detection
    #[arg(long)]
    pub host: Option<IpAddr>,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Extension to share, repeatable (defaults to cia and 3dsx)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,
}

impl Default for ShareArgs {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            host: None,
            port: DEFAULT_PORT,
            extensions: Vec::new(),
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub share: ShareArgs,

    /// Milliseconds between directory scans
    #[arg(long = "poll-ms", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_ms: u64,

    /// Bytes read and sent per chunk
    #[arg(long = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Also print each new file's QR code in the terminal
    #[arg(long = "print-qr")]
    pub print_qr: bool,

    /// Do not draw a terminal progress bar per download
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            share: ShareArgs::default(),
            poll_ms: DEFAULT_POLL_INTERVAL_MS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            print_qr: false,
            no_progress: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_flags_parse() {
        let cli = Cli::try_parse_from([
            "ciaserve", "serve", "-v", "--dir", "/srv/roms", "--host", "10.0.0.5", "--ext", "cia",
            "--ext", "nds", "--poll-ms", "250", "--print-qr",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Some(Commands::Serve(args)) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.share.dir, PathBuf::from("/srv/roms"));
        assert_eq!(args.share.host, Some("10.0.0.5".parse().unwrap()));
        assert_eq!(args.share.extensions, vec!["cia", "nds"]);
        assert_eq!(args.share.port, DEFAULT_PORT);
        assert_eq!(args.poll_ms, 250);
        assert_eq!(args.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(args.print_qr);
    }

    #[test]
    fn bare_invocation_has_no_subcommand() {
        let cli = Cli::try_parse_from(["ciaserve"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.serve.share.port, DEFAULT_PORT);
        assert!(!cli.serve.no_progress);
    }

    #[test]
    fn flags_without_subcommand_mean_serve() {
        let cli = Cli::try_parse_from([
            "ciaserve", "--port", "9000", "--dir", "/tmp", "-vv", "--chunk-size", "4096",
            "--no-progress",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.serve.share.port, 9000);
        assert_eq!(cli.serve.share.dir, PathBuf::from("/tmp"));
        assert_eq!(cli.serve.chunk_size, 4096);
        assert!(cli.serve.no_progress);
    }

    #[test]
    fn list_takes_share_flags() {
        let cli = Cli::try_parse_from(["ciaserve", "list", "--dir", "/srv", "--ext", "nds"]).unwrap();
        let Some(Commands::List(args)) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.dir, PathBuf::from("/srv"));
        assert_eq!(args.extensions, vec!["nds"]);
    }

    #[test]
    fn top_level_flags_do_not_mix_with_a_subcommand() {
        assert!(Cli::try_parse_from(["ciaserve", "--port", "9000", "list"]).is_err());
    }
}
