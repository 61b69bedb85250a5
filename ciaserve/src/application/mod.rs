pub mod address;
pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use ciaserve_core::error::Result;
use clap::Parser;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::logging::init_logging(cli.verbose)?;
    match cli.command {
        None => handlers::handle_serve(cli.serve).await,
        Some(Commands::Serve(args)) => handlers::handle_serve(args).await,
        Some(Commands::List(args)) => handlers::handle_list(args).await,
    }
}
