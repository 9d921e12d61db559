//! quay CLI - incremental builds for a workspace of interdependent projects

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use quay::util::GlobalContext;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("quay=debug")
    } else {
        EnvFilter::new("quay=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let mut gctx = match &cli.directory {
        Some(dir) => GlobalContext::with_cwd(dir.clone())?,
        None => GlobalContext::new()?,
    };
    gctx.set_verbose(cli.verbose);
    gctx.set_color(!cli.no_color);
    gctx.set_offline(cli.offline);

    match cli.command {
        Commands::Paths(args) => commands::paths::execute(&gctx, args),
        Commands::Build(args) => commands::build::execute(&gctx, args),
        Commands::Stale(args) => commands::stale::execute(&gctx, args),
        Commands::Tree(args) => commands::tree::execute(&gctx, args),
        Commands::Clean(args) => commands::clean::execute(&gctx, args),
        Commands::Release(args) => commands::release::execute(&gctx, args),
        Commands::Repos(args) => commands::repos::execute(&gctx, args),
    }
}
