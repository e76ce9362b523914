//! jetbuild CLI - provisions CUDA and OpenCV on Jetson boards

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::Cli;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("jetbuild=debug")
    } else {
        EnvFilter::new("jetbuild=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    if cli.is_idle() {
        Cli::command().print_help()?;
        return Ok(());
    }

    if let Some(component) = &cli.list_versions {
        return commands::list_versions::execute(cli.work_dir.clone(), component.as_deref());
    }

    if cli.install_cuda {
        commands::install_cuda::execute(cli.work_dir.clone())?;
    }

    if cli.install_opencv {
        commands::install_opencv::execute(cli.work_dir.clone(), cli.opencv_version)?;
    }

    Ok(())
}
