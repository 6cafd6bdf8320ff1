mod cli;
mod commands;
mod config;
mod downloader;
mod errors;
mod installer;
mod metadata;
mod prompt;
mod runner;
mod security;
mod utils;

use std::process::ExitCode;

use clap::Parser;
use log::info;

use crate::cli::Args;
use crate::commands::{RunStatus, Session};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG still wins over the default level
    let default_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    info!("Starting Universal Media Downloader {}", env!("CARGO_PKG_VERSION"));

    let config = match config::AppConfig::load() {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            config::AppConfig::default()
        }
    };

    let mut session = match Session::system(config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::from(1);
        }
    };

    let result = if args.is_direct() {
        session.run_direct(&args).await
    } else {
        session.run_interactive(&args).await
    };

    match result {
        Ok(status) => status.into(),
        Err(e) if e.is_interrupted() => {
            println!("\nProgram terminated.");
            // A pending stdin read would otherwise keep the runtime alive
            std::process::exit(0);
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("❌ {}", e);
            RunStatus::Failed.into()
        }
    }
}
