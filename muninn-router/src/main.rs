#![forbid(unsafe_code)]

mod replay;

use clap::Parser;
use muninn_router_lib::{config::load_from_path, Router, RouterError};
use replay::ReplayHal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Muninn RIPv2 lab router (frame-replay HAL)")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/router.toml"
    )]
    config: PathBuf,
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(%err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(interfaces = cfg.interfaces.len(), "configuration loaded");

    let hal = ReplayHal::new(std::io::stdin().lock(), std::io::stdout(), &cfg);
    let mut router = match Router::new(hal, &cfg) {
        Ok(router) => router,
        Err(err) => {
            error!(%err, "failed to initialize router");
            return ExitCode::FAILURE;
        }
    };

    match router.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(RouterError::Hal(hal_err)) => {
            error!(%hal_err, "platform failure");
            ExitCode::from(hal_err.code.unsigned_abs().min(255) as u8)
        }
        Err(err) => {
            error!(%err, "router exited with error");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
