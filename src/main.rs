#![allow(
    clippy::collapsible_else_if,
    clippy::collapsible_if,
    clippy::module_inception,
    clippy::needless_range_loop,
    clippy::result_map_unit_fn,
    clippy::useless_format
)]
#![deny(
    clippy::get_unwrap,
    clippy::panic,
    clippy::print_stdout,
    clippy::unwrap_used,
    clippy::use_debug,
    clippy::used_underscore_binding,
    clippy::used_underscore_items
)]

mod actions;
mod archive;
mod config;
mod environment;
mod errors;
mod logger;
mod session;
mod util;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use config::{cli, resolve_config};
use environment::{EnvSettings, LinuxEnvironment};
use log::warn;
use serde_json::Value;
use util::{enable_json_output, print_json_output, set_json_output};

pub fn main() -> Result<()> {
    let logger = logger::Logger::new(log::LevelFilter::Trace)
        .init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;
    logger::install_panic_hook();
    let cli: cli::Args = cli::Args::parse();

    if let Some(log_level) = cli.log_level {
        logger.set_level(log_level);
    } else {
        logger.set_level(log::LevelFilter::Info);
    };

    let config = resolve_config(cli.clone()).context("Resolving config")?;

    // Now that we've loaded the config, we can set the log level and print out any deferred messages
    // emitted while we were loading the config.
    logger.set_level(config.log_level);
    if let Some(log_file) = &config.log_file {
        if let Err(e) = logger.open_log_file(log_file, &config.data_dir) {
            warn!("Failed to open log file {}: {}", log_file.display(), e);
        }
    }
    logger.print_deferred();

    let env = LinuxEnvironment::new(EnvSettings::from_config(&config));
    let action = cli.action.unwrap_or(cli::Action::Shell);

    if let cli::Action::Shell = action {
        let result = actions::shell(&config, &env);
        logger.shutdown();
        let code = result?;
        std::process::exit(code);
    }

    if cli.json {
        enable_json_output();
    }
    let result = match action {
        cli::Action::Setup => actions::setup(&config, &env),
        cli::Action::Status => actions::status(&env),
        cli::Action::Validate => actions::validate(&env),
        cli::Action::Config { keys } => actions::config(&config, keys),
        cli::Action::Launcher { argv } => actions::launcher(&env, argv),
        cli::Action::Shell => Ok(()),
    };
    if cli.json {
        if let Err(e) = &result {
            set_json_output("status", Value::String("error".to_string()));
            set_json_output("error", Value::String(format!("{:#}", e)));
        } else {
            set_json_output("status", Value::String("success".to_string()));
        }
        print_json_output()?;
        if result.is_err() {
            logger.shutdown();
            std::process::exit(1);
        }
    }
    logger.shutdown();
    result
}
