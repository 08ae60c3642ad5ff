//! `invx` command-line tool.

use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::{ColorChoice, Parser};
use serde::Serialize;
use tracing::level_filters::LevelFilter;

use invx_cli::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use invx_cli::commands::{run_extract, run_identify, run_map, run_validate};
use invx_cli::logging::{LogConfig, LogFormat, init_logging};
use invx_cli::settings::Settings;

mod summary;

use crate::summary::{print_extraction, print_identification, print_mapping, print_validation};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }

    let exit_code = match run(&cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> Result<i32> {
    let settings = if cli.command.reads_settings() {
        Settings::load(cli.config.as_deref())?
    } else {
        Settings::default()
    };
    match &cli.command {
        Command::Extract(args) => {
            let report = run_extract(args)?;
            if args.json {
                print_json(&report)?;
            } else {
                print_extraction(&report);
            }
            Ok(0)
        }
        Command::Identify(args) => {
            let identification = run_identify(args)?;
            if args.json {
                print_json(&identification)?;
            } else {
                print_identification(&identification);
            }
            Ok(0)
        }
        Command::Map(args) => {
            let result = run_map(args, &settings)?;
            if args.json {
                print_json(&result)?;
            } else {
                print_mapping(&result);
            }
            Ok(if result.success { 0 } else { 1 })
        }
        Command::Validate(args) => {
            let report = run_validate(args, &settings)?;
            print_validation(&report);
            Ok(if report.is_valid() { 0 } else { 1 })
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file.clone_from(&cli.log_file);
    config.log_data = cli.log_data;
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
