//! `modkit-design-copy` command-line entry point.

use std::io::{self, IsTerminal};

use clap::{ColorChoice, Parser};
use modkit_design_copy::{EnumRunStatus, ReportDesignCopy};
use modkit_design_copy_cli::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use modkit_design_copy_cli::commands::{run_copy, run_scan};
use modkit_design_copy_cli::config::load_config;
use modkit_design_copy_cli::logging::{LogConfig, LogFormat, init_logging};
use modkit_design_copy_cli::summary::{print_report, print_scan};
use tracing::level_filters::LevelFilter;

const EXIT_OK: i32 = 0;
const EXIT_FAILED: i32 = 1;
const EXIT_CANCELLED: i32 = 130;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(EXIT_FAILED);
    }
    std::process::exit(run(&cli));
}

fn run(cli: &Cli) -> i32 {
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error:#}");
            return EXIT_FAILED;
        }
    };
    match &cli.command {
        Command::Scan(args) => match run_scan(args, &config) {
            Ok(result) => {
                if args.json {
                    print_json(&result)
                } else {
                    print_scan(&result);
                    EXIT_OK
                }
            }
            Err(error) => {
                eprintln!("error: {error:#}");
                EXIT_FAILED
            }
        },
        Command::Copy(args) => match run_copy(args, &config) {
            Ok(report) => {
                if args.json {
                    let exit_code = print_json(&report);
                    if exit_code != EXIT_OK {
                        return exit_code;
                    }
                } else {
                    print_report(&report);
                }
                exit_code_for(&report)
            }
            Err(error) => {
                eprintln!("error: {error:#}");
                EXIT_FAILED
            }
        },
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(txt) => {
            println!("{txt}");
            EXIT_OK
        }
        Err(error) => {
            eprintln!("error: failed to serialize output: {error}");
            EXIT_FAILED
        }
    }
}

fn exit_code_for(report: &ReportDesignCopy) -> i32 {
    match report.status {
        EnumRunStatus::Completed | EnumRunStatus::NoFilesFound => EXIT_OK,
        EnumRunStatus::Cancelled => EXIT_CANCELLED,
        EnumRunStatus::CompletedWithFailures | EnumRunStatus::Failed => EXIT_FAILED,
    }
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
    config.log_file = cli.log_file.clone();
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
