//! Almanac CLI - test-report aggregation, release sync and release timelines.

use almanac::cli::{Cli, Commands, ConfigCommands};
use almanac::commands::{self, Output, TimelineOptions};
use almanac::config::{ConfigOverrides, resolve_config, resolve_config_strict};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Log filter variable checked before `RUST_LOG`.
const LOG_ENV: &str = "ALMANAC_LOG";

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    init_tracing(cli.verbose);

    if let Some(ref root) = cli.root {
        if !root.is_dir() {
            report_error(
                &format!("Specified root does not exist: {}", root.display()),
                human,
            );
            process::exit(1);
        }
    }

    if let Err(e) = run_command(cli.command, cli.root, human) {
        tracing::error!(error = %e, "command failed");
        report_error(&e.to_string(), human);
        process::exit(1);
    }
}

/// Set up stderr logging.
///
/// `ALMANAC_LOG` wins over `RUST_LOG`; without either the level comes from
/// `-v` (info) / `-vv` (debug), defaulting to warn.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn report_error(message: &str, human: bool) {
    if human {
        eprintln!("Error: {}", message);
    } else {
        eprintln!("{}", serde_json::json!({ "error": message }));
    }
}

fn run_command(
    command: Commands,
    root: Option<PathBuf>,
    human: bool,
) -> Result<(), almanac::Error> {
    let today = chrono::Local::now().date_naive();
    let store_path = match &command {
        Commands::Sync { store } => store.clone(),
        _ => None,
    };
    let overrides = ConfigOverrides { root, store_path };
    let config = if matches!(command, Commands::Config { .. }) {
        resolve_config_strict(&overrides)?
    } else {
        resolve_config(&overrides)?
    };
    let root = config.root.value.clone();

    match command {
        Commands::Scan => {
            let result = commands::scan(&root)?;
            output(&result, human);
        }

        Commands::Index => {
            let result = commands::index(&root, today)?;
            output(&result, human);
        }

        Commands::Sync { .. } => {
            let result = commands::sync(&config)?;
            output(&result, human);
        }

        Commands::Metrics { file } => {
            let result = commands::metrics(&file)?;
            output(&result, human);
        }

        Commands::Timeline {
            input,
            fetch,
            save,
            width,
        } => {
            let options = TimelineOptions {
                input,
                fetch,
                save,
                width,
            };
            let result = commands::timeline(&config, &options, today)?;
            output(&result, human);
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let result = commands::config_show(&config)?;
                output(&result, human);
            }
        },
    }

    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
