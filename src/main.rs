//! dapflash - Drag-and-drop target flash programmer
//!
//! Runs the DAPLink flash engine against a simulated target: images are fed
//! through the same stream, manager and engine a probe uses, and the
//! resulting flash can be dumped and compared.

mod boards;
mod cli;
mod commands;
mod error;
mod progress;

use clap::Parser;
use cli::{Cli, Commands};
use dapflash_core::Settings;
use error::CliError;
use std::path::{Path, PathBuf};

/// Settings file picked up from the working directory
const DEFAULT_CONFIG: &str = "dapflash.toml";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.verbose {
        0 => {}
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let db = boards::load_board_database(&cli.board_file)?;
    log::debug!("Loaded {} board definitions", db.len());

    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Program {
            board,
            input,
            output,
            reference,
            program,
        } => {
            let board = boards::find_board(&db, &board)?;
            commands::run_program(
                board,
                program.apply(settings),
                &input,
                output.as_deref(),
                reference.as_deref(),
                program.block_size,
            )
        }
        Commands::Erase { board } => {
            let board = boards::find_board(&db, &board)?;
            commands::run_erase(board, settings).map(|_| ())
        }
        Commands::Dump {
            board,
            input,
            output,
            program,
        } => {
            let board = boards::find_board(&db, &board)?;
            commands::run_dump(
                board,
                program.apply(settings),
                &input,
                &output,
                program.block_size,
            )
        }
        Commands::Boards { vendor } => {
            commands::list_boards(&db, vendor.as_deref());
            Ok(())
        }
        Commands::Info { board } => {
            let board = boards::find_board(&db, &board)?;
            commands::print_board_info(board);
            Ok(())
        }
    }
}

/// Load settings from `path`, or from `dapflash.toml` in the working
/// directory if it exists
fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG);
            if !default.is_file() {
                return Ok(Settings::default());
            }
            default
        }
    };

    let settings = Settings::from_toml_file(&path)?;
    log::info!("Loaded settings from {}", path.display());
    Ok(settings)
}
