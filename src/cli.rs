//! CLI argument parsing

use clap::{Parser, Subcommand};
use dapflash_core::{EraseMode, Settings};
use std::path::PathBuf;

/// Block size DAPLink's mass storage layer hands to the stream
pub const DEFAULT_BLOCK_SIZE: usize = 512;

fn parse_block_size(s: &str) -> Result<usize, String> {
    let size = s
        .parse::<usize>()
        .map_err(|e| format!("Invalid number: {}", e))?;
    if size == 0 {
        return Err("Block size must be nonzero".into());
    }
    Ok(size)
}

#[derive(Parser)]
#[command(name = "dapflash")]
#[command(author, version, about = "Drag-and-drop target flash programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Additional board description (.ron file or directory), may be repeated
    #[arg(long, global = true)]
    pub board_file: Vec<PathBuf>,

    /// Settings file (TOML). Defaults to ./dapflash.toml if present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Programming behaviour overrides shared by the commands that write flash
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ProgramArgs {
    /// Erase only the sectors the image touches instead of the whole chip
    #[arg(long)]
    pub page_erase: bool,

    /// Skip verifying programmed pages
    #[arg(long)]
    pub no_verify: bool,

    /// Accept binaries without a matching vector table
    #[arg(long)]
    pub no_detect: bool,

    /// Keep the target halted after programming
    #[arg(long)]
    pub no_reset: bool,

    /// Size of the blocks the image is fed in
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, value_parser = parse_block_size)]
    pub block_size: usize,
}

impl ProgramArgs {
    /// Apply the command line overrides on top of `settings`
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if self.page_erase {
            settings.erase_mode = EraseMode::Page;
        }
        if self.no_verify {
            settings.verify = false;
        }
        if self.no_detect {
            settings.detect_incompatible_target = false;
        }
        if self.no_reset {
            settings.auto_reset = false;
        }
        settings
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Program an image (Intel HEX or binary) into a simulated target
    Program {
        /// Board ID, board name or part number
        #[arg(short, long)]
        board: String,

        /// Image file
        #[arg(short, long)]
        input: PathBuf,

        /// Write the resulting contents of the first flash region here
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compare the resulting flash against this binary
        #[arg(short, long)]
        reference: Option<PathBuf>,

        #[command(flatten)]
        program: ProgramArgs,
    },

    /// Chip erase every region of a simulated target
    Erase {
        /// Board ID, board name or part number
        #[arg(short, long)]
        board: String,
    },

    /// Program an image and write the resulting flash as Intel HEX
    Dump {
        /// Board ID, board name or part number
        #[arg(short, long)]
        board: String,

        /// Image file
        #[arg(short, long)]
        input: PathBuf,

        /// Output Intel HEX file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        program: ProgramArgs,
    },

    /// List known boards
    Boards {
        /// Filter by vendor or family name
        #[arg(long)]
        vendor: Option<String>,
    },

    /// Show the memory map and flash algorithms of a board
    Info {
        /// Board ID, board name or part number
        #[arg(short, long)]
        board: String,
    },
}
