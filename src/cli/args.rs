//! CLI argument definitions using clap
//!
//! Commands:
//! - blockjournal init --config <path>
//! - blockjournal write --config <path> --inum <n> --offset <n> --data <text>
//! - blockjournal read --config <path> --inum <n> --offset <n> --count <n>
//! - blockjournal stat --config <path> --inum <n>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// blockjournal - journaled block storage with a tiny filesystem on top
#[derive(Parser, Debug)]
#[command(name = "blockjournal")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create and format a new image
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./blockjournal.json")]
        config: PathBuf,
    },

    /// Write bytes into a file
    Write {
        /// Path to configuration file
        #[arg(long, default_value = "./blockjournal.json")]
        config: PathBuf,

        /// Inode number
        #[arg(long)]
        inum: u64,

        /// Byte offset within the file
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// UTF-8 text to write
        #[arg(long)]
        data: String,
    },

    /// Read bytes from a file
    Read {
        /// Path to configuration file
        #[arg(long, default_value = "./blockjournal.json")]
        config: PathBuf,

        /// Inode number
        #[arg(long)]
        inum: u64,

        /// Byte offset within the file
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Maximum number of bytes to read
        #[arg(long, default_value_t = 4096)]
        count: u64,
    },

    /// Show file attributes and journal state
    Stat {
        /// Path to configuration file
        #[arg(long, default_value = "./blockjournal.json")]
        config: PathBuf,

        /// Inode number
        #[arg(long)]
        inum: u64,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
