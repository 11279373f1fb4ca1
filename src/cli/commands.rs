//! CLI command implementations
//!
//! Every command except `init` follows the same sequence:
//!
//! 1. Configuration load
//! 2. Open the image and recover the journal
//! 3. One filesystem request
//! 4. Shutdown: flush and install everything, join journal threads
//!
//! Each command returns the JSON object `run_command` prints.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::disk::FileDisk;
use crate::fs::{Filesystem, FsStatus, WriteArgs};
use crate::wal::{JournalConfig, LogLayout, Wal};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Image file path (required)
    pub image_path: String,

    /// Image size in blocks (optional, default 1024)
    #[serde(default = "default_disk_blocks")]
    pub disk_blocks: u64,

    /// Number of inodes (optional, default 64)
    #[serde(default = "default_ninodes")]
    pub ninodes: u64,

    /// Journal tuning (optional, every field defaulted)
    #[serde(default)]
    pub journal: JournalConfig,
}

fn default_disk_blocks() -> u64 {
    1024
}
fn default_ninodes() -> u64 {
    64
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.image_path.is_empty() {
            return Err(CliError::config_error("image_path must not be empty"));
        }
        if self.disk_blocks == 0 {
            return Err(CliError::config_error("disk_blocks must be > 0"));
        }
        if self.ninodes == 0 {
            return Err(CliError::config_error("ninodes must be > 0"));
        }
        self.journal
            .validate()
            .map_err(|e| CliError::config_error(format!("Journal config error: {}", e)))?;
        Ok(())
    }

    /// Get image path as Path
    pub fn image(&self) -> &Path {
        Path::new(&self.image_path)
    }
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command and print its result
pub fn run_command(cmd: Command) -> CliResult<()> {
    let response = match cmd {
        Command::Init { config } => init(&config)?,
        Command::Write {
            config,
            inum,
            offset,
            data,
        } => write(&config, inum, offset, &data)?,
        Command::Read {
            config,
            inum,
            offset,
            count,
        } => read(&config, inum, offset, count)?,
        Command::Stat { config, inum } => stat(&config, inum)?,
    };
    write_response(response)
}

/// Create the image file and format the journal on it
///
/// Refuses to touch an existing image.
pub fn init(config_path: &Path) -> CliResult<Value> {
    let config = Config::load(config_path)?;
    let image = config.image();

    if image.exists() {
        return Err(CliError::already_initialized());
    }

    let disk = FileDisk::create(image, config.disk_blocks)
        .map_err(|e| CliError::io_error(format!("Failed to create image: {}", e)))?;
    Wal::format(&disk, &config.journal)
        .map_err(|e| CliError::config_error(format!("Failed to format image: {}", e)))?;

    let data_start = LogLayout::new(config.journal.log_size).data_start();
    info!(image = %image.display(), blocks = config.disk_blocks, "initialized image");
    Ok(json!({
        "initialized": true,
        "disk_blocks": config.disk_blocks,
        "log_size": config.journal.log_size,
        "data_start": data_start,
    }))
}

/// Open the image, recovering the journal
fn open(config: &Config) -> CliResult<Filesystem> {
    let image = config.image();
    if !image.exists() {
        return Err(CliError::not_initialized());
    }
    let disk = FileDisk::open(image)
        .map_err(|e| CliError::open_failed(format!("Failed to open image: {}", e)))?;
    let wal = Wal::open(Arc::new(disk), config.journal.clone())
        .map_err(|e| CliError::open_failed(format!("Recovery failed: {}", e)))?;
    Filesystem::new(Arc::new(wal), config.ninodes)
        .map_err(|e| CliError::open_failed(e.to_string()))
}

/// Flush and install everything, then stop the journal threads
fn close(fs: Filesystem) -> CliResult<()> {
    fs.wal()
        .shutdown()
        .map_err(|e| CliError::io_error(format!("Shutdown failed: {}", e)))
}

fn status_str(status: FsStatus) -> &'static str {
    match status {
        FsStatus::Ok => "ok",
        FsStatus::Inval => "inval",
        FsStatus::ServerFault => "server_fault",
    }
}

/// Write `data` at `offset` of inode `inum`
pub fn write(config_path: &Path, inum: u64, offset: u64, data: &str) -> CliResult<Value> {
    let config = Config::load(config_path)?;
    let fs = open(&config)?;
    let reply = fs.write(&WriteArgs::new(inum, offset, data.as_bytes().to_vec()));
    close(fs)?;

    if reply.status != FsStatus::Ok {
        return Err(CliError::request_failed(format!(
            "write returned {}",
            status_str(reply.status)
        )));
    }
    Ok(json!({
        "status": status_str(reply.status),
        "count": reply.count,
    }))
}

/// Read up to `count` bytes at `offset` of inode `inum`
pub fn read(config_path: &Path, inum: u64, offset: u64, count: u64) -> CliResult<Value> {
    let config = Config::load(config_path)?;
    let fs = open(&config)?;
    let reply = fs.read(inum, offset, count);
    close(fs)?;

    if reply.status != FsStatus::Ok {
        return Err(CliError::request_failed(format!(
            "read returned {}",
            status_str(reply.status)
        )));
    }
    Ok(json!({
        "status": status_str(reply.status),
        "data": String::from_utf8_lossy(&reply.data),
        "bytes": reply.data,
        "eof": reply.eof,
    }))
}

/// Attributes of inode `inum` and what recovery did on open
pub fn stat(config_path: &Path, inum: u64) -> CliResult<Value> {
    let config = Config::load(config_path)?;
    let fs = open(&config)?;
    let attr = fs.getattr(inum);
    let recovery = fs.wal().recovery_stats().clone();
    let layout = fs.wal().layout();
    close(fs)?;

    let attr = attr.map_err(|e| CliError::request_failed(e.to_string()))?;
    Ok(json!({
        "inum": attr.inum,
        "size": attr.size,
        "journal": {
            "log_size": layout.log_size(),
            "data_start": layout.data_start(),
            "recovered_start": recovery.start,
            "recovered_end": recovery.end,
            "entries_replayed": recovery.entries_replayed,
            "blocks_written": recovery.blocks_written,
        },
    }))
}
