use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::bridge::DEFAULT_PANIC_EXPORT;
use crate::config::{DOCUMENT_ENV, INIT_TIMEOUT_ENV, MODULE_ENV, MOUNT_TARGET_ENV};
use crate::mount::{DEFAULT_MOUNT_TARGET, DEFAULT_ROOT_COMPONENT};

/// bootseq - initialize a WebAssembly module, install the panic bridge, mount the UI
#[derive(Parser)]
#[command(name = "bootseq")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full startup sequence and write the mounted document
    Run(RunArgs),
    /// Initialize the module only and list its exports (dry-run)
    Inspect {
        /// Module artifact: file path or http(s) URL
        #[arg(short = 'm', long, env = MODULE_ENV)]
        module: String,

        /// Print the module description as JSON
        #[arg(long)]
        json: bool,

        /// Stub unresolved imports with trapping functions
        #[arg(long)]
        trap_unknown_imports: bool,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Module artifact: file path or http(s) URL
    #[arg(short = 'm', long, env = MODULE_ENV)]
    pub module: String,

    /// HTML shell containing the mount target (a directory means its index.html)
    #[arg(short = 'd', long, env = DOCUMENT_ENV)]
    pub document: PathBuf,

    /// Id of the element the UI root is mounted into
    #[arg(short = 't', long, env = MOUNT_TARGET_ENV, default_value = DEFAULT_MOUNT_TARGET)]
    pub target: String,

    /// Name of the root component
    #[arg(short = 'r', long, default_value = DEFAULT_ROOT_COMPONENT)]
    pub root: String,

    /// Function the module must export for the panic bridge
    #[arg(long, default_value = DEFAULT_PANIC_EXPORT)]
    pub panic_export: String,

    /// Do not require the panic hook export
    #[arg(long)]
    pub no_panic_export_check: bool,

    /// Stub unresolved imports with trapping functions instead of failing
    #[arg(long)]
    pub trap_unknown_imports: bool,

    /// Abort if module initialization takes longer than this (milliseconds)
    #[arg(long, env = INIT_TIMEOUT_ENV)]
    pub init_timeout_ms: Option<u64>,

    /// Write the mounted document here instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Append diagnostic events as JSON lines to this file
    #[arg(long)]
    pub events: Option<PathBuf>,
}
