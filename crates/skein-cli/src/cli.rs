use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "skein",
    about = "Skein: content-addressed blobs in a remote folder tree",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a file as a blob
    Put(PutArgs),
    /// Show the remote object holding a blob
    Get(RefArgs),
    /// Print a blob's stored size (0 when absent)
    Stat(RefArgs),
    /// Write a blob's content to stdout or a file
    Cat(CatArgs),
    /// Move a blob to the trash
    Rm(RefArgs),
    /// List stored blobs
    Ls(LsArgs),
    /// List registered shard paths
    Shards(ShardsArgs),
}

#[derive(Args)]
pub struct PutArgs {
    pub file: PathBuf,
    /// Reference to store under. Computed with blake3 when omitted.
    #[arg(long = "ref")]
    pub blob: Option<String>,
    /// Shard path such as `ab/cd`. Derived from the reference when omitted.
    #[arg(long)]
    pub shard: Option<String>,
}

#[derive(Args)]
pub struct RefArgs {
    pub blob: String,
}

#[derive(Args)]
pub struct CatArgs {
    pub blob: String,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct LsArgs {
    /// Cursor returned by a previous listing
    #[arg(long)]
    pub after: Option<String>,
    #[arg(short = 'n', long, default_value = "100")]
    pub limit: usize,
}

#[derive(Args)]
pub struct ShardsArgs {
    #[arg(long)]
    pub page_token: Option<String>,
    #[arg(short = 'n', long, default_value = "100")]
    pub limit: usize,
}
