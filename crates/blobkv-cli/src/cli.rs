use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "blobkv",
    about = "Store and fetch JSON values in an object-storage container",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Read settings from a TOML file instead of the environment
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store a JSON value under a key
    Put(PutArgs),
    /// Print the value stored under a key
    Get(KeyArgs),
    /// Remove a key
    Delete(KeyArgs),
    /// Print every value directly under a prefix
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct PutArgs {
    pub key: String,
    /// The value, as a JSON document
    pub value: String,
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    pub key: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(default_value = "")]
    pub prefix: String,
}
