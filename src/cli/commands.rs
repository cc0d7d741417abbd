//! CLI command definitions using clap
//!
//! Defines all CLI subcommands and their arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Persistent Python environments over MCP, backed by uv.
///
/// Runs as an MCP server over stdio by default. The other subcommands
/// operate on the same environments directly from a shell.
#[derive(Parser, Debug)]
#[command(name = "mcp-python-executor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (overrides default XDG paths)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Subcommand to run; the MCP server when none was given
    pub fn resolved_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Mcp)
    }
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start MCP server over stdio (default)
    Mcp,

    /// List environments
    Envs(FormatArgs),

    /// Create an environment, optionally with packages
    Create(CreateArgs),

    /// Write and run Python code in an environment
    Exec(ExecArgs),

    /// List files in an environment
    Files(EnvArgs),

    /// Print or save a file from an environment
    Read(ReadArgs),

    /// Install packages into an environment
    Install(PackagesArgs),

    /// Remove packages from an environment
    Remove(PackagesArgs),

    /// List installed packages
    Packages(EnvArgs),

    /// Delete an environment
    Delete(DeleteArgs),

    /// Delete every environment
    Clean(CleanArgs),

    /// Show resolved configuration
    Config(ConfigArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON output
    Json,
    /// Plain text (one item per line)
    Plain,
}

/// Output format only
#[derive(Args, Debug, Clone)]
pub struct FormatArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// One environment plus an output format
#[derive(Args, Debug, Clone)]
pub struct EnvArgs {
    /// Environment ID
    pub env_id: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the `create` subcommand
#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    /// Environment ID
    pub env_id: String,

    /// Packages to install right away
    pub packages: Vec<String>,
}

/// Arguments for the `exec` subcommand
#[derive(Args, Debug, Clone)]
pub struct ExecArgs {
    /// Environment ID
    pub env_id: String,

    /// Inline Python code
    #[arg(short = 'e', long, conflicts_with = "script")]
    pub code: Option<String>,

    /// Local file whose contents are copied into the environment and run
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// Destination filename inside the environment (default: main.py)
    #[arg(short = 'n', long)]
    pub filename: Option<String>,

    /// Package to `uv add` first (repeatable)
    #[arg(short, long = "package")]
    pub packages: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Arguments for the `read` subcommand
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Environment ID
    pub env_id: String,

    /// File path inside the environment
    pub filename: String,

    /// Save the raw file contents here instead of printing
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Arguments for the `install` and `remove` subcommands
#[derive(Args, Debug, Clone)]
pub struct PackagesArgs {
    /// Environment ID
    pub env_id: String,

    /// Requirement specs
    #[arg(required = true)]
    pub packages: Vec<String>,
}

/// Arguments for the `delete` subcommand
#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Environment ID
    pub env_id: String,
}

/// Arguments for the `clean` subcommand
#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    /// Confirm deletion of all environments
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the `config` subcommand
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}
