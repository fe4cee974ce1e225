//! Clap derive structures for the `junosync` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use junosync_core::ResourceKind;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// junosync -- declarative configuration sync for Junos devices
#[derive(Debug, Parser)]
#[command(
    name = "junosync",
    version,
    about = "Synchronize Junos device configuration with resource descriptions",
    long_about = "Reads, creates, updates and deletes Junos configuration objects \
        (interfaces, security zones, address books, OSPF areas, IPsec VPNs) \
        from YAML or JSON descriptions, one locked commit per change.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device profile to use
    #[arg(long, short = 'p', env = "JUNOSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Management API URL (overrides profile)
    #[arg(long, short = 'H', env = "JUNOSYNC_HOST", global = true)]
    pub host: Option<String>,

    /// Login user (overrides profile)
    #[arg(long, short = 'u', env = "JUNOSYNC_USERNAME", global = true)]
    pub username: Option<String>,

    /// Login password
    #[arg(long, env = "JUNOSYNC_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "JUNOSYNC_OUTPUT",
        default_value = "yaml",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "JUNOSYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "JUNOSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// YAML (default)
    Yaml,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Pretty table where one applies, YAML otherwise
    Table,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show a configuration object, if configured
    #[command(alias = "get")]
    Read(TargetArgs),

    /// Read an object that must exist
    Import(TargetArgs),

    /// Report whether an object is configured and enabled
    Exists(TargetArgs),

    /// Create or update objects from a description file
    Apply(ApplyArgs),

    /// Delete an object
    #[command(alias = "rm")]
    Delete(TargetArgs),

    /// Show the directives an apply would send
    Plan(PlanArgs),

    /// List the managed resource kinds
    Kinds,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Resource commands ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Resource kind (interface, logical_interface, security_zone,
    /// address_book, ospf_area, ipsec_vpn)
    #[arg(value_parser = parse_kind)]
    pub kind: ResourceKind,

    /// Identifier; OSPF areas use `<area>_-_<v2|v3>_-_<routing instance>`
    pub id: String,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// YAML or JSON description file ("-" for stdin)
    #[arg(long, short = 'f')]
    pub file: PathBuf,

    #[command(flatten)]
    pub mode: ApplyMode,
}

#[derive(Debug, Args)]
#[group(multiple = false)]
pub struct ApplyMode {
    /// Fail if the object already exists
    #[arg(long)]
    pub create: bool,

    /// Fail if the object does not exist
    #[arg(long)]
    pub update: bool,
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// YAML or JSON description file ("-" for stdin)
    #[arg(long, short = 'f')]
    pub file: PathBuf,

    /// Plan offline against a saved `show configuration | display set` dump
    #[arg(long, short = 'd')]
    pub dump: Option<PathBuf>,

    /// Device model assumed for offline planning
    #[arg(long, default_value = "vsrx", requires = "dump")]
    pub model: String,

    /// Physical ports present on the offline device
    #[arg(long, value_delimiter = ',', requires = "dump")]
    pub physical: Vec<String>,
}

fn parse_kind(raw: &str) -> Result<ResourceKind, String> {
    raw.replace('-', "_")
        .parse()
        .map_err(|_| format!("unknown resource kind '{raw}'"))
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key (host, username, api_flavor, timeout, ...)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a password in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
