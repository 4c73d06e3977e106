//! Clap derive structures for the `zet` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Also
//! compiled into `build.rs` for man page generation, so it depends on
//! nothing but clap and clap_complete.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// zet -- manage zero-trust tunnel identities
#[derive(Debug, Parser)]
#[command(
    name = "zet",
    version,
    about = "Manage zero-trust tunnel identities from the command line",
    long_about = "Drives a local tunnel engine over its IPC sockets: enroll and load\n\
        identities, enable or disable them, inspect their services, and\n\
        configure the tunnel DNS.",
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
    /// Settings file (defaults to the platform config directory)
    #[arg(long, env = "ZET_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Engine command socket (overrides settings)
    #[arg(long, global = true)]
    pub command_socket: Option<PathBuf>,

    /// Engine event socket (overrides settings)
    #[arg(long, global = true)]
    pub event_socket: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ZET_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Engine command timeout in seconds (overrides settings)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Seconds to wait for loaded identities to report before reading them
    #[arg(long, value_name = "SECS", default_value_t = 5, global = true)]
    pub wait: u64,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Which identities a listing shows.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusFilter {
    All,
    Enabled,
    Disabled,
    /// Connected to their controller
    Active,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Enroll, load, and manage identities
    #[command(alias = "id", alias = "i")]
    Identities(IdentitiesArgs),

    /// List services reachable through identities
    #[command(alias = "svc", alias = "s")]
    Services(ServicesArgs),

    /// Show or change tunnel DNS settings
    Dns(DnsArgs),

    /// Stream identity and throughput changes until interrupted
    Watch(WatchArgs),

    /// Manage settings
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Identities ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct IdentitiesArgs {
    #[command(subcommand)]
    pub command: IdentitiesCommand,
}

#[derive(Debug, Subcommand)]
pub enum IdentitiesCommand {
    /// List loaded identities
    #[command(alias = "ls")]
    List {
        /// Only show identities in this state
        #[arg(long, short = 'f', default_value = "all")]
        filter: StatusFilter,
    },

    /// Show one identity
    Get {
        /// Identity id (e.g. ziti://ctrl.example:443/alice)
        id: String,
    },

    /// Enroll with a one-time token and load the new identity
    Enroll {
        /// File holding the enrollment JWT ("-" for stdin)
        #[arg(long)]
        jwt: PathBuf,
    },

    /// Enable an identity (persisted across restarts)
    Enable { id: String },

    /// Disable an identity (persisted across restarts)
    Disable { id: String },

    /// Remove an identity from the engine and delete its credentials
    #[command(alias = "rm")]
    Delete { id: String },

    /// Ask the engine to refresh an identity from its controller
    Refresh { id: String },

    /// Print the engine's diagnostic dump for an identity
    Dump { id: String },
}

// ── Services ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ServicesArgs {
    #[command(subcommand)]
    pub command: ServicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ServicesCommand {
    /// List services, for one identity or all of them
    #[command(alias = "ls")]
    List {
        /// Restrict to this identity
        id: Option<String>,
    },
}

// ── DNS ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DnsArgs {
    #[command(subcommand)]
    pub command: DnsCommand,
}

#[derive(Debug, Subcommand)]
pub enum DnsCommand {
    /// Show the persisted tunnel DNS settings
    Show,

    /// Persist the tunnel nameserver and range (applies at next start)
    Set {
        /// Nameserver address inside the tunnel range
        #[arg(long)]
        nameserver: String,

        /// Tunnel address range (CIDR)
        #[arg(long)]
        range: String,
    },

    /// Set the engine's upstream resolvers
    Upstream {
        /// Resolver addresses, in preference order
        #[arg(required = true)]
        servers: Vec<String>,
    },
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only show identities in this state
    #[arg(long, short = 'f', default_value = "all")]
    pub filter: StatusFilter,

    /// Also print a throughput line every sample
    #[arg(long)]
    pub rates: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a settings file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display the resolved settings
    Show,

    /// Print the settings file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
