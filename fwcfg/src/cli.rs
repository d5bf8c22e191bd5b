use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};

pub const DEFAULT_CONFIG_PATH: &str = "/conf/config.xml";

#[derive(Parser, Debug)]
#[command(name = "fwcfg", version)]
#[command(about = "Add VLANs and clone filter rules in pfSense/OPNsense config.xml")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Ensure a VLAN exists (optionally with an IP interface), then reload everything.
    AddVlan(AddVlanArgs),
    /// Copy a filter rule onto another interface, then reload the filter.
    CloneRule(CloneRuleArgs),
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Configuration document to edit (default /conf/config.xml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Optional TOML settings file (config path, reload programs, backup dir).
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,
    /// Directory for pre-change snapshots. Defaults to the document's directory.
    #[arg(long, global = true)]
    pub backup_dir: Option<PathBuf>,
    /// Write the document but do not reload the running configuration.
    #[arg(long, global = true)]
    pub no_reload: bool,
    /// Show what would be inserted without snapshotting, writing or reloading.
    #[arg(long, global = true)]
    pub dry_run: bool,
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Debug logging on stderr (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
pub struct AddVlanArgs {
    /// Parent (physical) interface, e.g. igb1.
    #[arg(long)]
    pub parent: String,
    /// 802.1Q tag (1-4094).
    #[arg(long)]
    pub vlan_id: u32,
    /// IPv4 address for a new `vlan<id>` interface assignment.
    #[arg(long)]
    pub ip: Option<String>,
    /// Netmask for --ip, dotted or prefix length.
    #[arg(long, default_value = "255.255.255.0")]
    pub netmask: String,
    /// Description for the VLAN and assignment (default VLAN<id>).
    #[arg(long)]
    pub descr: Option<String>,
}

#[derive(Parser, Debug)]
pub struct CloneRuleArgs {
    /// Rule to copy: its uuid attribute or tracker value.
    #[arg(long)]
    pub rule_id: String,
    /// Number of copies.
    #[arg(long)]
    pub count: u32,
    /// Interface the copies apply to.
    #[arg(long)]
    pub interface: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
