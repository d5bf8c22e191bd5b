use anyhow::{Context as _, Result};
use clap::Parser;
use fwcfg::ops::RunOptions;
use fwcfg::reload::CommandReloader;
use fwcfg::settings::{load_settings, Settings};
use fwcfg::store::ConfigStore;
use tracing_subscriber::EnvFilter;

mod cli;
mod clone_cmd;
mod vlan_cmd;

use cli::{Cli, Command, GlobalArgs, OutputFormat, DEFAULT_CONFIG_PATH};

/// Everything a subcommand needs, resolved from flags, settings and defaults.
pub struct RunContext {
    pub store: ConfigStore,
    pub reloader: CommandReloader,
    pub options: RunOptions,
    pub format: OutputFormat,
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Usage errors exit 1; --help and --version exit 0.
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    init_logging(cli.global.verbose);
    let ctx = resolve_context(&cli.global)?;

    match cli.command {
        Command::AddVlan(args) => vlan_cmd::run_add_vlan(&ctx, args),
        Command::CloneRule(args) => clone_cmd::run_clone_rule(&ctx, args),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn resolve_context(global: &GlobalArgs) -> Result<RunContext> {
    let settings = match &global.settings {
        Some(path) => load_settings(path)
            .with_context(|| format!("failed to load settings {}", path.display()))?,
        None => Settings::default(),
    };

    let config = global
        .config
        .clone()
        .or(settings.config)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.into());
    let mut store = ConfigStore::new(config);
    if let Some(dir) = global.backup_dir.clone().or(settings.backup.dir) {
        store = store.with_backup_dir(dir);
    }

    Ok(RunContext {
        store,
        reloader: CommandReloader::new(settings.reload),
        options: RunOptions {
            dry_run: global.dry_run,
            skip_reload: global.no_reload,
        },
        format: global.format,
    })
}
