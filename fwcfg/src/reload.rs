use std::process::{Command, Stdio};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::detect::ConfigFlavor;
use crate::settings::ReloadSettings;

/// How much of the running configuration to re-read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadScope {
    /// Interfaces, VLANs and everything else.
    Full,
    /// Firewall filter rules only.
    Filter,
}

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("failed to start reload command {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("reload command {program} exited with {}", exit_label(.code))]
    Failed { program: String, code: Option<i32> },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Makes the running daemon pick up the persisted configuration.
pub trait Reloader {
    fn reload(&self, scope: ReloadScope, flavor: ConfigFlavor) -> Result<(), ReloadError>;
}

/// Built-in reload program for a platform.
pub fn default_program(scope: ReloadScope, flavor: ConfigFlavor) -> &'static str {
    match (flavor, scope) {
        (ConfigFlavor::OpnSense, ReloadScope::Full) => "/usr/local/etc/rc.reload_all",
        (ConfigFlavor::OpnSense, ReloadScope::Filter) => "/usr/local/etc/rc.filter_configure",
        (_, ReloadScope::Full) => "/etc/rc.reload_all",
        (_, ReloadScope::Filter) => "/etc/rc.filter_configure",
    }
}

/// Runs an external program, blocking until it exits. No timeout is applied.
#[derive(Debug, Clone, Default)]
pub struct CommandReloader {
    overrides: ReloadSettings,
}

impl CommandReloader {
    pub fn new(overrides: ReloadSettings) -> Self {
        Self { overrides }
    }

    /// Program that will run for `scope` on `flavor`.
    pub fn program(&self, scope: ReloadScope, flavor: ConfigFlavor) -> String {
        let configured = match scope {
            ReloadScope::Full => self.overrides.full.as_deref(),
            ReloadScope::Filter => self.overrides.filter.as_deref(),
        };
        configured
            .unwrap_or_else(|| default_program(scope, flavor))
            .to_string()
    }
}

impl Reloader for CommandReloader {
    fn reload(&self, scope: ReloadScope, flavor: ConfigFlavor) -> Result<(), ReloadError> {
        let program = self.program(scope, flavor);
        info!(?scope, %program, "triggering reload");

        let status = Command::new(&program)
            .stdin(Stdio::null())
            .status()
            .map_err(|source| ReloadError::Spawn {
                program: program.clone(),
                source,
            })?;

        if status.success() {
            debug!(%program, "reload finished");
            Ok(())
        } else {
            Err(ReloadError::Failed {
                program,
                code: status.code(),
            })
        }
    }
}
