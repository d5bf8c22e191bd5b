//! End-to-end mutation workflows.
//!
//! Both operations follow the same sequence:
//!
//! 1. **Validate** the request; nothing is touched on failure
//! 2. **Snapshot** the document (kept whatever happens next)
//! 3. **Load** and apply the edit to the in-memory document
//! 4. **Commit** with one atomic file replacement
//! 5. **Reload** the running daemon (full for VLANs, filter-only for rules)
//!
//! A reload failure is returned as an error after the document has been
//! written. Nothing is rolled back; restore from the snapshot if needed.
//! Dry runs stop after step 3 and take no snapshot.

use serde::Serialize;
use tracing::{info, warn};
use xml_edit_core::{Document, XmlNode};

use crate::detect::{detect_config, ConfigFlavor};
use crate::error::OpError;
use crate::reload::{ReloadScope, Reloader};
use crate::rule_clone::{self, CloneRequest, RuleKey};
use crate::snapshot::Snapshot;
use crate::store::ConfigStore;
use crate::vlan::{self, VlanChange, VlanRequest};

/// Switches shared by both operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Plan and report the edit without writing, snapshotting or reloading.
    pub dry_run: bool,
    /// Write the document but leave the running configuration alone.
    pub skip_reload: bool,
}

/// What happened to the running configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadStatus {
    Completed,
    Skipped,
    NotNeeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VlanStatus {
    Added,
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VlanReport {
    pub config: String,
    pub platform: ConfigFlavor,
    pub parent_interface: String,
    pub vlan_id: u16,
    pub status: VlanStatus,
    pub device: Option<String>,
    pub assignment: Option<String>,
    pub snapshot: Option<String>,
    pub dry_run: bool,
    pub reload: ReloadStatus,
    /// Serialized elements added to the document.
    pub inserted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClonedRuleReport {
    pub id: String,
    pub key: RuleKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloneReport {
    pub config: String,
    pub platform: ConfigFlavor,
    pub source_rule: String,
    pub interface: String,
    pub clones: Vec<ClonedRuleReport>,
    pub snapshot: Option<String>,
    pub dry_run: bool,
    pub reload: ReloadStatus,
    /// Serialized elements added to the document.
    pub inserted: Vec<String>,
}

/// Ensure a VLAN (and optional interface assignment) exists, then run a full reload.
pub fn register_vlan(
    store: &ConfigStore,
    request: &VlanRequest,
    reloader: &dyn Reloader,
    options: RunOptions,
) -> Result<VlanReport, OpError> {
    let spec = request.validate()?;
    let snapshot = take_snapshot(store, options)?;
    let mut doc = store.load()?;
    let platform = detect_config(doc.root());

    let change = vlan::register(&mut doc, &spec)?;
    let mut report = VlanReport {
        config: store.path().display().to_string(),
        platform,
        parent_interface: spec.parent.clone(),
        vlan_id: spec.tag,
        status: VlanStatus::AlreadyPresent,
        device: None,
        assignment: None,
        snapshot: snapshot.map(|s| s.path().display().to_string()),
        dry_run: options.dry_run,
        reload: ReloadStatus::NotNeeded,
        inserted: Vec::new(),
    };

    match change {
        VlanChange::AlreadyPresent => {
            info!(
                parent = %spec.parent,
                tag = spec.tag,
                "VLAN already defined; nothing to do"
            );
        }
        VlanChange::Added {
            device,
            vlan,
            assignment,
        } => {
            info!(parent = %spec.parent, tag = spec.tag, %device, "VLAN added");
            report.status = VlanStatus::Added;
            report.device = Some(device);
            report.inserted.push(render_fragment(&vlan));
            if let Some(assignment) = assignment {
                report.assignment = Some(assignment.tag.clone());
                report.inserted.push(render_fragment(&assignment));
            }
            report.reload = commit_and_reload(
                store,
                &doc,
                reloader,
                ReloadScope::Full,
                platform,
                options,
            )?;
        }
    }

    Ok(report)
}

/// Append copies of an existing rule bound to a new interface, then run a filter reload.
pub fn clone_rule(
    store: &ConfigStore,
    request: &CloneRequest,
    reloader: &dyn Reloader,
    options: RunOptions,
) -> Result<CloneReport, OpError> {
    let spec = request.validate()?;
    let snapshot = take_snapshot(store, options)?;
    let mut doc = store.load()?;
    let platform = detect_config(doc.root());

    let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
    let clones = rule_clone::clone_rule(&mut doc, &spec, now)?;
    info!(
        rule = %spec.rule_id,
        count = clones.len(),
        interface = %spec.interface,
        "rule cloned"
    );

    let reload = commit_and_reload(
        store,
        &doc,
        reloader,
        ReloadScope::Filter,
        platform,
        options,
    )?;

    Ok(CloneReport {
        config: store.path().display().to_string(),
        platform,
        source_rule: spec.rule_id,
        interface: spec.interface,
        inserted: clones.iter().map(|c| c.xml.clone()).collect(),
        clones: clones
            .into_iter()
            .map(|c| ClonedRuleReport { id: c.id, key: c.key })
            .collect(),
        snapshot: snapshot.map(|s| s.path().display().to_string()),
        dry_run: options.dry_run,
        reload,
    })
}

fn take_snapshot(store: &ConfigStore, options: RunOptions) -> Result<Option<Snapshot>, OpError> {
    if options.dry_run {
        return Ok(None);
    }
    store.snapshot().map(Some)
}

fn commit_and_reload(
    store: &ConfigStore,
    doc: &Document,
    reloader: &dyn Reloader,
    scope: ReloadScope,
    platform: ConfigFlavor,
    options: RunOptions,
) -> Result<ReloadStatus, OpError> {
    if options.dry_run {
        return Ok(ReloadStatus::Skipped);
    }
    store.commit(doc)?;
    if options.skip_reload {
        info!(?scope, "reload skipped on request");
        return Ok(ReloadStatus::Skipped);
    }

    if let Err(err) = reloader.reload(scope, platform) {
        warn!(
            path = %store.path().display(),
            "configuration was written but reload failed: {err}"
        );
        return Err(err.into());
    }
    Ok(ReloadStatus::Completed)
}

fn render_fragment(node: &XmlNode) -> String {
    match xml_edit_core::write(node) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => node.to_string(),
    }
}
