use colored::Colorize;

use crate::ops::{CloneReport, ReloadStatus, VlanReport, VlanStatus};

/// Render a VLAN registration result for terminal output.
pub fn render_vlan(report: &VlanReport) -> String {
    let status = match report.status {
        VlanStatus::Added => "status=added".green().to_string(),
        VlanStatus::AlreadyPresent => "status=already_present".yellow().to_string(),
    };

    let mut out = Vec::new();
    out.push(format!(
        "vlan parent={} tag={} {status}",
        report.parent_interface, report.vlan_id
    ));
    if let Some(device) = &report.device {
        out.push(format!("- device: {device}"));
    }
    if let Some(assignment) = &report.assignment {
        out.push(format!("- assignment: {assignment}"));
    }
    append_common(
        &mut out,
        &report.config,
        report.platform.as_str(),
        report.snapshot.as_deref(),
        report.dry_run,
        report.reload,
        &report.inserted,
    );
    out.join("\n")
}

/// Render a rule clone result for terminal output.
pub fn render_clone(report: &CloneReport) -> String {
    let mut out = Vec::new();
    out.push(format!(
        "clone rule={} interface={} {}",
        report.source_rule,
        report.interface,
        format!("count={}", report.clones.len()).green()
    ));
    for clone in &report.clones {
        out.push(format!("- {}: {}", clone.key.as_str(), clone.id));
    }
    append_common(
        &mut out,
        &report.config,
        report.platform.as_str(),
        report.snapshot.as_deref(),
        report.dry_run,
        report.reload,
        &report.inserted,
    );
    out.join("\n")
}

fn append_common(
    out: &mut Vec<String>,
    config: &str,
    platform: &str,
    snapshot: Option<&str>,
    dry_run: bool,
    reload: ReloadStatus,
    inserted: &[String],
) {
    out.push(format!("config={config} platform={platform}"));
    match snapshot {
        Some(path) => out.push(format!("snapshot={path}")),
        None => out.push("snapshot=none".to_string()),
    }
    let reload = match reload {
        ReloadStatus::Completed => "reload=completed".green().to_string(),
        ReloadStatus::Skipped => "reload=skipped".yellow().to_string(),
        ReloadStatus::NotNeeded => "reload=not_needed".to_string(),
    };
    out.push(reload);
    if dry_run {
        out.push("dry_run: no changes written".cyan().to_string());
    }
    if !inserted.is_empty() {
        out.push(String::new());
        out.push("inserted".to_string());
        for fragment in inserted {
            out.push(fragment.clone());
        }
    }
}
