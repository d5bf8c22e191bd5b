use anyhow::{Context, Result};
use fwcfg::ops::clone_rule;
use fwcfg::report::render_clone;
use fwcfg::rule_clone::CloneRequest;

use crate::cli::{CloneRuleArgs, OutputFormat};
use crate::RunContext;

pub fn run_clone_rule(ctx: &RunContext, args: CloneRuleArgs) -> Result<()> {
    let request = CloneRequest {
        source_rule_id: Some(args.rule_id),
        clone_count: Some(args.count),
        new_interface: Some(args.interface),
    };

    let report = clone_rule(&ctx.store, &request, &ctx.reloader, ctx.options)
        .with_context(|| format!("clone-rule failed for {}", ctx.store.path().display()))?;

    match ctx.format {
        OutputFormat::Text => println!("{}", render_clone(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
