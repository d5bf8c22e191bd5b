use anyhow::{Context, Result};
use fwcfg::ops::register_vlan;
use fwcfg::report::render_vlan;
use fwcfg::vlan::VlanRequest;

use crate::cli::{AddVlanArgs, OutputFormat};
use crate::RunContext;

pub fn run_add_vlan(ctx: &RunContext, args: AddVlanArgs) -> Result<()> {
    let request = VlanRequest {
        parent_interface: Some(args.parent),
        vlan_id: Some(args.vlan_id),
        ip_address: args.ip,
        netmask: Some(args.netmask),
        description: args.descr,
    };

    let report = register_vlan(&ctx.store, &request, &ctx.reloader, ctx.options)
        .with_context(|| format!("add-vlan failed for {}", ctx.store.path().display()))?;

    match ctx.format {
        OutputFormat::Text => println!("{}", render_vlan(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
