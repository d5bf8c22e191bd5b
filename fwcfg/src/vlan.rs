//! VLAN registration.
//!
//! A VLAN is identified by the pair (parent interface, tag). The same tag on
//! two different parents is two different VLANs. Registering an existing pair
//! is a no-op.
//!
//! ```xml
//! <vlans>
//!   <vlan><if>igb1</if><tag>20</tag><descr>VLAN20</descr><vlanif>vlan20</vlanif></vlan>
//! </vlans>
//! <interfaces>
//!   <vlan20>
//!     <if>vlan20</if><descr>VLAN20</descr><enable>1</enable>
//!     <ipaddr>10.0.20.1</ipaddr><subnet>255.255.255.0</subnet>
//!   </vlan20>
//! </interfaces>
//! ```

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use uuid::Uuid;
use xml_edit_core::{Document, XmlNode};

use crate::detect::{detect_config, ConfigFlavor};
use crate::error::OpError;

pub const DEFAULT_NETMASK: &str = "255.255.255.0";
const MAX_VLAN_TAG: u32 = 4094;

/// Raw registrar input, as collected from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VlanRequest {
    pub parent_interface: Option<String>,
    pub vlan_id: Option<u32>,
    pub ip_address: Option<String>,
    /// Dotted mask or prefix length; [`DEFAULT_NETMASK`] when absent.
    pub netmask: Option<String>,
    pub description: Option<String>,
}

/// Validated registrar input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlanSpec {
    pub parent: String,
    pub tag: u16,
    pub address: Option<Ipv4Addr>,
    pub netmask: Ipv4Addr,
    pub description: String,
}

impl VlanRequest {
    pub fn validate(&self) -> Result<VlanSpec, OpError> {
        let parent = self
            .parent_interface
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| OpError::Validation("parent interface is required".to_string()))?;
        if parent.chars().any(char::is_whitespace) {
            return Err(OpError::Validation(format!(
                "parent interface '{parent}' must not contain whitespace"
            )));
        }

        let vlan_id = self
            .vlan_id
            .ok_or_else(|| OpError::Validation("VLAN id is required".to_string()))?;
        if vlan_id == 0 || vlan_id > MAX_VLAN_TAG {
            return Err(OpError::Validation(format!(
                "VLAN id {vlan_id} outside 1..={MAX_VLAN_TAG}"
            )));
        }
        let tag = vlan_id as u16;

        let address = self
            .ip_address
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(|ip| {
                ip.parse::<Ipv4Addr>()
                    .map_err(|_| OpError::Validation(format!("'{ip}' is not an IPv4 address")))
            })
            .transpose()?;

        let netmask = parse_netmask(self.netmask.as_deref().unwrap_or(DEFAULT_NETMASK))?;

        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| format!("VLAN{tag}"));

        Ok(VlanSpec {
            parent: parent.to_string(),
            tag,
            address,
            netmask,
            description,
        })
    }
}

/// Parse a contiguous IPv4 netmask given dotted (`255.255.255.0`) or as a
/// prefix length (`24`, `/24`).
pub fn parse_netmask(raw: &str) -> Result<Ipv4Addr, OpError> {
    let raw = raw.trim();
    let invalid = || OpError::Validation(format!("'{raw}' is not a valid netmask"));

    let prefix = raw.strip_prefix('/').unwrap_or(raw);
    if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) {
        let bits: u32 = prefix.parse().map_err(|_| invalid())?;
        if !(1..=32).contains(&bits) {
            return Err(invalid());
        }
        return Ok(Ipv4Addr::from(u32::MAX << (32 - bits)));
    }

    let mask: Ipv4Addr = raw.parse().map_err(|_| invalid())?;
    let value = u32::from(mask);
    if value == 0 || value.leading_ones() + value.trailing_zeros() != 32 {
        return Err(invalid());
    }
    Ok(mask)
}

/// What registration did to the document.
#[derive(Debug, Clone, PartialEq)]
pub enum VlanChange {
    /// The (parent, tag) pair was already defined.
    AlreadyPresent,
    Added {
        /// Device name the VLAN is known by (`vlanif`).
        device: String,
        vlan: XmlNode,
        assignment: Option<XmlNode>,
    },
}

/// Name of the interface assignment created for `tag`.
pub fn assignment_name(tag: u16) -> String {
    format!("vlan{tag}")
}

/// Register the VLAN described by `spec` in `doc`.
///
/// All checks run before the first insert, so an error leaves `doc`
/// unmodified.
pub fn register(doc: &mut Document, spec: &VlanSpec) -> Result<VlanChange, OpError> {
    let root = doc.root();
    let vlans = root
        .get_child("vlans")
        .ok_or_else(|| OpError::MissingSection("vlans".to_string()))?;

    if find_vlan(vlans, &spec.parent, spec.tag).is_some() {
        return Ok(VlanChange::AlreadyPresent);
    }

    let interfaces = root.get_child("interfaces");
    let name = assignment_name(spec.tag);
    if spec.address.is_some() {
        let interfaces = interfaces
            .ok_or_else(|| OpError::MissingSection("interfaces".to_string()))?;
        if interfaces.get_child(&name).is_some() {
            return Err(OpError::Conflict(format!(
                "interface assignment '{name}' already exists"
            )));
        }
    }

    let used = used_device_names(vlans, interfaces);
    let device = pick_device_name(&used, spec);
    let vlan = build_vlan(spec, &device, detect_config(root));
    let assignment = spec
        .address
        .map(|address| build_assignment(spec, &name, &device, address));

    doc.append_child(&["vlans"], vlan.clone())?;
    if let Some(assignment) = &assignment {
        doc.append_child(&["interfaces"], assignment.clone())?;
    }

    Ok(VlanChange::Added {
        device,
        vlan,
        assignment,
    })
}

/// Find the VLAN entry for (parent, tag).
pub fn find_vlan<'a>(vlans: &'a XmlNode, parent: &str, tag: u16) -> Option<&'a XmlNode> {
    vlans
        .children
        .iter()
        .filter(|n| n.tag == "vlan")
        .find(|vlan| {
            text_of(vlan, "if").as_deref() == Some(parent)
                && text_of(vlan, "tag").and_then(|t| t.parse::<u16>().ok()) == Some(tag)
        })
}

/// Collect device names already claimed by VLANs or interface assignments.
fn used_device_names(vlans: &XmlNode, interfaces: Option<&XmlNode>) -> BTreeSet<String> {
    let from_vlans = vlans
        .children
        .iter()
        .filter(|n| n.tag == "vlan")
        .filter_map(|v| text_of(v, "vlanif"));
    let from_interfaces = interfaces
        .into_iter()
        .flat_map(|i| i.children.iter())
        .filter_map(|i| text_of(i, "if"));
    from_vlans.chain(from_interfaces).collect()
}

/// `vlan<tag>` when free, else the dotted `<parent>.<tag>` form.
fn pick_device_name(used: &BTreeSet<String>, spec: &VlanSpec) -> String {
    let short = format!("vlan{}", spec.tag);
    if used.contains(&short) {
        format!("{}.{}", spec.parent, spec.tag)
    } else {
        short
    }
}

fn build_vlan(spec: &VlanSpec, device: &str, flavor: ConfigFlavor) -> XmlNode {
    let mut vlan = XmlNode::new("vlan");
    vlan.children.push(XmlNode::with_text("if", &spec.parent));
    vlan.children.push(XmlNode::with_text("tag", spec.tag.to_string()));
    if flavor == ConfigFlavor::OpnSense {
        // OPNsense tracks VLANs by uuid and expects pcp/proto to be present.
        vlan.attributes
            .insert("uuid".to_string(), Uuid::new_v4().to_string());
        vlan.children.push(XmlNode::with_text("pcp", "0"));
        vlan.children.push(XmlNode::new("proto"));
    }
    vlan.children
        .push(XmlNode::with_text("descr", &spec.description));
    vlan.children.push(XmlNode::with_text("vlanif", device));
    vlan
}

/// Interface assignment for a new VLAN.
///
/// `<subnet>` holds a dotted netmask (`255.255.255.0`), not the prefix bits
/// (`24`) that pfSense and OPNsense write themselves.
fn build_assignment(spec: &VlanSpec, name: &str, device: &str, address: Ipv4Addr) -> XmlNode {
    let mut iface = XmlNode::new(name);
    iface.children.push(XmlNode::with_text("if", device));
    iface
        .children
        .push(XmlNode::with_text("descr", &spec.description));
    iface.children.push(XmlNode::with_text("enable", "1"));
    iface
        .children
        .push(XmlNode::with_text("ipaddr", address.to_string()));
    iface
        .children
        .push(XmlNode::with_text("subnet", spec.netmask.to_string()));
    iface
}

/// Extract trimmed, non-empty text from a child element.
fn text_of(node: &XmlNode, child: &str) -> Option<String> {
    node.get_text(&[child])
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use pretty_assertions::assert_eq;
    use xml_edit_core::Document;

    use super::{parse_netmask, register, VlanChange, VlanRequest, VlanSpec};
    use crate::error::OpError;

    const PF: &str = "<pfsense>\n\t<interfaces>\n\t\t<lan>\n\t\t\t<if>igb1</if>\n\t\t</lan>\n\t</interfaces>\n\t<vlans>\n\t</vlans>\n</pfsense>\n";

    fn doc(src: &str) -> Document {
        Document::from_bytes(src.as_bytes().to_vec()).expect("parse")
    }

    fn spec(parent: &str, tag: u16, ip: Option<&str>) -> VlanSpec {
        VlanRequest {
            parent_interface: Some(parent.to_string()),
            vlan_id: Some(u32::from(tag)),
            ip_address: ip.map(ToOwned::to_owned),
            ..VlanRequest::default()
        }
        .validate()
        .expect("valid")
    }

    #[test]
    fn validation_requires_parent_and_id() {
        let err = VlanRequest {
            vlan_id: Some(10),
            ..VlanRequest::default()
        }
        .validate()
        .expect_err("no parent");
        assert!(matches!(err, OpError::Validation(_)));

        let err = VlanRequest {
            parent_interface: Some("igb1".to_string()),
            ..VlanRequest::default()
        }
        .validate()
        .expect_err("no id");
        assert!(matches!(err, OpError::Validation(_)));

        let err = VlanRequest {
            parent_interface: Some("igb1".to_string()),
            vlan_id: Some(4095),
            ..VlanRequest::default()
        }
        .validate()
        .expect_err("out of range");
        assert!(err.to_string().contains("4095"));
    }

    #[test]
    fn validation_rejects_bad_addresses() {
        let base = VlanRequest {
            parent_interface: Some("igb1".to_string()),
            vlan_id: Some(20),
            ..VlanRequest::default()
        };
        let bad_ip = VlanRequest {
            ip_address: Some("10.0.20.300".to_string()),
            ..base.clone()
        };
        assert!(matches!(bad_ip.validate(), Err(OpError::Validation(_))));

        let bad_mask = VlanRequest {
            ip_address: Some("10.0.20.1".to_string()),
            netmask: Some("255.0.255.0".to_string()),
            ..base
        };
        assert!(matches!(bad_mask.validate(), Err(OpError::Validation(_))));
    }

    #[test]
    fn netmask_accepts_dotted_and_prefix_forms() {
        assert_eq!(
            parse_netmask("255.255.255.0").expect("dotted"),
            Ipv4Addr::new(255, 255, 255, 0)
        );
        assert_eq!(parse_netmask("/16").expect("slash"), Ipv4Addr::new(255, 255, 0, 0));
        assert_eq!(parse_netmask("32").expect("host"), Ipv4Addr::new(255, 255, 255, 255));
        assert!(parse_netmask("0").is_err());
        assert!(parse_netmask("0.0.0.0").is_err());
        assert!(parse_netmask("33").is_err());
        assert!(parse_netmask("mask").is_err());
    }

    #[test]
    fn registers_vlan_and_assignment() {
        let mut doc = doc(PF);
        let change = register(&mut doc, &spec("igb1", 20, Some("10.0.20.1"))).expect("register");

        let VlanChange::Added { device, assignment, .. } = change else {
            panic!("expected insert");
        };
        assert_eq!(device, "vlan20");
        assert!(assignment.is_some());

        let root = doc.root();
        let vlan = root.get_path(&["vlans", "vlan"]).expect("vlan");
        assert_eq!(vlan.get_text(&["if"]), Some("igb1"));
        assert_eq!(vlan.get_text(&["tag"]), Some("20"));
        assert!(!vlan.attributes.contains_key("uuid"));

        let iface = root.get_path(&["interfaces", "vlan20"]).expect("assignment");
        assert_eq!(iface.get_text(&["if"]), Some("vlan20"));
        assert_eq!(iface.get_text(&["ipaddr"]), Some("10.0.20.1"));
        assert_eq!(iface.get_text(&["subnet"]), Some("255.255.255.0"));
        assert_eq!(iface.get_text(&["enable"]), Some("1"));
    }

    #[test]
    fn second_registration_is_a_noop() {
        let mut doc = doc(PF);
        register(&mut doc, &spec("igb1", 20, None)).expect("first");
        let change = register(&mut doc, &spec("igb1", 20, None)).expect("second");

        assert_eq!(change, VlanChange::AlreadyPresent);
        assert_eq!(doc.root().get_child("vlans").expect("vlans").children.len(), 1);
    }

    #[test]
    fn same_tag_on_other_parent_is_distinct() {
        let mut doc = doc(PF);
        register(&mut doc, &spec("igb1", 20, None)).expect("first");
        let change = register(&mut doc, &spec("igb2", 20, None)).expect("second");

        let VlanChange::Added { device, .. } = change else {
            panic!("expected insert");
        };
        assert_eq!(device, "igb2.20");
        assert_eq!(doc.root().get_child("vlans").expect("vlans").children.len(), 2);
    }

    #[test]
    fn existing_assignment_name_conflicts_without_mutation() {
        let src = "<pfsense><interfaces><vlan20><if>igb3.20</if></vlan20></interfaces><vlans/></pfsense>";
        let mut doc = doc(src);
        let err = register(&mut doc, &spec("igb1", 20, Some("10.0.20.1"))).expect_err("conflict");

        assert!(matches!(err, OpError::Conflict(_)));
        assert!(!doc.is_modified());
    }

    #[test]
    fn missing_sections_fail_loudly() {
        let mut no_vlans = doc("<pfsense><interfaces/></pfsense>");
        let err = register(&mut no_vlans, &spec("igb1", 20, None)).expect_err("no vlans");
        assert!(matches!(err, OpError::MissingSection(s) if s == "vlans"));

        let mut no_interfaces = doc("<pfsense><vlans/></pfsense>");
        let err = register(&mut no_interfaces, &spec("igb1", 20, Some("10.0.20.1")))
            .expect_err("no interfaces");
        assert!(matches!(err, OpError::MissingSection(s) if s == "interfaces"));
        assert!(!no_interfaces.is_modified());
    }

    #[test]
    fn opnsense_vlans_get_uuid_and_defaults() {
        let mut doc = doc("<opnsense><interfaces/><vlans/></opnsense>");
        register(&mut doc, &spec("vtnet0", 50, None)).expect("register");

        let vlan = doc.root().get_path(&["vlans", "vlan"]).expect("vlan");
        assert!(vlan.attributes.contains_key("uuid"));
        assert_eq!(vlan.get_text(&["pcp"]), Some("0"));
        assert!(vlan.get_child("proto").is_some());
    }
}
