use serde::Serialize;
use xml_edit_core::XmlNode;

/// Detected configuration family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFlavor {
    /// pfSense root format.
    PfSense,
    /// OPNsense root format.
    OpnSense,
    /// Unrecognized root format.
    Unknown,
}

impl ConfigFlavor {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigFlavor::PfSense => "pfsense",
            ConfigFlavor::OpnSense => "opnsense",
            ConfigFlavor::Unknown => "unknown",
        }
    }
}

/// Detect config family from the root tag.
pub fn detect_config(node: &XmlNode) -> ConfigFlavor {
    match node.tag.as_str() {
        "pfsense" => ConfigFlavor::PfSense,
        "opnsense" => ConfigFlavor::OpnSense,
        _ => ConfigFlavor::Unknown,
    }
}
