//! Firewall rule cloning.
//!
//! Rules live under `<filter>` and are identified either by a `uuid`
//! attribute (OPNsense) or by a numeric `<tracker>` child (pfSense). A clone
//! copies the source rule's markup exactly, then replaces the identifier(s)
//! and the `<interface>` value.

use serde::Serialize;
use uuid::Uuid;
use xml_edit_core::{Document, ElementCopy, XmlNode};

use crate::error::OpError;

/// Raw cloner input, as collected from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneRequest {
    pub source_rule_id: Option<String>,
    pub clone_count: Option<u32>,
    pub new_interface: Option<String>,
}

/// Validated cloner input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneSpec {
    pub rule_id: String,
    pub count: u32,
    pub interface: String,
}

impl CloneRequest {
    pub fn validate(&self) -> Result<CloneSpec, OpError> {
        let rule_id = required(self.source_rule_id.as_deref(), "source rule id")?;
        let count = self
            .clone_count
            .ok_or_else(|| OpError::Validation("clone count is required".to_string()))?;
        if count < 1 {
            return Err(OpError::Validation(
                "clone count must be at least 1".to_string(),
            ));
        }
        let interface = required(self.new_interface.as_deref(), "new interface")?;

        Ok(CloneSpec {
            rule_id,
            count,
            interface,
        })
    }
}

fn required(value: Option<&str>, what: &str) -> Result<String, OpError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
        .ok_or_else(|| OpError::Validation(format!("{what} is required")))
}

/// Which field identifies a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKey {
    Uuid,
    Tracker,
}

impl RuleKey {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleKey::Uuid => "uuid",
            RuleKey::Tracker => "tracker",
        }
    }
}

/// One appended copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClonedRule {
    pub id: String,
    pub key: RuleKey,
    /// Markup inserted into the document.
    pub xml: String,
}

/// Locate a rule in `<filter>` by uuid attribute or tracker value.
pub fn find_rule<'a>(filter: &'a XmlNode, id: &str) -> Option<(&'a XmlNode, RuleKey)> {
    filter
        .children
        .iter()
        .filter(|n| n.tag == "rule")
        .find_map(|rule| {
            if rule.attributes.get("uuid").map(|u| u.trim()) == Some(id) {
                Some((rule, RuleKey::Uuid))
            } else if rule.get_text(&["tracker"]).map(str::trim) == Some(id) {
                Some((rule, RuleKey::Tracker))
            } else {
                None
            }
        })
}

/// Append `spec.count` copies of the source rule to `<filter>`, in order.
///
/// Each copy is the source rule's markup byte for byte, with only the
/// identifiers and `<interface>` replaced. `now` seeds new tracker values
/// (seconds since the epoch, the way pfSense assigns them); every tracker
/// handed out is above all existing ones. Either every copy is appended or
/// none is.
pub fn clone_rule(
    doc: &mut Document,
    spec: &CloneSpec,
    now: u64,
) -> Result<Vec<ClonedRule>, OpError> {
    let filter = doc
        .root()
        .get_child("filter")
        .ok_or_else(|| OpError::MissingSection("filter".to_string()))?;
    let (source, key) = find_rule(filter, &spec.rule_id)
        .ok_or_else(|| OpError::NotFound(format!("rule '{}'", spec.rule_id)))?;
    let has_uuid = source.attributes.contains_key("uuid");
    let has_tracker = source.get_child("tracker").is_some();
    let mut trackers = TrackerSeq::new(filter, now);

    let mut clones = Vec::with_capacity(spec.count as usize);
    let mut markups = Vec::with_capacity(spec.count as usize);
    for _ in 0..spec.count {
        let mut copy = ElementCopy::new(doc.source(), source)?;

        let uuid = has_uuid.then(|| Uuid::new_v4().to_string());
        if let Some(uuid) = &uuid {
            copy.set_attribute("uuid", uuid);
        }
        let tracker = if has_tracker {
            Some(trackers.next_value()?.to_string())
        } else {
            None
        };
        if let Some(tracker) = &tracker {
            copy.set_child_text("tracker", tracker);
        }
        copy.set_child_text("interface", &spec.interface);

        let id = match key {
            RuleKey::Uuid => uuid,
            RuleKey::Tracker => tracker,
        }
        .unwrap_or_default();

        let markup = copy.into_bytes();
        clones.push(ClonedRule {
            id,
            key,
            xml: String::from_utf8_lossy(&markup).into_owned(),
        });
        markups.push(markup);
    }

    for markup in markups {
        doc.append_raw(&["filter"], markup)?;
    }
    Ok(clones)
}

/// Hands out tracker values above every tracker in the collection.
struct TrackerSeq {
    next: Option<u64>,
}

impl TrackerSeq {
    fn new(filter: &XmlNode, now: u64) -> Self {
        let max = filter
            .children
            .iter()
            .filter(|n| n.tag == "rule")
            .filter_map(|r| r.get_text(&["tracker"]))
            .filter_map(|t| t.trim().parse::<u64>().ok())
            .max();
        let floor = match max {
            Some(max) => max.checked_add(1),
            None => Some(0),
        };
        Self {
            next: floor.map(|floor| floor.max(now)),
        }
    }

    fn next_value(&mut self) -> Result<u64, OpError> {
        let value = self
            .next
            .ok_or_else(|| OpError::Conflict("tracker space exhausted".to_string()))?;
        self.next = value.checked_add(1);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;
    use xml_edit_core::{Document, XmlNode};

    use super::{clone_rule, CloneRequest, CloneSpec, RuleKey};
    use crate::error::OpError;

    const PF: &str = r#"<pfsense>
	<filter>
		<rule>
			<tracker>1700000100</tracker>
			<type>pass</type>
			<interface>lan</interface>
			<ipprotocol>inet</ipprotocol>
			<descr><![CDATA[LAN out]]></descr>
			<source>
				<network>lan</network>
			</source>
			<destination>
				<address>10.0.0.5</address>
				<port>443</port>
			</destination>
		</rule>
	</filter>
</pfsense>"#;

    const OPN: &str = r#"<opnsense>
  <filter>
    <rule uuid="abc-123"><type>block</type><interface>wan</interface><protocol>tcp</protocol></rule>
  </filter>
</opnsense>"#;

    fn doc(src: &str) -> Document {
        Document::from_bytes(src.as_bytes().to_vec()).expect("parse")
    }

    fn spec(id: &str, count: u32, interface: &str) -> CloneSpec {
        CloneSpec {
            rule_id: id.to_string(),
            count,
            interface: interface.to_string(),
        }
    }

    fn rules(doc: &Document) -> Vec<XmlNode> {
        doc.root()
            .get_child("filter")
            .expect("filter")
            .get_children("rule")
            .into_iter()
            .cloned()
            .collect()
    }

    /// The rule without the fields a clone is expected to change.
    fn without_identity(rule: &XmlNode) -> XmlNode {
        let mut rule = rule.clone();
        rule.attributes.remove("uuid");
        rule.children
            .retain(|c| c.tag != "tracker" && c.tag != "interface");
        rule
    }

    #[test]
    fn validation_rejects_missing_or_zero() {
        let err = CloneRequest {
            source_rule_id: Some("1".to_string()),
            clone_count: Some(0),
            new_interface: Some("opt1".to_string()),
        }
        .validate()
        .expect_err("zero count");
        assert!(matches!(err, OpError::Validation(_)));

        let err = CloneRequest {
            source_rule_id: Some("1".to_string()),
            clone_count: Some(2),
            new_interface: Some("  ".to_string()),
        }
        .validate()
        .expect_err("blank interface");
        assert!(err.to_string().contains("new interface"));

        assert!(CloneRequest::default().validate().is_err());
    }

    #[test]
    fn tracker_rule_fans_out_with_fresh_trackers() {
        let mut doc = doc(PF);
        let clones = clone_rule(&mut doc, &spec("1700000100", 3, "opt2"), 5).expect("clone");

        assert_eq!(clones.len(), 3);
        let ids: BTreeSet<_> = clones.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains("1700000100"));
        assert!(clones.iter().all(|c| c.key == RuleKey::Tracker));

        let rules = rules(&doc);
        assert_eq!(rules.len(), 4);
        let source = &rules[0];
        for (copy, clone) in rules[1..].iter().zip(&clones) {
            assert_eq!(copy.get_text(&["tracker"]), Some(clone.id.as_str()));
            assert_eq!(copy.get_text(&["interface"]), Some("opt2"));
            assert_eq!(without_identity(copy), without_identity(source));
            assert_eq!(copy.get_text(&["destination", "port"]), Some("443"));
            assert!(copy.get_child("descr").expect("descr").cdata);
        }
    }

    #[test]
    fn trackers_start_from_clock_when_newer() {
        let mut doc = doc(PF);
        let clones =
            clone_rule(&mut doc, &spec("1700000100", 2, "opt2"), 1800000000).expect("clone");
        let ids: Vec<_> = clones.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1800000000", "1800000001"]);
    }

    #[test]
    fn uuid_rule_gets_new_uuids() {
        let mut doc = doc(OPN);
        let clones = clone_rule(&mut doc, &spec("abc-123", 2, "DMZ"), 0).expect("clone");

        assert!(clones.iter().all(|c| c.key == RuleKey::Uuid));
        assert_ne!(clones[0].id, clones[1].id);
        assert!(clones.iter().all(|c| c.id != "abc-123" && c.id.len() == 36));

        let rules = rules(&doc);
        assert_eq!(rules[2].attributes.get("uuid"), Some(&clones[1].id));
        assert_eq!(rules[2].get_text(&["interface"]), Some("DMZ"));
        assert_eq!(without_identity(&rules[2]), without_identity(&rules[0]));
    }

    #[test]
    fn copies_keep_source_markup_byte_for_byte() {
        let src = "<pfsense>\n\t<filter>\n\t\t<rule b=\"2\" a=\"1\">\n\t\t\t<tracker>7</tracker>\n\t\t\t<interface>lan</interface>\n\t\t\t<descr> </descr><!-- note -->\n\t\t</rule>\n\t</filter>\n</pfsense>\n";
        let mut doc = doc(src);
        let clones = clone_rule(&mut doc, &spec("7", 1, "opt1"), 0).expect("clone");

        let expected = "<rule b=\"2\" a=\"1\">\n\t\t\t<tracker>8</tracker>\n\t\t\t<interface>opt1</interface>\n\t\t\t<descr> </descr><!-- note -->\n\t\t</rule>";
        assert_eq!(clones[0].xml, expected);

        let out = String::from_utf8(doc.to_bytes().expect("serialize")).expect("utf8");
        assert_eq!(
            out,
            src.replace("\t</filter>", &format!("\t\t{expected}\n\t</filter>"))
        );
    }

    #[test]
    fn exhausted_tracker_space_is_an_error_not_a_panic() {
        let max = format!(
            "<pfsense><filter><rule><tracker>{}</tracker><interface>lan</interface></rule></filter></pfsense>",
            u64::MAX
        );
        let mut full = doc(&max);
        let err = clone_rule(&mut full, &spec(&u64::MAX.to_string(), 1, "opt1"), 0)
            .expect_err("no tracker left");
        assert!(matches!(err, OpError::Conflict(_)));
        assert!(!full.is_modified());

        let near = format!(
            "<pfsense><filter><rule><tracker>{}</tracker></rule></filter></pfsense>",
            u64::MAX - 1
        );
        let mut almost = doc(&near);
        let err = clone_rule(&mut almost, &spec(&(u64::MAX - 1).to_string(), 2, "opt1"), 0)
            .expect_err("only one tracker left");
        assert!(matches!(err, OpError::Conflict(_)));
        assert!(!almost.is_modified());
    }

    #[test]
    fn unknown_rule_is_not_found_and_leaves_document() {
        let mut doc = doc(OPN);
        let err = clone_rule(&mut doc, &spec("missing", 2, "DMZ"), 0).expect_err("not found");
        assert!(matches!(err, OpError::NotFound(_)));
        assert!(!doc.is_modified());
    }

    #[test]
    fn missing_filter_section_is_reported() {
        let mut doc = doc("<pfsense><system/></pfsense>");
        let err = clone_rule(&mut doc, &spec("1", 1, "lan"), 0).expect_err("no filter");
        assert!(matches!(err, OpError::MissingSection(s) if s == "filter"));
    }
}
