//! Situ network anomaly events (XML)
//!
//! ```xml
//! <situ>
//!   <event id="e1">
//!     <timestamp>1420070400</timestamp><site>hq</site><score>0.92</score>
//!     <proto>6</proto>
//!     <srcIP>10.0.0.5</srcIP><srcPort>51234</srcPort>
//!     <dstIP>198.51.100.9</dstIP><dstPort>443</dstPort>
//!   </event>
//! </situ>
//! ```

use super::FragmentBuilder;
use crate::extract::{ExtractError, Metadata, ParsedTree};
use crate::graph::GraphFragment;

pub fn extract(tree: &ParsedTree, _metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
    let root = tree.document()?;
    let mut builder = FragmentBuilder::new("situ");

    for event in root.descendants("event") {
        let (Some(src_ip), Some(dst_ip)) = (event.child_text("srcIP"), event.child_text("dstIP")) else {
            continue;
        };

        let src = builder.address(src_ip, event.child_text("srcPort"));
        let dst = builder.address(dst_ip, event.child_text("dstPort"));
        let mut flow = builder.flow(&src, &dst);
        for (key, child) in [
            ("startTime", "timestamp"),
            ("site", "site"),
            ("situScore", "score"),
            ("proto", "proto"),
        ] {
            if let Some(value) = event.child_text(child) {
                flow.set(key, value);
            }
        }
        if let Some(id) = event.attr("id") {
            flow.set("situEventId", id);
        }
        builder.add(flow);
    }

    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Parser;
    use crate::graph::PropertyValue;

    #[test]
    fn events_become_scored_flows() {
        let tree = Parser::Xml
            .parse(
                "<situ><event id='e1'><timestamp>1420070400</timestamp><score>0.92</score>\
                 <srcIP>10.0.0.5</srcIP><srcPort>51234</srcPort>\
                 <dstIP>198.51.100.9</dstIP><dstPort>443</dstPort></event>\
                 <event id='e2'><srcIP>10.0.0.6</srcIP></event></situ>",
            )
            .unwrap();

        let fragment = extract(&tree, &Metadata::new()).unwrap();
        let flow = fragment
            .vertices
            .iter()
            .find(|v| v.name == "10.0.0.5:51234_through_198.51.100.9:443")
            .unwrap();

        assert_eq!(flow.properties.get("situScore").and_then(PropertyValue::as_scalar), Some("0.92"));
        assert_eq!(flow.properties.get("situEventId").and_then(PropertyValue::as_scalar), Some("e1"));
        assert!(!fragment.vertices.iter().any(|v| v.name == "10.0.0.6"));
    }

    #[test]
    fn document_without_events_yields_empty_fragment() {
        let tree = Parser::Xml.parse("<situ/>").unwrap();
        assert!(extract(&tree, &Metadata::new()).unwrap().is_empty());
    }
}
