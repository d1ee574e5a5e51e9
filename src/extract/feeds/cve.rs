//! Mitre CVE list
//!
//! ```xml
//! <cve>
//!   <item type="CVE" name="CVE-2014-0001" seq="2014-0001">
//!     <status>Candidate</status>
//!     <desc>Buffer overflow in ...</desc>
//!     <refs><ref source="MLIST" url="http://...">[oss-security] ...</ref></refs>
//!   </item>
//! </cve>
//! ```

use super::FragmentBuilder;
use crate::extract::{ExtractError, Metadata, ParsedTree};
use crate::graph::GraphFragment;

pub fn extract(tree: &ParsedTree, _metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
    let root = tree.document()?;
    let mut builder = FragmentBuilder::new("cve");

    for item in root.descendants("item") {
        let Some(name) = item.attr("name") else {
            continue;
        };

        let mut vertex = builder.vertex(name, "vulnerability");
        if let Some(status) = item.child_text("status") {
            vertex.set("status", status);
        }
        if let Some(desc) = item.child_text("desc") {
            vertex.set("description", desc);
        }

        let references: Vec<String> = item
            .child("refs")
            .map(|refs| {
                refs.children_named("ref")
                    .filter_map(|r| r.attr("url").or_else(|| Some(r.text())))
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if !references.is_empty() {
            vertex.set("references", references);
        }

        builder.add(vertex);
    }

    Ok(builder.finish())
}
