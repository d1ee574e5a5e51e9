//! CPE dictionary
//!
//! `<cpe-item name="cpe:/a:apache:http_server:2.2.3">` entries become
//! software vertices. Vendor, product and version come from the CPE name.

use super::FragmentBuilder;
use crate::extract::{ExtractError, Metadata, ParsedTree};
use crate::graph::GraphFragment;

pub fn extract(tree: &ParsedTree, _metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
    let root = tree.document()?;
    let mut builder = FragmentBuilder::new("cpe");

    for item in root.descendants("cpe-item") {
        let Some(name) = item.attr("name") else {
            continue;
        };

        let mut vertex = builder.vertex(name, "software");
        let mut fields = name.split(':').skip(1);
        if let Some(part) = fields.next() {
            vertex.set("part", part.trim_start_matches('/'));
        }
        for key in ["vendor", "product", "version", "update", "edition", "language"] {
            match fields.next() {
                Some(value) => vertex.set(key, value),
                None => break,
            }
        }
        if let Some(title) = item.child_text("title") {
            vertex.set("description", title);
        }
        if item.attr("deprecated").is_some_and(|d| d == "true") {
            vertex.set("deprecated", "true");
        }

        builder.add(vertex);
    }

    Ok(builder.finish())
}
