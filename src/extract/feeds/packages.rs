//! Installed package inventory
//!
//! Columns: `hostname, package, version`

use super::FragmentBuilder;
use crate::extract::{ExtractError, Metadata, ParsedTree};
use crate::graph::GraphFragment;

const HEADER: &str = "hostname";

pub fn extract(tree: &ParsedTree, _metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
    let table = tree.table()?;
    let mut builder = FragmentBuilder::new("PackageList");

    for row in table.records(HEADER) {
        let (Some(host), Some(package)) = (row.get(0), row.get(1)) else {
            continue;
        };

        let name = match row.get(2) {
            Some(version) => format!("{}_{}", package, version),
            None => package.to_string(),
        };
        let mut software = builder.vertex(&name, "software");
        software.set("product", package);
        if let Some(version) = row.get(2) {
            software.set("version", version);
        }

        builder.add_bare(host, "host");
        builder.add(software);
        builder.edge(host, "runs", &name);
    }

    Ok(builder.finish())
}
