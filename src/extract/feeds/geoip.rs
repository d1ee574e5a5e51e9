//! MaxMind GeoIP country blocks
//!
//! Columns: `startIp, endIp, startIpNum, endIpNum, countryCode, countryName`

use super::FragmentBuilder;
use crate::extract::{ExtractError, Metadata, ParsedTree};
use crate::graph::GraphFragment;

const HEADER: &str = "startIp";

pub fn extract(tree: &ParsedTree, _metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
    let table = tree.table()?;
    let mut builder = FragmentBuilder::new("maxmind");

    for row in table.records(HEADER) {
        let (Some(start), Some(end)) = (row.get(0), row.get(1)) else {
            continue;
        };

        let name = format!("{}_through_{}", start, end);
        let mut range = builder.vertex(&name, "addressRange");
        range.set("startIP", start);
        range.set("endIP", end);
        if let Some(n) = row.get(2) {
            range.set("startIPInt", n);
        }
        if let Some(n) = row.get(3) {
            range.set("endIPInt", n);
        }
        if let Some(code) = row.get(4) {
            range.set("countryCode", code);
        }

        if let Some(country) = row.get(5) {
            range.set("location", country);
            let mut vertex = builder.vertex(country, "country");
            if let Some(code) = row.get(4) {
                vertex.set("countryCode", code);
            }
            builder.add(vertex);
            builder.edge(&name, "locatedIn", country);
        }
        builder.add(range);
    }

    Ok(builder.finish())
}
