//! Malware Domain List export
//!
//! Columns: `date, domain, ip, reverse_lookup, description, registrant,
//! asn, inactive, country`. The list writes `-` for unknown values. A
//! `domain` may carry a path; the host part is the DNS name and the whole
//! value is kept as a URL.

use super::FragmentBuilder;
use crate::extract::{ExtractError, Metadata, ParsedTree, Row};
use crate::graph::GraphFragment;

const HEADER: &str = "date";

const DATE: usize = 0;
const DOMAIN: usize = 1;
const IP: usize = 2;
const DESCRIPTION: usize = 4;
const REGISTRANT: usize = 5;
const ASN: usize = 6;
const COUNTRY: usize = 8;

fn cell(row: &Row, index: usize) -> Option<&str> {
    row.get(index).filter(|c| *c != "-")
}

pub fn extract(tree: &ParsedTree, _metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
    let table = tree.table()?;
    let mut builder = FragmentBuilder::new("malwaredomainlist");

    for row in table.records(HEADER) {
        let Some(domain) = cell(row, DOMAIN) else {
            continue;
        };
        let host = domain.split('/').next().unwrap_or(domain);

        let mut dns = builder.vertex(host, "DNSName");
        for (key, index) in [("description", DESCRIPTION), ("registrant", REGISTRANT), ("listedDate", DATE)] {
            if let Some(value) = cell(row, index) {
                dns.set(key, value);
            }
        }
        builder.add(dns);

        if host != domain {
            builder.add_bare(domain, "URL");
            builder.edge(domain, "hostedOn", host);
        }

        if let Some(ip) = cell(row, IP) {
            let mut vertex = builder.vertex(ip, "IP");
            if let Some(asn) = cell(row, ASN) {
                vertex.set("asn", asn);
            }
            if let Some(country) = cell(row, COUNTRY) {
                vertex.set("country", country);
            }
            builder.add(vertex);
            builder.edge(host, "resolvesTo", ip);
        }
    }

    Ok(builder.finish())
}
