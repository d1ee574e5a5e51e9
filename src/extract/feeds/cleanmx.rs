//! CleanMX virus watch (XML)
//!
//! ```xml
//! <output><entries>
//!   <entry>
//!     <id>22447134</id><first>1394445736</first><md5>b5ab...</md5>
//!     <virusname>Gen:Variant.Kazy.8782</virusname>
//!     <url>http://example.org/x.exe</url><ip>1.2.3.4</ip>
//!     <domain>example.org</domain><country>US</country>
//!   </entry>
//! </entries></output>
//! ```

use super::FragmentBuilder;
use crate::extract::{ExtractError, Metadata, ParsedTree};
use crate::graph::GraphFragment;

pub fn extract(tree: &ParsedTree, _metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
    let root = tree.document()?;
    let mut builder = FragmentBuilder::new("cleanmx");

    for entry in root.descendants("entry") {
        let Some(virus) = entry.child_text("virusname") else {
            continue;
        };

        let mut malware = builder.vertex(virus, "malware");
        if let Some(md5) = entry.child_text("md5") {
            malware.set("md5hashes", vec![md5.to_ascii_lowercase()]);
        }
        if let Some(first) = entry.child_text("first") {
            malware.set("firstSeen", first);
        }
        builder.add(malware);

        let ip = entry.child_text("ip");
        if let Some(ip) = ip {
            let mut vertex = builder.vertex(ip, "IP");
            if let Some(country) = entry.child_text("country") {
                vertex.set("country", country);
            }
            builder.add(vertex);
            builder.edge(virus, "communicatesWith", ip);
        }

        if let Some(domain) = entry.child_text("domain") {
            builder.add_bare(domain, "DNSName");
            if let Some(ip) = ip {
                builder.edge(domain, "resolvesTo", ip);
            }
        }

        if let Some(url) = entry.child_text("url") {
            builder.add_bare(url, "URL");
            builder.edge(url, "hosts", virus);
        }
    }

    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Parser;

    #[test]
    fn entries_link_malware_to_infrastructure() {
        let tree = Parser::Xml
            .parse(
                "<output><entries><entry>\
                 <id>1</id><first>1394445736</first>\
                 <md5>B5AB2EB1AB9A6C5B5F7C8E3F1E1A2B3C</md5>\
                 <virusname><![CDATA[Gen:Variant.Kazy.8782]]></virusname>\
                 <url><![CDATA[http://example.org/x.exe]]></url>\
                 <ip>1.2.3.4</ip><domain>example.org</domain><country>US</country>\
                 </entry><entry><id>2</id></entry></entries></output>",
            )
            .unwrap();

        let fragment = extract(&tree, &Metadata::new()).unwrap();
        let ids: Vec<_> = fragment.edges.iter().map(|e| e.id.as_str()).collect();

        assert_eq!(fragment.vertices.len(), 4);
        assert_eq!(
            ids,
            vec![
                "Gen:Variant.Kazy.8782_communicatesWith_1.2.3.4",
                "example.org_resolvesTo_1.2.3.4",
                "http://example.org/x.exe_hosts_Gen:Variant.Kazy.8782",
            ]
        );
    }
}
