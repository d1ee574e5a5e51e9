//! NVD vulnerability feed (XML, schema 2.0)
//!
//! Each `<entry>` becomes a vulnerability; each product in its vulnerable
//! software list becomes a software vertex with a `hasVulnerability` edge.

use super::FragmentBuilder;
use crate::extract::{ExtractError, Metadata, ParsedTree};
use crate::graph::GraphFragment;

pub fn extract(tree: &ParsedTree, _metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
    let root = tree.document()?;
    let mut builder = FragmentBuilder::new("nvd");

    for entry in root.descendants("entry") {
        let Some(id) = entry.attr("id").or_else(|| entry.child_text("cve-id")) else {
            continue;
        };

        let mut vertex = builder.vertex(id, "vulnerability");
        if let Some(summary) = entry.child_text("summary") {
            vertex.set("description", summary);
        }
        if let Some(published) = entry.child_text("published-datetime") {
            vertex.set("publishedDate", published);
        }
        if let Some(modified) = entry.child_text("last-modified-datetime") {
            vertex.set("modifiedDate", modified);
        }
        if let Some(metrics) = entry.find("base_metrics") {
            if let Some(score) = metrics.child_text("score") {
                vertex.set("cvssScore", score);
            }
            if let Some(vector) = metrics.child_text("access-vector") {
                vertex.set("accessVector", vector);
            }
        }
        if let Some(cwe) = entry.child("cwe").and_then(|c| c.attr("id")) {
            vertex.set("cweNumber", cwe);
        }

        let references: Vec<String> = entry
            .descendants("reference")
            .into_iter()
            .filter_map(|r| r.attr("href"))
            .map(str::to_string)
            .collect();
        if !references.is_empty() {
            vertex.set("references", references);
        }
        builder.add(vertex);

        if let Some(list) = entry.child("vulnerable-software-list") {
            for product in list.children_named("product") {
                let cpe = product.text();
                if cpe.is_empty() {
                    continue;
                }
                builder.add_bare(cpe, "software");
                builder.edge(cpe, "hasVulnerability", id);
            }
        }
    }

    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Parser;
    use crate::graph::PropertyValue;

    const ENTRY: &str = r#"<nvd xmlns:vuln="urn:vuln" xmlns:cvss="urn:cvss">
      <entry id="CVE-2013-4878">
        <vuln:vulnerable-software-list>
          <vuln:product>cpe:/h:parkerwinhomes:pw-cam:-</vuln:product>
          <vuln:product>cpe:/a:vendor:tool:1.0</vuln:product>
        </vuln:vulnerable-software-list>
        <vuln:cve-id>CVE-2013-4878</vuln:cve-id>
        <vuln:published-datetime>2013-07-18T12:51:56.227-04:00</vuln:published-datetime>
        <vuln:cvss>
          <cvss:base_metrics>
            <cvss:score>9.3</cvss:score>
            <cvss:access-vector>NETWORK</cvss:access-vector>
          </cvss:base_metrics>
        </vuln:cvss>
        <vuln:references reference_type="UNKNOWN">
          <vuln:reference href="http://example.com/advisory">advisory</vuln:reference>
        </vuln:references>
        <vuln:summary>Default configuration allows remote access.</vuln:summary>
      </entry>
    </nvd>"#;

    #[test]
    fn entry_links_software_to_vulnerability() {
        let tree = Parser::Xml.parse(ENTRY).unwrap();
        let fragment = extract(&tree, &Metadata::new()).unwrap();

        assert_eq!(fragment.vertices.len(), 3);
        let vuln = &fragment.vertices[0];
        assert_eq!(vuln.name, "CVE-2013-4878");
        assert_eq!(vuln.properties.get("cvssScore").and_then(PropertyValue::as_scalar), Some("9.3"));
        assert_eq!(
            vuln.properties.get("references").and_then(PropertyValue::as_list),
            Some(&["http://example.com/advisory".to_string()][..])
        );

        assert_eq!(fragment.edges.len(), 2);
        assert_eq!(
            fragment.edges[0].id,
            "cpe:/h:parkerwinhomes:pw-cam:-_hasVulnerability_CVE-2013-4878"
        );
    }
}
