//! Per-feed extractors
//!
//! Every vertex an extractor emits carries `vertexType` and `source`; every
//! edge carries `source` and the id `"{out}_{label}_{in}"`, so the same fact
//! seen twice maps onto the same graph element.

pub mod argus;
pub mod bugtraq;
pub mod cleanmx;
pub mod cpe;
pub mod cve;
pub mod fsecure;
pub mod geoip;
pub mod hone;
pub mod login_events;
pub mod malware_domains;
pub mod metasploit;
pub mod nvd;
pub mod packages;
pub mod situ;
pub mod sophos;

mod html;

use crate::graph::{EdgeRecord, GraphFragment, VertexRecord};

pub const VERTEX_TYPE: &str = "vertexType";
pub const SOURCE: &str = "source";

/// Deterministic logical edge id
pub fn edge_id(out: &str, label: &str, inv: &str) -> String {
    format!("{}_{}_{}", out, label, inv)
}

/// Accumulates one feed's fragment, tagging everything with the feed name.
pub(crate) struct FragmentBuilder {
    source: &'static str,
    fragment: GraphFragment,
}

impl FragmentBuilder {
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            fragment: GraphFragment::new(),
        }
    }

    /// A tagged vertex record, not yet added
    pub fn vertex(&self, name: &str, vertex_type: &str) -> VertexRecord {
        VertexRecord::new(name)
            .with_property(VERTEX_TYPE, vertex_type)
            .with_property(SOURCE, self.source)
    }

    pub fn add(&mut self, vertex: VertexRecord) {
        self.fragment.add_vertex(vertex);
    }

    /// Add a vertex with no properties beyond its type
    pub fn add_bare(&mut self, name: &str, vertex_type: &str) {
        let vertex = self.vertex(name, vertex_type);
        self.add(vertex);
    }

    pub fn edge(&mut self, out: &str, label: &str, inv: &str) {
        let edge = EdgeRecord::new(edge_id(out, label, inv), out, inv, label)
            .with_property(SOURCE, self.source);
        self.fragment.add_edge(edge);
    }

    /// An `ip:port` address with its IP and port vertices. Returns the
    /// address name, or the bare IP when there is no port.
    pub fn address(&mut self, ip: &str, port: Option<&str>) -> String {
        self.add_bare(ip, "IP");
        let Some(port) = port else {
            return ip.to_string();
        };

        let address = format!("{}:{}", ip, port);
        self.add_bare(port, "port");
        self.add_bare(&address, "address");
        self.edge(&address, "hasIP", ip);
        self.edge(&address, "hasPort", port);
        address
    }

    /// A flow vertex between two addresses, linked to both. The caller adds
    /// it once its own properties are set.
    pub fn flow(&mut self, src: &str, dst: &str) -> VertexRecord {
        let name = format!("{}_through_{}", src, dst);
        self.edge(&name, "srcAddress", src);
        self.edge(&name, "dstAddress", dst);
        self.vertex(&name, "flow")
    }

    pub fn finish(self) -> GraphFragment {
        self.fragment
    }
}

/// Split a delimited list cell into trimmed, non-empty items
pub(crate) fn split_list(cell: &str, separator: char) -> Vec<String> {
    cell.split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PropertyValue;

    #[test]
    fn builder_tags_vertices_and_edges() {
        let mut builder = FragmentBuilder::new("test");
        builder.add_bare("h", "host");
        builder.edge("h", "runs", "p");
        let fragment = builder.finish();

        let vertex = &fragment.vertices[0];
        assert_eq!(vertex.properties.get("vertexType"), Some(&PropertyValue::from("host")));
        assert_eq!(vertex.properties.get("source"), Some(&PropertyValue::from("test")));
        assert_eq!(fragment.edges[0].id, "h_runs_p");
        assert_eq!(fragment.edges[0].properties.get("source"), Some(&PropertyValue::from("test")));
    }

    #[test]
    fn address_links_ip_and_port() {
        let mut builder = FragmentBuilder::new("test");
        assert_eq!(builder.address("10.0.0.1", Some("80")), "10.0.0.1:80");
        assert_eq!(builder.address("10.0.0.2", None), "10.0.0.2");
        let fragment = builder.finish();

        let ids: Vec<_> = fragment.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["10.0.0.1:80_hasIP_10.0.0.1", "10.0.0.1:80_hasPort_80"]);
        assert_eq!(fragment.vertices.len(), 4);
    }

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(split_list(" a, ,b,", ','), vec!["a", "b"]);
    }
}
