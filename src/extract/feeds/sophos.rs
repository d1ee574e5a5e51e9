//! Sophos threat analyses
//!
//! A record is two pages: the summary (`.../Troj~Agent-ABC.aspx`) and the
//! detailed analysis (`.../Troj~Agent-ABC/detailed-analysis.aspx`). The
//! summary names the threat and describes it; the detailed analysis lists
//! file digests and the addresses the sample contacts.

use super::{html, split_list, FragmentBuilder};
use crate::extract::{ExtractError, Metadata, Parts, Role};
use crate::graph::GraphFragment;

pub const ROLES: &[Role] = &[Role::Summary, Role::DetailedAnalysis];

pub fn classify(url: &str) -> Option<Role> {
    if url.contains("/detailed-analysis.aspx") {
        Some(Role::DetailedAnalysis)
    } else if url.contains(".aspx") {
        Some(Role::Summary)
    } else {
        None
    }
}

pub fn extract(parts: &Parts, _metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
    let summary = parts
        .get(Role::Summary)
        .ok_or_else(|| ExtractError::Missing(Role::Summary.to_string()))?;
    let details = parts
        .get(Role::DetailedAnalysis)
        .ok_or_else(|| ExtractError::Missing(Role::DetailedAnalysis.to_string()))?;

    let name = html::heading(summary).ok_or_else(|| ExtractError::Missing("threat name".into()))?;
    let summary_text = html::plain_text(summary);
    let details_text = html::plain_text(details);

    let mut builder = FragmentBuilder::new("sophos");
    let mut malware = builder.vertex(&name, "malware");

    for (key, label) in [
        ("malwareType", "Type"),
        ("category", "Category"),
        ("platform", "Affected Operating Systems"),
        ("discoveryDate", "Discovered"),
        ("prevalence", "Prevalence"),
    ] {
        if let Some(value) = html::field(&summary_text, label) {
            malware.set(key, value);
        }
    }
    if let Some(aliases) = html::field(&summary_text, "Also known as") {
        malware.set("aliases", split_list(&aliases, ','));
    }
    if let Some(description) = html::field(&summary_text, "Description") {
        malware.set("description", description);
    }

    let digests = html::md5_digests(&details_text);
    if !digests.is_empty() {
        malware.set("md5hashes", digests);
    }
    builder.add(malware);

    for ip in html::ipv4_addresses(&details_text) {
        builder.add_bare(&ip, "IP");
        builder.edge(&name, "communicatesWith", &ip);
    }

    Ok(builder.finish())
}
