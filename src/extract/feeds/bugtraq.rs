//! SecurityFocus Bugtraq entries
//!
//! One entry is five pages under `http://www.securityfocus.com/bid/{id}/`:
//! `info`, `discuss` (also published as `discussion`), `exploit`, `solution`
//! and `references`. The info page carries the structured fields, the other
//! pages free text or links.

use super::{html, split_list, FragmentBuilder};
use crate::extract::{ExtractError, Metadata, Parts, Role};
use crate::graph::GraphFragment;

pub const ROLES: &[Role] = &[
    Role::Info,
    Role::Discussion,
    Role::Exploit,
    Role::Solution,
    Role::References,
];

pub fn classify(url: &str) -> Option<Role> {
    [
        ("/info", Role::Info),
        ("/discuss", Role::Discussion),
        ("/exploit", Role::Exploit),
        ("/solution", Role::Solution),
        ("/references", Role::References),
    ]
    .into_iter()
    .find_map(|(marker, role)| url.contains(marker).then_some(role))
}

fn require(parts: &Parts, role: Role) -> Result<&str, ExtractError> {
    parts.get(role).ok_or_else(|| ExtractError::Missing(role.to_string()))
}

/// Page text minus the heading line the site repeats on every tab
fn body_text(page: &str) -> String {
    let text = html::plain_text(page);
    let heading = html::heading(page);
    text.lines()
        .filter(|l| Some(*l) != heading.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn extract(parts: &Parts, _metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
    let info = require(parts, Role::Info)?;
    let discussion = require(parts, Role::Discussion)?;
    let exploit = require(parts, Role::Exploit)?;
    let solution = require(parts, Role::Solution)?;
    let references = require(parts, Role::References)?;

    let info_text = html::plain_text(info);
    let bid = html::field(&info_text, "Bugtraq ID")
        .ok_or_else(|| ExtractError::Missing("Bugtraq ID".into()))?;
    let name = format!("Bugtraq_{}", bid);

    let mut builder = FragmentBuilder::new("bugtraq");
    let mut vuln = builder.vertex(&name, "vulnerability");
    if let Some(title) = html::heading(info) {
        vuln.set("shortDescription", title);
    }
    for (key, label) in [
        ("class", "Class"),
        ("publishedDate", "Published"),
        ("updatedDate", "Updated"),
        ("remote", "Remote"),
        ("local", "Local"),
    ] {
        if let Some(value) = html::field(&info_text, label) {
            vuln.set(key, value);
        }
    }
    vuln.set("description", body_text(discussion));
    vuln.set("exploit", body_text(exploit));
    vuln.set("solution", body_text(solution));

    let links = html::links(references);
    if !links.is_empty() {
        vuln.set("references", links);
    }

    let cves = html::field(&info_text, "CVE")
        .map(|c| split_list(&c, ' '))
        .unwrap_or_default();
    if !cves.is_empty() {
        vuln.set("CVE", cves.clone());
    }
    builder.add(vuln);

    for cve in &cves {
        builder.add_bare(cve, "vulnerability");
        builder.edge(&name, "sameAs", cve);
    }

    for software in html::section(&info_text, "Vulnerable", "Not Vulnerable") {
        builder.add_bare(&software, "software");
        builder.edge(&software, "hasVulnerability", &name);
    }

    Ok(builder.finish())
}
