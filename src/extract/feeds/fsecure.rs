//! F-Secure threat descriptions (raw HTML page)

use super::{html, split_list, FragmentBuilder};
use crate::extract::{ExtractError, Metadata};
use crate::graph::GraphFragment;

pub fn extract(content: &str, _metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
    let name = html::heading(content).ok_or_else(|| ExtractError::Missing("threat name".into()))?;
    let text = html::plain_text(content);

    let mut builder = FragmentBuilder::new("fsecure");
    let mut malware = builder.vertex(&name, "malware");

    for (key, label) in [
        ("category", "Category"),
        ("malwareType", "Type"),
        ("platform", "Platform"),
    ] {
        if let Some(value) = html::field(&text, label) {
            malware.set(key, value);
        }
    }
    if let Some(aliases) = html::field(&text, "Aliases") {
        malware.set("aliases", split_list(&aliases, ','));
    }

    let summary = html::section(&text, "Summary", "Removal");
    if !summary.is_empty() {
        malware.set("description", summary.join(" "));
    }

    builder.add(malware);
    Ok(builder.finish())
}
