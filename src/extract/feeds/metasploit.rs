//! Metasploit module export
//!
//! Columns: `id, mtime, file, mtype, refname, fullname, name, rank,
//! description, license, privileged, disclosure_date, default_target,
//! default_action, stance, ready, ref_names`
//!
//! `ref_names` lists references such as `CVE-2008-4250, OSVDB-49243`. Each
//! CVE reference links the exploit to that vulnerability.

use super::{split_list, FragmentBuilder};
use crate::extract::{ExtractError, Metadata, ParsedTree};
use crate::graph::GraphFragment;

const HEADER: &str = "id";

const MODULE_TYPE: usize = 3;
const FULL_NAME: usize = 5;
const NAME: usize = 6;
const RANK: usize = 7;
const DESCRIPTION: usize = 8;
const PRIVILEGED: usize = 10;
const DISCLOSED: usize = 11;
const REF_NAMES: usize = 16;

pub fn extract(tree: &ParsedTree, _metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
    let table = tree.table()?;
    let mut builder = FragmentBuilder::new("metasploit");

    for row in table.records(HEADER) {
        let Some(full_name) = row.get(FULL_NAME) else {
            continue;
        };
        // Only exploit modules describe attacks on vulnerabilities
        if row.get(MODULE_TYPE).is_some_and(|t| t != "exploit") {
            continue;
        }

        let mut exploit = builder.vertex(full_name, "exploit");
        for (key, index) in [
            ("shortDescription", NAME),
            ("rank", RANK),
            ("description", DESCRIPTION),
            ("privileged", PRIVILEGED),
            ("publishedDate", DISCLOSED),
        ] {
            if let Some(value) = row.get(index) {
                exploit.set(key, value);
            }
        }
        builder.add(exploit);

        let references = row.get(REF_NAMES).map(|r| split_list(r, ',')).unwrap_or_default();
        for cve in references.iter().filter(|r| r.starts_with("CVE-")) {
            builder.add_bare(cve, "vulnerability");
            builder.edge(full_name, "exploits", cve);
        }
    }

    Ok(builder.finish())
}
