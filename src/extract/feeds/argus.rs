//! Argus flow records
//!
//! Columns: `StartTime, Flgs, Proto, SrcAddr, Sport, Dir, DstAddr, Dport,
//! TotPkts, TotBytes, State`

use super::FragmentBuilder;
use crate::extract::{ExtractError, Metadata, ParsedTree};
use crate::graph::GraphFragment;

const HEADER: &str = "StartTime";

const START_TIME: usize = 0;
const FLAGS: usize = 1;
const PROTO: usize = 2;
const SRC_ADDR: usize = 3;
const SRC_PORT: usize = 4;
const DIR: usize = 5;
const DST_ADDR: usize = 6;
const DST_PORT: usize = 7;
const PACKETS: usize = 8;
const BYTES: usize = 9;
const STATE: usize = 10;

pub fn extract(tree: &ParsedTree, _metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
    let table = tree.table()?;
    let mut builder = FragmentBuilder::new("argus");

    for row in table.records(HEADER) {
        let (Some(src_ip), Some(dst_ip)) = (row.get(SRC_ADDR), row.get(DST_ADDR)) else {
            continue;
        };

        let src = builder.address(src_ip, row.get(SRC_PORT));
        let dst = builder.address(dst_ip, row.get(DST_PORT));

        let mut flow = builder.flow(&src, &dst);
        for (key, index) in [
            ("startTime", START_TIME),
            ("flags", FLAGS),
            ("proto", PROTO),
            ("dir", DIR),
            ("totalPkts", PACKETS),
            ("totalBytes", BYTES),
            ("state", STATE),
        ] {
            if let Some(value) = row.get(index) {
                flow.set(key, value);
            }
        }
        builder.add(flow);
    }

    Ok(builder.finish())
}
