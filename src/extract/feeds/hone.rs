//! Hone host agent records
//!
//! Columns: `user, uid, proc_pid, proc_ppid, path, argv, conn_id,
//! timestamp_epoch_ms, source_port, dest_port, ppid, source_ip, dest_ip,
//! byte_cnt`
//!
//! The reporting host is not in the records; it arrives in the `hostName`
//! message header. Without it, no host vertex is emitted.

use super::FragmentBuilder;
use crate::extract::{ExtractError, Metadata, ParsedTree};
use crate::graph::GraphFragment;

/// Header naming the host the records were collected on
pub const HOST_NAME: &str = "hostName";

const HEADER: &str = "user";

const USER: usize = 0;
const UID: usize = 1;
const PID: usize = 2;
const PARENT_PID: usize = 3;
const PATH: usize = 4;
const ARGV: usize = 5;
const TIMESTAMP: usize = 7;
const SRC_PORT: usize = 8;
const DST_PORT: usize = 9;
const SRC_IP: usize = 11;
const DST_IP: usize = 12;
const BYTES: usize = 13;

pub fn extract(tree: &ParsedTree, metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
    let table = tree.table()?;
    let mut builder = FragmentBuilder::new("hone");

    let host = metadata.get(HOST_NAME).map(String::as_str).filter(|h| !h.is_empty());
    if let Some(host) = host {
        builder.add_bare(host, "host");
    }

    for row in table.records(HEADER) {
        let Some(path) = row.get(PATH) else {
            continue;
        };

        let software = match host {
            Some(host) => format!("{}:{}", host, path),
            None => path.to_string(),
        };
        let mut process = builder.vertex(&software, "software");
        process.set("path", path);
        for (key, index) in [("pid", PID), ("ppid", PARENT_PID), ("argv", ARGV)] {
            if let Some(value) = row.get(index) {
                process.set(key, value);
            }
        }
        builder.add(process);
        if let Some(host) = host {
            builder.edge(host, "runs", &software);
        }

        if let Some(user) = row.get(USER) {
            let account = match host {
                Some(host) => format!("{}:{}", host, user),
                None => user.to_string(),
            };
            let mut vertex = builder.vertex(&account, "account");
            vertex.set("username", user);
            if let Some(uid) = row.get(UID) {
                vertex.set("uid", uid);
            }
            builder.add(vertex);
            builder.edge(&software, "runsAs", &account);
            if let Some(host) = host {
                builder.edge(host, "usesAccount", &account);
            }
        }

        let (Some(src_ip), Some(dst_ip)) = (row.get(SRC_IP), row.get(DST_IP)) else {
            continue;
        };
        let src = builder.address(src_ip, row.get(SRC_PORT));
        let dst = builder.address(dst_ip, row.get(DST_PORT));
        let mut flow = builder.flow(&src, &dst);
        if let Some(ts) = row.get(TIMESTAMP) {
            flow.set("startTime", ts);
        }
        if let Some(bytes) = row.get(BYTES) {
            flow.set("totalBytes", bytes);
        }
        builder.add(flow);
        builder.edge(&software, "hasFlow", &format!("{}_through_{}", src, dst));
    }

    Ok(builder.finish())
}
