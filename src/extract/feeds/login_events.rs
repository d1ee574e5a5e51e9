//! Login events
//!
//! Columns: `date_time, hostname_of_login, login_software, status, user,
//! hostname_of_origin, ip_of_origin`

use super::FragmentBuilder;
use crate::extract::{ExtractError, Metadata, ParsedTree};
use crate::graph::{EdgeRecord, GraphFragment};

const HEADER: &str = "date_time";

const DATE_TIME: usize = 0;
const HOST: usize = 1;
const SOFTWARE: usize = 2;
const STATUS: usize = 3;
const USER: usize = 4;
const ORIGIN_HOST: usize = 5;
const ORIGIN_IP: usize = 6;

pub fn extract(tree: &ParsedTree, _metadata: &Metadata) -> Result<GraphFragment, ExtractError> {
    let table = tree.table()?;
    let mut builder = FragmentBuilder::new("LoginEvent");
    let mut logins = Vec::new();

    for row in table.records(HEADER) {
        let (Some(host), Some(user)) = (row.get(HOST), row.get(USER)) else {
            continue;
        };

        let account = format!("{}:{}", host, user);
        builder.add_bare(host, "host");
        let mut vertex = builder.vertex(&account, "account");
        vertex.set("username", user);
        builder.add(vertex);
        builder.edge(host, "usesAccount", &account);

        if let Some(software) = row.get(SOFTWARE) {
            let name = format!("{}:{}", host, software);
            builder.add_bare(&name, "software");
            builder.edge(host, "runs", &name);
        }

        if let Some(origin) = row.get(ORIGIN_HOST) {
            builder.add_bare(origin, "host");
            if let Some(ip) = row.get(ORIGIN_IP) {
                builder.add_bare(ip, "IP");
                builder.edge(origin, "usesAddress", ip);
            }

            // The login edge records when and how the login went
            let mut login = EdgeRecord::new(
                super::edge_id(&account, "logsInFrom", origin),
                &account,
                origin,
                "logsInFrom",
            )
            .with_property(super::SOURCE, "LoginEvent");
            for (key, index) in [("timeStamp", DATE_TIME), ("status", STATUS)] {
                if let Some(value) = row.get(index) {
                    login = login.with_property(key, value);
                }
            }
            logins.push(login);
        }
    }

    let mut fragment = builder.finish();
    for login in logins {
        fragment.add_edge(login);
    }
    Ok(fragment)
}
