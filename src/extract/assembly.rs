//! Multi-part records
//!
//! Some feeds publish one logical record as several web pages. The message
//! body then lists the parts, one per line, as `referenceId sourceUrl`. The
//! source URL decides which role each fetched page fills.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("part list line {line} is not 'referenceId sourceUrl': {text:?}")]
    MalformedLine { line: usize, text: String },

    #[error("part list is empty")]
    Empty,
}

/// One entry of a part list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRef {
    pub reference_id: String,
    pub source_url: String,
}

/// Parse a newline-delimited part list. Blank lines are ignored.
pub fn parse_part_list(body: &str) -> Result<Vec<PartRef>, AssemblyError> {
    let mut parts = Vec::new();
    for (index, line) in body.lines().enumerate() {
        let mut fields = line.split_whitespace();
        let Some(reference_id) = fields.next() else {
            continue;
        };
        let source_url = fields.next().ok_or_else(|| AssemblyError::MalformedLine {
            line: index + 1,
            text: line.to_string(),
        })?;
        parts.push(PartRef {
            reference_id: reference_id.to_string(),
            source_url: source_url.to_string(),
        });
    }

    if parts.is_empty() {
        return Err(AssemblyError::Empty);
    }
    Ok(parts)
}

/// The role a page plays within a multi-part record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Summary,
    DetailedAnalysis,
    Info,
    Discussion,
    Exploit,
    Solution,
    References,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::DetailedAnalysis => "detailed analysis",
            Self::Info => "info",
            Self::Discussion => "discussion",
            Self::Exploit => "exploit",
            Self::Solution => "solution",
            Self::References => "references",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetched page contents keyed by role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parts {
    contents: BTreeMap<Role, String>,
}

impl Parts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill a role. A later page for the same role replaces the earlier one.
    pub fn insert(&mut self, role: Role, content: String) {
        self.contents.insert(role, content);
    }

    pub fn with(mut self, role: Role, content: impl Into<String>) -> Self {
        self.insert(role, content.into());
        self
    }

    pub fn get(&self, role: Role) -> Option<&str> {
        self.contents.get(&role).map(String::as_str)
    }

    /// Roles from `required` that are still unfilled
    pub fn missing(&self, required: &[Role]) -> Vec<Role> {
        required
            .iter()
            .copied()
            .filter(|r| !self.contents.contains_key(r))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_list_pairs_ids_with_urls() {
        let parts = parse_part_list("doc1 http://a/info\r\n\n  doc2\thttp://a/exploit  \n").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].reference_id, "doc1");
        assert_eq!(parts[1].source_url, "http://a/exploit");
    }

    #[test]
    fn line_without_url_is_malformed() {
        let err = parse_part_list("doc1 http://a/info\ndoc2\n").unwrap_err();
        assert!(matches!(err, AssemblyError::MalformedLine { line: 2, .. }));
    }

    #[test]
    fn blank_list_is_rejected() {
        assert!(matches!(parse_part_list("\n \n"), Err(AssemblyError::Empty)));
    }

    #[test]
    fn missing_roles_are_reported_in_order() {
        let parts = Parts::new().with(Role::Info, "x").with(Role::Solution, "y");
        assert_eq!(
            parts.missing(&[Role::Info, Role::Discussion, Role::Solution, Role::References]),
            vec![Role::Discussion, Role::References]
        );
    }
}
