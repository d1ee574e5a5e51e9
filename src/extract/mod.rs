//! Turning feed content into graph fragments
//!
//! A routing label selects a [`Route`]; its [`Plan`] says how to get from
//! resolved content to a [`GraphFragment`](crate::graph::GraphFragment):
//! parse then extract, extract from raw content, or assemble a multi-part
//! record first.

mod assembly;
pub mod feeds;
mod parser;
mod registry;

use std::collections::BTreeMap;
use thiserror::Error;

pub use assembly::{parse_part_list, AssemblyError, PartRef, Parts, Role};
pub use parser::{ParseError, ParsedTree, Parser, Row, Table, XmlElement};
pub use registry::{
    normalize_label, ExtractorRegistry, ParsedExtractor, PartsExtractor, Plan, RawExtractor,
    RoleClassifier, Route,
};

/// Message header values flattened to text, as extractors see them
pub type Metadata = BTreeMap<String, String>;

/// Why an extractor produced no fragment
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("expected {expected}")]
    WrongShape { expected: &'static str },

    #[error("required field missing: {0}")]
    Missing(String),
}

impl ParsedTree {
    /// The XML root, or a shape error for tabular input
    pub fn document(&self) -> Result<&XmlElement, ExtractError> {
        match self {
            Self::Document(root) => Ok(root),
            Self::Table(_) => Err(ExtractError::WrongShape {
                expected: "an XML document",
            }),
        }
    }

    /// The table, or a shape error for XML input
    pub fn table(&self) -> Result<&Table, ExtractError> {
        match self {
            Self::Table(table) => Ok(table),
            Self::Document(_) => Err(ExtractError::WrongShape {
                expected: "delimited text",
            }),
        }
    }
}
