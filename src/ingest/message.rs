//! Queue messages and the header metadata passed to extractors

use crate::extract::Metadata;
use serde_json::{Map, Value};

/// Header that marks the body as the content itself rather than a document id
pub const HAS_CONTENT_HEADER: &str = "HasContent";

/// One delivery from the message queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Label the message was published under; selects the extractor
    pub routing_key: String,
    /// Opaque handle used to ack or retry this delivery
    pub delivery_id: String,
    pub body: Option<Vec<u8>>,
    pub headers: Map<String, Value>,
}

impl Message {
    pub fn new(
        routing_key: impl Into<String>,
        delivery_id: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            routing_key: routing_key.into(),
            delivery_id: delivery_id.into(),
            body: Some(body.into()),
            headers: Map::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// The body, or `None` when it is missing or zero-length
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref().filter(|b| !b.is_empty())
    }

    /// Whether the body carries the record inline.
    ///
    /// Accepts a JSON boolean or a case-insensitive `"true"` string.
    pub fn content_inline(&self) -> bool {
        match self.headers.get(HAS_CONTENT_HEADER) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Scalar headers as text. Structured header values are dropped.
    pub fn metadata(&self) -> Metadata {
        self.headers
            .iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((key.clone(), text))
            })
            .collect()
    }
}
