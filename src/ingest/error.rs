//! Per-message failures

use super::content::ResolveError;
use crate::extract::{ExtractError, Role};
use thiserror::Error;

/// Why a message produced no merge.
///
/// Only an empty body is retried. Every other failure is logged and the
/// message acknowledged, so a bad record never blocks the queue.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("message has no body")]
    EmptyBody,

    #[error("no extractor for routing key '{0}'")]
    Routing(String),

    #[error("could not resolve content: {0}")]
    ContentResolution(#[from] ResolveError),

    #[error("{feed}: {source}")]
    Parse {
        feed: &'static str,
        #[source]
        source: ExtractError,
    },

    #[error("{feed}: record is missing parts {missing:?}")]
    Incomplete {
        feed: &'static str,
        missing: Vec<Role>,
    },
}

impl IngestError {
    /// Whether the message should go back on the queue instead of being acked
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmptyBody)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_empty_body_is_retryable() {
        assert!(IngestError::EmptyBody.is_retryable());
        assert!(!IngestError::Routing("x".into()).is_retryable());
        assert!(!IngestError::Incomplete {
            feed: "bugtraq",
            missing: vec![Role::Exploit],
        }
        .is_retryable());
    }

    #[test]
    fn messages_name_the_feed() {
        let err = IngestError::Parse {
            feed: "cve",
            source: ExtractError::Missing("name".into()),
        };
        assert_eq!(err.to_string(), "cve: required field missing: name");
    }
}
