//! Metric source trait and the tagged per-query result.
//!
//! Every device transport implements [`MetricSource`]. A query never fails
//! past its own boundary: faults come back as [`RawResult::Failed`] so the
//! collector can record them next to the values that did arrive.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::FailureKind;

/// Outcome of one metric query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RawResult {
    /// Well-formed single-value reply, rendered as text.
    Ok(String),
    /// The query failed; `detail` is a human-readable reason.
    Failed { kind: FailureKind, detail: String },
}

impl RawResult {
    pub fn ok(value: impl Into<String>) -> Self {
        Self::Ok(value.into())
    }

    pub fn failed(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn is_failed(&self) -> bool {
        !self.is_ok()
    }

    /// The value text, if the query succeeded.
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Ok(v) => Some(v),
            Self::Failed { .. } => None,
        }
    }

    /// The failure kind, if the query failed.
    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            Self::Ok(_) => None,
            Self::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// Trait that every device transport must implement.
///
/// Implementations hold configuration only and must be safe to call from the
/// scheduler and from request handlers at the same time.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Query a single protocol address (an OID for SNMP).
    async fn query(&self, address: &str) -> RawResult;

    /// Device identifier used for registry bookkeeping (`host:port`).
    fn target(&self) -> String;
}
