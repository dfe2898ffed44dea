//! Per-field persistability decisions for a snapshot.
//!
//! A field is usable when its query succeeded and the value text parses as a
//! finite decimal number. Descriptive strings (`sysName`, interface names)
//! stay visible to API consumers but are never written as time-series fields.
//! A snapshot is critical only when every field failed; a degraded snapshot
//! still has its usable fields persisted.

use std::collections::BTreeSet;

use crate::snapshot::Snapshot;

/// Validator verdict for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    /// Fields that may be persisted.
    pub usable: BTreeSet<String>,
    /// True when no field produced a value at all.
    pub has_critical_failure: bool,
}

impl Classification {
    /// Some fields usable, some failed or non-numeric.
    pub fn is_degraded(&self, snapshot: &Snapshot) -> bool {
        !self.has_critical_failure && self.usable.len() < snapshot.len()
    }
}

/// Parse a value as a finite f64, tolerating surrounding whitespace.
///
/// Integers too large for exact double precision are accepted with rounding.
pub fn parse_metric_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Classify a snapshot field by field.
pub fn classify(snapshot: &Snapshot) -> Classification {
    let usable: BTreeSet<String> = snapshot
        .iter()
        .filter(|(_, raw)| raw.value().and_then(parse_metric_value).is_some())
        .map(|(name, _)| name.to_string())
        .collect();
    let has_critical_failure = snapshot.iter().all(|(_, raw)| raw.is_failed());

    Classification {
        usable,
        has_critical_failure,
    }
}
