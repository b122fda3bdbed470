//! Per-run accounting and the failure policy that drives it.

use std::{fmt, str::FromStr};

use greenway_core::{ExternalId, FeatureClass};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a sync run does when storing a feature fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failure. Features stored before it stay stored.
    #[default]
    Abort,
    /// Record the failure and carry on with the next feature.
    Skip,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Abort => "abort",
            Self::Skip => "skip",
        })
    }
}

/// Error returned when parsing an unknown failure policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown failure policy '{input}'; expected abort or skip")]
pub struct ParseFailurePolicyError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for FailurePolicy {
    type Err = ParseFailurePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            _ => Err(ParseFailurePolicyError {
                input: s.to_owned(),
            }),
        }
    }
}

/// Why a feature was left out without attempting a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The feature had no usable identifier.
    MissingId,
    /// The feature had no geometry.
    MissingGeometry,
}

/// A feature that was not written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFeature {
    /// Position of the feature in the upstream snapshot.
    pub index: usize,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// A feature whose write failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFeature {
    /// Position of the feature in the upstream snapshot.
    pub index: usize,
    /// Identifier of the feature.
    pub external_id: ExternalId,
    /// Rendered failure.
    pub error: String,
}

/// Outcome of one sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Class that was synced.
    pub class: FeatureClass,
    /// Features in the upstream snapshot.
    pub total: usize,
    /// Features written to the store.
    pub upserted: usize,
    /// Features left out before writing.
    pub skipped: Vec<SkippedFeature>,
    /// Features whose write failed.
    pub failed: Vec<FailedFeature>,
}

impl SyncSummary {
    /// Empty summary for a snapshot of `total` features.
    #[must_use]
    pub const fn new(class: FeatureClass, total: usize) -> Self {
        Self {
            class,
            total,
            upserted: 0,
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Features not yet accounted for; non-zero only after an abort.
    #[must_use]
    pub fn unprocessed(&self) -> usize {
        self.total
            .saturating_sub(self.upserted + self.skipped.len() + self.failed.len())
    }

    /// Whether every feature was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.upserted == self.total
    }
}
