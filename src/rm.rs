//! Rotation-measure resolution.
//!
//! Looked up fresh every time an RM is needed; the directory contents decide
//! which source wins. Precedence: synthesis result, then rmfit report, then
//! the catalog.
use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::artifacts::StageArtifactSet;
use crate::catalog::RmCatalog;
use crate::results::{rmfit, synthesis};

/// Uncertainty assigned to an RM whose source did not report one.
pub const DEFAULT_UNCERTAINTY_FRACTION: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RmProvenance {
    Synthesis,
    FitFile,
    Catalog,
}

/// A resolved rotation measure and where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RotationMeasureRecord {
    pub value: f64,
    pub uncertainty: f64,
    pub provenance: RmProvenance,
}

/// Resolve the RM for a pipeline instance, first available source wins.
///
/// A catalog lookup failure is downgraded to "no record": it is the end of
/// the chain either way, and the correction stage fails fast on `None`.
pub fn resolve_rm(
    dir: &Path,
    facts: &StageArtifactSet,
    pulsar: &str,
    catalog: &dyn RmCatalog,
) -> Result<Option<RotationMeasureRecord>> {
    if let Some(name) = &facts.synthesis_file {
        if let Some(record) = synthesis::read_synthesis_file(&dir.join(name))? {
            return Ok(Some(RotationMeasureRecord {
                value: record.rm,
                uncertainty: record.rm_err,
                provenance: RmProvenance::Synthesis,
            }));
        }
        tracing::warn!(file = %name, "synthesis result holds no usable RM, falling back");
    }
    if let Some(name) = &facts.rmfit_file {
        if let Some(record) = rmfit::read_rmfit_file(&dir.join(name))? {
            let uncertainty = record
                .rm_err
                .unwrap_or_else(|| DEFAULT_UNCERTAINTY_FRACTION * record.rm.abs());
            return Ok(Some(RotationMeasureRecord {
                value: record.rm,
                uncertainty,
                provenance: RmProvenance::FitFile,
            }));
        }
        tracing::warn!(file = %name, "rmfit report holds no usable RM, falling back");
    }
    match catalog.rotation_measure(pulsar) {
        Ok(Some(record)) => Ok(Some(RotationMeasureRecord {
            value: record.rm,
            uncertainty: record
                .rm_err
                .unwrap_or_else(|| DEFAULT_UNCERTAINTY_FRACTION * record.rm.abs()),
            provenance: RmProvenance::Catalog,
        })),
        Ok(None) => Ok(None),
        Err(err) => {
            tracing::warn!(error = %err, pulsar, "catalog lookup failed, RM unresolved");
            Ok(None)
        }
    }
}
