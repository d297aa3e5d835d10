//! The stage decision engine.
//!
//! One total, pure function from the scanned fact set to the next action.
//! Determinism is what makes the pipeline resumable: if a stage's job died
//! before writing its output artifact, the next invocation sees the same
//! facts and re-attempts the same stage.
use serde::Serialize;

use crate::artifacts::StageArtifactSet;

/// The single action an invocation takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageDecision {
    /// Fold the raw data and fit for a rotation measure. `ipfb` selects the
    /// per-channel fold over header files instead of the combined fits fold.
    Fold { ipfb: bool },
    /// Correct the folded archive for Faraday rotation, then fit the
    /// rotating vector model.
    RmCorrectAndRvm,
    /// All products exist: finalize, plot, and stop relaunching.
    PlotAndTerminate,
    /// Nothing to work on in this directory.
    NoInputData,
    /// The artifacts do not match any stage boundary; an operator has to
    /// look at the directory.
    Inconsistent,
}

/// Map the fact set to the next stage. Rules are evaluated in a fixed
/// priority order; the corrected-without-precursor guard runs before the
/// fold rule so a stray `.ar2` can never trigger a silent re-fold.
pub fn next_stage(facts: &StageArtifactSet) -> StageDecision {
    let archive = facts.folded_archive.is_some();
    let corrected = facts.corrected_archive.is_some();

    if !facts.has_raw_data() && !facts.has_header_files() {
        return StageDecision::NoInputData;
    }
    if corrected && !archive {
        return StageDecision::Inconsistent;
    }
    if !(facts.has_rm_source() && archive) {
        return StageDecision::Fold {
            ipfb: facts.has_header_files() && !facts.has_raw_data(),
        };
    }
    if !(corrected && facts.rvm_fit_file.is_some()) {
        return StageDecision::RmCorrectAndRvm;
    }
    StageDecision::PlotAndTerminate
}
