//! Pointing-directory inspection.
//!
//! The directory contents are the only pipeline state, so the scan is
//! deliberately dumb: filename matching per artifact category, no content
//! validation, no caching. Absence of a file is a fact, never an error.
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Facts derived from one read-only scan of a pointing directory.
///
/// Filenames are stored relative to the scanned directory, keyed by the
/// `{obsid}_{pulsar}` stem of the pipeline instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageArtifactSet {
    pub fits_files: Vec<String>,
    pub header_files: Vec<String>,
    pub folded_archive: Option<String>,
    pub corrected_archive: Option<String>,
    pub rmfit_file: Option<String>,
    pub synthesis_file: Option<String>,
    pub rvm_fit_file: Option<String>,
    pub chi_map_file: Option<String>,
    pub ascii_archive: Option<String>,
}

impl StageArtifactSet {
    pub fn has_raw_data(&self) -> bool {
        !self.fits_files.is_empty()
    }

    pub fn has_header_files(&self) -> bool {
        !self.header_files.is_empty()
    }

    /// Any file a rotation measure can be read from.
    pub fn has_rm_source(&self) -> bool {
        self.rmfit_file.is_some() || self.synthesis_file.is_some()
    }
}

/// Scan a pointing directory for the artifacts of one pipeline instance.
pub fn scan_pointing_dir(dir: &Path, obsid: &str, pulsar: &str) -> Result<StageArtifactSet> {
    let base = format!("{obsid}_{pulsar}");
    let mut facts = StageArtifactSet::default();

    let entries =
        fs::read_dir(dir).with_context(|| format!("read pointing directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        classify(&mut facts, &base, name);
    }
    facts.fits_files.sort();
    facts.header_files.sort();
    Ok(facts)
}

fn classify(facts: &mut StageArtifactSet, base: &str, name: String) {
    // ipfb products share the `_archive` suffix, so one check covers both.
    let archive_name = |name: &str, suffix: &str| {
        name == format!("{base}_archive{suffix}") || name == format!("{base}_ipfb_archive{suffix}")
    };

    if name.ends_with(".fits") {
        facts.fits_files.push(name);
    } else if name.ends_with(".hdr") {
        facts.header_files.push(name);
    } else if archive_name(&name, ".ar") {
        facts.folded_archive = Some(name);
    } else if archive_name(&name, ".ar2") {
        facts.corrected_archive = Some(name);
    } else if archive_name(&name, ".txt") {
        facts.ascii_archive = Some(name);
    } else if name == format!("{base}_rmfit.txt") {
        facts.rmfit_file = Some(name);
    } else if name.contains("RM_synthesis") && name.ends_with(".txt") {
        facts.synthesis_file = Some(name);
    } else if name == format!("{base}_RVM_fit.txt") {
        facts.rvm_fit_file = Some(name);
    } else if name == "chi_map.txt" {
        facts.chi_map_file = Some(name);
    }
}
