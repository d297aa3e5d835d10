//! Reader for `rmfit` report files.
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Rotation measure reported by `rmfit`, uncertainty included when the tool
/// printed one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RmFitRecord {
    pub rm: f64,
    pub rm_err: Option<f64>,
}

/// Scan report text for the `Best RM` line.
///
/// The value is the 4th whitespace-separated token and the uncertainty, when
/// present, the 6th. A report with no such line (rmfit found no peak) is not
/// an error, just an absent record.
pub fn parse_rmfit(text: &str) -> Option<RmFitRecord> {
    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first() == Some(&"Best") && tokens.get(1) == Some(&"RM") {
            let rm = tokens.get(3)?.parse().ok()?;
            let rm_err = tokens.get(5).and_then(|token| token.parse().ok());
            return Some(RmFitRecord { rm, rm_err });
        }
    }
    None
}

pub fn read_rmfit_file(path: &Path) -> Result<Option<RmFitRecord>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read rmfit report {}", path.display()))?;
    Ok(parse_rmfit(&text))
}
