//! Reader for RM-synthesis result files.
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Faraday depth of the synthesis peak and its uncertainty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisRecord {
    pub rm: f64,
    pub rm_err: f64,
}

/// Parse a synthesis result file: `#`-prefixed header lines followed by one
/// data line holding the peak depth and its uncertainty.
pub fn parse_synthesis(text: &str) -> Option<SynthesisRecord> {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let rm = tokens.next()?.parse().ok()?;
        let rm_err = tokens.next()?.parse().ok()?;
        return Some(SynthesisRecord { rm, rm_err });
    }
    None
}

pub fn read_synthesis_file(path: &Path) -> Result<Option<SynthesisRecord>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read RM synthesis result {}", path.display()))?;
    Ok(parse_synthesis(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_first_data_line() {
        let text = "\
# rm_synthesis 1255444104_J2241-5236_archive.ar
# phi [rad/m^2]   err
12.25 0.80
";
        let record = parse_synthesis(text).unwrap();
        assert_eq!(record.rm, 12.25);
        assert_eq!(record.rm_err, 0.8);
    }

    #[test]
    fn header_only_file_is_absent() {
        assert!(parse_synthesis("# no detection\n").is_none());
    }

    #[test]
    fn data_line_needs_both_columns() {
        assert!(parse_synthesis("12.25\n").is_none());
    }
}
