//! Readers for the rotating-vector-model fit report and its chi-square map.
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Best-fit RVM geometry from a grid-search report.
///
/// `alpha_e`/`zeta_e` are not printed by the fitting tool; they are half a
/// grid step, derived from the number of grid samples in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RvmFitRecord {
    pub nbins: u32,
    pub chisq: f64,
    pub redchisq: f64,
    pub psi_0: f64,
    pub psi_0_err: (f64, f64),
    pub phi_0: f64,
    pub phi_0_err: (f64, f64),
    pub alpha: f64,
    pub alpha_e: f64,
    pub zeta: f64,
    pub zeta_e: f64,
}

/// One grid sample of the chi-square map, angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChiMapPoint {
    pub alpha: f64,
    pub zeta: f64,
    pub chisq: f64,
}

const NUMBER: &str = r"[-+]?[0-9]*\.?[0-9]+(?:[eE][-+]?[0-9]+)?";

fn capture_f64(regex: &Regex, text: &str, tag: &str, group: usize) -> Result<f64> {
    let captures = regex
        .captures(text)
        .ok_or_else(|| anyhow!("`{tag}` not found in RVM fit output"))?;
    captures[group]
        .parse()
        .with_context(|| format!("parse `{tag}` value from RVM fit output"))
}

/// Parse a grid-search fit report.
///
/// All eleven report fields are required; a truncated report (the fit ran
/// out of walltime, or the grid search crashed mid-write) is a hard error so
/// callers can treat the fit as not usable.
pub fn parse_rvm_fit(text: &str) -> Result<RvmFitRecord> {
    let nbins_re = Regex::new(r"nbins\s+(\d+)").context("compile nbins pattern")?;
    let chisq_re = Regex::new(&format!(
        r"(?m)^chisq=\s*({NUMBER})\s+reduced chisq=\s*({NUMBER})"
    ))
    .context("compile chisq pattern")?;
    let psi_re = Regex::new(&format!(
        r"psi_0=\(\s*({NUMBER})\s+({NUMBER})\s+({NUMBER})\s*\)"
    ))
    .context("compile psi_0 pattern")?;
    let phi_re = Regex::new(&format!(
        r"phi_0=\(\s*({NUMBER})\s+({NUMBER})\s+({NUMBER})\s*\)"
    ))
    .context("compile phi_0 pattern")?;
    let alpha_re =
        Regex::new(&format!(r"alpha=\(\s*({NUMBER})\s*\)")).context("compile alpha pattern")?;
    let zeta_re =
        Regex::new(&format!(r"zeta\s*=\(\s*({NUMBER})\s*\)")).context("compile zeta pattern")?;

    let nbins: u32 = nbins_re
        .captures(text)
        .ok_or_else(|| anyhow!("`nbins` not found in RVM fit output"))?[1]
        .parse()
        .context("parse `nbins` value from RVM fit output")?;

    let n_elements = text.matches("alpha=").count();
    if n_elements == 0 {
        return Err(anyhow!("`alpha` not found in RVM fit output"));
    }
    // Half a grid step on a square search grid.
    let grid_err = 180.0 / (n_elements as f64).sqrt() / 2.0;

    Ok(RvmFitRecord {
        nbins,
        chisq: capture_f64(&chisq_re, text, "chisq", 1)?,
        redchisq: capture_f64(&chisq_re, text, "reduced chisq", 2)?,
        psi_0: capture_f64(&psi_re, text, "psi_0", 1)?,
        psi_0_err: (
            capture_f64(&psi_re, text, "psi_0", 2)?,
            capture_f64(&psi_re, text, "psi_0", 3)?,
        ),
        phi_0: capture_f64(&phi_re, text, "phi_0", 1)?,
        phi_0_err: (
            capture_f64(&phi_re, text, "phi_0", 2)?,
            capture_f64(&phi_re, text, "phi_0", 3)?,
        ),
        alpha: capture_f64(&alpha_re, text, "alpha", 1)?,
        alpha_e: grid_err,
        zeta: capture_f64(&zeta_re, text, "zeta", 1)?,
        zeta_e: grid_err,
    })
}

pub fn read_rvm_fit_file(path: &Path) -> Result<RvmFitRecord> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read RVM fit {}", path.display()))?;
    parse_rvm_fit(&text)
}

/// Parse the chi-square map: one `alpha zeta chisq` triple per line, angles
/// in degrees on disk, radians in memory.
pub fn parse_chi_map(text: &str) -> Result<Vec<ChiMapPoint>> {
    let mut points = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let mut next = |label: &str| -> Result<f64> {
            tokens
                .next()
                .ok_or_else(|| anyhow!("chi map line {}: missing {label}", index + 1))?
                .parse()
                .with_context(|| format!("chi map line {}: bad {label}", index + 1))
        };
        let alpha = next("alpha")?.to_radians();
        let zeta = next("zeta")?.to_radians();
        let chisq = next("chisq")?;
        points.push(ChiMapPoint { alpha, zeta, chisq });
    }
    Ok(points)
}

pub fn read_chi_map_file(path: &Path) -> Result<Vec<ChiMapPoint>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read chi map {}", path.display()))?;
    parse_chi_map(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> String {
        let mut text = String::from(
            "\
Grid search finished for nbins  128
chisq= 312.47 reduced chisq= 2.67
psi_0=( -34.56 -1.20 +3.40)
phi_0=( 120.20 -0.80 +0.90)
alpha=( 43.00)
zeta =( 47.50)
",
        );
        for step in 0..8 {
            text.push_str(&format!(
                "alpha=( {}.00) zeta =( {}.00) chisq= 900.12\n",
                step + 1,
                step + 2
            ));
        }
        text
    }

    #[test]
    fn complete_report_parses_every_field() {
        let record = parse_rvm_fit(&sample_report()).unwrap();
        assert_eq!(record.nbins, 128);
        assert_eq!(record.chisq, 312.47);
        assert_eq!(record.redchisq, 2.67);
        assert_eq!(record.psi_0, -34.56);
        assert_eq!(record.psi_0_err, (-1.2, 3.4));
        assert_eq!(record.phi_0, 120.2);
        assert_eq!(record.phi_0_err, (-0.8, 0.9));
        assert_eq!(record.alpha, 43.0);
        assert_eq!(record.zeta, 47.5);
    }

    #[test]
    fn grid_error_is_half_a_step() {
        let report = sample_report();
        let n_elements = report.matches("alpha=").count();
        let record = parse_rvm_fit(&report).unwrap();
        let expected = 180.0 / (n_elements as f64).sqrt() / 2.0;
        assert_eq!(record.alpha_e, expected);
        assert_eq!(record.zeta_e, expected);
    }

    #[test]
    fn missing_chisq_line_is_an_error() {
        let report = sample_report().replace("chisq= 312.47 reduced chisq= 2.67\n", "");
        let err = parse_rvm_fit(&report).unwrap_err();
        assert!(err.to_string().contains("chisq"));
    }

    #[test]
    fn missing_psi_line_is_an_error() {
        let report = sample_report().replace("psi_0=( -34.56 -1.20 +3.40)\n", "");
        let err = parse_rvm_fit(&report).unwrap_err();
        assert!(err.to_string().contains("psi_0"));
    }

    #[test]
    fn chi_map_converts_to_radians() {
        let points = parse_chi_map("90.0 180.0 312.5\n").unwrap();
        assert_eq!(points.len(), 1);
        assert!((points[0].alpha - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((points[0].zeta - std::f64::consts::PI).abs() < 1e-12);
        assert_eq!(points[0].chisq, 312.5);
    }

    #[test]
    fn chi_map_rejects_short_lines() {
        assert!(parse_chi_map("90.0 180.0\n").is_err());
    }

    #[test]
    fn chi_map_skips_blank_lines() {
        let points = parse_chi_map("\n10.0 20.0 1.0\n\n").unwrap();
        assert_eq!(points.len(), 1);
    }
}
