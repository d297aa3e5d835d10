//! Terminal stage: summarize the fit, archive the data products, plot.
//!
//! Plotting itself belongs to an external toolkit; this stage validates the
//! records, writes the machine-readable summary, copies everything into the
//! observation's product tree, and optionally hands off to a configured plot
//! command.
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::process::Command;

use crate::artifacts::StageArtifactSet;
use crate::catalog::RmCatalog;
use crate::config::PipelineConfig;
use crate::context::RunContext;
use crate::results::rvm::{self, RvmFitRecord};
use crate::rm::{resolve_rm, RotationMeasureRecord};

/// Machine-readable result of one completed pipeline instance.
#[derive(Debug, Serialize)]
struct PolarimetrySummary<'a> {
    pulsar: &'a str,
    obsid: &'a str,
    centre_freq_mhz: Option<f64>,
    rotation_measure: Option<RotationMeasureRecord>,
    rvm_fit: &'a RvmFitRecord,
    chi_map_samples: usize,
}

/// Run the terminal stage. The RVM record has already been validated by the
/// caller; everything else is best-effort against whatever exists on disk.
pub fn finalize(
    context: &RunContext,
    config: &PipelineConfig,
    facts: &StageArtifactSet,
    catalog: &dyn RmCatalog,
    rvm_record: &RvmFitRecord,
) -> Result<()> {
    let dir = &context.pointing_dir;

    let chi_map = match &facts.chi_map_file {
        Some(name) => rvm::read_chi_map_file(&dir.join(name))?,
        None => {
            tracing::warn!("no chi map found, summary will carry the fit only");
            Vec::new()
        }
    };
    // Resolved fresh, as everywhere: provenance belongs in the summary.
    let rotation_measure = resolve_rm(dir, facts, &context.pulsar, catalog)?;

    let summary = PolarimetrySummary {
        pulsar: &context.pulsar,
        obsid: &context.obsid,
        centre_freq_mhz: context.freq,
        rotation_measure,
        rvm_fit: rvm_record,
        chi_map_samples: chi_map.len(),
    };
    let summary_name = format!("{}_polarimetry.json", context.base_name());
    let summary_path = dir.join(&summary_name);
    let json = serde_json::to_string_pretty(&summary).context("serialize polarimetry summary")?;
    fs::write(&summary_path, json)
        .with_context(|| format!("write summary {}", summary_path.display()))?;
    tracing::info!(summary = %summary_path.display(), "polarimetry summary written");

    let products_dir = config.data_products_dir(&context.obsid, &context.pulsar);
    copy_products(dir, facts, &summary_name, &products_dir)?;

    if let Some(command) = config.plot_command.as_deref() {
        run_plot_command(command, dir, facts, context)?;
    }

    tracing::info!(
        pulsar = %context.pulsar,
        obsid = %context.obsid,
        products = %products_dir.display(),
        "pipeline complete"
    );
    Ok(())
}

fn copy_products(
    dir: &Path,
    facts: &StageArtifactSet,
    summary_name: &str,
    products_dir: &Path,
) -> Result<()> {
    fs::create_dir_all(products_dir)
        .with_context(|| format!("create product dir {}", products_dir.display()))?;
    let names = [
        facts.folded_archive.as_deref(),
        facts.corrected_archive.as_deref(),
        facts.ascii_archive.as_deref(),
        facts.rmfit_file.as_deref(),
        facts.synthesis_file.as_deref(),
        facts.rvm_fit_file.as_deref(),
        facts.chi_map_file.as_deref(),
        Some(summary_name),
    ];
    for name in names.into_iter().flatten() {
        let source = dir.join(name);
        let dest = products_dir.join(name);
        fs::copy(&source, &dest)
            .with_context(|| format!("copy {} to {}", source.display(), dest.display()))?;
        tracing::debug!(product = name, "data product copied");
    }
    Ok(())
}

/// Invoke the configured external plotting command. A plot failure is logged
/// but never fails the terminal stage; the data products are already safe.
fn run_plot_command(
    command: &str,
    dir: &Path,
    facts: &StageArtifactSet,
    context: &RunContext,
) -> Result<()> {
    let mut argv =
        shell_words::split(command).with_context(|| format!("parse plot command: {command}"))?;
    if argv.is_empty() {
        tracing::warn!("plot command is empty, skipping");
        return Ok(());
    }
    let program = argv.remove(0);
    let mut invocation = Command::new(&program);
    invocation.args(&argv);
    invocation.arg("--label").arg(context.base_name());
    if let Some(name) = &facts.ascii_archive {
        invocation.arg("--ascii").arg(dir.join(name));
    }
    if let Some(name) = &facts.rvm_fit_file {
        invocation.arg("--rvm").arg(dir.join(name));
    }
    if let Some(name) = &facts.chi_map_file {
        invocation.arg("--chi-map").arg(dir.join(name));
    }
    invocation.arg("--out-dir").arg(dir);

    match invocation.status() {
        Ok(status) if status.success() => {
            tracing::info!(command = %program, "plot command finished");
        }
        Ok(status) => {
            tracing::warn!(command = %program, %status, "plot command failed");
        }
        Err(err) => {
            tracing::warn!(command = %program, error = %err, "plot command could not run");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::scan_pointing_dir;
    use crate::catalog::{CatalogRm, RmCatalog};
    use crate::results::rvm::parse_rvm_fit;

    struct NoCatalog;

    impl RmCatalog for NoCatalog {
        fn rotation_measure(&self, _pulsar: &str) -> Result<Option<CatalogRm>> {
            Ok(None)
        }
    }

    const RVM_REPORT: &str = "\
Grid search finished for nbins  128
chisq= 312.47 reduced chisq= 2.67
psi_0=( -34.56 -1.20 +3.40)
phi_0=( 120.20 -0.80 +0.90)
alpha=( 43.00)
zeta =( 47.50)
";

    fn context(dir: &Path) -> RunContext {
        RunContext {
            pulsar: "J2241-5236".to_string(),
            obsid: "1255444104".to_string(),
            pointing_dir: dir.to_path_buf(),
            begin: None,
            end: None,
            freq: None,
            nbins: 128,
            subint: 10.0,
            dm: None,
            period: None,
            fold_options: None,
            no_ephemeris: false,
            candidate: false,
            rm: None,
            rvm_resolution: 90,
            loglvl: "info".to_string(),
            stop: false,
        }
    }

    #[test]
    fn finalize_writes_summary_and_copies_products() {
        let scratch = tempfile::tempdir().unwrap();
        let pointing = scratch.path().join("pointing");
        fs::create_dir_all(&pointing).unwrap();
        let base = "1255444104_J2241-5236";
        fs::write(pointing.join("raw.fits"), b"").unwrap();
        fs::write(pointing.join(format!("{base}_archive.ar")), b"ar").unwrap();
        fs::write(pointing.join(format!("{base}_archive.ar2")), b"ar2").unwrap();
        fs::write(pointing.join(format!("{base}_archive.txt")), b"ascii").unwrap();
        fs::write(
            pointing.join(format!("{base}_rmfit.txt")),
            "Best RM is 40.0 +/- 1.0\n",
        )
        .unwrap();
        fs::write(pointing.join(format!("{base}_RVM_fit.txt")), RVM_REPORT).unwrap();
        fs::write(pointing.join("chi_map.txt"), "10.0 20.0 900.0\n").unwrap();

        let config = PipelineConfig {
            base_product_dir: scratch.path().join("products"),
            ..PipelineConfig::default()
        };

        let context = context(&pointing);
        let facts = scan_pointing_dir(&pointing, &context.obsid, &context.pulsar).unwrap();
        let record = parse_rvm_fit(RVM_REPORT).unwrap();
        finalize(&context, &config, &facts, &NoCatalog, &record).unwrap();

        let summary_path = pointing.join(format!("{base}_polarimetry.json"));
        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&summary_path).unwrap()).unwrap();
        assert_eq!(summary["pulsar"], "J2241-5236");
        assert_eq!(summary["rotation_measure"]["value"], 40.0);
        assert_eq!(summary["rvm_fit"]["nbins"], 128);
        assert_eq!(summary["chi_map_samples"], 1);

        let products = config.data_products_dir(&context.obsid, &context.pulsar);
        assert!(products.join(format!("{base}_archive.ar2")).is_file());
        assert!(products.join(format!("{base}_RVM_fit.txt")).is_file());
        assert!(products.join(format!("{base}_polarimetry.json")).is_file());
    }
}
