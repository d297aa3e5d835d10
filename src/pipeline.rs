//! One pipeline invocation: scan, decide, build, dispatch.
//!
//! There is no loop across stages here. The chosen stage's batch job ends
//! with a self-relaunch command, so the cluster's own job completion is the
//! pipeline's continuation mechanism.
use anyhow::{anyhow, bail, Context, Result};

use crate::artifacts::{scan_pointing_dir, StageArtifactSet};
use crate::catalog::RmCatalog;
use crate::commands::fold::FoldCommands;
use crate::commands::rm::{RmCorrectionCommands, RmFitCommands, RmSynthesisCommands};
use crate::commands::rvm::RvmFitCommands;
use crate::config::PipelineConfig;
use crate::context::RunContext;
use crate::decision::{next_stage, StageDecision};
use crate::dispatch::{JobDispatcher, JobRequest, ResourceProfile};
use crate::products;
use crate::results::rvm;
use crate::rm::resolve_rm;

/// Wall-time limit for the fold + RM-fit job.
pub const FOLD_TIME_LIMIT: &str = "08:00:00";
/// Wall-time limit for the correction + RVM-fit job.
pub const RM_RVM_TIME_LIMIT: &str = "02:00:00";

/// What a single invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The next stage was handed to the scheduler.
    Submitted { job_name: String },
    /// All products exist and the terminal stage completed; nothing was
    /// submitted and nothing will relaunch.
    Finalized,
}

/// Run one invocation against the pointing directory.
pub fn run_invocation(
    context: &RunContext,
    config: &PipelineConfig,
    catalog: &dyn RmCatalog,
    dispatcher: &dyn JobDispatcher,
) -> Result<Outcome> {
    let facts = scan_pointing_dir(&context.pointing_dir, &context.obsid, &context.pulsar)?;
    let decision = next_stage(&facts);
    tracing::info!(
        pulsar = %context.pulsar,
        obsid = %context.obsid,
        ?decision,
        "stage decision"
    );

    match decision {
        StageDecision::Fold { ipfb } => submit_fold_stage(context, config, &facts, ipfb, dispatcher),
        StageDecision::RmCorrectAndRvm => {
            submit_correction_stage(context, config, &facts, catalog, dispatcher)
        }
        StageDecision::PlotAndTerminate => {
            finalize_or_refit(context, config, &facts, catalog, dispatcher)
        }
        StageDecision::NoInputData => bail!(
            "no raw fits or header files for {} in {}",
            context.pulsar,
            context.pointing_dir.display()
        ),
        StageDecision::Inconsistent => {
            let dump = serde_json::to_string_pretty(&facts).context("serialize artifact facts")?;
            tracing::error!(
                "artifact state in {} matches no pipeline stage, operator intervention needed:\n{dump}",
                context.pointing_dir.display()
            );
            bail!(
                "inconsistent artifact state in {}",
                context.pointing_dir.display()
            );
        }
    }
}

fn submit_fold_stage(
    context: &RunContext,
    config: &PipelineConfig,
    facts: &StageArtifactSet,
    ipfb: bool,
    dispatcher: &dyn JobDispatcher,
) -> Result<Outcome> {
    let (seek, total) = context.window_as_seek_total();
    let fold = FoldCommands {
        pulsar: &context.pulsar,
        obsid: &context.obsid,
        pointing_dir: &context.pointing_dir,
        nbins: context.nbins,
        subint: context.subint,
        seek,
        total,
        dm: context.dm,
        period: context.period,
        fold_options: context.fold_options.as_deref(),
        no_ephemeris: context.no_ephemeris,
        header_files: if ipfb { facts.header_files.as_slice() } else { &[] },
    };
    let archive = fold.out_base();

    let mut commands = Vec::new();
    fold.append_to(&mut commands)?;
    RmFitCommands {
        archive: &archive,
        pointing_dir: &context.pointing_dir,
        obsid: &context.obsid,
        pulsar: &context.pulsar,
        out_name: None,
    }
    .append_to(&mut commands)?;
    RmSynthesisCommands {
        archive: &archive,
        pointing_dir: &context.pointing_dir,
        obsid: &context.obsid,
        pulsar: &context.pulsar,
        write_output: true,
        plot: false,
        keep_flux: false,
        out_name: None,
    }
    .append_to(&mut commands)?;
    append_relaunch(context, &mut commands);

    let request = JobRequest {
        name: format!("fold_rm_{}_{}", context.pulsar, context.obsid),
        commands,
        batch_dir: config.batch_dir(&context.obsid),
        resources: ResourceProfile::with_time(FOLD_TIME_LIMIT),
        modules: vec![
            config.modules.dspsr.clone(),
            config.modules.psrchive.clone(),
        ],
        must_submit: true,
    };
    dispatch(dispatcher, request)
}

fn submit_correction_stage(
    context: &RunContext,
    config: &PipelineConfig,
    facts: &StageArtifactSet,
    catalog: &dyn RmCatalog,
    dispatcher: &dyn JobDispatcher,
) -> Result<Outcome> {
    let archive = facts.folded_archive.clone().ok_or_else(|| {
        anyhow!(
            "no folded archive to correct in {}",
            context.pointing_dir.display()
        )
    })?;

    // The relaunch line is built from the pristine context: the next
    // invocation re-resolves the RM from the directory, it is never cached
    // across stages.
    let relaunch = (!context.stop).then(|| context.relaunch_command());

    let rm_value = match context.rm {
        Some(value) => {
            tracing::info!(rm = value, "using operator-supplied rotation measure");
            value
        }
        None => {
            let record = resolve_rm(&context.pointing_dir, facts, &context.pulsar, catalog)?
                .ok_or_else(|| {
                    anyhow!(
                        "no rotation measure for {} from synthesis, rmfit, or the catalog",
                        context.pulsar
                    )
                })?;
            tracing::info!(
                rm = record.value,
                uncertainty = record.uncertainty,
                provenance = ?record.provenance,
                "rotation measure resolved"
            );
            record.value
        }
    };
    let context = context.clone().with_measured_rm(rm_value);

    let mut commands = Vec::new();
    RmCorrectionCommands {
        archive: &archive,
        pointing_dir: &context.pointing_dir,
        rm: context.rm,
        ascii_out: None,
    }
    .append_to(&mut commands)?;
    RvmFitCommands {
        archive: &archive,
        pointing_dir: &context.pointing_dir,
        obsid: &context.obsid,
        pulsar: &context.pulsar,
        resolution: context.rvm_resolution,
    }
    .append_to(&mut commands)?;
    if let Some(line) = relaunch {
        commands.push(line);
    }

    let request = JobRequest {
        name: format!("rm_rvm_{}_{}", context.pulsar, context.obsid),
        commands,
        batch_dir: config.batch_dir(&context.obsid),
        resources: ResourceProfile::with_time(RM_RVM_TIME_LIMIT),
        modules: vec![
            config.modules.psrchive.clone(),
            config.modules.psrsalsa.clone(),
        ],
        must_submit: true,
    };
    dispatch(dispatcher, request)
}

/// Terminal stage. An unusable RVM fit report is not fatal: the fit is
/// treated as absent and the correction stage is re-submitted.
fn finalize_or_refit(
    context: &RunContext,
    config: &PipelineConfig,
    facts: &StageArtifactSet,
    catalog: &dyn RmCatalog,
    dispatcher: &dyn JobDispatcher,
) -> Result<Outcome> {
    let report_name = facts
        .rvm_fit_file
        .as_deref()
        .ok_or_else(|| anyhow!("terminal stage reached without an RVM fit report"))?;
    match rvm::read_rvm_fit_file(&context.pointing_dir.join(report_name)) {
        Ok(record) => {
            products::finalize(context, config, facts, catalog, &record)?;
            Ok(Outcome::Finalized)
        }
        Err(err) => {
            tracing::warn!(error = %err, "RVM fit report unusable, re-running the fit stage");
            submit_correction_stage(context, config, facts, catalog, dispatcher)
        }
    }
}

fn append_relaunch(context: &RunContext, commands: &mut Vec<String>) {
    if context.stop {
        tracing::info!("stop flag set, pipeline will not relaunch after this stage");
        return;
    }
    commands.push(context.relaunch_command());
}

fn dispatch(dispatcher: &dyn JobDispatcher, request: JobRequest) -> Result<Outcome> {
    let handle = dispatcher.submit(&request)?;
    tracing::info!(
        job = %request.name,
        script = %handle.script_path.display(),
        "stage dispatched"
    );
    Ok(Outcome::Submitted {
        job_name: request.name,
    })
}
