//! Dedispersion-plan calculator for low-frequency observations.
//!
//! Closed-form loop: each pass finds the DM at which channel smearing
//! overtakes the current time resolution, picks the DM step that doubles the
//! effective pulse width, then doubles the sampling interval to track the
//! downsampling of incoherent dedispersion.
use serde::Serialize;

/// Minimum pulse period the plan stays sensitive to, in ms.
const MIN_PERIOD_MS: f64 = 20.0;
/// Relative S/N floor used for the effective-width step criterion.
const RELATIVE_SN: f64 = 0.5;
/// Assumed pulse duty cycle.
const DUTY_CYCLE: f64 = 0.1;
/// Dispersion delay constant for MHz/ms units.
const DISPERSION_CONST: f64 = 8.3e6;

/// One row of the plan: a contiguous DM range searched at a single time
/// resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DdPlanStep {
    pub dm_min: f64,
    pub dm_max: f64,
    pub dm_step: f64,
    pub n_steps: u32,
    pub time_res_ms: f64,
}

/// Compute the dedispersion plan for a DM range.
pub fn dd_plan(
    centre_freq_mhz: f64,
    bandwidth_mhz: f64,
    n_freq_chan: u32,
    time_res_ms: f64,
    low_dm: f64,
    high_dm: f64,
) -> Vec<DdPlanStep> {
    let freq_res = bandwidth_mhz / f64::from(n_freq_chan);
    let mut plan = Vec::new();
    let mut previous_dm = low_dm;
    let mut time_res = time_res_ms;
    let mut smear_dm = 0.0;

    while smear_dm < high_dm {
        // DM at which the current time resolution equals the dispersive
        // smearing across one frequency channel.
        smear_dm = 2.0 * time_res * centre_freq_mhz.powi(3) / (DISPERSION_CONST * freq_res);

        let w_int = ((MIN_PERIOD_MS * DUTY_CYCLE).powi(2) + time_res.powi(2)).sqrt();
        let w_eff = MIN_PERIOD_MS
            / (RELATIVE_SN.powi(2) * ((1.0 - w_int / MIN_PERIOD_MS) / (w_int / MIN_PERIOD_MS))
                + 1.0);

        // DM difference that doubles the effective width, rounded to 0.01
        // with a floor of one step.
        let mut dm_step = (w_eff.powi(2) - w_int.powi(2)).sqrt()
            / (DISPERSION_CONST * bandwidth_mhz / centre_freq_mhz.powi(3));
        dm_step = (dm_step * 100.0).round() / 100.0;
        if dm_step == 0.0 {
            dm_step = 0.01;
        }

        if smear_dm > high_dm {
            let n_steps = ((high_dm - previous_dm) / dm_step) as u32;
            plan.push(DdPlanStep {
                dm_min: previous_dm,
                dm_max: high_dm,
                dm_step,
                n_steps,
                time_res_ms: time_res,
            });
            previous_dm = smear_dm;
        } else if smear_dm > previous_dm {
            let n_steps = ((smear_dm - previous_dm) / dm_step) as u32;
            plan.push(DdPlanStep {
                dm_min: previous_dm,
                dm_max: smear_dm,
                dm_step,
                n_steps,
                time_res_ms: time_res,
            });
            previous_dm = smear_dm;
        }

        // Downsample by two per pass to track incoherent dedispersion cost.
        time_res *= 2.0;
    }
    plan
}

/// Render the plan the way operators expect to read it.
pub fn render_plan(plan: &[DdPlanStep]) -> String {
    let mut out = String::from(" low DM | high DM | DeltaDM | Nsteps | Effective time resolution (ms)\n");
    let mut total_steps = 0;
    for step in plan {
        out.push_str(&format!(
            "{:7.1} | {:7.1} | {:7.2} | {:6} | {:7.3}\n",
            step.dm_min, step.dm_max, step.dm_step, step.n_steps, step.time_res_ms
        ));
        total_steps += step.n_steps;
    }
    out.push_str(&format!("Total DM steps required: {total_steps}\n"));
    out
}
