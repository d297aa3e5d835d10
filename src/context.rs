//! The per-invocation run context.
//!
//! A `RunContext` is built once from the `run` arguments and never mutated
//! afterwards, with one exception: the measured rotation measure may be bound
//! once, inside the invocation that discovered it. The context must always be
//! reconstructable into an equivalent `run` command line, because the
//! self-relaunch command in every batch script is exactly that serialization.
use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::cli::RunArgs;

/// Program name used in self-relaunch commands. Batch jobs resolve it via
/// the loaded environment module, not via an absolute path.
pub const RELAUNCH_PROGRAM: &str = "stokespipe";

/// Immutable parameters of one pipeline instance.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub pulsar: String,
    pub obsid: String,
    pub pointing_dir: PathBuf,
    pub begin: Option<u64>,
    pub end: Option<u64>,
    pub freq: Option<f64>,
    pub nbins: u32,
    pub subint: f64,
    pub dm: Option<f64>,
    pub period: Option<f64>,
    pub fold_options: Option<String>,
    pub no_ephemeris: bool,
    pub candidate: bool,
    pub rm: Option<f64>,
    pub rvm_resolution: u32,
    pub loglvl: String,
    pub stop: bool,
}

impl RunContext {
    /// Validate the `run` arguments and build the context.
    ///
    /// Missing required flags are reported one at a time, matching how an
    /// operator fixes them.
    pub fn from_run_args(args: &RunArgs) -> Result<Self> {
        let pointing_dir = args
            .pointing_dir
            .clone()
            .ok_or_else(|| anyhow!("a pointing directory is required (-d)"))?;
        let pulsar = args
            .pulsar
            .clone()
            .ok_or_else(|| anyhow!("a pulsar name is required (-p)"))?;
        let obsid = args
            .obsid
            .clone()
            .ok_or_else(|| anyhow!("an observation ID is required (-o)"))?;
        let nbins = args
            .nbins
            .ok_or_else(|| anyhow!("the number of fold bins is required (-b)"))?;
        if args.candidate && (args.dm.is_none() || args.period.is_none()) {
            return Err(anyhow!(
                "candidate folds need both --dm and --period (no catalogued ephemeris exists)"
            ));
        }

        Ok(Self {
            pulsar,
            obsid,
            pointing_dir,
            begin: args.begin,
            end: args.end,
            freq: args.freq,
            nbins,
            subint: args.subint,
            dm: args.dm,
            period: args.period,
            fold_options: args.fold_options.clone(),
            no_ephemeris: args.no_ephemeris,
            candidate: args.candidate,
            rm: args.rm,
            rvm_resolution: args.rvm_resolution,
            loglvl: args.loglvl.clone(),
            stop: args.stop,
        })
    }

    /// Filename stem shared by every artifact of this pipeline instance.
    pub fn base_name(&self) -> String {
        format!("{}_{}", self.obsid, self.pulsar)
    }

    /// Bind the measured rotation measure. Called at most once, by the
    /// invocation that resolved it.
    pub fn with_measured_rm(mut self, value: f64) -> Self {
        self.rm = Some(value);
        self
    }

    /// Translate the observation window into fold seek/total seconds.
    ///
    /// The obsid is the GPS start second of the observation, so the seek
    /// offset is `begin - obsid` and the window length is inclusive of both
    /// endpoints. A non-numeric obsid yields no seek offset.
    pub fn window_as_seek_total(&self) -> (Option<u64>, Option<u64>) {
        let (Some(begin), Some(end)) = (self.begin, self.end) else {
            return (None, None);
        };
        if end < begin {
            tracing::warn!(begin, end, "observation window ends before it begins, ignoring");
            return (None, None);
        }
        let seek = self
            .obsid
            .parse::<u64>()
            .ok()
            .map(|start| begin.saturating_sub(start));
        (seek, Some(end - begin + 1))
    }

    /// Serialize the context back into `run` flags.
    ///
    /// Defaults are emitted explicitly so the relaunch line is unambiguous
    /// even if defaults change between releases.
    pub fn to_relaunch_args(&self) -> Vec<String> {
        let mut args = vec![
            "--pointing-dir".to_string(),
            self.pointing_dir.display().to_string(),
            "--pulsar".to_string(),
            self.pulsar.clone(),
            "--obsid".to_string(),
            self.obsid.clone(),
            "--nbins".to_string(),
            self.nbins.to_string(),
            "--subint".to_string(),
            self.subint.to_string(),
            "--rvm-resolution".to_string(),
            self.rvm_resolution.to_string(),
            "--loglvl".to_string(),
            self.loglvl.clone(),
        ];
        let mut push_opt = |flag: &str, value: Option<String>| {
            if let Some(value) = value {
                args.push(flag.to_string());
                args.push(value);
            }
        };
        push_opt("--begin", self.begin.map(|v| v.to_string()));
        push_opt("--end", self.end.map(|v| v.to_string()));
        push_opt("--freq", self.freq.map(|v| v.to_string()));
        push_opt("--dm", self.dm.map(|v| v.to_string()));
        push_opt("--period", self.period.map(|v| v.to_string()));
        push_opt("--fold-options", self.fold_options.clone());
        push_opt("--rm", self.rm.map(|v| v.to_string()));
        if self.no_ephemeris {
            args.push("--no-ephemeris".to_string());
        }
        if self.candidate {
            args.push("--candidate".to_string());
        }
        if self.stop {
            args.push("--stop".to_string());
        }
        args
    }

    /// The full self-relaunch shell line appended to batch scripts.
    pub fn relaunch_command(&self) -> String {
        let mut argv = vec![RELAUNCH_PROGRAM.to_string(), "run".to_string()];
        argv.extend(self.to_relaunch_args());
        shell_words::join(argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn sample_context() -> RunContext {
        RunContext {
            pulsar: "J2241-5236".to_string(),
            obsid: "1255444104".to_string(),
            pointing_dir: PathBuf::from("/astro/1255444104/pointings/J2241-5236"),
            begin: Some(1255444112),
            end: Some(1255444711),
            freq: Some(154.24),
            nbins: 128,
            subint: 10.0,
            dm: None,
            period: None,
            fold_options: Some("-nsub 8".to_string()),
            no_ephemeris: false,
            candidate: false,
            rm: None,
            rvm_resolution: 90,
            loglvl: "info".to_string(),
            stop: false,
        }
    }

    fn reparse(context: &RunContext) -> RunContext {
        let mut argv = vec!["run".to_string()];
        argv.extend(context.to_relaunch_args());
        let args = RunArgs::try_parse_from(argv).expect("relaunch args parse");
        RunContext::from_run_args(&args).expect("context rebuilds")
    }

    #[test]
    fn relaunch_args_round_trip() {
        let context = sample_context();
        assert_eq!(reparse(&context), context);
    }

    #[test]
    fn relaunch_args_round_trip_with_flags_set() {
        let mut context = sample_context();
        context.candidate = true;
        context.dm = Some(25.3);
        context.period = Some(0.002_1);
        context.rm = Some(-56.2);
        context.no_ephemeris = true;
        context.stop = true;
        assert_eq!(reparse(&context), context);
    }

    #[test]
    fn relaunch_command_is_a_single_shell_line() {
        let mut context = sample_context();
        context.fold_options = Some("-nsub 8 -j 'zap median'".to_string());
        let line = context.relaunch_command();
        assert!(line.starts_with("stokespipe run "));
        let tokens = shell_words::split(&line).unwrap();
        assert_eq!(tokens[0], "stokespipe");
        assert!(tokens.contains(&"-nsub 8 -j 'zap median'".to_string()));
    }

    #[test]
    fn candidate_without_overrides_is_rejected() {
        let args = RunArgs::try_parse_from([
            "run",
            "--pointing-dir",
            "/tmp/p",
            "--pulsar",
            "cand_0012",
            "--obsid",
            "1255444104",
            "--nbins",
            "64",
            "--candidate",
        ])
        .unwrap();
        assert!(RunContext::from_run_args(&args).is_err());
    }

    #[test]
    fn missing_nbins_is_reported() {
        let args = RunArgs::try_parse_from([
            "run",
            "--pointing-dir",
            "/tmp/p",
            "--pulsar",
            "J0437-4715",
            "--obsid",
            "1255444104",
        ])
        .unwrap();
        let err = RunContext::from_run_args(&args).unwrap_err();
        assert!(err.to_string().contains("-b"));
    }

    #[test]
    fn window_derives_seek_and_inclusive_total() {
        let context = sample_context();
        assert_eq!(context.window_as_seek_total(), (Some(8), Some(600)));
    }

    #[test]
    fn window_without_bounds_is_absent() {
        let mut context = sample_context();
        context.begin = None;
        assert_eq!(context.window_as_seek_total(), (None, None));
    }
}
