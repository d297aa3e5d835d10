//! CLI argument parsing for the pipeline driver.
//!
//! The CLI is intentionally thin: `run` maps one-to-one onto a single
//! pipeline invocation, so a batch job can re-enter the pipeline with the
//! exact flag set it was launched with.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "stokespipe",
    version,
    about = "Artifact-driven Stokes polarimetry pipeline driver",
    after_help = "Commands:\n  run     Advance the pipeline by one stage for a pointing directory\n  ddplan  Calculate a dedispersion plan for a low-frequency observation\n\nExamples:\n  stokespipe run -d /astro/1255444104/pointings/J2241-5236 -p J2241-5236 -o 1255444104 -b 128\n  stokespipe run -d . -p cand_0012 -o 1255444104 -b 64 --candidate --dm 25.3 --period 0.0021\n  stokespipe ddplan -f 184.96 --low-dm 1 --high-dm 250",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Ddplan(DdplanArgs),
}

/// One pipeline invocation: inspect the pointing directory, decide the next
/// stage, and dispatch it.
///
/// Required flags are validated by hand rather than by clap so a missing
/// argument exits 1 like every other unrecoverable pipeline condition.
#[derive(Parser, Debug, Clone)]
#[command(about = "Advance the polarimetry pipeline by one stage")]
pub struct RunArgs {
    /// Pointing directory containing the raw data products
    #[arg(short = 'd', long, value_name = "DIR")]
    pub pointing_dir: Option<PathBuf>,

    /// Name of the pulsar (or candidate label) to fold on
    #[arg(short = 'p', long, value_name = "NAME")]
    pub pulsar: Option<String>,

    /// Observation ID (GPS start second of the observation)
    #[arg(short = 'o', long, value_name = "OBSID")]
    pub obsid: Option<String>,

    /// Number of phase bins to fold the profile with
    #[arg(short = 'b', long, value_name = "N")]
    pub nbins: Option<u32>,

    /// Length of each sub-integration in seconds
    #[arg(short = 's', long, value_name = "SECONDS", default_value_t = 10.0)]
    pub subint: f64,

    /// First GPS second of the observation window to fold
    #[arg(long, value_name = "GPS")]
    pub begin: Option<u64>,

    /// Last GPS second of the observation window to fold
    #[arg(long, value_name = "GPS")]
    pub end: Option<u64>,

    /// Centre frequency of the observation in MHz
    #[arg(short = 'f', long, value_name = "MHZ")]
    pub freq: Option<f64>,

    /// Dispersion measure override for candidate folds (pc cm^-3)
    #[arg(long, value_name = "DM")]
    pub dm: Option<f64>,

    /// Folding period override for candidate folds (seconds)
    #[arg(long, value_name = "SECONDS")]
    pub period: Option<f64>,

    /// Extra options appended verbatim to the fold command
    #[arg(long, value_name = "OPTS", allow_hyphen_values = true)]
    pub fold_options: Option<String>,

    /// Skip the ephemeris-generation step
    #[arg(long)]
    pub no_ephemeris: bool,

    /// Target is a search candidate rather than a catalogued pulsar
    #[arg(long)]
    pub candidate: bool,

    /// Already-known rotation measure in rad m^-2
    #[arg(long, value_name = "RM", allow_negative_numbers = true)]
    pub rm: Option<f64>,

    /// Grid points per axis for the RVM chi-square search
    #[arg(long, value_name = "N", default_value_t = 90)]
    pub rvm_resolution: u32,

    /// Logger verbosity (error, warn, info, debug, trace)
    #[arg(short = 'L', long, value_name = "LEVEL", default_value = "info")]
    pub loglvl: String,

    /// Stop after the current stage instead of relaunching the pipeline
    #[arg(short = 'S', long)]
    pub stop: bool,
}

/// Dedispersion-plan calculator for low-frequency observations.
#[derive(Parser, Debug, Clone)]
#[command(about = "Calculate a dedispersion plan")]
pub struct DdplanArgs {
    /// Centre frequency of the observation in MHz
    #[arg(short = 'f', long, value_name = "MHZ", default_value_t = 150.0)]
    pub centre_freq: f64,

    /// Bandwidth of the observation in MHz
    #[arg(short = 'b', long, value_name = "MHZ", default_value_t = 30.72)]
    pub bandwidth: f64,

    /// Number of frequency channels
    #[arg(long, value_name = "N", default_value_t = 3072)]
    pub nfreqchan: u32,

    /// Time resolution in ms
    #[arg(short = 't', long, value_name = "MS", default_value_t = 0.1)]
    pub timeres: f64,

    /// Lowest DM of the required range
    #[arg(long, value_name = "DM", default_value_t = 1.0)]
    pub low_dm: f64,

    /// Highest DM of the required range
    #[arg(long, value_name = "DM", default_value_t = 250.0)]
    pub high_dm: f64,
}
