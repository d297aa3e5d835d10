use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use stokespipe::catalog::HttpCatalog;
use stokespipe::cli::{Command, DdplanArgs, RootArgs, RunArgs};
use stokespipe::config::load_config;
use stokespipe::context::RunContext;
use stokespipe::ddplan::{dd_plan, render_plan};
use stokespipe::dispatch::SlurmDispatcher;
use stokespipe::pipeline::{self, Outcome};

fn main() {
    let cli = RootArgs::parse();
    init_logging(&cli);

    let result = match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Ddplan(args) => cmd_ddplan(args),
    };
    if let Err(err) = result {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over the CLI level so operators can turn single targets
/// up without editing batch scripts.
fn init_logging(cli: &RootArgs) {
    let level = match &cli.command {
        Command::Run(args) => args.loglvl.as_str(),
        Command::Ddplan(_) => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let context = RunContext::from_run_args(&args)?;
    let config = load_config(None)?;
    let catalog = HttpCatalog::new(config.catalog_url.clone());
    let outcome = pipeline::run_invocation(&context, &config, &catalog, &SlurmDispatcher)?;
    match outcome {
        Outcome::Submitted { job_name } => {
            println!("Submitted {job_name}; the pipeline resumes when it completes.");
        }
        Outcome::Finalized => {
            println!(
                "Pipeline complete for {} in observation {}.",
                context.pulsar, context.obsid
            );
        }
    }
    Ok(())
}

fn cmd_ddplan(args: DdplanArgs) -> Result<()> {
    let plan = dd_plan(
        args.centre_freq,
        args.bandwidth,
        args.nfreqchan,
        args.timeres,
        args.low_dm,
        args.high_dm,
    );
    print!("{}", render_plan(&plan));
    Ok(())
}
