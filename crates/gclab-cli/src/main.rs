mod config;

use anyhow::Result;
use clap::Parser;
use gclab_experiments::{Context, dispatch, usage};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::filter::EnvFilter;

use crate::config::{GC_PERCENT_ENV, Overrides, Settings};

#[derive(Parser)]
#[command(name = "gclab", version, about = "Garbage collector experiments")]
struct Cli {
    /// Experiment to run; omit to list them
    experiment: Option<String>,

    /// Configuration file (default: gclab.toml in this or a parent directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Multiply iteration counts, e.g. 0.1 for a quick run
    #[arg(long)]
    scale: Option<f64>,

    /// Run workloads that leave blocked workers behind
    #[arg(long)]
    allow_leaks: bool,

    /// Also print every measurement as a JSON line
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let file = config::load_config(cli.config.as_deref())?;
    let overrides = Overrides {
        scale: cli.scale,
        allow_leaks: cli.allow_leaks,
    };
    let settings = config::resolve(&file, std::env::var(GC_PERCENT_ENV).ok(), &overrides)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    let Some(name) = cli.experiment else {
        usage(&mut out)?;
        return Ok(());
    };

    print_banner(&mut out, &settings)?;

    let mut ctx = Context::with_fresh_heap(&settings.experiments, &mut out);
    let ran = dispatch(&name, &mut ctx)?;

    if ran && cli.json {
        let lines: Vec<String> = ctx
            .records()
            .iter()
            .map(|record| record.to_json().to_string())
            .collect();
        for line in lines {
            writeln!(ctx.out, "{line}")?;
        }
    }
    ctx.out.flush()?;

    Ok(())
}

fn print_banner(out: &mut dyn Write, settings: &Settings) -> io::Result<()> {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    writeln!(out, "gclab {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(
        out,
        "platform: {}/{}, CPUs: {}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        cpus
    )?;
    writeln!(out, "GC percent: {}", settings.tuning_label())?;
    writeln!(out)?;
    Ok(())
}
