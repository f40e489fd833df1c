use anatomist::path_util::canonical_path;
use anatomist::{analyze, scan, Analysis};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use common::config::Config;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pytest-incremental")]
#[command(about = "File-level dependency tracking for incremental test runs", long_about = None)]
struct Cli {
    /// JSON config file (defaults apply when omitted).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Package directory or source file to track (multi-allowed).
    #[arg(long = "watch", short = 'w')]
    watch: Vec<PathBuf>,
    /// Test files or directories holding tests.
    tests: Vec<PathBuf>,
    /// Show paths relative to this directory (default: config `base_dir`,
    /// then the current directory).
    #[arg(long)]
    base: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the direct-dependency map as JSON.
    Deps {
        #[command(flatten)]
        inputs: Inputs,
        /// Output file (stdout when omitted).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print every tracked module with its full dependency closure.
    PrintDeps {
        #[command(flatten)]
        inputs: Inputs,
    },
    /// Write the import graph in DOT format.
    Graph {
        #[command(flatten)]
        inputs: Inputs,
        /// Output file (stdout when omitted).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print tracked modules with dependencies before their dependents.
    Order {
        #[command(flatten)]
        inputs: Inputs,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match &cli.command {
        Commands::Deps { inputs, output } => cmd_deps(inputs, &cfg, output.as_deref())?,
        Commands::PrintDeps { inputs } => cmd_print_deps(inputs, &cfg)?,
        Commands::Graph { inputs, output } => cmd_graph(inputs, &cfg, output.as_deref())?,
        Commands::Order { inputs } => cmd_order(inputs, &cfg)?,
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// shared
// ---------------------------------------------------------------------------

fn run_analysis(inputs: &Inputs, cfg: &Config) -> anyhow::Result<Analysis> {
    if inputs.watch.is_empty() && inputs.tests.is_empty() {
        anyhow::bail!("nothing to analyse: pass --watch <PATH> and/or test paths");
    }
    let files = scan::discover(&inputs.watch, &inputs.tests, cfg)?;
    if files.tracked.is_empty() {
        tracing::warn!("no source files found under the given paths");
    }
    let analysis = analyze(&files.tracked, &files.tests, cfg)?;
    Ok(analysis)
}

fn base_dir(inputs: &Inputs, cfg: &Config) -> anyhow::Result<PathBuf> {
    let base = match inputs.base.as_ref().or(cfg.base_dir.as_ref()) {
        Some(base) => base.clone(),
        None => std::env::current_dir().context("reading current directory")?,
    };
    Ok(canonical_path(&base)?)
}

fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

// ---------------------------------------------------------------------------
// deps
// ---------------------------------------------------------------------------

fn cmd_deps(inputs: &Inputs, cfg: &Config, output: Option<&Path>) -> anyhow::Result<()> {
    let analysis = run_analysis(inputs, cfg)?;
    let mut out = open_output(output)?;
    serde_json::to_writer_pretty(&mut out, &analysis.deps)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// print-deps
// ---------------------------------------------------------------------------

fn cmd_print_deps(inputs: &Inputs, cfg: &Config) -> anyhow::Result<()> {
    let analysis = run_analysis(inputs, cfg)?;
    let base = base_dir(inputs, cfg)?;
    let mut out = open_output(None)?;
    for line in analysis.describe_all(Some(&base)) {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// graph
// ---------------------------------------------------------------------------

fn cmd_graph(inputs: &Inputs, cfg: &Config, output: Option<&Path>) -> anyhow::Result<()> {
    let analysis = run_analysis(inputs, cfg)?;
    let out = open_output(output)?;
    analysis.write_dot(out).context("writing DOT output")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// order
// ---------------------------------------------------------------------------

fn cmd_order(inputs: &Inputs, cfg: &Config) -> anyhow::Result<()> {
    let analysis = run_analysis(inputs, cfg)?;
    let base = base_dir(inputs, cfg)?;
    let mut out = open_output(None)?;
    for name in analysis.order() {
        writeln!(out, "{}", common::paths::display_relative(name, Some(&base)))?;
    }
    out.flush()?;
    Ok(())
}
