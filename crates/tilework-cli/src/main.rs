//! `tilework` - scripted, tile-parallel image processing CLI.
//!
//! Grounded on `vfx-cli/src/main.rs`'s clap-derive + `tracing-subscriber`
//! shape, pared down to the single flat argument surface spec.md §6
//! describes (this engine has one operation — "compile and run a script
//! against an image" — not a per-filter subcommand tree like the teacher's).

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tilework_core::image::Image;
use tilework_engine::prelude::ImageProcessor;
use tilework_pool::{CancellationToken, WorkerPool};
use tilework_script::prelude::{AlgorithmRegistry, Literal};

mod png_io;

#[derive(Parser)]
#[command(name = "tilework")]
#[command(author, version, about = "Scripted, tile-parallel image processing")]
struct Cli {
    /// Path to the input PNG image.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Path to write the output PNG image.
    #[arg(long, default_value = "output.png")]
    output: PathBuf,

    /// Wall-clock timeout, in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Suppress informational logging.
    #[arg(long)]
    quiet: bool,

    /// List registered operations and their parameter sets, then exit.
    #[arg(long)]
    filters: bool,

    /// The script to compile and evaluate, e.g. `var g = input("gray", 8); var t = otsu_threshold(histogram(g))`.
    #[arg(long)]
    expression: Option<String>,

    /// Maximum tile width before the engine splits along x.
    #[arg(long, default_value_t = 512)]
    xcutoff: u32,

    /// Maximum tile height before the engine splits along y.
    #[arg(long, default_value_t = 512)]
    ycutoff: u32,

    /// Worker thread count (0 = use all logical CPUs).
    #[arg(long, default_value_t = 0)]
    threads: usize,
}

fn init_tracing(quiet: bool) {
    let filter = if quiet { "warn" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
}

fn print_filters() {
    let registry = AlgorithmRegistry::with_builtins();
    let mut specs: Vec<_> = registry.iter().collect();
    specs.sort_by_key(|spec| spec.name);
    for spec in specs {
        println!("{} ({})", spec.name, spec.category);
        for param in &spec.params {
            let kinds: Vec<String> = param.admissible.iter().map(|k| k.to_string()).collect();
            println!("  {:<16} {}  [{}]", param.name, param.description, kinds.join("|"));
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.filters {
        print_filters();
        return Ok(());
    }

    let input = cli.input.context("missing required --input")?;
    let expression = cli.expression.context("missing required --expression")?;

    let pool = if cli.threads > 0 {
        WorkerPool::new(cli.threads)
    } else {
        WorkerPool::with_default_parallelism()
    }
    .context("failed to build worker pool")?;

    let processor = Arc::new(ImageProcessor::new(pool));
    processor.add_parameter("cutoff_x", Literal::Int(cli.xcutoff as i64));
    processor.add_parameter("cutoff_y", Literal::Int(cli.ycutoff as i64));

    let compile_id = processor
        .compile(&expression)
        .with_context(|| format!("failed to compile expression: {expression}"))?;

    let image = png_io::read(&input).with_context(|| format!("failed to read input image {}", input.display()))?;

    let cancel = CancellationToken::new();
    let timeout = Duration::from_secs(cli.timeout);
    let timer_cancel = cancel.clone();
    let timer = thread::spawn(move || {
        timer_cancel.park_timeout(timeout);
        timer_cancel.cancel();
    });

    let result = processor.evaluate_convert_if(compile_id, image, &cancel);
    cancel.cancel();
    let _ = timer.join();

    let item = match result {
        Ok(item) => item,
        Err(tilework_core::error::Error::Cancelled) => {
            bail!("timed out after {timeout:?}");
        }
        Err(err) => return Err(err.into()),
    };

    let out_image: Image = item.as_image()?.clone();
    png_io::write(&cli.output, &out_image)
        .with_context(|| format!("failed to write output image {}", cli.output.display()))?;

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet);
    run(cli)
}
