//! CLI entry point for the IVF search benchmark.
//!
//! Loads `.fvecs` base and query sets, runs brute-force or IVF search over
//! them, and reports build time, search time, throughput, latency and
//! (given a ground-truth `.ivecs` file) recall.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{
    Args, Parser, Subcommand, ValueEnum,
    builder::styling::{AnsiColor, Effects, Styles},
};
use tracing::Level;

use ivf_search::display::{
    BenchmarkReport, SearchMode, create_cluster_table, create_report_table,
};
use ivf_search::io::ExitCode;
use ivf_search::{
    ClusteringStrategy, IndexError, Settings, VectorSearchEngine, read_fvecs, read_ivecs,
    recall_at_k,
};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Nearest-neighbor search benchmark
#[derive(Parser)]
#[command(
    name = "ivf-search",
    version = env!("CARGO_PKG_VERSION"),
    about = "Brute-force and IVF nearest-neighbor search over .fvecs datasets",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log build and search progress at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Exact search by scanning every base vector
    #[command(
        after_help = "Examples:\n  ivf-search brute --base sift_base.fvecs --query sift_query.fvecs --groundtruth sift_groundtruth.ivecs"
    )]
    Brute {
        #[command(flatten)]
        dataset: DatasetArgs,
    },

    /// Approximate search through a k-means inverted file
    #[command(
        after_help = "Examples:\n  ivf-search ivf --base sift_base.fvecs --query sift_query.fvecs --clusters 64 --probe 8\n  ivf-search ivf --base b.fvecs --query q.fvecs --strategy bisecting --seed 42 --json"
    )]
    Ivf {
        #[command(flatten)]
        dataset: DatasetArgs,

        #[command(flatten)]
        index: IndexArgs,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings, including IVF_ environment overrides")]
    Config,

    /// Write a commented settings file
    #[command(about = "Create .ivf/settings.toml with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
struct DatasetArgs {
    /// Base vectors (.fvecs)
    #[arg(long)]
    base: PathBuf,

    /// Query vectors (.fvecs)
    #[arg(long)]
    query: PathBuf,

    /// Ground-truth neighbor ids (.ivecs); enables recall
    #[arg(long)]
    groundtruth: Option<PathBuf>,

    /// Neighbors per query (overrides config)
    #[arg(short)]
    k: Option<usize>,

    /// Worker threads, 0 for one per CPU (overrides config)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Output the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct IndexArgs {
    /// Clustering strategy
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Clusters to build
    #[arg(long)]
    clusters: Option<usize>,

    /// Clusters probed per query
    #[arg(long)]
    probe: Option<usize>,

    /// Lloyd iteration budget
    #[arg(long)]
    iterations: Option<usize>,

    /// Seed for reproducible builds
    #[arg(long)]
    seed: Option<u64>,

    /// Print a cluster size summary
    #[arg(long)]
    show_clusters: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Lloyd,
    Bisecting,
}

impl From<StrategyArg> for ClusteringStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Lloyd => ClusteringStrategy::Lloyd,
            StrategyArg::Bisecting => ClusteringStrategy::Bisecting,
        }
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::ConfigError.into();
        }
    };

    init_tracing(cli.verbose || settings.debug);

    match run(cli.command, settings) {
        Ok(()) => ExitCode::Success.into(),
        Err(err) => {
            let index_err = err.downcast_ref::<IndexError>();
            let code = index_err.map_or(ExitCode::GeneralError, ExitCode::from_error);
            eprintln!("{}: {err:#}", code.description());
            if let Some(index_err) = index_err {
                for suggestion in index_err.recovery_suggestions() {
                    eprintln!("  - {suggestion}");
                }
            }
            code.into()
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands, mut settings: Settings) -> anyhow::Result<()> {
    match command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(Settings::default_path(), force)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
            Ok(())
        }

        Commands::Config => {
            let rendered =
                toml::to_string_pretty(&settings).context("Failed to render settings")?;
            println!("{rendered}");
            Ok(())
        }

        Commands::Brute { dataset } => {
            apply_dataset_overrides(&mut settings, &dataset);
            benchmark(SearchMode::Brute, &dataset, false, settings)
        }

        Commands::Ivf { dataset, index } => {
            apply_dataset_overrides(&mut settings, &dataset);
            let config = &mut settings.index;
            if let Some(strategy) = index.strategy {
                config.strategy = strategy.into();
            }
            if let Some(clusters) = index.clusters {
                config.num_clusters = clusters;
            }
            if let Some(probe) = index.probe {
                config.candidate_clusters = probe;
            }
            if let Some(iterations) = index.iterations {
                config.max_iterations = iterations;
            }
            if index.seed.is_some() {
                config.random_seed = index.seed;
            }
            benchmark(SearchMode::Ivf, &dataset, index.show_clusters, settings)
        }
    }
}

fn apply_dataset_overrides(settings: &mut Settings, dataset: &DatasetArgs) {
    if let Some(k) = dataset.k {
        settings.index.k = k;
    }
    if let Some(threads) = dataset.threads {
        settings.execution.parallel_threads = threads;
    }
}

fn benchmark(
    mode: SearchMode,
    dataset: &DatasetArgs,
    show_clusters: bool,
    settings: Settings,
) -> anyhow::Result<()> {
    let base = read_fvecs(&dataset.base).map_err(IndexError::from)?;
    let queries = read_fvecs(&dataset.query).map_err(IndexError::from)?;
    let truth = dataset
        .groundtruth
        .as_ref()
        .map(read_ivecs)
        .transpose()
        .map_err(IndexError::from)?;

    let k = settings.index.k;
    let mut engine = VectorSearchEngine::new(base, settings.index, &settings.execution)?;

    if mode == SearchMode::Ivf {
        engine.build()?;
    }

    let start = Instant::now();
    let results = match mode {
        SearchMode::Brute => engine.search_brute_batch(&queries, k)?,
        SearchMode::Ivf => engine.search_ivf_batch(&queries, k)?,
    };
    let search_time = start.elapsed();

    let mut report = BenchmarkReport::new(
        mode,
        engine.threads(),
        engine.vector_count(),
        queries.len(),
        engine.dimension().get(),
        k,
        search_time,
    );
    if let Some(index) = engine.index() {
        report = report.with_index(
            engine.config().candidate_clusters,
            index.stats().clone(),
            index.cluster_sizes(),
        );
    }
    if let Some(truth) = &truth {
        let recall = recall_at_k(engine.store(), &queries, &results, truth, k)?;
        report = report.with_recall(recall);
    }

    if dataset.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", create_report_table(&report));
    if let Some(sizes) = report.cluster_sizes.as_ref().filter(|_| show_clusters) {
        println!("{}", create_cluster_table(sizes));
    }
    Ok(())
}
