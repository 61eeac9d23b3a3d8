//! # CLI Module
//!
//! Command-line surface over the engine: `scan`, `find-duplicates`,
//! `clean`, `quality`, `stats`, `cluster` and `export`. Exit code is 0
//! on success and 1 on any failure (the binary returns the error).

use crate::core::config::{EngineConfig, StoreBackend};
use crate::core::report::{self, ReportFormat};
use crate::core::types::{
    format_bytes, CleanOptions, DuplicateGroup, QualityLevel, ScanReport, SelectionPolicy,
    DEFAULT_SIMILARITY_THRESHOLD,
};
use crate::core::engine::{CancellationToken, Engine};
use crate::error::Result;
use crate::events::{Event, EventChannel, ProcessEvent, ScanEvent};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

/// Image deduplication and quality assessment engine
#[derive(Parser, Debug)]
#[command(name = "imgdedup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Index file location
    #[arg(long, global = true, default_value = "imgdedup.db")]
    index: PathBuf,

    /// Storage backend for the index
    #[arg(long, global = true, default_value = "bucket")]
    backend: Backend,

    /// Load engine configuration from a JSON file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// Embedded bucketed store (default)
    Bucket,
    /// Embedded SQLite store
    Relational,
    /// In-memory store (discarded on exit)
    Memory,
}

impl From<Backend> for StoreBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Bucket => StoreBackend::Bucket,
            Backend::Relational => StoreBackend::Relational,
            Backend::Memory => StoreBackend::Memory,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Policy {
    HighestQuality,
    HighestResolution,
    BestExposure,
    Oldest,
    Newest,
}

impl From<Policy> for SelectionPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::HighestQuality => SelectionPolicy::HighestQuality,
            Policy::HighestResolution => SelectionPolicy::HighestResolution,
            Policy::BestExposure => SelectionPolicy::BestExposure,
            Policy::Oldest => SelectionPolicy::Oldest,
            Policy::Newest => SelectionPolicy::Newest,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Json,
    Text,
    Html,
}

impl From<ExportFormat> for ReportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => ReportFormat::Json,
            ExportFormat::Text => ReportFormat::Text,
            ExportFormat::Html => ReportFormat::Html,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan directories and index every supported image
    Scan {
        /// Directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Number of worker threads
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// List exact and near duplicate groups from the index
    FindDuplicates {
        /// Similarity threshold for near duplicates (0.0-1.0)
        #[arg(short, long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
        threshold: f64,

        /// Print groups as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Move duplicates aside, keeping the best image of each group
    Clean {
        /// Directory receiving moved duplicates
        #[arg(short, long, default_value = "duplicates")]
        output_dir: PathBuf,

        /// How the kept image is chosen
        #[arg(short, long, default_value = "highest-quality")]
        policy: Policy,

        /// Similarity threshold for the near-duplicate pass
        #[arg(short, long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
        threshold: f64,

        /// Leave duplicates below this quality score in place
        #[arg(long, default_value_t = 0.0)]
        min_quality: f64,

        /// Actually move files (default is a dry run)
        #[arg(long)]
        execute: bool,
    },

    /// Rate the quality of a single image
    Quality {
        /// Image file to analyze
        path: PathBuf,
    },

    /// Show index statistics
    Stats,

    /// Partition the indexed collection into similarity clusters
    Cluster {
        /// Similarity threshold (0.0-1.0)
        #[arg(short, long, default_value_t = 0.7)]
        threshold: f64,
    },

    /// Write a duplicate report for the current index
    Export {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Report format
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// Similarity threshold for near duplicates
        #[arg(short, long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
        threshold: f64,
    },
}

/// Parse arguments and run
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    config.index_path = cli.index.clone();
    config.backend = cli.backend.into();

    match cli.command {
        Commands::Scan { paths, workers } => {
            if let Some(workers) = workers {
                config.num_workers = workers;
            }
            run_scan(config, paths)
        }
        Commands::FindDuplicates { threshold, json } => {
            run_find_duplicates(config, threshold, json)
        }
        Commands::Clean {
            output_dir,
            policy,
            threshold,
            min_quality,
            execute,
        } => run_clean(config, output_dir, policy.into(), threshold, min_quality, execute),
        Commands::Quality { path } => run_quality(config, path),
        Commands::Stats => run_stats(config),
        Commands::Cluster { threshold } => run_cluster(config, threshold),
        Commands::Export {
            output,
            format,
            threshold,
        } => run_export(config, output, format.into(), threshold),
    }
}

fn run_scan(config: EngineConfig, paths: Vec<PathBuf>) -> Result<()> {
    let engine = Engine::new(config)?;
    let cancel = CancellationToken::new();
    let (sender, receiver) = EventChannel::new();

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let report = std::thread::scope(|scope| {
        let engine = &engine;
        let paths = &paths;
        let cancel = &cancel;
        // The sender moves into the worker so the event stream closes
        // when the scan ends
        let handle = scope.spawn(move || engine.scan_folder(paths, cancel, &sender));

        for event in receiver.iter() {
            match event {
                Event::Scan(ScanEvent::FileFound { path }) => {
                    progress.set_message(format!("found {}", path.display()));
                }
                Event::Process(ProcessEvent::Progress(p)) => {
                    progress.set_message(format!(
                        "fingerprinted {}/{} {}",
                        p.completed,
                        p.total,
                        p.current_path.display()
                    ));
                    progress.tick();
                }
                _ => {}
            }
        }

        handle.join().unwrap_or(Err(crate::error::EngineError::Cancelled))
    });
    progress.finish_and_clear();

    let report = report?;
    print_scan_summary(&report);
    engine.close()
}

fn print_scan_summary(report: &ScanReport) {
    println!(
        "{} {} files, {} processed, {} skipped in {:.1}s",
        style("Scan complete:").bold().green(),
        report.total_files,
        report.processed_images,
        report.skipped_files,
        report.scan_duration.as_secs_f64()
    );
}

fn run_find_duplicates(config: EngineConfig, threshold: f64, json: bool) -> Result<()> {
    let engine = Engine::new(config)?;
    let cancel = CancellationToken::new();

    let exact = engine.find_exact(&cancel)?;
    let near = engine.find_near(threshold, &cancel)?;

    if json {
        let all: Vec<&DuplicateGroup> = exact.iter().chain(near.iter()).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&all)
                .map_err(|e| crate::error::EngineError::Config(e.to_string()))?
        );
    } else {
        print_groups("Exact duplicates", &exact);
        print_groups("Near duplicates", &near);
    }
    engine.close()
}

fn print_groups(title: &str, groups: &[DuplicateGroup]) {
    println!("{} ({})", style(title).bold(), groups.len());
    for group in groups {
        println!(
            "  {} main={} duplicates={} confidence={:.2}",
            group.group_id,
            group.main_image_id,
            group.duplicate_ids.len(),
            group.confidence
        );
    }
}

fn run_clean(
    config: EngineConfig,
    output_dir: PathBuf,
    policy: SelectionPolicy,
    threshold: f64,
    min_quality: f64,
    execute: bool,
) -> Result<()> {
    let engine = Engine::new(config)?;
    let options = CleanOptions {
        dry_run: !execute,
        selection_policy: policy,
        min_quality_score: min_quality,
        max_similarity_threshold: threshold,
        move_duplicates: true,
        output_dir,
    };

    let report = engine.clean_duplicates(&options, &CancellationToken::new())?;

    if options.dry_run {
        println!(
            "{} {} groups inspected (dry run; pass --execute to move files)",
            style("Clean planned:").bold().yellow(),
            report.total_processed
        );
    } else {
        println!(
            "{} {} files moved, {} freed, {} errors",
            style("Clean complete:").bold().green(),
            report.moved_files,
            format_bytes(report.freed_space_bytes),
            report.errors.len()
        );
        for error in &report.errors {
            eprintln!("  {error}");
        }
    }
    engine.close()
}

fn run_quality(config: EngineConfig, path: PathBuf) -> Result<()> {
    let engine = Engine::new(config)?;
    let quality = engine.rate_quality(&path)?;
    let level = QualityLevel::from_score(quality.final_score);

    println!("{}", style(path.display()).bold());
    println!("  sharpness:   {:.3}", quality.sharpness);
    println!("  noise:       {:.3}", quality.noise);
    println!("  exposure:    {:.3}", quality.exposure);
    println!("  contrast:    {:.3}", quality.contrast);
    println!("  compression: {:.3}", quality.compression);
    println!("  color cast:  {:.3}", quality.color_cast);
    println!(
        "  final score: {} ({})",
        style(format!("{:.1}", quality.final_score)).bold(),
        level
    );

    let analyzer = engine.analyzer();
    if analyzer.is_blurry(&quality) {
        println!("  {}", style("warning: image appears blurry").yellow());
    }
    if analyzer.is_underexposed(&quality) {
        println!("  {}", style("warning: image appears underexposed").yellow());
    } else if analyzer.is_overexposed(&quality) {
        println!("  {}", style("warning: image appears overexposed").yellow());
    }
    engine.close()
}

fn run_stats(config: EngineConfig) -> Result<()> {
    let engine = Engine::new(config)?;
    let stats = engine.stats()?;

    println!("{}", style("Index statistics").bold());
    println!("  images:          {}", stats.total_images);
    println!("  referenced size: {}", format_bytes(stats.total_size_bytes));
    println!("  average quality: {:.1}", stats.average_quality);
    println!("  index size:      {}", format_bytes(stats.index_size_bytes));
    engine.close()
}

fn run_cluster(config: EngineConfig, threshold: f64) -> Result<()> {
    let engine = Engine::new(config)?;
    let clusters = engine.cluster(threshold)?;

    println!("{} ({})", style("Clusters").bold(), clusters.len());
    for cluster in &clusters {
        println!("  {} images={}", cluster.cluster_id, cluster.images.len());
    }
    engine.close()
}

fn run_export(
    config: EngineConfig,
    output: PathBuf,
    format: ReportFormat,
    threshold: f64,
) -> Result<()> {
    let engine = Engine::new(config)?;
    let cancel = CancellationToken::new();

    let stats = engine.stats()?;
    let exact = engine.find_exact(&cancel)?;
    let near = engine.find_near(threshold, &cancel)?;
    let clusters = engine.cluster(threshold)?;

    let now = chrono::Utc::now();
    let mut groups = exact;
    let exact_count = groups.len();
    let near_count = near.len();
    groups.extend(near);

    let report = ScanReport {
        scan_id: uuid::Uuid::new_v4().to_string(),
        total_files: stats.total_images as usize,
        processed_images: stats.total_images as usize,
        skipped_files: 0,
        exact_duplicate_count: exact_count,
        near_duplicate_count: near_count,
        groups,
        clusters,
        scan_duration: std::time::Duration::ZERO,
        started_at: now,
        completed_at: now,
    };

    report::export(&report, format, &output)?;
    println!(
        "{} {}",
        style("Report written:").bold().green(),
        output.display()
    );
    engine.close()
}
