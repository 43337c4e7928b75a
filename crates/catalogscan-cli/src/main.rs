use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;

use catalogscan_core::config_file::{ConfigFile, load_config};
use catalogscan_core::{PdfBackend, PdfMetadata, PdfStatus, VendorType};
use catalogscan_detect::{DetectionResult, SignatureStore, TextExtractor, VendorDetector};
use catalogscan_ingest::{PdfIngestor, find_pdfs};
use catalogscan_pdf_lopdf::LopdfBackend;
use catalogscan_pdf_mupdf::MupdfBackend;
use catalogscan_years::{YearProcessor, decade_summary};

mod output;

use output::ColorMode;

/// Auto-parts catalog scanner - identify catalog vendors and normalize model years
#[derive(Parser, Debug)]
#[command(name = "catalogscan", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read metadata for every PDF in a directory and update the metadata cache
    Ingest {
        /// Directory containing PDF catalogs
        dir: PathBuf,

        /// Only look at the top level of the directory
        #[arg(long)]
        no_recursive: bool,

        /// Ignore cached metadata
        #[arg(long)]
        force: bool,

        /// Write all records and a summary to this JSON file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Identify the vendor of one or more PDF catalogs
    Detect {
        /// PDF files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Ignore cached metadata and detection results
        #[arg(long)]
        force: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Number of documents processed in parallel
        #[arg(long)]
        workers: Option<usize>,

        /// TOML file with vendor signatures (defaults to the built-in set)
        #[arg(long)]
        signatures: Option<PathBuf>,

        /// Pages of text to read per document
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Parse model-year expressions from free text
    Years {
        /// Text containing year expressions, e.g. "Fits 03-08 models"
        text: String,

        /// Vendor whose year framing to try first (depo, yuto, hushan)
        #[arg(long)]
        vendor: Option<String>,

        /// List every individual year and a per-decade breakdown
        #[arg(long)]
        expand: bool,

        /// Merge overlapping and adjacent ranges
        #[arg(long)]
        consolidate: bool,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the loaded vendor signatures
    Signatures {
        /// TOML file with vendor signatures (defaults to the built-in set)
        #[arg(long)]
        signatures: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config();
    let color = ColorMode(!cli.no_color);

    match cli.command {
        Command::Ingest {
            dir,
            no_recursive,
            force,
            export,
        } => {
            let recursive = !no_recursive && config.recursive();
            ingest(&config, dir, recursive, force, export, color).await
        }
        Command::Detect {
            paths,
            force,
            json,
            workers,
            signatures,
            max_pages,
        } => {
            let options = DetectOptions {
                force,
                json,
                workers: workers.unwrap_or_else(|| config.num_workers()).max(1),
                signatures: signatures.or_else(|| config.signatures_path()),
                max_pages: max_pages.unwrap_or_else(|| config.max_pages()),
            };
            detect(&config, paths, options, color).await
        }
        Command::Years {
            text,
            vendor,
            expand,
            consolidate,
            json,
        } => years(&text, vendor.as_deref(), expand, consolidate, json, color),
        Command::Signatures { signatures } => {
            let store = load_signatures(signatures.or_else(|| config.signatures_path()).as_deref());
            let mut stdout = std::io::stdout();
            output::print_signatures(&mut stdout, &store, color)?;
            Ok(())
        }
    }
}

/// Log to stderr. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// MuPDF first, lopdf as the fallback.
fn default_backends() -> Vec<Arc<dyn PdfBackend>> {
    vec![Arc::new(MupdfBackend::new()), Arc::new(LopdfBackend::new())]
}

fn load_signatures(path: Option<&Path>) -> SignatureStore {
    match path {
        Some(path) => SignatureStore::from_path(path),
        None => SignatureStore::defaults(),
    }
}

async fn ingest(
    config: &ConfigFile,
    dir: PathBuf,
    recursive: bool,
    force: bool,
    export: Option<PathBuf>,
    color: ColorMode,
) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }

    let ingestor = Arc::new(PdfIngestor::new(default_backends(), config.cache_path()));
    let spinner = indicatif::ProgressBar::new_spinner();
    spinner.set_message(format!("Ingesting {}...", dir.display()));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let records = {
        let ingestor = ingestor.clone();
        let dir = dir.clone();
        tokio::task::spawn_blocking(move || ingestor.ingest_directory(&dir, recursive, force))
            .await?
    };
    spinner.finish_and_clear();

    let summary = ingestor.summary(&records);
    let mut stdout = std::io::stdout();
    output::print_ingest_summary(&mut stdout, &dir, &records, &summary, color)?;

    if let Some(path) = export {
        ingestor.export_metadata(&path, &records)?;
        writeln!(stdout, "Metadata exported to {}", path.display())?;
    }
    Ok(())
}

struct DetectOptions {
    force: bool,
    json: bool,
    workers: usize,
    signatures: Option<PathBuf>,
    max_pages: usize,
}

#[derive(Serialize)]
struct DetectionRecord<'a> {
    file: &'a Path,
    status: PdfStatus,
    #[serde(flatten)]
    result: &'a DetectionResult,
}

/// Expand directories into the PDFs they contain; plain paths pass through
/// so missing files still get a NOT_FOUND record.
fn collect_inputs(paths: &[PathBuf], recursive: bool) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(find_pdfs(path, recursive)?);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

async fn detect(
    config: &ConfigFile,
    paths: Vec<PathBuf>,
    options: DetectOptions,
    color: ColorMode,
) -> anyhow::Result<()> {
    let files = collect_inputs(&paths, config.recursive())?;
    if files.is_empty() {
        anyhow::bail!("no PDF files found");
    }

    let backends = default_backends();
    let ingestor = Arc::new(PdfIngestor::new(backends.clone(), config.cache_path()));
    let store = Arc::new(load_signatures(options.signatures.as_deref()));
    let detector = Arc::new(
        VendorDetector::new(store, TextExtractor::new(backends))
            .with_max_pages(options.max_pages)
            .with_page_analysis_pages(config.page_analysis_pages()),
    );
    tracing::info!(
        files = files.len(),
        workers = options.workers,
        signatures = detector.signatures().signature_count(),
        "starting detection"
    );

    let bar = indicatif::ProgressBar::new(files.len() as u64);
    bar.set_style(
        indicatif::ProgressStyle::with_template(
            "{spinner:.green} {msg} [{bar:40.green/dim}] {pos}/{len} (eta {eta})",
        )?
        .progress_chars("=> "),
    );
    bar.set_message("Detecting vendors");
    if options.json {
        bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let semaphore = Arc::new(Semaphore::new(options.workers));
    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let permit = semaphore.clone().acquire_owned().await?;
        let ingestor = ingestor.clone();
        let detector = detector.clone();
        let bar = bar.clone();
        let force = options.force;
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let metadata = ingestor.ingest_file(&path, force);
            let result = detector.detect_vendor(&metadata, force);
            bar.inc(1);
            (metadata, result)
        }));
    }

    let mut outcomes: Vec<(PdfMetadata, DetectionResult)> = Vec::with_capacity(handles.len());
    for handle in handles {
        outcomes.push(handle.await?);
    }
    bar.finish_and_clear();

    if let Err(e) = ingestor.save_cache() {
        tracing::warn!(error = %e, "could not save metadata cache");
    }

    let mut stdout = std::io::stdout();
    if options.json {
        let records: Vec<DetectionRecord<'_>> = outcomes
            .iter()
            .map(|(metadata, result)| DetectionRecord {
                file: &metadata.file_path,
                status: metadata.status,
                result,
            })
            .collect();
        serde_json::to_writer_pretty(&mut stdout, &records)?;
        writeln!(stdout)?;
        return Ok(());
    }

    for (metadata, result) in &outcomes {
        output::print_detection(&mut stdout, metadata, result, color)?;
    }
    output::print_detection_stats(&mut stdout, &detector.detection_stats(), color)?;
    Ok(())
}

#[derive(Serialize)]
struct YearsReport<'a> {
    text: &'a str,
    vendor: Option<VendorType>,
    ranges: Vec<catalogscan_years::YearRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    years: Option<Vec<i32>>,
}

fn years(
    text: &str,
    vendor: Option<&str>,
    expand: bool,
    consolidate: bool,
    json: bool,
    color: ColorMode,
) -> anyhow::Result<()> {
    let vendor = vendor.map(str::parse::<VendorType>).transpose()?;
    let processor = YearProcessor::new();

    let mut ranges = processor.extract_years_from_text(text, vendor);
    if consolidate {
        ranges = processor.consolidate_ranges(&ranges);
    }
    let expanded = expand.then(|| processor.expand_all_years(text, vendor));

    let mut stdout = std::io::stdout();
    if json {
        let report = YearsReport {
            text,
            vendor,
            ranges,
            years: expanded,
        };
        serde_json::to_writer_pretty(&mut stdout, &report)?;
        writeln!(stdout)?;
        return Ok(());
    }

    output::print_year_ranges(&mut stdout, text, &ranges, color)?;
    if let Some(years) = expanded {
        output::print_expanded_years(&mut stdout, &years, &decade_summary(&years), color)?;
    }
    Ok(())
}
