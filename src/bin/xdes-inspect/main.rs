//! Binary entry point for the extent descriptor inspector.
#![forbid(unsafe_code)]

mod config;

use std::collections::BTreeMap;
use std::error::Error;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use xdes::storage::{
    ExtentDescriptor, ExtentPage, FilAddress, ListLinks, PageStatus, XdesPage, PAGES_PER_EXTENT,
};
use xdes::types::{PageNo, XdesError};

use config::{InspectConfig, OutputFormat};

#[derive(Parser, Debug)]
#[command(
    name = "xdes-inspect",
    version,
    about = "Inspect extent descriptors stored in FSP_HDR and XDES pages",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        help = "Output format for structured responses"
    )]
    format: Option<OutputFormat>,

    #[arg(long, global = true, help = "Tablespace page size in bytes")]
    page_size: Option<usize>,

    #[arg(
        long,
        global = true,
        env = "XDES_INSPECT_CONFIG",
        value_name = "FILE",
        help = "Inspector config file (TOML)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "DIRECTIVES",
        help = "Log filter, e.g. xdes=trace (defaults to RUST_LOG, then warn)"
    )]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct PageArgs {
    #[arg(value_name = "TABLESPACE")]
    path: PathBuf,

    #[arg(
        long,
        default_value_t = 0,
        help = "Page number of the FSP_HDR or XDES page"
    )]
    page: u32,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every descriptor entry on the page.
    Entries(PageArgs),
    /// Show per-page status of one extent.
    Bitmap {
        #[command(flatten)]
        target: PageArgs,
        #[arg(long, help = "Index of the entry within the page's descriptor array")]
        extent: usize,
    },
    /// Count extents per state and pages free/used.
    Summary(PageArgs),
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Decode(#[from] XdesError),
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("page {page} lies beyond the end of {path}")]
    PageOutOfRange { page: u32, path: PathBuf },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());
    let config = InspectConfig::load(cli.config.clone())
        .and_then(|c| c.with_overrides(cli.page_size, cli.format))
        .map_err(CliError::from)?;

    match &cli.command {
        Command::Entries(target) => {
            let buf = read_page(target, config.page_size)?;
            let page = XdesPage::new(&buf).map_err(CliError::from)?;
            let report = entries_report(&page);
            emit(config.format, &report, print_entries_text)?;
        }
        Command::Bitmap { target, extent } => {
            let buf = read_page(target, config.page_size)?;
            let page = XdesPage::new(&buf).map_err(CliError::from)?;
            let xdes = page.descriptor(*extent).map_err(CliError::from)?;
            let report = BitmapReport::new(*extent, &xdes);
            emit(config.format, &report, print_bitmap_text)?;
        }
        Command::Summary(target) => {
            let buf = read_page(target, config.page_size)?;
            let page = XdesPage::new(&buf).map_err(CliError::from)?;
            let report = summary_report(&page);
            emit(config.format, &report, print_summary_text)?;
        }
    }
    Ok(())
}

fn init_tracing(directives: Option<&str>) {
    let filter = directives
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}

fn read_page(target: &PageArgs, page_size: usize) -> Result<Vec<u8>, CliError> {
    let io_err = |source: io::Error| CliError::Io {
        path: target.path.clone(),
        source,
    };
    let mut file = File::open(&target.path).map_err(io_err)?;
    let offset = u64::from(target.page) * page_size as u64;
    let len = file.metadata().map_err(io_err)?.len();
    if offset + page_size as u64 > len {
        return Err(CliError::PageOutOfRange {
            page: target.page,
            path: target.path.clone(),
        });
    }
    file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
    let mut buf = vec![0u8; page_size];
    file.read_exact(&mut buf).map_err(io_err)?;
    info!(path = %target.path.display(), page = target.page, page_size, "read page");
    Ok(buf)
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(&T),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(value),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct EntryReport {
    index: usize,
    start_page: PageNo,
    end_page: PageNo,
    state: String,
    fseg_id: u64,
    self_address: FilAddress,
    prev: Option<FilAddress>,
    next: Option<FilAddress>,
    free_pages: usize,
    used_pages: usize,
    bitmap: String,
}

impl From<&ExtentDescriptor> for EntryReport {
    fn from(xdes: &ExtentDescriptor) -> Self {
        Self {
            index: xdes.extent_index(),
            start_page: xdes.start_page(),
            end_page: xdes.end_page(),
            state: xdes.state().to_string(),
            fseg_id: xdes.fseg_id(),
            self_address: xdes.self_address(),
            prev: xdes.prev_address(),
            next: xdes.next_address(),
            free_pages: xdes.free_pages(),
            used_pages: xdes.used_pages(),
            bitmap: hex::encode(xdes.bitmap()),
        }
    }
}

#[derive(Debug, Serialize)]
struct EntryError {
    index: usize,
    error: String,
}

#[derive(Debug, Serialize)]
struct EntriesReport {
    page: u32,
    entries: Vec<EntryReport>,
    errors: Vec<EntryError>,
}

fn entries_report(page: &XdesPage<'_>) -> EntriesReport {
    let mut entries = Vec::with_capacity(page.entry_count());
    let mut errors = Vec::new();
    for (index, decoded) in page.descriptors().enumerate() {
        match decoded {
            Ok(xdes) => entries.push(EntryReport::from(&xdes)),
            Err(err) => {
                warn!(index, error = %err, "skipping undecodable descriptor");
                errors.push(EntryError {
                    index,
                    error: err.to_string(),
                });
            }
        }
    }
    EntriesReport {
        page: page.page_number(),
        entries,
        errors,
    }
}

fn print_entries_text(report: &EntriesReport) {
    println!(
        "{:>5} {:>10} {:>10} {:<12} {:>10} {:>12} {:>12} {:>4} {:>4}",
        "index", "start", "end", "state", "fseg", "prev", "next", "free", "used"
    );
    for e in &report.entries {
        println!(
            "{:>5} {:>10} {:>10} {:<12} {:>10} {:>12} {:>12} {:>4} {:>4}",
            e.index,
            e.start_page,
            e.end_page,
            e.state,
            e.fseg_id,
            format_address(e.prev),
            format_address(e.next),
            e.free_pages,
            e.used_pages
        );
    }
    for err in &report.errors {
        println!("{:>5} error: {}", err.index, err.error);
    }
}

fn format_address(addr: Option<FilAddress>) -> String {
    addr.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string())
}

#[derive(Debug, Serialize)]
struct BitmapReport {
    extent: usize,
    start_page: PageNo,
    state: String,
    bitmap: String,
    free_pages: usize,
    used_pages: usize,
    pages: Vec<PageStatus>,
}

impl BitmapReport {
    fn new(extent: usize, xdes: &ExtentDescriptor) -> Self {
        Self {
            extent,
            start_page: xdes.start_page(),
            state: xdes.state().to_string(),
            bitmap: hex::encode(xdes.bitmap()),
            free_pages: xdes.free_pages(),
            used_pages: xdes.used_pages(),
            pages: xdes.page_statuses().collect(),
        }
    }
}

fn print_bitmap_text(report: &BitmapReport) {
    println!(
        "Extent {} (pages {}-{}) state={} bitmap={}",
        report.extent,
        report.start_page,
        report.start_page + (PAGES_PER_EXTENT - 1) as PageNo,
        report.state,
        report.bitmap
    );
    for status in &report.pages {
        println!(
            "  page {:>10}: {} {}",
            status.page_number,
            if status.free { "free" } else { "used" },
            if status.clean { "clean" } else { "" }
        );
    }
    println!("free={} used={}", report.free_pages, report.used_pages);
}

#[derive(Debug, Default, Serialize)]
struct SummaryReport {
    page: u32,
    kind: u16,
    extents: usize,
    undecodable: usize,
    states: BTreeMap<String, usize>,
    free_pages: usize,
    used_pages: usize,
}

fn summary_report(page: &XdesPage<'_>) -> SummaryReport {
    let mut report = SummaryReport {
        page: page.page_number(),
        kind: page.kind().as_u16(),
        ..SummaryReport::default()
    };
    for decoded in page.descriptors() {
        match decoded {
            Ok(xdes) => {
                report.extents += 1;
                *report.states.entry(xdes.state().name().to_string()).or_default() += 1;
                report.free_pages += xdes.free_pages();
                report.used_pages += xdes.used_pages();
            }
            Err(_) => report.undecodable += 1,
        }
    }
    report
}

fn print_summary_text(report: &SummaryReport) {
    println!(
        "Page {} (type {}): {} extents, {} undecodable",
        report.page, report.kind, report.extents, report.undecodable
    );
    for (state, count) in &report.states {
        println!("  {state:<12} {count}");
    }
    println!("Pages: free={} used={}", report.free_pages, report.used_pages);
}
