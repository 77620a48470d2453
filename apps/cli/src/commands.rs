//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use paperscout_core::{
    EnrichedDataset, FilterOptions, KeywordOptions, ModelClient, RunProgress, RunSummary,
    is_conference_paper, normalize_primary, normalize_secondary, run_filter, run_keywords,
    summarize,
};
use paperscout_shared::{
    AppConfig, Venue, config_file_path, init_config, load_config, parse_years, resolve_api_key,
    resolve_data_dir,
};
use paperscout_sources::{AbstractFetcher, CatalogClient, ScholarClient};
use paperscout_storage::{JudgedOutcome, Storage};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// paperscout — aggregate and search security-conference paper metadata.
#[derive(Parser)]
#[command(
    name = "paperscout",
    version,
    about = "Fetch, reconcile, and search conference-paper metadata with cached model judgments.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Venue/year selection shared by most subcommands.
#[derive(Args, Clone)]
pub(crate) struct Selection {
    /// Venue to process: ccs, ndss, sp, or uss (default: all).
    #[arg(long)]
    venue: Option<String>,

    /// Years to process, e.g. "2015,2016,2018-2020" (default: 2015-2024).
    #[arg(long)]
    years: Option<String>,
}

impl Selection {
    fn venues(&self) -> Result<Vec<Venue>> {
        match self.venue.as_deref() {
            Some(v) => Ok(vec![Venue::from_str(v)?]),
            None => Ok(Venue::ALL.to_vec()),
        }
    }

    fn years(&self) -> Vec<u16> {
        parse_years(self.years.as_deref())
    }

    /// Scope strings mixed into run keys so differently-scoped runs keep
    /// separate result files.
    fn scope(&self) -> Vec<String> {
        vec![
            self.venue.clone().unwrap_or_else(|| "all".into()),
            self.years.clone().unwrap_or_else(|| "default".into()),
        ]
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Download yearly paper listings from the primary catalog.
    FetchPrimary {
        #[command(flatten)]
        selection: Selection,
    },

    /// Download yearly paper listings from the scholarly-metadata API.
    FetchSecondary {
        #[command(flatten)]
        selection: Selection,
    },

    /// Merge primary and secondary listings into enriched datasets.
    Enrich {
        #[command(flatten)]
        selection: Selection,
    },

    /// Scrape venue paper pages to fill in still-missing abstracts.
    EnrichMissing {
        #[command(flatten)]
        selection: Selection,
    },

    /// Report abstract coverage per venue and year.
    Stats {
        #[command(flatten)]
        selection: Selection,
    },

    /// Filter papers by relevance to a query using the model.
    Filter {
        /// Search query or topic description.
        #[arg(long)]
        query: String,

        #[command(flatten)]
        selection: Selection,

        /// Persist partial results after every paper for resumability.
        #[arg(long)]
        save_partial: bool,

        /// Re-judge every paper instead of using cached judgments.
        #[arg(long)]
        no_cache: bool,
    },

    /// Extract keywords for every paper and attach them to the datasets.
    Keywords {
        #[command(flatten)]
        selection: Selection,

        /// Persist partial results after every paper for resumability.
        #[arg(long)]
        save_partial: bool,

        /// Re-extract for every paper instead of using cached results.
        #[arg(long)]
        no_cache: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "paperscout=info",
        1 => "paperscout=debug",
        _ => "paperscout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::FetchPrimary { selection } => cmd_fetch_primary(&selection).await,
        Command::FetchSecondary { selection } => cmd_fetch_secondary(&selection).await,
        Command::Enrich { selection } => cmd_enrich(&selection).await,
        Command::EnrichMissing { selection } => cmd_enrich_missing(&selection).await,
        Command::Stats { selection } => cmd_stats(&selection).await,
        Command::Filter {
            query,
            selection,
            save_partial,
            no_cache,
        } => cmd_filter(&query, &selection, save_partial, no_cache).await,
        Command::Keywords {
            selection,
            save_partial,
            no_cache,
        } => cmd_keywords(&selection, save_partial, no_cache).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Data layout
// ---------------------------------------------------------------------------

/// Resolved paths under the configured data directory.
struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    fn resolve(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            root: resolve_data_dir(config)?,
        })
    }

    fn catalog_file(&self, venue: Venue, year: u16) -> PathBuf {
        self.root
            .join("catalog")
            .join(venue.as_str())
            .join(format!("{year}.json"))
    }

    fn scholar_file(&self, venue: Venue, year: u16) -> PathBuf {
        self.root
            .join("scholar")
            .join(venue.as_str())
            .join(format!("{year}.json"))
    }

    fn enriched_file(&self, venue: Venue, year: u16) -> PathBuf {
        self.root
            .join("enriched")
            .join(venue.as_str())
            .join(format!("{year}.jsonl"))
    }

    fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    fn database(&self) -> PathBuf {
        self.root.join("paperscout.db")
    }
}

fn save_raw_listing(path: &Path, entries: &[serde_json::Value]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn load_raw_listing(path: &Path) -> Result<Vec<serde_json::Value>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

// ---------------------------------------------------------------------------
// Fetch commands
// ---------------------------------------------------------------------------

async fn cmd_fetch_primary(selection: &Selection) -> Result<()> {
    let config = load_config()?;
    let paths = DataPaths::resolve(&config)?;
    let client = CatalogClient::new(&config.sources);

    let mut fetched = 0usize;
    let mut failed = 0usize;
    for venue in selection.venues()? {
        for year in selection.years() {
            info!(%venue, year, "fetching primary listing");
            match client.fetch_listing(venue, year).await {
                Ok(entries) => {
                    save_raw_listing(&paths.catalog_file(venue, year), &entries)?;
                    fetched += 1;
                }
                Err(e) => {
                    failed += 1;
                    tracing::error!(%venue, year, error = %e, "primary fetch failed");
                }
            }
            pace(&config).await;
        }
    }

    println!();
    println!("  Primary listings fetched: {fetched}  failed: {failed}");
    println!();
    Ok(())
}

async fn cmd_fetch_secondary(selection: &Selection) -> Result<()> {
    let config = load_config()?;
    let paths = DataPaths::resolve(&config)?;
    let client = ScholarClient::new(&config.sources);

    let mut fetched = 0usize;
    let mut failed = 0usize;
    for venue in selection.venues()? {
        for year in selection.years() {
            info!(%venue, year, "fetching secondary listing");
            match client.fetch_listing(venue, year).await {
                Ok(entries) => {
                    save_raw_listing(&paths.scholar_file(venue, year), &entries)?;
                    fetched += 1;
                }
                Err(e) => {
                    failed += 1;
                    tracing::error!(%venue, year, error = %e, "secondary fetch failed");
                }
            }
            pace(&config).await;
        }
    }

    println!();
    println!("  Secondary listings fetched: {fetched}  failed: {failed}");
    println!();
    Ok(())
}

async fn pace(config: &AppConfig) {
    tokio::time::sleep(std::time::Duration::from_millis(
        config.sources.rate_limit_ms,
    ))
    .await;
}

// ---------------------------------------------------------------------------
// Enrich commands
// ---------------------------------------------------------------------------

async fn cmd_enrich(selection: &Selection) -> Result<()> {
    let config = load_config()?;
    let paths = DataPaths::resolve(&config)?;

    let mut total = 0usize;
    let mut enriched = 0usize;
    let mut skipped_entries = 0usize;

    for venue in selection.venues()? {
        for year in selection.years() {
            let catalog_path = paths.catalog_file(venue, year);
            if !catalog_path.exists() {
                warn!(%venue, year, "no primary listing on disk, skipping");
                continue;
            }

            let mut primary = Vec::new();
            for raw in load_raw_listing(&catalog_path)? {
                if !is_conference_paper(&raw) {
                    continue;
                }
                match normalize_primary(venue, year, &raw) {
                    Ok(record) => primary.push(record),
                    Err(e) => {
                        skipped_entries += 1;
                        warn!(%venue, year, error = %e, "skipping malformed catalog entry");
                    }
                }
            }

            let scholar_path = paths.scholar_file(venue, year);
            let mut secondary = Vec::new();
            if scholar_path.exists() {
                for raw in load_raw_listing(&scholar_path)? {
                    match normalize_secondary(&raw) {
                        Ok(record) => secondary.push(record),
                        Err(e) => {
                            skipped_entries += 1;
                            warn!(%venue, year, error = %e, "skipping malformed scholar entry");
                        }
                    }
                }
            } else {
                warn!(%venue, year, "no secondary listing on disk, merging without abstracts");
            }

            let (dataset, report) = EnrichedDataset::merge(primary, &secondary);
            dataset.persist(&paths.enriched_file(venue, year))?;
            info!(
                %venue,
                year,
                total = report.total,
                enriched = report.enriched,
                "dataset written"
            );
            total += report.total;
            enriched += report.enriched;
        }
    }

    println!();
    println!("  Papers merged:    {total}");
    println!("  With abstract:    {enriched}");
    println!("  Without abstract: {}", total - enriched);
    println!("  Entries skipped:  {skipped_entries}");
    println!();
    Ok(())
}

async fn cmd_enrich_missing(selection: &Selection) -> Result<()> {
    let config = load_config()?;
    let paths = DataPaths::resolve(&config)?;
    let fetcher = AbstractFetcher::new(&config.sources)?;

    let mut missing = 0usize;
    let mut updated = 0usize;
    let mut failed = 0usize;
    let mut no_url = 0usize;

    for venue in selection.venues()? {
        for year in selection.years() {
            let path = paths.enriched_file(venue, year);
            if !path.exists() {
                continue;
            }
            let mut dataset = EnrichedDataset::reload(&path)?;
            let (indices, without_url) = fetchable_missing(&dataset);
            missing += indices.len() + without_url;
            if without_url > 0 {
                no_url += without_url;
                warn!(
                    %venue,
                    year,
                    count = without_url,
                    "records missing an abstract have no page url to scrape"
                );
            }
            if indices.is_empty() {
                continue;
            }

            let bar = progress_bar(indices.len() as u64, &format!("{venue} {year}"));
            let mut dirty = false;
            for i in indices {
                bar.inc(1);
                let Some(url) = dataset.records()[i].url.clone() else {
                    continue;
                };
                fetcher.pace().await;
                match fetcher.fetch_page_info(venue, &url).await {
                    Ok(Some(info)) => {
                        let record = &mut dataset.records_mut()[i];
                        if record.set_abstract_if_absent(info.abstract_text) {
                            updated += 1;
                            dirty = true;
                        }
                        if record.pdf_url.is_none() {
                            record.pdf_url = info.pdf_url;
                        }
                    }
                    Ok(None) => failed += 1,
                    Err(e) => {
                        failed += 1;
                        tracing::error!(%venue, year, url, error = %e, "page fetch failed");
                    }
                }
            }
            bar.finish_and_clear();

            if dirty {
                dataset.persist(&path)?;
                info!(%venue, year, "dataset updated");
            }
        }
    }

    println!();
    println!("  Papers missing abstracts: {missing}");
    println!("  Successfully updated:     {updated}");
    println!("  Failed to update:         {failed}");
    println!("  Without a page URL:       {no_url}");
    println!();
    Ok(())
}

/// Indices of records missing an abstract that have a page URL to scrape,
/// plus a count of those with nowhere to look.
fn fetchable_missing(dataset: &EnrichedDataset) -> (Vec<usize>, usize) {
    let mut fetchable = Vec::new();
    let mut no_url = 0usize;
    for i in dataset.missing_abstract_indices() {
        if dataset.records()[i].url.is_some() {
            fetchable.push(i);
        } else {
            no_url += 1;
        }
    }
    (fetchable, no_url)
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

async fn cmd_stats(selection: &Selection) -> Result<()> {
    let config = load_config()?;
    let paths = DataPaths::resolve(&config)?;

    let records = load_enriched_records(&paths, selection)?;
    if records.is_empty() {
        println!("No enriched datasets found. Run `paperscout enrich` first.");
        return Ok(());
    }

    let report = summarize(&records)?;

    println!();
    println!("=== Missing Abstracts Summary ===");
    println!(
        "{:<6} {:<6} {:<8} {:<8} {:<10}",
        "Conf", "Year", "Missing", "Total", "Percentage"
    );
    println!("{}", "-".repeat(40));
    for row in &report.rows {
        println!(
            "{:<6} {:<6} {:<8} {:<8} {:.1}%",
            row.venue,
            row.year,
            row.missing_abstract,
            row.total,
            row.missing_percentage()
        );
    }
    println!();
    println!(
        "  Total papers: {}  with abstract: {}",
        report.total, report.with_abstract
    );
    println!();
    Ok(())
}

fn load_enriched_records(
    paths: &DataPaths,
    selection: &Selection,
) -> Result<Vec<paperscout_shared::PaperRecord>> {
    let mut records = Vec::new();
    for venue in selection.venues()? {
        for year in selection.years() {
            let path = paths.enriched_file(venue, year);
            if !path.exists() {
                tracing::debug!(%venue, year, "no enriched dataset on disk");
                continue;
            }
            records.extend(EnrichedDataset::reload(&path)?.into_records());
        }
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Model-backed runs
// ---------------------------------------------------------------------------

async fn cmd_filter(
    query: &str,
    selection: &Selection,
    save_partial: bool,
    no_cache: bool,
) -> Result<()> {
    let config = load_config()?;
    let api_key = resolve_api_key(&config)?;
    let paths = DataPaths::resolve(&config)?;

    let candidates = load_enriched_records(&paths, selection)?;
    if candidates.is_empty() {
        return Err(eyre!(
            "no enriched datasets match the selection; run `paperscout enrich` first"
        ));
    }

    let storage = Storage::open(&paths.database()).await?;
    let model = ModelClient::new(&config.model, api_key)?;

    let mut options = FilterOptions::new(query);
    options.scope = selection.scope();
    options.model = config.model.model.clone();
    options.use_cache = !no_cache;
    options.save_partial = save_partial;
    options.flush_interval = config.defaults.partial_flush_interval;

    info!(query, candidates = candidates.len(), "starting relevance filter");
    let reporter = CliProgress::new("Filtering papers");
    let (summary, result_path) = run_filter(
        &candidates,
        &options,
        &model,
        &storage,
        &paths.runs_dir(),
        &reporter,
    )
    .await?;

    println!();
    println!("  Relevance filter complete");
    println!("  Results: {}", result_path.display());
    print_summary(&summary);
    Ok(())
}

async fn cmd_keywords(selection: &Selection, save_partial: bool, no_cache: bool) -> Result<()> {
    let config = load_config()?;
    let api_key = resolve_api_key(&config)?;
    let paths = DataPaths::resolve(&config)?;

    let storage = Storage::open(&paths.database()).await?;
    let model = ModelClient::new(&config.model, api_key)?;

    let mut totals = RunSummary::default();
    let mut datasets = 0usize;

    for venue in selection.venues()? {
        for year in selection.years() {
            let path = paths.enriched_file(venue, year);
            if !path.exists() {
                continue;
            }
            let mut dataset = EnrichedDataset::reload(&path)?;
            if dataset.is_empty() {
                continue;
            }
            datasets += 1;

            let options = KeywordOptions {
                scope: vec![venue.to_string(), year.to_string()],
                model: config.model.model.clone(),
                use_cache: !no_cache,
                save_partial,
                flush_interval: config.defaults.partial_flush_interval,
            };

            info!(%venue, year, papers = dataset.len(), "extracting keywords");
            let reporter = CliProgress::new(&format!("Keywords {venue} {year}"));
            let summary = run_keywords(
                &mut dataset,
                &options,
                &model,
                &storage,
                &paths.runs_dir(),
                &reporter,
            )
            .await?;
            dataset.persist(&path)?;

            totals.processed += summary.processed;
            totals.accepted += summary.accepted;
            totals.errors += summary.errors;
            totals.cache_hits += summary.cache_hits;
            totals.cache_misses += summary.cache_misses;
            totals.skipped += summary.skipped;
            totals.corrupt += summary.corrupt;
        }
    }

    if datasets == 0 {
        return Err(eyre!(
            "no enriched datasets match the selection; run `paperscout enrich` first"
        ));
    }

    println!();
    println!("  Keyword extraction complete ({datasets} datasets)");
    print_summary(&totals);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("  Processed:    {}", summary.processed);
    println!("  Accepted:     {}", summary.accepted);
    println!("  Rejected:     {}", summary.rejected);
    println!("  Errors:       {}", summary.errors);
    println!("  Cache hits:   {}", summary.cache_hits);
    println!("  Cache misses: {}", summary.cache_misses);
    println!("  Skipped:      {}", summary.skipped);
    if summary.corrupt > 0 {
        println!("  Corrupt cache entries recomputed: {}", summary.corrupt);
    }
    println!();
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Created config file: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let path = config_file_path()?;
    println!("# {}", path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

fn progress_bar(len: u64, label: &str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:30.cyan}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(label.to_string());
    bar
}

/// Progress reporter for judgment runs, backed by an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
    label: String,
}

impl CliProgress {
    fn new(label: &str) -> Self {
        let bar = ProgressBar::hidden();
        Self {
            bar,
            label: label.to_string(),
        }
    }
}

impl RunProgress for CliProgress {
    fn begin(&self, total: usize, resumed: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:30.cyan}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        self.bar.set_message(self.label.clone());
        self.bar.set_position(resumed as u64);
        self.bar
            .set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }

    fn judged(&self, title: &str, outcome: &JudgedOutcome) {
        let tag = match outcome {
            JudgedOutcome::Accepted => "+",
            JudgedOutcome::Rejected => "-",
            JudgedOutcome::Error { .. } => "!",
            JudgedOutcome::Extracted { .. } => "*",
        };
        self.bar.set_message(format!("{} {tag} {title}", self.label));
        self.bar.inc(1);
    }

    fn done(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}
