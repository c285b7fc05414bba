use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use faunadex_core::archive::{
    ArticleSource, open_archive, read_wiki_path, wiki_path_exists,
};
use faunadex_core::extract::{extract_all, write_extracted};
use faunadex_core::fish::FishReport;
use faunadex_core::html::{WIKI_PREFIX, page_title};
use faunadex_core::index::{
    IndexStats, build_species_index, index_stats, load_species_index, write_species_index,
};
use faunadex_core::pages::export_pages;
use faunadex_core::runtime::{
    InitOptions, PathOverrides, ResolutionContext, ResolvedPaths, init_layout, inspect_runtime,
    resolve_paths,
};
use tracing_subscriber::EnvFilter;

const MISSING_LISTED: usize = 20;

#[derive(Debug, Parser)]
#[command(
    name = "faunadex",
    version,
    about = "Build a US wildlife species index from an offline Wikipedia dump"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH", help = ".zim file, dump directory, or .zip of one")]
    archive: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    scrape_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Log more (-v info, -vv debug)")]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    project_root: Option<PathBuf>,
    config: Option<PathBuf>,
    archive: Option<PathBuf>,
    scrape_dir: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            project_root: cli.project_root.clone(),
            config: cli.config.clone(),
            archive: cli.archive.clone(),
            scrape_dir: cli.scrape_dir.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    Init(InitArgs),
    Status,
    Index(IndexArgs),
    #[command(about = "Look up one archive entry")]
    Article(ArticleArgs),
    #[command(about = "Export each indexed species' article HTML")]
    Pages,
    #[command(about = "Extract binomial, conservation status and names from exported pages")]
    Extract,
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing .faunadex/config.toml")]
    force: bool,
}

#[derive(Debug, Args)]
struct IndexArgs {
    #[command(subcommand)]
    command: IndexSubcommand,
}

#[derive(Debug, Subcommand)]
enum IndexSubcommand {
    #[command(about = "Build species_index.json from the archive")]
    Build,
    #[command(about = "Summarize the stored species index")]
    Stats {
        #[arg(long, help = "Print stats as JSON")]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct ArticleArgs {
    #[arg(value_name = "PATH", help = "Archive path (A/Foo) or wiki path (/wiki/Foo)")]
    path: String,
    #[arg(long, help = "Print the page title")]
    title: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Init(args)) => run_init(&runtime, args),
        Some(Commands::Status) => run_status(&runtime),
        Some(Commands::Index(IndexArgs { command })) => match command {
            IndexSubcommand::Build => run_index_build(&runtime),
            IndexSubcommand::Stats { json } => run_index_stats(&runtime, json),
        },
        Some(Commands::Article(args)) => run_article(&runtime, args),
        Some(Commands::Pages) => run_pages(&runtime),
        Some(Commands::Extract) => run_extract(&runtime),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let report = init_layout(&paths, &InitOptions { force: args.force })?;

    println!("Initialized faunadex layout");
    println!("project_root: {}", normalize_path(&paths.project_root));
    println!("state_dir: {}", normalize_path(&paths.state_dir));
    println!("config_path: {}", normalize_path(&paths.config_path));
    println!("scrape_dir: {}", normalize_path(&paths.scrape_dir));
    println!("pages_dir: {}", normalize_path(&paths.pages_dir));
    println!("created_dirs: {}", report.created_dirs.len());
    println!("wrote_config: {}", report.wrote_config);
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_status(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let status = inspect_runtime(&paths)?;

    println!("runtime status");
    println!("project_root: {}", normalize_path(&paths.project_root));
    println!(
        "project_root_exists: {}",
        format_flag(status.project_root_exists)
    );
    println!("state_dir_exists: {}", format_flag(status.state_dir_exists));
    println!("config_exists: {}", format_flag(status.config_exists));
    println!(
        "archive: {}",
        paths
            .archive_path
            .as_deref()
            .map(normalize_path)
            .unwrap_or_else(|| "<unset>".to_string())
    );
    println!("archive_exists: {}", format_flag(status.archive_exists));
    println!("scrape_dir_exists: {}", format_flag(status.scrape_dir_exists));
    println!("index_exists: {}", format_flag(status.index_exists));
    println!(
        "index_size_bytes: {}",
        status
            .index_size_bytes
            .map(|size| size.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );
    println!("cached_pages: {}", status.cached_pages);
    println!("extracted_exists: {}", format_flag(status.extracted_exists));
    if !status.warnings.is_empty() {
        println!("warnings:");
        for warning in &status.warnings {
            println!("  - {warning}");
        }
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_index_build(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let source = open_configured_archive(&paths)?;
    let built = build_species_index(source.as_ref())?;
    let digest = write_species_index(&paths.index_path, &built.species)?;
    let report = &built.report;

    println!("index build");
    println!("archive: {}", report.archive);
    println!("manual_additions: {}", report.manual_additions);
    for list in &report.sources {
        if list.found {
            println!("source.{}: {}", list.label.to_lowercase(), list.candidates);
        } else {
            println!("source.{}: not found ({})", list.label.to_lowercase(), list.path);
        }
    }
    println!("source.fish: {}", report.fish_candidates);
    print_fish_report("fish", &report.fish);
    println!("dedup.input: {}", report.dedup.input);
    println!("dedup.missing_path: {}", report.dedup.missing_path);
    println!("dedup.duplicate_path: {}", report.dedup.duplicate_path);
    println!("dedup.duplicate_latin: {}", report.dedup.duplicate_latin);
    println!("dedup.duplicate_name: {}", report.dedup.duplicate_name);
    println!("total: {}", report.dedup.unique);
    println!("index_path: {}", normalize_path(&paths.index_path));
    println!("sha256: {digest}");
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_index_stats(runtime: &RuntimeOptions, json: bool) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let species = load_species_index(&paths.index_path)?;
    let stats = index_stats(&species);
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    println!("index stats");
    println!("index_path: {}", normalize_path(&paths.index_path));
    print_index_stats("index", &stats);
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_article(runtime: &RuntimeOptions, args: ArticleArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let source = open_configured_archive(&paths)?;

    let (exists, html) = if args.path.starts_with(WIKI_PREFIX) {
        (
            wiki_path_exists(source.as_ref(), &args.path)?,
            read_wiki_path(source.as_ref(), &args.path)?,
        )
    } else {
        (
            source.article_exists(&args.path)?,
            source.read_article(&args.path)?,
        )
    };

    println!("path: {}", args.path);
    println!("exists: {}", format_flag(exists));
    println!("resolves: {}", format_flag(html.is_some()));
    println!(
        "bytes: {}",
        html.as_ref()
            .map(|html| html.len().to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );
    if args.title {
        println!(
            "title: {}",
            html.as_deref()
                .and_then(page_title)
                .unwrap_or_else(|| "<none>".to_string())
        );
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_pages(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let species = load_species_index(&paths.index_path)?;
    let source = open_configured_archive(&paths)?;
    let report = export_pages(source.as_ref(), &species, &paths.pages_dir)?;

    println!("pages export");
    println!("pages_dir: {}", report.pages_dir);
    println!("total: {}", report.total);
    println!("written: {}", report.written);
    println!("missing: {}", report.missing.len());
    if !report.missing.is_empty() {
        println!("missing_names (first {MISSING_LISTED}):");
        for name in report.missing.iter().take(MISSING_LISTED) {
            println!("  - {name}");
        }
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn run_extract(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let species = load_species_index(&paths.index_path)?;
    let (records, report) = extract_all(&species, &paths.pages_dir)?;
    write_extracted(&paths.extracted_path, &records)?;

    println!("extract");
    println!("extracted_path: {}", normalize_path(&paths.extracted_path));
    println!("total: {}", report.total);
    println!("pages_found: {}", report.pages_found);
    println!("names_fixed: {}", report.names_fixed);
    for entry in &report.statuses {
        println!("status.{}: {}", entry.status, entry.count);
    }
    print_diagnostics(runtime, &paths);
    Ok(())
}

fn print_fish_report(prefix: &str, report: &FishReport) {
    println!("{prefix}.regional_pages_read: {}", report.regional_pages_read);
    println!(
        "{prefix}.regional_pages_missing: {}",
        report.regional_pages_missing
    );
    println!("{prefix}.regional_candidates: {}", report.regional_candidates);
    println!(
        "{prefix}.global_page_found: {}",
        format_flag(report.global_page_found)
    );
    println!("{prefix}.global_candidates: {}", report.global_candidates);
    println!("{prefix}.global_already_seen: {}", report.global_already_seen);
    println!(
        "{prefix}.global_missing_article: {}",
        report.global_missing_article
    );
    println!("{prefix}.global_no_infobox: {}", report.global_no_infobox);
    println!("{prefix}.global_included: {}", report.global_included);
    println!("{prefix}.global_excluded: {}", report.global_excluded);
    let validation = &report.validation;
    println!("{prefix}.validation.checked: {}", validation.checked);
    println!("{prefix}.validation.validated: {}", validation.validated);
    println!("{prefix}.validation.renamed: {}", validation.renamed);
    println!(
        "{prefix}.validation.missing_article: {}",
        validation.missing_article
    );
    println!("{prefix}.validation.no_infobox: {}", validation.no_infobox);
    println!("{prefix}.validation.no_binomial: {}", validation.no_binomial);
    println!(
        "{prefix}.validation.placeholder_epithet: {}",
        validation.placeholder_epithet
    );
}

fn print_index_stats(prefix: &str, stats: &IndexStats) {
    println!("{prefix}.total: {}", stats.total);
    for (kind, count) in &stats.by_type {
        println!("{prefix}.type.{kind}: {count}");
    }
    println!("{prefix}.missing_latin: {}", stats.missing_latin);
    println!("{prefix}.name_equals_latin: {}", stats.name_equals_latin);
}

fn open_configured_archive(paths: &ResolvedPaths) -> Result<Box<dyn ArticleSource>> {
    let archive = paths.require_archive()?;
    let source = open_archive(archive)?;
    tracing::info!(archive = %source.describe(), "archive opened");
    Ok(source)
}

fn print_diagnostics(runtime: &RuntimeOptions, paths: &ResolvedPaths) {
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<ResolvedPaths> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: runtime.project_root.clone(),
        config: runtime.config.clone(),
        archive: runtime.archive.clone(),
        scrape_dir: runtime.scrape_dir.clone(),
    };

    let initial = resolve_paths(&context, &overrides)?;
    let project_env = initial.project_root.join(".env");
    if project_env.exists() {
        let _ = dotenvy::from_path_override(&project_env);
    }

    resolve_paths(&context, &overrides)
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
