use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;
use wishlist_sync_core::colors::ColorSource;
use wishlist_sync_core::config::{DEFAULT_CONFIG_FILENAME, load_config};
use wishlist_sync_core::sync::{SyncOptions, SyncReport, run_sync};

#[derive(Debug, Parser)]
#[command(
    name = "wishlist-sync",
    version,
    about = "Recreate Brick Owl wish lists from a local JSON description"
)]
struct Cli {
    #[arg(
        long,
        alias = "apikey",
        value_name = "KEY",
        help = "API key registered on Brick Owl (or BRICKOWL_API_KEY)"
    )]
    api_key: Option<String>,
    #[arg(
        long,
        alias = "datafile",
        value_name = "PATH",
        help = "JSON file describing the wish lists"
    )]
    data_file: Option<PathBuf>,
    #[arg(
        long,
        alias = "purgelists",
        help = "Also delete remote lists that are not in the data file"
    )]
    purge_lists: bool,
    #[arg(short, long, help = "Log every catalog request and response")]
    verbose: bool,
    #[arg(long, value_name = "PATH", help = "TOML config file")]
    config: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Directory holding the color and part caches")]
    cache_dir: Option<PathBuf>,
    #[arg(long, help = "Print the run report as JSON")]
    json: bool,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let api_key = cli
        .api_key
        .clone()
        .or_else(|| env::var("BRICKOWL_API_KEY").ok())
        .filter(|value| !value.trim().is_empty());
    let (Some(api_key), Some(data_file)) = (api_key, cli.data_file.clone()) else {
        eprintln!("{}", Cli::command().render_help());
        return ExitCode::FAILURE;
    };

    match run(&cli, api_key, data_file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, api_key: String, data_file: PathBuf) -> Result<()> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME));
    let config = load_config(&config_path)?;

    let options = SyncOptions {
        api_key,
        data_file,
        purge_lists: cli.purge_lists,
        cache_dir: cli.cache_dir.clone(),
        config,
    };
    let report = run_sync(&options)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&options.data_file, &report);
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "wishlist_sync=debug,wishlist_sync_core=debug"
    } else {
        "wishlist_sync=warn,wishlist_sync_core=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(data_file: &Path, report: &SyncReport) {
    println!("wish list sync");
    println!("data_file: {}", normalize_path(data_file));
    println!(
        "colors: {} ({})",
        report.colors_known,
        match report.color_source {
            ColorSource::Cache => "cache",
            ColorSource::Remote => "remote",
        }
    );
    println!("dummy_created: {}", format_flag(report.lists.dummy_created));
    println!("lists_deleted: {}", report.lists.deleted_lists.len());
    for name in &report.lists.deleted_lists {
        println!("  - {name}");
    }
    println!("lists_kept: {}", report.lists.kept_lists.len());
    println!("lists_created: {}", report.lists.created_lists.len());
    for created in &report.lists.created_lists {
        println!(
            "  - {} (id {}): lots={} quantity_updates={} skipped={}",
            created.name,
            created.list_id,
            created.lots_created,
            created.quantity_updates,
            created.items_skipped
        );
    }
    println!("lots_created: {}", report.lists.lots_created);
    println!("quantity_updates: {}", report.lists.quantity_updates);
    println!("items_skipped: {}", report.lists.skipped.len());
    for skipped in &report.lists.skipped {
        println!(
            "  - {} on '{}': {}",
            skipped.part_code, skipped.list, skipped.reason
        );
    }
    println!("parts_cached: {}", report.parts_cached);
    println!("parts_resolved_remotely: {}", report.parts_resolved_remotely);
    println!("request_count: {}", report.request_count);
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
