use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use icd_reference::{
    init_logging, AppConfig, BillingEntryService, CatalogLoader, IcdError, LoadOutcome,
    QueryService, Store,
};

#[derive(Parser, Debug)]
#[command(name = "icdref")]
#[command(about = "ICD-10 code lookup and billing line items", version)]
struct Args {
    /// Configuration file (TOML). Defaults to the per-user config if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the code file into the catalog (appends; run once per database).
    Load {
        /// Code file to read instead of the configured one
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Search diagnoses; separate several terms with commas.
    Search { text: String },
    /// Look up ICD codes by diagnosis text or code before billing.
    Lookup { text: String },
    /// Save a billing line item.
    Bill {
        #[arg(long)]
        icd: String,
        #[arg(long)]
        service: String,
        #[arg(long)]
        billing_code: String,
        #[arg(long)]
        price: String,
    },
    /// List saved billing line items.
    BillingItems,
    /// Show row counts.
    Stats,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    init_logging(&config).context("failed to initialise logging")?;
    tracing::info!(version = icd_reference::VERSION, "icdref starting");

    let store = Store::open(&config.database_path).with_context(|| {
        format!("failed to open database {}", config.database_path.display())
    })?;

    // The explicit `load` command skips the startup load so rows are not doubled
    let explicit_load = matches!(args.cmd, Command::Load { .. });
    if config.load_catalog_on_startup && !explicit_load {
        load_catalog_once(&store, &config);
    }

    let outcome = run_command(&store, &config, &args);
    if let Err(e) = &outcome {
        if !e.is_user_error() {
            tracing::error!(error = %e, "command failed");
        }
        eprintln!("{}", e.user_message());
    }

    store.close().context("failed to close database")?;

    if outcome.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

/// Load the catalog unless it already has rows
fn load_catalog_once(store: &Store, config: &AppConfig) {
    match store.catalog().is_empty() {
        Ok(true) => {
            let outcome = CatalogLoader::new(store.catalog()).load(&config.catalog_path);
            report_load(&outcome);
        }
        Ok(false) => tracing::debug!("catalog already populated; skipping startup load"),
        Err(e) => tracing::error!(error = %e, "could not check catalog before loading"),
    }
}

fn report_load(outcome: &LoadOutcome) {
    match &outcome.error {
        None => eprintln!(
            "✓ Loaded {} ICD codes ({} lines skipped)",
            outcome.inserted, outcome.skipped
        ),
        Some(e) => eprintln!(
            "Error loading data from file: {} ({} codes loaded before the failure)",
            e, outcome.inserted
        ),
    }
}

fn run_command(store: &Store, config: &AppConfig, args: &Args) -> Result<(), IcdError> {
    match &args.cmd {
        Command::Load { file } => {
            let path = file.as_ref().unwrap_or(&config.catalog_path);
            let outcome = CatalogLoader::new(store.catalog()).load(path);
            report_load(&outcome);
            match outcome.error {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
        Command::Search { text } => {
            let results = QueryService::new(store.catalog()).search(text)?;
            if args.json {
                print_json(&results)?;
            } else {
                for (term, matches) in results.iter() {
                    println!("• Search: {}", capitalize(term));
                    for m in matches {
                        let (diagnosis, code) = m.as_pair();
                        if m.is_match() {
                            println!("• {}: {}", diagnosis, code);
                        } else {
                            println!("• {}", diagnosis);
                        }
                    }
                }
            }
            Ok(())
        }
        Command::Lookup { text } => {
            let matches = BillingEntryService::new(store.billing()).lookup(text)?;
            if args.json {
                print_json(&matches)?;
            } else if matches.is_empty() {
                println!("No matching ICD codes found.");
            } else {
                for m in &matches {
                    println!("Diagnosis: {}\nICD Code: {}", m.diagnosis, m.code);
                }
            }
            Ok(())
        }
        Command::Bill {
            icd,
            service,
            billing_code,
            price,
        } => {
            let id =
                BillingEntryService::new(store.billing()).submit(icd, service, billing_code, price)?;
            if args.json {
                print_json(&serde_json::json!({ "id": id }))?;
            } else {
                println!("✅ Billing details saved successfully! (id {})", id);
            }
            Ok(())
        }
        Command::BillingItems => {
            let items = store.billing().list()?;
            if args.json {
                print_json(&items)?;
            } else {
                for item in &items {
                    println!(
                        "{:>4}  {:<10} {:<30} {:<10} {:>10.2}",
                        item.id, item.code, item.service_name, item.billing_code, item.price
                    );
                }
            }
            Ok(())
        }
        Command::Stats => {
            let catalog = store.catalog().count()?;
            let billing = store.billing().count()?;
            if args.json {
                print_json(&serde_json::json!({
                    "catalog_entries": catalog,
                    "billing_items": billing,
                }))?;
            } else {
                println!("Catalog entries: {}", catalog);
                println!("Billing items:   {}", billing);
            }
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), IcdError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

fn capitalize(term: &str) -> String {
    let mut chars = term.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
