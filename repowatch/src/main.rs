//! repowatch CLI
//!
//! Command-line interface for diffing repository listings against stored state.

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use repowatch::{
    format_size, parse_packages, Baseline, DiffEngine, EngineConfig, Error, IndexBuilder, JsonStateFile,
    LedgerEntries, LedgerStore, PackageIndex, Result, Scope, ScopeReport, StateDatabase,
    StateStore, VersionScheme,
};

#[derive(Parser)]
#[command(name = "repowatch")]
#[command(about = "Change feeds for Debian-style package repositories", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to state file (.json uses the JSON backend, anything else SQLite)
    #[arg(short, long, env = "REPOWATCH_STATE", default_value = "repowatch.sdb")]
    state: PathBuf,

    /// State backend, overriding the file extension
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, env = "REPOWATCH_LOG", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendKind {
    Sqlite,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Diff listings against the stored baselines and print the change feed
    Diff {
        /// Listing to read, as <release>/<component>=<path>; repeat per file
        #[arg(short, long = "input", required = true, num_args = 1..)]
        inputs: Vec<String>,

        /// Save the new baselines after printing the feed
        #[arg(long)]
        commit: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// How versions are compared when deduplicating (lexicographic, debian)
        #[arg(long, value_parser = VersionScheme::from_str, default_value = "lexicographic")]
        version_order: VersionScheme,

        /// Maximum number of changes reported per scope
        #[arg(long, default_value = "30")]
        feed_cap: usize,
    },

    /// Print package summary projections for listings
    Summary {
        /// Listing to read, as <release>/<component>=<path>; repeat per file
        #[arg(short, long = "input", required = true, num_args = 1..)]
        inputs: Vec<String>,

        /// How versions are compared when deduplicating (lexicographic, debian)
        #[arg(long, value_parser = VersionScheme::from_str, default_value = "lexicographic")]
        version_order: VersionScheme,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the stored baseline of a scope
    Baseline {
        /// Scope as <release>/<component>
        #[arg(short = 'S', long)]
        scope: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List scopes with a stored baseline
    Scopes {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop ledger entries for packages no longer in a scope's baseline
    Compact {
        /// Scope as <release>/<component>; all known scopes when omitted
        #[arg(short = 'S', long)]
        scope: Option<String>,
    },
}

/// State backend selected on the command line
enum Backend {
    Sqlite(StateDatabase),
    Json(JsonStateFile),
}

impl Backend {
    fn open(path: &Path, kind: Option<BackendKind>) -> Result<Self> {
        let kind = kind.unwrap_or_else(|| {
            match path.extension().and_then(|e| e.to_str()) {
                Some("json") => BackendKind::Json,
                _ => BackendKind::Sqlite,
            }
        });

        match kind {
            BackendKind::Sqlite => Ok(Backend::Sqlite(StateDatabase::open(path)?)),
            BackendKind::Json => Ok(Backend::Json(JsonStateFile::new(path))),
        }
    }
}

impl StateStore for Backend {
    fn load_baseline(&self, scope: &Scope) -> Baseline {
        match self {
            Backend::Sqlite(db) => db.load_baseline(scope),
            Backend::Json(file) => file.load_baseline(scope),
        }
    }

    fn save_baseline(&self, scope: &Scope, baseline: &Baseline) -> Result<()> {
        match self {
            Backend::Sqlite(db) => db.save_baseline(scope, baseline),
            Backend::Json(file) => file.save_baseline(scope, baseline),
        }
    }

    fn scopes(&self) -> Vec<Scope> {
        match self {
            Backend::Sqlite(db) => db.scopes(),
            Backend::Json(file) => file.scopes(),
        }
    }
}

impl LedgerStore for Backend {
    fn load_ledger(&self, scope: &Scope) -> LedgerEntries {
        match self {
            Backend::Sqlite(db) => db.load_ledger(scope),
            Backend::Json(file) => file.load_ledger(scope),
        }
    }

    fn save_ledger(&self, scope: &Scope, entries: &LedgerEntries) -> Result<()> {
        match self {
            Backend::Sqlite(db) => db.save_ledger(scope, entries),
            Backend::Json(file) => file.save_ledger(scope, entries),
        }
    }
}

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => EnvFilter::new(level.to_lowercase()),
            _ => EnvFilter::new("info"),
        }
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Group `scope=path` inputs by scope, keeping first-appearance order.
fn group_inputs(inputs: &[String]) -> Result<IndexMap<Scope, Vec<PathBuf>>> {
    let mut grouped: IndexMap<Scope, Vec<PathBuf>> = IndexMap::new();
    for input in inputs {
        let (scope, path) = input
            .split_once('=')
            .ok_or_else(|| {
                Error::Other(format!(
                    "Invalid input {:?}, expected <release>/<component>=<path>",
                    input
                ))
            })?;
        let scope: Scope = scope.parse()?;
        grouped.entry(scope).or_default().push(PathBuf::from(path));
    }
    Ok(grouped)
}

fn read_listings(paths: &[PathBuf]) -> Result<Vec<String>> {
    paths
        .iter()
        .map(|path| -> Result<String> {
            let bytes = std::fs::read(path)?;
            info!(path = %path.display(), bytes = bytes.len(), "read listing");
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        })
        .collect()
}

fn build_index(builder: &IndexBuilder, paths: &[PathBuf]) -> Result<PackageIndex> {
    let listings = read_listings(paths)?;
    Ok(builder.build(listings.iter().flat_map(|text| parse_packages(text))))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match cli.command {
        Commands::Diff {
            inputs,
            commit,
            format,
            version_order,
            feed_cap,
        } => {
            let grouped = group_inputs(&inputs)?;
            let backend = Backend::open(&cli.state, cli.backend)?;
            let config = EngineConfig {
                feed_cap,
                ..EngineConfig::default()
            };
            let builder = IndexBuilder::new(config).with_order(version_order.order());
            info!(
                scopes = grouped.len(),
                version_order = version_order.as_str(),
                commit,
                "starting diff"
            );
            let mut engine = DiffEngine::new(&backend, &backend, config);

            let mut reports = Vec::new();
            let mut failed = 0usize;

            // A failing scope is logged and skipped; the others still run
            for (scope, paths) in &grouped {
                let now = Utc::now();
                let result = build_index(&builder, paths).and_then(|index| {
                    let outcome = engine.diff(scope, &index, now)?;
                    Ok((index, outcome))
                });

                match result {
                    Ok((index, outcome)) => {
                        let report = ScopeReport::new(&index, outcome, now);
                        match format {
                            OutputFormat::Text => println!("{}", report.to_text()),
                            OutputFormat::Markdown => println!("{}", report.to_markdown()),
                            OutputFormat::Json => {}
                        }
                        reports.push(report);

                        if commit {
                            if let Err(e) = engine.commit_baseline(scope, &index) {
                                error!(scope = %scope, error = %e, "baseline not saved, next run will report these changes again");
                                failed += 1;
                            }
                        }
                    }
                    Err(e) => {
                        error!(scope = %scope, error = %e, "scope failed");
                        failed += 1;
                    }
                }
            }

            if let OutputFormat::Json = format {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }

            if failed > 0 {
                return Err(Error::Other(format!(
                    "{} of {} scopes failed",
                    failed,
                    grouped.len()
                )));
            }
            Ok(())
        }

        Commands::Summary {
            inputs,
            version_order,
            json,
        } => {
            let grouped = group_inputs(&inputs)?;
            let builder = IndexBuilder::default().with_order(version_order.order());

            let mut indexes = IndexMap::new();
            for (scope, paths) in &grouped {
                indexes.insert(scope.key(), build_index(&builder, paths)?);
            }

            if json {
                let output: IndexMap<_, _> = indexes
                    .iter()
                    .map(|(scope, index)| {
                        (
                            scope,
                            serde_json::json!({
                                "summary": index.summary(),
                                "packages": index.display_packages(),
                            }),
                        )
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                for (scope, index) in &indexes {
                    let summary = index.summary();
                    println!("Summary for {}", scope);
                    println!("========================");
                    println!("Packages:    {}", summary.total_packages);
                    println!("Total size:  {}", format_size(summary.total_size));
                    println!();
                    println!("Latest:");
                    for pkg in &summary.latest_packages {
                        println!(
                            "  {:<35} {:<20} {}",
                            pkg.name,
                            pkg.version,
                            pkg.architecture.as_deref().unwrap_or("N/A")
                        );
                    }
                    println!();
                    println!("Largest:");
                    for pkg in &summary.largest_packages {
                        println!(
                            "  {:<35} {:<20} {}",
                            pkg.name,
                            pkg.version,
                            format_size(pkg.size)
                        );
                    }
                    println!();
                }
            }
            Ok(())
        }

        Commands::Baseline { scope, json } => {
            let scope: Scope = scope.parse()?;
            let backend = Backend::open(&cli.state, cli.backend)?;
            let baseline = backend.load_baseline(&scope);

            if json {
                println!("{}", serde_json::to_string_pretty(&baseline)?);
            } else {
                println!("Baseline for {} ({} packages):", scope, baseline.len());
                println!();
                for (name, version) in &baseline {
                    println!("  {:<35} {}", name, version);
                }
            }
            Ok(())
        }

        Commands::Scopes { json } => {
            let backend = Backend::open(&cli.state, cli.backend)?;
            let scopes = backend.scopes();

            if json {
                let output: Vec<_> = scopes
                    .iter()
                    .map(|scope| {
                        serde_json::json!({
                            "scope": scope.key(),
                            "packages": backend.load_baseline(scope).len(),
                            "ledger_entries": backend.load_ledger(scope).len(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{:<30} {:>10} {:>10}", "Scope", "Packages", "Ledger");
                println!("{}", "-".repeat(52));
                for scope in &scopes {
                    println!(
                        "{:<30} {:>10} {:>10}",
                        scope.key(),
                        backend.load_baseline(scope).len(),
                        backend.load_ledger(scope).len()
                    );
                }
            }
            Ok(())
        }

        Commands::Compact { scope } => {
            let backend = Backend::open(&cli.state, cli.backend)?;
            let scopes = match scope {
                Some(scope) => vec![scope.parse::<Scope>()?],
                None => backend.scopes(),
            };
            let mut engine = DiffEngine::new(&backend, &backend, EngineConfig::default());

            let summary = engine.compact_scopes(&scopes);
            for (scope, removed) in &summary.compacted {
                println!("{}: removed {} ledger entries", scope, removed);
            }
            println!(
                "Compacted {} ledger entries across {} scopes",
                summary.removed(),
                summary.compacted.len()
            );

            if !summary.failed.is_empty() {
                return Err(Error::Other(format!(
                    "{} of {} scopes failed",
                    summary.failed.len(),
                    scopes.len()
                )));
            }
            Ok(())
        }
    }
}
