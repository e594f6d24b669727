//! CLI entry point for the markdown semantic search service.
//!
//! Provides commands for configuring, indexing, querying, and serving a
//! corpus of markdown documents.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use console::style;
use ragrepo::config::CONFIG_DIR;
use ragrepo::index::CorpusWalker;
use ragrepo::search::{SearchEngine, SearchOptions};
use ragrepo::vector::{Embedder, FastEmbedGenerator};
use ragrepo::{Settings, build_index, logging, server};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Semantic search over a markdown corpus
#[derive(Parser)]
#[command(
    name = "ragrepo",
    version = env!("CARGO_PKG_VERSION"),
    about = "Semantic search over a markdown corpus",
    long_about = "Embed every markdown document under a content root and answer natural language queries with the most similar documents.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  $ ragrepo init\n  $ ragrepo index --dry-run\n  $ ragrepo search \"how do I configure logging\"\n  $ ragrepo serve --bind 0.0.0.0:8080"
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .ragrepo directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings after file and environment overrides")]
    Config,

    /// Build the index and report what was embedded
    #[command(about = "Build the vector index from the content root")]
    Index {
        /// Content root (overrides config)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Number of threads to use (overrides config)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Dry run - list the documents that would be indexed
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a single query against a freshly built index
    #[command(
        about = "Search the corpus from the command line",
        after_help = "Examples:\n  ragrepo search \"error handling\"\n  ragrepo search \"deploy\" --limit 3 --json"
    )]
    Search {
        /// Natural language query
        query: String,

        /// Maximum number of results (defaults to search.top_k)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Content root (overrides config)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP server
    #[command(
        about = "Start the HTTP search server",
        after_help = "Endpoints:\n  GET /search?query=<text>\n  GET /content/<path>\n  GET /static/<path>\n  GET /health\n  GET /ready"
    )]
    Serve {
        /// Bind address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,

        /// Content root (overrides config)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Static asset directory (overrides config)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        Settings::load_from(config_path).unwrap_or_else(|e| {
            eprintln!(
                "Configuration error loading from {}: {e}",
                config_path.display()
            );
            std::process::exit(1);
        })
    } else {
        Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            Settings::default()
        })
    };
    config.debug |= cli.debug;
    logging::init(config.debug);

    match cli.command {
        Commands::Init { force } => {
            match Settings::init_config_file(".", force) {
                Ok(path) => {
                    println!("Created configuration file at: {}", path.display());
                    println!("Edit this file to customize your settings.");
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    eprintln!("Existing file: {CONFIG_DIR}/settings.toml");
                    std::process::exit(1);
                }
            }
        }

        Commands::Config => {
            println!("{}", style("Current Configuration:").cyan().bold());
            println!("{}", "=".repeat(50));
            match toml::to_string_pretty(&config) {
                Ok(toml_str) => println!("{toml_str}"),
                Err(e) => eprintln!("Error displaying config: {e}"),
            }
        }

        Commands::Index {
            root,
            threads,
            dry_run,
        } => {
            if let Some(root) = root {
                config.content_root = root;
            }
            if let Some(threads) = threads {
                config.indexing.parallel_threads = threads;
            }
            exit_on_invalid(&config);

            if dry_run {
                let walker = CorpusWalker::new(&config.indexing);
                let files = walker.walk(&config.content_root);
                for file in &files {
                    println!("{}", file.display());
                }
                println!(
                    "{} {} documents would be indexed",
                    style("Dry run:").yellow().bold(),
                    files.len()
                );
                return;
            }

            let embedder = load_embedder(&config);
            match build_index(&config.content_root, &config, embedder.as_ref()) {
                Ok((index, report)) => {
                    println!(
                        "{} {} documents ({} dimensions) in {:.2?}",
                        style("Indexed").green().bold(),
                        index.len(),
                        embedder.dimension(),
                        report.elapsed
                    );
                    for skipped in &report.skipped {
                        println!(
                            "  {} {}: {}",
                            style("skipped").yellow(),
                            skipped.path.display(),
                            skipped.reason
                        );
                    }
                }
                Err(e) => exit_with_error(&e),
            }
        }

        Commands::Search {
            query,
            limit,
            root,
            json,
        } => {
            if let Some(root) = root {
                config.content_root = root;
            }
            exit_on_invalid(&config);

            let embedder = load_embedder(&config);
            let (index, _report) = build_index(&config.content_root, &config, embedder.as_ref())
                .unwrap_or_else(|e| exit_with_error(&e));
            let engine = SearchEngine::new(
                Arc::new(index),
                embedder,
                SearchOptions::from_settings(&config),
            );

            let started = Instant::now();
            let limit = limit.unwrap_or(config.search.top_k);
            let results = engine
                .search_with_limit(&query, limit)
                .unwrap_or_else(|e| exit_with_error(&e));

            if json {
                match serde_json::to_string_pretty(&results) {
                    Ok(out) => println!("{out}"),
                    Err(e) => {
                        eprintln!("Error serializing results: {e}");
                        std::process::exit(1);
                    }
                }
            } else if results.is_empty() {
                println!("No documents matched '{query}'");
            } else {
                for (rank, hit) in results.iter().enumerate() {
                    println!(
                        "{:>3}. {} {}",
                        rank + 1,
                        style(hit.score).dim(),
                        style(&hit.id).green()
                    );
                }
                println!(
                    "{}",
                    style(format!("{} results in {:.2?}", results.len(), started.elapsed())).dim()
                );
            }
        }

        Commands::Serve {
            bind,
            root,
            static_dir,
        } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(root) = root {
                config.content_root = root;
            }
            if let Some(static_dir) = static_dir {
                config.static_root = static_dir;
            }
            exit_on_invalid(&config);

            if let Err(e) = server::serve(config).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn load_embedder(config: &Settings) -> Arc<dyn Embedder> {
    match FastEmbedGenerator::from_config(&config.embedding) {
        Ok(embedder) => Arc::new(embedder),
        Err(e) => {
            eprintln!("Failed to load embedding model: {e}");
            std::process::exit(1);
        }
    }
}

fn exit_on_invalid(config: &Settings) {
    if let Err(e) = config.validate() {
        exit_with_error(&e);
    }
}

fn exit_with_error(error: &ragrepo::SearchError) -> ! {
    eprintln!("{} {error}", style("Error:").red().bold());
    for suggestion in error.recovery_suggestions() {
        eprintln!("  {} {suggestion}", style("hint:").dim());
    }
    std::process::exit(1);
}
