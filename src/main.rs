use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use catalog_search::catalog::JsonFileSource;
use catalog_search::config::{Config, DEFAULT_CONFIG_PATH};
use catalog_search::embedder::{Embedder, build_embedder};
use catalog_search::pipeline::{IndexOrigin, load_or_build};
use catalog_search::render::{OutputFormat, render};
use catalog_search::search::SearchEngine;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Find catalog tables by asking a question in plain language.
#[derive(Parser, Debug)]
#[command(name = "catalog-search", version, about)]
struct Cli {
    /// Search query; starts interactive mode when omitted
    query: Option<String>,

    /// Number of results to return (default: search_top_k from config)
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Ignore the cached index and rebuild it
    #[arg(long)]
    rebuild_index: bool,

    /// Rebuild the index and exit without searching
    #[arg(long)]
    build_index_only: bool,

    /// Path to the JSON config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("Error: {err:#}");
        let code = err
            .downcast_ref::<catalog_search::Error>()
            .map_or(1, catalog_search::Error::exit_code);
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    config
        .validate()
        .map_err(|e| catalog_search::Error::Configuration(format!("{e:#}")))?;

    let embedder: Arc<dyn Embedder> = Arc::from(build_embedder(&config.model).map_err(|e| {
        catalog_search::Error::Configuration(format!(
            "cannot load embedding model {}: {e}",
            config.model.name
        ))
    })?);
    let source = JsonFileSource::new(&config.metadata_path);

    if cli.build_index_only {
        let loaded = load_or_build(&config, &source, embedder.as_ref(), true)?;
        let stats = loaded.index.stats();
        println!("Index built successfully!");
        println!("Tables indexed: {}", stats.num_tables);
        println!("Embedding dimensions: {}", stats.embedding_dim);
        println!("Model: {}", stats.model);
        if !loaded.duplicates.is_empty() {
            println!("Duplicate table ids: {}", loaded.duplicates.join(", "));
        }
        return Ok(());
    }

    let loaded = load_or_build(&config, &source, embedder.as_ref(), cli.rebuild_index)?;
    if loaded.origin == IndexOrigin::Cache {
        info!("Using cached index built at {}", loaded.index.built_at());
    }
    let engine = SearchEngine::new(Arc::new(loaded.index), embedder, config.search_top_k);

    match cli.query {
        Some(query) => {
            let results = engine.search(&query, cli.top_k)?;
            println!("{}", render(&results, cli.format));
            Ok(())
        }
        None => interactive(&engine, cli.top_k, cli.format),
    }
}

fn interactive(engine: &SearchEngine, top_k: Option<usize>, format: OutputFormat) -> Result<()> {
    let stats = engine.index().stats();
    println!("\nIndex ready: {} tables indexed", stats.num_tables);
    println!("Model: {}", stats.model);
    println!("\nEnter your questions (type 'exit' to quit)");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\nQuestion: ");
        std::io::stdout().flush().context("failed to flush stdout")?;

        let Some(line) = lines.next() else {
            break;
        };
        let query = line.context("failed to read from stdin")?;
        let query = query.trim();

        if matches!(query.to_lowercase().as_str(), "exit" | "quit" | "q") {
            break;
        }
        if query.is_empty() {
            continue;
        }

        match engine.search(query, top_k) {
            Ok(results) => println!("{}", render(&results, format)),
            Err(e) => eprintln!("\nError: {e}"),
        }
    }

    println!("\nGoodbye!");
    Ok(())
}
