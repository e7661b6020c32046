use anyhow::Context;
use clap::{Parser, Subcommand};
use jsonrag::{
    ask::AskPipeline,
    config::Config,
    indexing::IndexingPipeline,
    logging,
    query::{QueryPipeline, run_repl},
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jsonrag", version, about = "Index JSON records into Qdrant and query them by similarity")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Flatten JSON files from the data directory and index them.
    Index {
        /// Directory containing JSON documents.
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Target collection name.
        #[arg(long)]
        collection: Option<String>,
    },
    /// Interactively query the indexed collection.
    Query {
        /// Target collection name.
        #[arg(long)]
        collection: Option<String>,
        /// Number of results per query.
        #[arg(short)]
        k: Option<usize>,
    },
    /// Answer a question using retrieved records and a generation model.
    Ask {
        /// Question to answer.
        question: String,
        /// Target collection name.
        #[arg(long)]
        collection: Option<String>,
        /// Number of records retrieved as context.
        #[arg(short)]
        k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();
    let mut config = Config::from_env().context("failed to load configuration")?;

    match cli.command {
        Command::Index {
            data_dir,
            collection,
        } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            if let Some(name) = collection {
                config.collection_name = name;
            }
            run_index(config).await
        }
        Command::Query { collection, k } => {
            if let Some(name) = collection {
                config.collection_name = name;
            }
            if let Some(k) = k {
                config.top_k = k;
            }
            run_query(config).await
        }
        Command::Ask {
            question,
            collection,
            k,
        } => {
            if let Some(name) = collection {
                config.collection_name = name;
            }
            if let Some(k) = k {
                config.top_k = k;
            }
            run_ask(config, &question).await
        }
    }
}

async fn run_index(config: Config) -> anyhow::Result<()> {
    println!("=== Indexing Pipeline ===");
    println!("Data directory: {}", config.data_dir.display());
    println!("Qdrant: {}", config.qdrant_url);
    println!("Collection: {}", config.collection_name);
    println!("Embedding model: {}", config.embedding_model);
    println!();

    let pipeline = IndexingPipeline::new(config).context("failed to initialize indexing")?;
    let report = pipeline.run().await.context("indexing run failed")?;

    if report.files_found == 0 {
        println!("No JSON files found to index.");
        return Ok(());
    }

    println!("=== Indexing Complete ===");
    println!("Files discovered: {}", report.files_found);
    println!("Files skipped: {}", report.files_skipped);
    println!("Records indexed: {}", report.records_indexed);
    if report.elements_skipped > 0 {
        println!("Non-object array elements skipped: {}", report.elements_skipped);
    }
    if report.batches_failed > 0 {
        anyhow::bail!("{} batch(es) failed to index; see logs", report.batches_failed);
    }
    Ok(())
}

async fn run_query(config: Config) -> anyhow::Result<()> {
    println!("=== Query Interface ===");
    println!("Qdrant: {}", config.qdrant_url);
    println!("Collection: {}", config.collection_name);
    println!("Embedding model: {}", config.embedding_model);
    println!("Returning top {} results per query", config.top_k);
    println!();

    let top_k = config.top_k;
    let max_display_chars = config.max_display_chars;
    let pipeline = QueryPipeline::new(config).context("failed to initialize query pipeline")?;

    let count = pipeline
        .ensure_ready()
        .await
        .context("collection is not ready for querying")?;
    println!("Connected; collection holds {count} entries.");

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    run_repl(
        &pipeline,
        top_k,
        max_display_chars,
        stdin.lock(),
        stdout.lock(),
    )
    .await
    .context("interactive loop failed")?;

    Ok(())
}

async fn run_ask(config: Config, question: &str) -> anyhow::Result<()> {
    let top_k = config.top_k;
    let generation = jsonrag::generation::generation_client_for(&config);
    let model = config.generation_model.clone();

    let query = QueryPipeline::new(config).context("failed to initialize query pipeline")?;
    query
        .ensure_ready()
        .await
        .context("collection is not ready for querying")?;

    let pipeline = AskPipeline::with_clients(Box::new(query), generation, model);
    let answer = pipeline
        .ask(question, top_k)
        .await
        .context("failed to answer question")?;

    println!("=== Answer ===");
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for (index, hit) in answer.sources.iter().enumerate() {
            println!(
                "{}. {} (record {}) - similarity {:.4}",
                index + 1,
                hit.source_file,
                hit.record_id,
                hit.score
            );
        }
    }
    Ok(())
}
