//! `docrieve` — an operator harness exercising the in-process operation
//! surface end to end (submit, status, search, collections), standing in
//! for an HTTP/MCP layer.

mod wiring;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::{Parser, Subcommand};
use docrieve_config::ApplicationConfig;
use docrieve_meta::UploadStatus;
use tokio_util::io::ReaderStream;

#[derive(Parser, Debug)]
#[command(name = "docrieve", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a file for ingestion, then wait for it to reach a terminal
    /// status (processing only happens while a worker pool is running, so
    /// this runs one in-process for the wait window).
    Submit {
        /// Bearer token identifying the owning user.
        #[arg(long)]
        user: String,
        /// Path to the file to upload.
        #[arg(long)]
        file: PathBuf,
        /// Target collection id (defaults to the user's default collection).
        #[arg(long)]
        collection: Option<String>,
        /// Caller-supplied doc id (generated if omitted).
        #[arg(long)]
        doc_id: Option<String>,
        /// MIME type override (guessed from extension if omitted).
        #[arg(long)]
        mime_type: Option<String>,
        /// How long to run the worker pool waiting for completion.
        #[arg(long, default_value_t = 60)]
        wait_secs: u64,
    },
    /// Print an upload record's current status.
    Status {
        #[arg(long)]
        doc_id: String,
    },
    /// List a user's upload records.
    Tasks {
        #[arg(long)]
        user: String,
        /// One of pending/processing/completed/failed.
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Search a collection by natural-language text.
    Search {
        #[arg(long)]
        user: String,
        #[arg(long)]
        collection: String,
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// Create a collection owned by `user`.
    CreateCollection {
        #[arg(long)]
        user: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List a user's collections with their document counts.
    Collections {
        #[arg(long)]
        user: String,
    },
    /// List the documents a user has placed in a collection.
    CollectionDocs {
        #[arg(long)]
        user: String,
        #[arg(long)]
        collection: String,
    },
    /// Delete an upload record, its blobs, and its vector-index entries.
    Delete {
        #[arg(long)]
        user: String,
        #[arg(long)]
        doc_id: String,
    },
    /// Run the worker pool until Ctrl-C, draining whatever is queued (there
    /// is nothing queued across process restarts, since the task queue is
    /// in-process only — §4.6).
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    docrieve_common::initialize_environment();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = ApplicationConfig::from_env()?;
    let manager = wiring::build_manager(&config).await?;

    match cli.command {
        Command::Submit {
            user,
            file,
            collection,
            doc_id,
            mime_type,
            wait_secs,
        } => {
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "upload".to_string());
            let handle = tokio::fs::File::open(&file).await?;
            let body = ReaderStream::new(handle);

            let doc_id = manager
                .submit(&user, &filename, mime_type, collection, doc_id, body)
                .await?;
            println!("submitted doc_id={doc_id}");

            let shutdown = manager.shutdown_handle();
            let run_manager = std::sync::Arc::clone(&manager);
            let run_handle = tokio::spawn(async move { run_manager.run().await });

            let deadline = tokio::time::Instant::now() + Duration::from_secs(wait_secs);
            loop {
                let record = manager.get_task(&doc_id).await?;
                if matches!(record.status, UploadStatus::Completed | UploadStatus::Failed) {
                    print_json(&record)?;
                    break;
                }
                if tokio::time::Instant::now() >= deadline {
                    eprintln!("timed out after {wait_secs}s waiting for doc_id={doc_id}");
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }

            shutdown.store(true, Ordering::Relaxed);
            run_handle.await?;
        }
        Command::Status { doc_id } => {
            let record = manager.get_task(&doc_id).await?;
            print_json(&record)?;
        }
        Command::Tasks { user, status, limit } => {
            let status = status
                .map(|s| s.parse::<UploadStatus>().map_err(anyhow::Error::msg))
                .transpose()?;
            let tasks = manager.list_user_tasks(&user, limit, status).await?;
            print_json(&tasks)?;
        }
        Command::Search {
            user,
            collection,
            query,
            top_k,
        } => {
            let results = manager.search(&user, &collection, &query, top_k).await?;
            let scores = results.relevance_scores();
            for ((document, metadata), score) in results
                .documents
                .iter()
                .zip(&results.metadatas)
                .zip(&scores)
            {
                println!("[{score:.4}] {metadata}\n{document}\n");
            }
        }
        Command::CreateCollection {
            user,
            id,
            name,
            description,
        } => {
            let collection = manager
                .create_collection(&id, &name, &user, description.as_deref())
                .await?;
            print_json(&collection)?;
        }
        Command::Collections { user } => {
            let stats = manager.list_user_collections_with_counts(&user).await?;
            print_json(&stats)?;
        }
        Command::CollectionDocs { user, collection } => {
            let docs = manager.list_collection_documents(&user, &collection).await?;
            print_json(&docs)?;
        }
        Command::Delete { user, doc_id } => {
            manager.delete_upload_record(&user, &doc_id).await?;
            println!("deleted doc_id={doc_id}");
        }
        Command::Run => {
            let shutdown = manager.shutdown_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("shutdown signal received");
                    shutdown.store(true, Ordering::Relaxed);
                }
            });
            manager.run().await;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
