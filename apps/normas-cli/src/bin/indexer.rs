use std::env;
use std::path::PathBuf;

use normas_cli::{init_tracing, load_chunks, missing_documents_message};
use normas_core::config::{expand_path, Config};
use normas_llm::get_default_embedder;
use normas_vector::{IndexOptions, VectorIndex};

fn usage() {
    println!("Usage: normas-indexer [docs_dir]\n\nRebuilds the vector index from every PDF in docs_dir (default: paths.docs_dir).");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut docs_dir: Option<PathBuf> = None;
    for arg in &args {
        match arg.as_str() {
            "--help" | "-h" => { usage(); return Ok(()); }
            _ if !arg.starts_with('-') => docs_dir = Some(expand_path(arg)),
            other => { eprintln!("Error: unknown option {}", other); usage(); std::process::exit(1); }
        }
    }
    let docs_dir = docs_dir.unwrap_or_else(|| settings.docs_dir());
    let index_dir = settings.index_dir();

    println!("normas vector indexer\n=====================");
    println!("Documents: {}", docs_dir.display());
    println!("Index: {}", index_dir.display());

    let Some((pages, chunks)) = load_chunks(&settings, &docs_dir).await? else {
        eprintln!("{}", missing_documents_message(&docs_dir));
        std::process::exit(1);
    };
    let embedder = get_default_embedder(&settings)?;
    let index = VectorIndex::rebuild(&chunks, embedder, &index_dir, IndexOptions::from_settings(&settings)).await?;

    println!("\n✅ Indexing completed successfully!");
    println!("📊 Indexed {} chunks from {} pages with {}", index.len(), pages, index.embedder_id());
    println!("🗂️  Index stored at {}", index.storage_path().display());
    println!("\n💡 To ask questions, use: cargo run --bin normas");
    Ok(())
}
