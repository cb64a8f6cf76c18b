use std::io;
use tracing::info;

use normas_cli::{init_tracing, load_chunks, missing_documents_message};
use normas_core::config::Config;
use normas_llm::{get_default_chat_model, get_default_embedder};
use normas_qa::{run_shell, QaOrchestrator};
use normas_vector::{IndexOptions, VectorIndex};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    info!("Starting the technical standards assistant...");

    let docs_dir = settings.docs_dir();
    let Some((_, chunks)) = load_chunks(&settings, &docs_dir).await.map_err(|e| { eprintln!("Error: failed to process the documents in '{}': {}", docs_dir.display(), e); e })? else {
        eprintln!("{}", missing_documents_message(&docs_dir));
        std::process::exit(1);
    };

    let embedder = get_default_embedder(&settings).map_err(|e| { eprintln!("Error: failed to set up the embedding service ({}). Check your API key.", e); e })?;
    let index_dir = settings.index_dir();
    let index = VectorIndex::build_or_load(&chunks, embedder, &index_dir, IndexOptions::from_settings(&settings))
        .await
        .map_err(|e| { eprintln!("Error: failed to create or load the vector index at '{}': {}", index_dir.display(), e); e })?;
    println!("📦 Vector index ready: {} chunks ({})", index.len(), index.embedder_id());

    let chat = get_default_chat_model(&settings).map_err(|e| { eprintln!("Error: failed to set up the chat model ({}). Check your OpenAI API key.", e); e })?;
    let qa = QaOrchestrator::new(index, chat, &settings.retrieval)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    run_shell(&qa, stdin.lock(), &mut stdout).await?;
    Ok(())
}
