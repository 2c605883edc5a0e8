//! Command-line entry point: ingest filings, ask questions, list companies.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use filings_qa::pipeline::IndexBuilder;
use filings_qa::providers::{
    ChatCompletionsClient, FastembedProvider, HttpOcrEngine, OcrEngine,
};
use filings_qa::{load_settings, QaEngine, QaError};

#[derive(Parser, Debug)]
#[command(name = "filings-qa", about = "Question answering over company filing PDFs")]
struct Cli {
    /// Alternate config file (default: ~/.filings-qa/config.json)
    #[arg(long, value_name = "FILE", env = "FILINGS_QA_CONFIG")]
    config: Option<PathBuf>,
    /// Override the root directory of per-company filing PDFs
    #[arg(long, value_name = "DIR", env = "FILINGS_QA_DOCUMENTS_DIR")]
    documents_dir: Option<PathBuf>,
    /// Override the root directory of per-company indexes
    #[arg(long, value_name = "DIR", env = "FILINGS_QA_INDEX_DIR")]
    index_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build or rebuild a company's index from its filings on disk
    Ingest {
        /// Company number, e.g. 00445790
        company_number: String,
    },
    /// Ask a question against a company's indexed filings
    Ask {
        company_number: String,
        question: String,
    },
    /// List companies with a persisted index
    ListCompanies,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), QaError> {
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref()).await;
    if let Some(dir) = cli.documents_dir {
        settings.documents_dir = dir;
    }
    if let Some(dir) = cli.index_dir {
        settings.index_dir = dir;
    }

    // Listing needs no providers; skip the model load.
    if matches!(cli.command, Command::ListCompanies) {
        let builder = IndexBuilder::new(&settings.index_dir);
        for company in builder.persisted_tenants().await? {
            println!("{company}");
        }
        return Ok(());
    }

    let engine = build_engine(&settings)?;

    match cli.command {
        Command::Ingest { company_number } => {
            let report = engine.ingest(&company_number).await?;
            println!(
                "Ingested company {}: {} document(s), {} with text, {} page(s), {} chunk(s) indexed",
                report.tenant,
                report.documents,
                report.documents_with_text,
                report.pages,
                report.chunks
            );
        }
        Command::Ask {
            company_number,
            question,
        } => {
            let answer = engine.ask(&company_number, &question).await?;
            println!("{answer}");
        }
        Command::ListCompanies => unreachable!("handled above"),
    }

    Ok(())
}

fn build_engine(settings: &filings_qa::QaSettings) -> Result<QaEngine, QaError> {
    let embedder = Arc::new(FastembedProvider::initialize()?);
    let generator = Arc::new(ChatCompletionsClient::new(&settings.generation));
    let ocr: Option<Arc<dyn OcrEngine>> = settings
        .ocr
        .endpoint
        .as_deref()
        .map(|endpoint| Arc::new(HttpOcrEngine::new(endpoint)) as Arc<dyn OcrEngine>);

    Ok(QaEngine::new(settings, embedder, generator, ocr))
}
