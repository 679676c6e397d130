use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};

use docqa_core::config::{Config, Settings};
use docqa_core::documents::load_documents;
use docqa_core::{logging, IngestReport};
use docqa_embed::{embedder_from_settings, generator_from_settings};
use docqa_rag::{PipelineOptions, RagPipeline};
use docqa_vector::persist::index_file;
use docqa_vector::VectorStore;

const USAGE: &str = "Usage: docqa <ingest [dir] | query \"<text>\" [top_k] [threshold] | ask \"<text>\" | status>";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn open_pipeline(settings: &Settings) -> anyhow::Result<RagPipeline> {
    let embedder = embedder_from_settings(&settings.embedding);
    let generator = generator_from_settings(&settings.generation);
    let index_path = settings.data.index_path();
    let store = VectorStore::open_or_create(&index_path, embedder.dim())
        .with_context(|| format!("opening index at {}", index_path.display()))?;
    let mut options = PipelineOptions::from_settings(settings);
    // The CLI writes one compacted snapshot at the end of an ingest run.
    options.persist_on_ingest = false;
    Ok(RagPipeline::new(Arc::new(store), embedder, generator, options)?)
}

async fn ingest(settings: &Settings, args: &[String]) -> anyhow::Result<()> {
    let docs_dir = args.first().map(PathBuf::from).unwrap_or_else(|| settings.data.docs_dir());
    println!("📂 Ingesting from {}", docs_dir.display());
    let docs = load_documents(&docs_dir)?;
    if docs.is_empty() { println!("No .txt or .md documents found."); return Ok(()); }

    let pipeline = open_pipeline(settings)?;
    let pb = ProgressBar::new(docs.len() as u64);
    pb.set_style(ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")?.progress_chars("##-"));
    let mut total = IngestReport::default();
    for doc in docs {
        pb.set_message(doc.source_identifier.clone());
        total += pipeline.ingest_document(doc).await?;
        pb.inc(1);
    }
    pb.finish_with_message("done");

    let store = Arc::clone(pipeline.store());
    tokio::task::spawn_blocking(move || store.persist()).await??;
    println!("✅ Indexed {} documents into {} chunks ({} entries in store)", total.documents_len, total.chunks_len, pipeline.store().len());
    println!("💾 Index written to {}", settings.data.index_path().display());
    Ok(())
}

async fn query(settings: &Settings, args: &[String]) -> anyhow::Result<()> {
    let Some(text) = args.first() else { eprintln!("{USAGE}"); std::process::exit(1) };
    let top_k = match args.get(1) { Some(s) => s.parse::<usize>().context("top_k must be a number")?, None => settings.retrieval.top_k };
    let threshold = match args.get(2) { Some(s) => s.parse::<f32>().context("threshold must be a number")?, None => settings.retrieval.score_threshold };

    let pipeline = open_pipeline(settings)?;
    let answer = pipeline.query(text, top_k, threshold).await?;
    println!("{}\n", answer.answer.trim());
    if answer.sources.is_empty() { println!("(no sources above threshold {threshold})"); }
    for (i, source) in answer.sources.iter().enumerate() {
        let label = match source.page {
            Some(page) => format!("{}, p. {}", source.source_identifier, page),
            None => format!("{}, chars {}-{}", source.source_identifier, source.char_span.start, source.char_span.end),
        };
        println!("  [{}] score={:.4}  {}", i + 1, source.score, label);
    }
    Ok(())
}

async fn ask(settings: &Settings, args: &[String]) -> anyhow::Result<()> {
    let Some(text) = args.first() else { eprintln!("{USAGE}"); std::process::exit(1) };
    let pipeline = open_pipeline(settings)?;
    println!("{}", pipeline.ask(text).await?.trim());
    Ok(())
}

fn status(settings: &Settings) -> anyhow::Result<()> {
    let index_path = settings.data.index_path();
    println!("🔎 docqa status\n==============");
    println!("Index: {}", index_path.display());
    if !index_file(&index_path).exists() { println!("No index yet. Run `docqa ingest` first."); return Ok(()); }
    let (store, report) = VectorStore::load_with_recovery(&index_path)?;
    println!("Dimension: {}", store.dim());
    println!("Entries: {}", store.len());
    if !report.corrupt_lines.is_empty() {
        tracing::warn!(lines = ?report.corrupt_lines, "index has unreadable records");
        println!("⚠️  Skipped {} unreadable records (lines {:?})", report.corrupt_lines.len(), report.corrupt_lines);
    }
    let sources = store.sources();
    println!("Sources ({}):", sources.len());
    for source in sources { println!("  - {source}"); }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("info");
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "ingest" => ingest(&settings, &args).await,
        "query" => query(&settings, &args).await,
        "ask" => ask(&settings, &args).await,
        "status" => status(&settings),
        _ => { eprintln!("Unknown command: {}\n{USAGE}", cmd); std::process::exit(1); }
    }
}
