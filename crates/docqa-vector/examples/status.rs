use std::path::PathBuf;

use docqa_vector::VectorStore;

fn main() -> anyhow::Result<()> {
    let dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data/index"));
    let (store, report) = VectorStore::load_with_recovery(&dir)?;
    println!("index: {} (dim={})", dir.display(), store.dim());
    println!("entries: {}", report.loaded);
    println!("sources: {}", store.sources().len());
    if !report.corrupt_lines.is_empty() {
        println!("corrupt lines: {:?}", report.corrupt_lines);
    }
    Ok(())
}
