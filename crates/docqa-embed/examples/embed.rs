use docqa_core::Embedder;
use docqa_embed::HashEmbedder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let embedder = HashEmbedder::new(384);
    for text in ["hello world", "rust embeddings"] {
        let v = embedder.embed(text).await?;
        println!("{text:?}: dim={} head={:?}", v.len(), &v[..4]);
    }
    Ok(())
}
