use docqa_core::config::{EmbeddingProvider, EmbeddingSettings};
use docqa_core::Embedder;
use docqa_embed::{embedder_from_settings, HashEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[tokio::test]
async fn hash_embedder_shapes_and_determinism() {
    let embedder = HashEmbedder::new(256);
    let v1 = embedder.embed("hello world").await.expect("embed");
    let v2 = embedder.embed("hello world").await.expect("embed");

    assert_eq!(v1.len(), 256, "embedding dim is 256");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[tokio::test]
async fn shared_words_score_higher() {
    let embedder = HashEmbedder::new(512);
    let q = embedder.embed("solar panel wiring").await.expect("embed");
    let near = embedder.embed("Wiring a solar panel to the battery.").await.expect("embed");
    let far = embedder.embed("baking sourdough bread at home").await.expect("embed");
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

#[tokio::test]
async fn empty_text_embeds_to_zero_vector() {
    let embedder = HashEmbedder::new(8);
    let v = embedder.embed("").await.expect("embed");
    assert!(v.iter().all(|x| *x == 0.0));
}

#[test]
fn fake_provider_is_selected_from_settings() {
    let settings = EmbeddingSettings { provider: EmbeddingProvider::Fake, dim: 32, ..EmbeddingSettings::default() };
    let embedder = embedder_from_settings(&settings);
    assert_eq!(embedder.dim(), 32);
    assert!(embedder.embedder_id().starts_with("hash:"));
}
