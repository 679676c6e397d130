use std::fs;

use docqa_core::chunker::{chunk, Chunker, ChunkingConfig};
use docqa_core::config::{Config, EmbeddingProvider};
use docqa_core::documents::{document_from_text, load_documents};
use docqa_core::types::{CharSpan, Document};
use docqa_core::Error;
use tempfile::TempDir;

fn prose(len: usize) -> String {
    let sentence = "The quick brown fox jumps over the lazy dog. ";
    sentence.chars().cycle().take(len).collect()
}

#[test]
fn scenario_2500_chars_three_chunks() {
    let text = "x".repeat(2500);
    let chunks = chunk(&text, "doc.txt", 1024, 80).expect("chunk");

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].char_span, CharSpan::new(0, 1024));
    assert_eq!(chunks[1].char_span, CharSpan::new(944, 1968));
    assert_eq!(chunks[2].char_span, CharSpan::new(1888, 2500));
    for (i, c) in chunks.iter().enumerate() {
        assert_eq!(c.sequence_index, i);
        assert_eq!(c.source_identifier, "doc.txt");
        assert_eq!(c.text.chars().count(), c.char_span.len());
    }
}

#[test]
fn overlap_must_be_smaller_than_max_length() {
    assert!(matches!(chunk("abc", "a", 100, 100), Err(Error::InvalidConfig(_))));
    assert!(matches!(chunk("abc", "a", 100, 150), Err(Error::InvalidConfig(_))));
    assert!(matches!(Chunker::new(ChunkingConfig { max_length: 0, overlap: 0 }), Err(Error::InvalidConfig(_))));
}

#[test]
fn chunking_is_deterministic() {
    let text = prose(5000);
    let a = chunk(&text, "d", 300, 40).expect("chunk");
    let b = chunk(&text, "d", 300, 40).expect("chunk");
    assert_eq!(a, b);
}

#[test]
fn consecutive_chunks_share_exactly_overlap_chars() {
    let mut text = prose(3000);
    text.insert_str(700, "\n\n");
    text.insert_str(1900, "\n\n");
    let overlap = 50;
    let chunks = chunk(&text, "d", 400, overlap).expect("chunk");
    assert!(chunks.len() > 2);

    for pair in chunks.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let tail: String = a.text.chars().skip(a.text.chars().count() - overlap).collect();
        let head: String = b.text.chars().take(overlap).collect();
        assert_eq!(tail, head);
        assert_eq!(b.char_span.start, a.char_span.end - overlap);
    }
    let total = text.chars().count();
    assert_eq!(chunks.first().map(|c| c.char_span.start), Some(0));
    assert_eq!(chunks.last().map(|c| c.char_span.end), Some(total));
    for c in &chunks {
        assert!(c.char_span.len() <= 400);
        assert!(c.char_span.end <= total);
    }
}

#[test]
fn splits_prefer_paragraph_then_sentence_boundaries() {
    let first = "a".repeat(60);
    let text = format!("{first}\n\n{}", "b".repeat(100));
    let chunks = chunk(&text, "d", 80, 10).expect("chunk");
    assert_eq!(chunks[0].text, format!("{first}\n\n"));

    let text = format!("{}. {}", "a".repeat(50), "b".repeat(100));
    let chunks = chunk(&text, "d", 80, 10).expect("chunk");
    assert!(chunks[0].text.ends_with(". "));
    assert_eq!(chunks[0].char_span.end, 52);
}

#[test]
fn short_and_empty_texts() {
    assert!(chunk("", "d", 10, 2).expect("chunk").is_empty());
    assert!(chunk("   \n\n  ", "d", 10, 2).expect("chunk").is_empty());
    let one = chunk("hello", "d", 10, 2).expect("chunk");
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].text, "hello");
}

#[test]
fn multibyte_text_is_measured_in_chars() {
    let text = "é".repeat(25);
    let chunks = chunk(&text, "d", 10, 3).expect("chunk");
    assert_eq!(chunks[0].text, "é".repeat(10));
    assert_eq!(chunks[1].char_span, CharSpan::new(7, 17));
}

#[test]
fn chunk_iterator_is_restartable() {
    let chunker = Chunker::new(ChunkingConfig { max_length: 100, overlap: 10 }).expect("chunker");
    let doc = Document::new("d", prose(450));
    let iter = chunker.chunks(&doc);
    let first: Vec<_> = iter.clone().collect();
    let second: Vec<_> = iter.collect();
    assert_eq!(first, second);
    assert_eq!(first, chunker.chunk(&doc.raw_text, "d"));
}

#[test]
fn chunks_carry_page_numbers() {
    let text = format!("{}\x0c{}\x0c{}", "a".repeat(40), "b".repeat(40), "c".repeat(40));
    let doc = document_from_text("paged.txt", text);
    assert_eq!(doc.page_boundaries.as_deref(), Some(&[0, 41, 82][..]));

    let chunker = Chunker::new(ChunkingConfig { max_length: 30, overlap: 5 }).expect("chunker");
    let pages: Vec<_> = chunker.chunks(&doc).map(|c| c.page).collect();
    assert_eq!(pages.first(), Some(&Some(1)));
    assert_eq!(pages.last(), Some(&Some(3)));
}

#[test]
fn document_ids_follow_content() {
    let a = Document::new("a.txt", "alpha");
    let b = Document::new("a.txt", "alpha");
    let c = Document::new("a.txt", "bravo");
    assert_eq!(a.id, b.id);
    assert_ne!(a.id, c.id);
}

#[test]
fn load_documents_walks_text_files() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("manuals")).unwrap();
    fs::write(dir.join("b.txt"), "bravo").unwrap();
    fs::write(dir.join("manuals/a.md"), "alpha").unwrap();
    fs::write(dir.join("skip.pdf"), "binary").unwrap();

    let docs = load_documents(dir).expect("load");
    let sources: Vec<_> = docs.iter().map(|d| d.source_identifier.as_str()).collect();
    assert_eq!(sources, vec!["b.txt", "manuals/a.md"]);
    assert_eq!(docs[1].raw_text, "alpha");
}

#[test]
fn config_defaults_and_overrides() {
    let config = Config::from_toml_str("").expect("config");
    let s = config.settings().expect("settings");
    assert_eq!(s.chunking, ChunkingConfig { max_length: 1024, overlap: 80 });
    assert_eq!(s.retrieval.top_k, 20);
    assert!((s.retrieval.score_threshold - 0.1).abs() < 1e-6);
    assert_eq!(s.generation.model, "phi3");

    let config = Config::from_toml_str("[chunking]\nmax_length = 512\n[embedding]\nprovider = \"fake\"\ndim = 64\n").expect("config");
    let s = config.settings().expect("settings");
    assert_eq!(s.chunking.max_length, 512);
    assert_eq!(s.chunking.overlap, 80);
    assert_eq!(s.embedding.provider, EmbeddingProvider::Fake);
    assert_eq!(config.get::<usize>("embedding.dim").expect("dim"), 64);
}

#[test]
fn config_rejects_bad_chunking() {
    assert!(Config::from_toml_str("[chunking]\nmax_length = 50\noverlap = 50\n").is_err());
}

#[test]
fn data_paths_expand_home() {
    let config = Config::from_toml_str("[data]\nindex_path = \"~/docqa/index\"\n").expect("config");
    let settings = config.settings().expect("settings");
    let path = settings.data.index_path();
    assert!(path.ends_with("docqa/index"));
    if std::env::var_os("HOME").is_some() {
        assert!(!path.starts_with("~"), "{}", path.display());
    }
    assert_eq!(settings.data.docs_dir(), std::path::PathBuf::from("data/docs"));
}
