//! Shared fakes for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use finquery::backends::{load_prompts, Backends, CollectionBackend};
use finquery::config::Settings;
use finquery::embedding::Embedder;
use finquery::llm::LanguageModel;
use finquery::sql::SqliteStore;
use finquery::vector_store::{ChunkRecord, MemoryVectorStore, VectorStore};
use finquery::Result;
use std::sync::{Arc, Mutex};

/// Fixture tables for the structured route.
pub const PROPERTY_FIXTURES: &str = "
    CREATE TABLE properties (
        id INTEGER, property_id INTEGER, property_name TEXT, property_address TEXT,
        metro_area TEXT, square_foot NUMERIC, property_type TEXT
    );
    CREATE TABLE financials (
        id INTEGER, property_id INTEGER, year INTEGER, revenue NUMERIC, net_income NUMERIC
    );
    INSERT INTO properties VALUES
        (1, 101, 'Dallas Logistics Center', '100 Main St', 'Dallas', 250000, 'Industrial'),
        (2, 102, 'Atlanta Distribution Hub', '5 Peachtree Rd', 'Atlanta', 410000, 'Industrial');
    INSERT INTO financials VALUES
        (1, 101, 2022, 3100000, 900000),
        (2, 101, 2023, 3400000, 1100000),
        (3, 102, 2023, 5200000, 1500000);
";

/// Answers SQL-generation prompts with a fixed query and everything else
/// with a fixed answer. Every prompt is recorded.
pub struct FakeModel {
    sql: String,
    answer: String,
    prompts: Mutex<Vec<String>>,
}

impl FakeModel {
    pub fn new(sql: &str, answer: &str) -> Self {
        Self {
            sql: sql.to_string(),
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("-- SQL:") {
            Ok(self.sql.clone())
        } else {
            Ok(self.answer.clone())
        }
    }
}

/// Embeds every text as the first basis vector of its width.
pub struct AxisEmbedder {
    dimensions: usize,
}

impl AxisEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl Embedder for AxisEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(axis(self.dimensions, 0.0))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| axis(self.dimensions, 0.0)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A unit-ish vector along the first axis, tilted by `tilt` on the second.
/// Larger tilt means lower cosine similarity to the query.
pub fn axis(dimensions: usize, tilt: f32) -> Vec<f32> {
    let mut v = vec![0.0; dimensions];
    v[0] = 1.0;
    v[1] = tilt;
    v
}

/// A press release chunk whose similarity to any query falls with `rank`.
pub fn press_chunk(rank: usize, content: &str) -> ChunkRecord {
    ChunkRecord::new(
        format!("https://ir.example.com/pr/{}", rank),
        format!("Release {}", rank),
        None,
        0,
        content.to_string(),
        axis(768, rank as f32 * 0.5),
    )
}

/// Backends wired to fakes: in-memory collections and an on-disk SQLite
/// database filled with the property fixtures.
pub async fn fake_backends(
    settings: Settings,
    llm: Arc<FakeModel>,
    db_path: &std::path::Path,
    press: Vec<ChunkRecord>,
) -> Backends {
    let sql_store = SqliteStore::new(db_path).unwrap();
    sql_store.execute_batch(PROPERTY_FIXTURES).unwrap();

    let press_store = Arc::new(MemoryVectorStore::new());
    press_store.upsert_batch(&press).await.unwrap();

    let prompts = load_prompts(&settings).unwrap();
    Backends::with_components(
        settings,
        prompts,
        llm,
        Arc::new(sql_store),
        CollectionBackend {
            embedder: Arc::new(AxisEmbedder::new(768)),
            store: press_store,
        },
        CollectionBackend {
            embedder: Arc::new(AxisEmbedder::new(1536)),
            store: Arc::new(MemoryVectorStore::new()),
        },
    )
}
