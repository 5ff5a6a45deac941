//! Local game knowledge base behind a swappable capability trait.
//!
//! Two backends share the contract: [`EmbeddingStore`] delegates embedding
//! computation to the hosted API and ranks by cosine similarity, caching
//! document vectors on disk so restarts do not re-embed; [`KeywordStore`]
//! scores by token overlap and needs no network, for offline wiring.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::LlmClient;
use crate::models::{GameRecord, RecordHit};

/// Semantic search over the game knowledge base.
#[async_trait]
pub trait GameRecordStore: Send + Sync {
    /// Return up to `limit` candidates ordered by descending relevance.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RecordHit>>;
}

/// Load every `*.json` game file in a directory, in sorted order.
///
/// Unreadable or malformed files are logged and skipped so one bad record
/// cannot empty the knowledge base. Returns (file stem, record) pairs.
pub fn load_games_from_directory(games_dir: &Path) -> Result<Vec<(String, GameRecord)>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(games_dir)
        .with_context(|| format!("Games directory not found: {:?}", games_dir))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();
    entries.sort();

    let mut games = Vec::new();
    for path in entries {
        let doc_id = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };

        let parsed = fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|contents| {
                serde_json::from_str::<GameRecord>(&contents).map_err(anyhow::Error::from)
            });

        match parsed {
            Ok(game) => {
                tracing::info!("Loaded game: {} ({})", game.name, game.platform);
                games.push((doc_id, game));
            }
            Err(e) => {
                tracing::error!("Error loading {:?}: {}", path, e);
            }
        }
    }

    tracing::info!("Total games loaded: {}", games.len());
    Ok(games)
}

#[derive(Debug, Serialize, Deserialize)]
struct EmbeddingIndex {
    model: String,
    documents: Vec<IndexedDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexedDocument {
    doc_id: String,
    record: GameRecord,
    vector: Vec<f32>,
}

/// Embedding-backed store. The index file lives in the agent data
/// directory, alongside the conversation state file.
pub struct EmbeddingStore {
    client: LlmClient,
    embedding_model: String,
    documents: Vec<IndexedDocument>,
}

impl EmbeddingStore {
    const INDEX_FILE: &'static str = "embeddings.json";

    /// Open the store: reuse the cached index when it matches the current
    /// game files and embedding model, otherwise (re)embed everything.
    pub async fn open(
        client: LlmClient,
        embedding_model: &str,
        games_dir: &Path,
        data_dir: &Path,
    ) -> Result<Self> {
        let games = load_games_from_directory(games_dir)?;
        let index_path = data_dir.join(Self::INDEX_FILE);

        if let Some(index) = Self::load_cached(&index_path, embedding_model, &games) {
            tracing::info!(
                "Reusing embedding index ({} documents) from {:?}",
                index.documents.len(),
                index_path
            );
            return Ok(Self {
                client,
                embedding_model: embedding_model.to_string(),
                documents: index.documents,
            });
        }

        tracing::info!("Embedding {} game records...", games.len());
        let texts: Vec<String> = games
            .iter()
            .map(|(_, game)| game.searchable_content())
            .collect();
        let vectors = client.embed(embedding_model, &texts).await?;

        let documents: Vec<IndexedDocument> = games
            .into_iter()
            .zip(vectors)
            .map(|((doc_id, record), vector)| IndexedDocument {
                doc_id,
                record,
                vector,
            })
            .collect();

        let index = EmbeddingIndex {
            model: embedding_model.to_string(),
            documents,
        };

        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;
        let serialized = serde_json::to_string(&index).context("Failed to serialize index")?;
        fs::write(&index_path, serialized)
            .with_context(|| format!("Failed to write embedding index to {:?}", index_path))?;
        tracing::info!("Wrote embedding index to {:?}", index_path);

        Ok(Self {
            client,
            embedding_model: index.model,
            documents: index.documents,
        })
    }

    fn load_cached(
        index_path: &Path,
        embedding_model: &str,
        games: &[(String, GameRecord)],
    ) -> Option<EmbeddingIndex> {
        let contents = fs::read_to_string(index_path).ok()?;
        let index: EmbeddingIndex = match serde_json::from_str(&contents) {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!("Ignoring unreadable embedding index: {}", e);
                return None;
            }
        };

        if index.model != embedding_model {
            tracing::info!(
                "Embedding model changed ({} -> {}), re-indexing",
                index.model,
                embedding_model
            );
            return None;
        }

        let cached_ids: HashSet<&str> = index.documents.iter().map(|d| d.doc_id.as_str()).collect();
        let current_ids: HashSet<&str> = games.iter().map(|(id, _)| id.as_str()).collect();
        if cached_ids != current_ids {
            tracing::info!("Game files changed since last index, re-indexing");
            return None;
        }

        Some(index)
    }
}

#[async_trait]
impl GameRecordStore for EmbeddingStore {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RecordHit>> {
        if self.documents.is_empty() {
            return Ok(Vec::new());
        }

        let query_vectors = self
            .client
            .embed(&self.embedding_model, &[query.to_string()])
            .await?;
        let query_vector = query_vectors
            .first()
            .ok_or_else(|| anyhow::anyhow!("Embedding API returned no vector for query"))?;

        let mut hits: Vec<RecordHit> = self
            .documents
            .iter()
            .map(|doc| RecordHit {
                record: doc.record.clone(),
                score: cosine_similarity(query_vector, &doc.vector),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Token-overlap store for offline wiring and tests. Scores a record by
/// the fraction of query tokens present in its searchable content.
pub struct KeywordStore {
    records: Vec<GameRecord>,
}

impl KeywordStore {
    pub fn new(records: Vec<GameRecord>) -> Self {
        Self { records }
    }

    pub fn from_directory(games_dir: &Path) -> Result<Self> {
        let games = load_games_from_directory(games_dir)?;
        Ok(Self::new(games.into_iter().map(|(_, g)| g).collect()))
    }

    fn tokenize(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 1)
            .map(|t| t.to_lowercase())
            .collect()
    }
}

#[async_trait]
impl GameRecordStore for KeywordStore {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RecordHit>> {
        let query_tokens = Self::tokenize(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<RecordHit> = self
            .records
            .iter()
            .filter_map(|record| {
                let doc_tokens = Self::tokenize(&record.searchable_content());
                let overlap = query_tokens.intersection(&doc_tokens).count();
                if overlap == 0 {
                    return None;
                }
                Some(RecordHit {
                    record: record.clone(),
                    score: overlap as f32 / query_tokens.len() as f32,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(name: &str, genre: &str, year: i32) -> GameRecord {
        GameRecord {
            name: name.to_string(),
            platform: "Game Boy Color".to_string(),
            genre: genre.to_string(),
            publisher: "Nintendo".to_string(),
            description: format!("{} is a classic.", name),
            year_of_release: year,
        }
    }

    #[tokio::test]
    async fn keyword_store_ranks_matching_records_first() {
        let store = KeywordStore::new(vec![
            game("Pokémon Gold and Silver", "RPG", 1999),
            game("Tetris", "Puzzle", 1989),
        ]);

        let hits = store.search("When was Pokémon Gold released?", 5).await.unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].record.name, "Pokémon Gold and Silver");
    }

    #[tokio::test]
    async fn keyword_store_returns_empty_for_unrelated_query() {
        let store = KeywordStore::new(vec![game("Tetris", "Puzzle", 1989)]);
        let hits = store.search("submarine warfare simulators", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn keyword_store_honors_limit() {
        let records: Vec<GameRecord> =
            (0..10).map(|i| game(&format!("Zelda {}", i), "Adventure", 1990 + i)).collect();
        let store = KeywordStore::new(records);
        let hits = store.search("Zelda adventure", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn loads_games_skipping_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("game_001.json"),
            r#"{"Name":"Gran Turismo","Platform":"PlayStation 1","Genre":"Racing",
                "Publisher":"Sony","Description":"Racing sim.","YearOfRelease":1997}"#,
        )
        .unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let games = load_games_from_directory(dir.path()).unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].0, "game_001");
        assert_eq!(games[0].1.name, "Gran Turismo");
    }

    #[test]
    fn missing_games_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(load_games_from_directory(&missing).is_err());
    }

    fn write_index(path: &Path, model: &str, doc_ids: &[&str]) {
        let index = EmbeddingIndex {
            model: model.to_string(),
            documents: doc_ids
                .iter()
                .map(|id| IndexedDocument {
                    doc_id: id.to_string(),
                    record: game(id, "RPG", 1999),
                    vector: vec![0.1, 0.2, 0.3],
                })
                .collect(),
        };
        fs::write(path, serde_json::to_string(&index).unwrap()).unwrap();
    }

    #[test]
    fn cached_index_is_reused_when_model_and_games_match() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("embeddings.json");
        write_index(&index_path, "text-embedding-3-small", &["g1", "g2"]);

        let games = vec![("g1".to_string(), game("g1", "RPG", 1999)),
                         ("g2".to_string(), game("g2", "RPG", 1999))];
        let index = EmbeddingStore::load_cached(&index_path, "text-embedding-3-small", &games);
        assert_eq!(index.unwrap().documents.len(), 2);
    }

    #[test]
    fn cached_index_is_discarded_when_embedding_model_changes() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("embeddings.json");
        write_index(&index_path, "text-embedding-3-small", &["g1"]);

        let games = vec![("g1".to_string(), game("g1", "RPG", 1999))];
        assert!(EmbeddingStore::load_cached(&index_path, "text-embedding-3-large", &games).is_none());
    }

    #[test]
    fn cached_index_is_discarded_when_game_files_change() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("embeddings.json");
        write_index(&index_path, "text-embedding-3-small", &["g1"]);

        // a record was added since the index was written
        let games = vec![("g1".to_string(), game("g1", "RPG", 1999)),
                         ("g2".to_string(), game("g2", "RPG", 1999))];
        assert!(EmbeddingStore::load_cached(&index_path, "text-embedding-3-small", &games).is_none());
    }

    #[test]
    fn unreadable_or_missing_index_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("embeddings.json");
        let games = vec![("g1".to_string(), game("g1", "RPG", 1999))];

        assert!(EmbeddingStore::load_cached(&index_path, "text-embedding-3-small", &games).is_none());

        fs::write(&index_path, "{ not an index").unwrap();
        assert!(EmbeddingStore::load_cached(&index_path, "text-embedding-3-small", &games).is_none());
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
