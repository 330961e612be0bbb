//! Corpus store for curated notices.
//!
//! The store holds one immutable [`CorpusSnapshot`] behind an `Arc`. Readers
//! clone the `Arc` and never observe a partially built corpus; a refresh
//! builds a complete replacement (parsed, validated, embedded, indexed)
//! before swapping it in.

use crate::embeddings::{embed_missing, EmbeddingProvider};
use crate::lexical::LexicalIndex;
use crate::types::{normalize_airport, NoticeRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use skylens_core::{AppError, AppResult};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Curated notices compiled into the binary.
const BUILTIN_CORPUS: &str = include_str!("../data/notams.jsonl");

/// Where corpus contents come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorpusSource {
    /// The curated EGLL/EGLC notices shipped with the service
    Builtin,
    /// A JSONL file, one record per line
    File(PathBuf),
    /// Fixed JSONL contents
    Inline(String),
}

impl CorpusSource {
    pub fn from_path(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::File(path.to_path_buf()),
            None => Self::Builtin,
        }
    }

    /// Read the raw JSONL contents.
    pub fn read(&self) -> AppResult<String> {
        match self {
            Self::Builtin => Ok(BUILTIN_CORPUS.to_string()),
            Self::Inline(contents) => Ok(contents.clone()),
            Self::File(path) => std::fs::read_to_string(path).map_err(|e| {
                AppError::Knowledge(format!("Failed to read corpus file {:?}: {}", path, e))
            }),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Builtin => "builtin".to_string(),
            Self::Inline(_) => "inline".to_string(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Parse JSONL notice records. Blank lines are skipped.
pub fn parse_jsonl(contents: &str) -> AppResult<Vec<NoticeRecord>> {
    let mut records = Vec::new();

    for (line_num, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let record: NoticeRecord = serde_json::from_str(line).map_err(|e| {
            AppError::CorpusIntegrity(format!(
                "Failed to parse notice at line {}: {}",
                line_num + 1,
                e
            ))
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Hex SHA-256 of the raw corpus contents.
pub fn content_hash(contents: &str) -> String {
    let digest = Sha256::digest(contents.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// The notices of one airport, ordered by ascending id.
#[derive(Debug)]
pub struct AirportCorpus {
    pub airport: String,
    pub records: Vec<Arc<NoticeRecord>>,
    pub lexical: LexicalIndex,
}

impl AirportCorpus {
    fn new(airport: String, mut records: Vec<Arc<NoticeRecord>>) -> Self {
        records.sort_by(|a, b| a.id.cmp(&b.id));
        let lexical = LexicalIndex::build(&records);
        Self {
            airport,
            records,
            lexical,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// An immutable, fully indexed corpus version.
#[derive(Debug)]
pub struct CorpusSnapshot {
    airports: BTreeMap<String, Arc<AirportCorpus>>,
    content_hash: String,
    loaded_at: DateTime<Utc>,
    dimensions: Option<usize>,
}

impl CorpusSnapshot {
    /// Validate records and build per-airport indexes.
    ///
    /// Rejects empty ids, airports or texts, duplicate ids, inverted
    /// effective windows, and embeddings of differing lengths.
    pub fn build(records: Vec<NoticeRecord>, content_hash: String) -> AppResult<Self> {
        let mut seen = HashSet::new();
        let mut dimensions: Option<(usize, String)> = None;
        let mut grouped: BTreeMap<String, Vec<Arc<NoticeRecord>>> = BTreeMap::new();

        for mut record in records {
            record.id = record.id.trim().to_string();
            record.airport = normalize_airport(&record.airport);

            if record.id.is_empty() {
                return Err(AppError::CorpusIntegrity(
                    "Notice with empty id".to_string(),
                ));
            }
            if record.airport.is_empty() {
                return Err(AppError::CorpusIntegrity(format!(
                    "Notice '{}' has no airport",
                    record.id
                )));
            }
            if record.text.trim().is_empty() {
                return Err(AppError::CorpusIntegrity(format!(
                    "Notice '{}' has empty text",
                    record.id
                )));
            }
            if !seen.insert(record.id.clone()) {
                return Err(AppError::CorpusIntegrity(format!(
                    "Duplicate notice id '{}'",
                    record.id
                )));
            }
            if let (Some(from), Some(to)) = (record.effective_from, record.effective_to) {
                if to < from {
                    return Err(AppError::CorpusIntegrity(format!(
                        "Notice '{}' ends before it starts",
                        record.id
                    )));
                }
            }
            if let Some(embedding) = &record.embedding {
                match &dimensions {
                    None => dimensions = Some((embedding.len(), record.id.clone())),
                    Some((expected, _)) if *expected != embedding.len() => {
                        return Err(AppError::EmbeddingDimensionMismatch {
                            record: record.id.clone(),
                            expected: *expected,
                            actual: embedding.len(),
                        });
                    }
                    Some(_) => {}
                }
            }

            grouped
                .entry(record.airport.clone())
                .or_default()
                .push(Arc::new(record));
        }

        let airports = grouped
            .into_iter()
            .map(|(airport, records)| {
                let corpus = AirportCorpus::new(airport.clone(), records);
                (airport, Arc::new(corpus))
            })
            .collect();

        Ok(Self {
            airports,
            content_hash,
            loaded_at: Utc::now(),
            dimensions: dimensions.map(|(d, _)| d),
        })
    }

    pub fn airport(&self, airport: &str) -> Option<Arc<AirportCorpus>> {
        self.airports.get(airport).cloned()
    }

    pub fn airports(&self) -> impl Iterator<Item = &Arc<AirportCorpus>> {
        self.airports.values()
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Embedding length shared by all embedded records, if any are embedded.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn record_count(&self) -> usize {
        self.airports.values().map(|a| a.len()).sum()
    }

    pub fn stats(&self) -> CorpusStats {
        let embedded = self
            .airports
            .values()
            .flat_map(|a| a.records.iter())
            .filter(|r| r.embedding.is_some())
            .count();

        CorpusStats {
            airports: self.airports.keys().cloned().collect(),
            records: self.record_count(),
            embedded,
            content_hash: self.content_hash.clone(),
            loaded_at: self.loaded_at,
        }
    }
}

/// Summary of the published snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusStats {
    pub airports: Vec<String>,
    pub records: usize,
    pub embedded: usize,
    pub content_hash: String,
    pub loaded_at: DateTime<Utc>,
}

/// Result of a refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Source contents hash to the published snapshot; nothing changed
    Unchanged,
    /// A new snapshot was published
    Updated { records: usize, airports: usize },
    /// Same contents, republished with embeddings an earlier attempt missed
    Embedded { embedded: usize },
}

/// How corpus embeddings are precomputed.
#[derive(Clone)]
pub struct CorpusEmbedder {
    pub provider: Arc<dyn EmbeddingProvider>,
    pub batch_size: usize,
    pub timeout: Duration,
}

/// Read-mostly holder of the current corpus snapshot.
pub struct CorpusStore {
    source: CorpusSource,
    embedder: Option<CorpusEmbedder>,
    current: RwLock<Arc<CorpusSnapshot>>,
}

impl std::fmt::Debug for CorpusStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusStore")
            .field("source", &self.source.describe())
            .field("embedded", &self.embedder.is_some())
            .finish()
    }
}

impl CorpusStore {
    /// Load the source and publish the first snapshot.
    ///
    /// With an embedder, missing record embeddings are precomputed; if the
    /// backend is unavailable the snapshot is still published and the vector
    /// ranker embeds those records on demand.
    pub async fn open(source: CorpusSource, embedder: Option<CorpusEmbedder>) -> AppResult<Self> {
        let contents = source.read()?;
        let snapshot = build_snapshot(&contents, embedder.as_ref()).await?;

        tracing::info!(
            source = %source.describe(),
            records = snapshot.record_count(),
            airports = snapshot.airports.len(),
            "Corpus loaded"
        );

        Ok(Self {
            source,
            embedder,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Build a store from in-memory records without embedding them.
    pub fn from_records(records: Vec<NoticeRecord>) -> AppResult<Self> {
        let contents = records
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");
        let snapshot = CorpusSnapshot::build(records, content_hash(&contents))?;

        Ok(Self {
            source: CorpusSource::Inline(contents),
            embedder: None,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<CorpusSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Notices for `airport`, ordered by ascending id.
    ///
    /// Fails with `CorpusUnavailable` when no curated data exists for it.
    pub fn load(&self, airport: &str) -> AppResult<Arc<AirportCorpus>> {
        let airport = normalize_airport(airport);
        self.snapshot()
            .airport(&airport)
            .ok_or(AppError::CorpusUnavailable { airport })
    }

    /// Every airport with curated data.
    pub fn all_airports(&self) -> BTreeSet<String> {
        self.snapshot().airports.keys().cloned().collect()
    }

    pub fn source(&self) -> &CorpusSource {
        &self.source
    }

    /// Re-read the source and publish a new snapshot if its contents changed.
    ///
    /// Unchanged contents are still re-embedded when the published snapshot
    /// has records without embeddings, i.e. an earlier precompute failed.
    pub async fn refresh(&self) -> AppResult<RefreshOutcome> {
        let contents = self.source.read()?;
        let current = self.snapshot();

        if content_hash(&contents) == current.content_hash {
            let stats = current.stats();
            if self.embedder.is_none() || stats.embedded == stats.records {
                tracing::debug!("Corpus source unchanged");
                return Ok(RefreshOutcome::Unchanged);
            }

            let snapshot = build_snapshot(&contents, self.embedder.as_ref()).await?;
            let embedded = snapshot.stats().embedded;
            if embedded <= stats.embedded {
                tracing::debug!("Corpus embeddings still unavailable");
                return Ok(RefreshOutcome::Unchanged);
            }

            self.publish(snapshot);
            tracing::info!(embedded, "Corpus embeddings completed");
            return Ok(RefreshOutcome::Embedded { embedded });
        }

        // Built without holding the lock; the embedding call may be slow.
        let snapshot = build_snapshot(&contents, self.embedder.as_ref()).await?;
        let outcome = RefreshOutcome::Updated {
            records: snapshot.record_count(),
            airports: snapshot.airports.len(),
        };

        self.publish(snapshot);
        tracing::info!(?outcome, "Corpus refreshed");
        Ok(outcome)
    }

    fn publish(&self, snapshot: CorpusSnapshot) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(snapshot);
    }
}

async fn build_snapshot(
    contents: &str,
    embedder: Option<&CorpusEmbedder>,
) -> AppResult<CorpusSnapshot> {
    let hash = content_hash(contents);
    let mut records = parse_jsonl(contents)?;

    if let Some(embedder) = embedder {
        if let Err(e) = embed_missing(
            embedder.provider.as_ref(),
            &mut records,
            embedder.batch_size,
            embedder.timeout,
        )
        .await
        {
            if !e.is_backend_unavailable() {
                return Err(e);
            }
            tracing::warn!(
                "Could not precompute corpus embeddings, ranking will embed on demand: {}",
                e
            );
        }
    }

    CorpusSnapshot::build(records, hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::{MockProvider, TrigramProvider};
    use std::fs;
    use tempfile::TempDir;

    const TWO_AIRPORTS: &str = r#"{"id":"EGLL-2","airport":"egll","text":"Taxiway B closed"}
{"id":"EGLL-1","airport":"EGLL","text":"Runway 09L closed"}

{"id":"EGLC-1","icao":"EGLC","text":"PAPI unserviceable"}
"#;

    fn embedder(provider: Arc<dyn EmbeddingProvider>) -> CorpusEmbedder {
        CorpusEmbedder {
            provider,
            batch_size: 8,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_parse_jsonl_reports_line_numbers() {
        let err = parse_jsonl("{\"id\":\"A\",\"airport\":\"EGLL\",\"text\":\"t\"}\nnot json\n")
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_load_orders_by_id_and_normalizes_airport() {
        let store = CorpusStore::open(CorpusSource::Inline(TWO_AIRPORTS.to_string()), None)
            .await
            .unwrap();

        let egll = store.load("egll").unwrap();
        let ids: Vec<&str> = egll.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["EGLL-1", "EGLL-2"]);
        assert_eq!(
            store.all_airports(),
            BTreeSet::from(["EGLC".to_string(), "EGLL".to_string()])
        );
    }

    #[tokio::test]
    async fn test_unknown_airport_is_unavailable() {
        let store = CorpusStore::open(CorpusSource::Builtin, None).await.unwrap();
        match store.load("ZZZZ") {
            Err(AppError::CorpusUnavailable { airport }) => assert_eq!(airport, "ZZZZ"),
            other => panic!("expected CorpusUnavailable, got {:?}", other.map(|c| c.len())),
        }
    }

    #[tokio::test]
    async fn test_builtin_corpus_covers_heathrow_and_city() {
        let store = CorpusStore::open(CorpusSource::Builtin, None).await.unwrap();
        let airports = store.all_airports();
        assert!(airports.contains("EGLL"));
        assert!(airports.contains("EGLC"));
        assert!(store
            .load("EGLL")
            .unwrap()
            .records
            .iter()
            .any(|r| r.id == "EGLL-2025-001"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let records = vec![
            NoticeRecord::new("A", "EGLL", "one"),
            NoticeRecord::new("A", "EGLC", "two"),
        ];
        assert!(matches!(
            CorpusSnapshot::build(records, String::new()),
            Err(AppError::CorpusIntegrity(_))
        ));
    }

    #[test]
    fn test_inverted_window_rejected() {
        let mut record = NoticeRecord::new("A", "EGLL", "one");
        record.effective_from = Some(Utc::now());
        record.effective_to = Some(Utc::now() - chrono::Duration::hours(1));
        assert!(CorpusSnapshot::build(vec![record], String::new()).is_err());
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let records = vec![
            NoticeRecord::new("A", "EGLL", "one").with_embedding(vec![1.0, 0.0]),
            NoticeRecord::new("B", "EGLL", "two").with_embedding(vec![1.0, 0.0, 0.0]),
        ];
        match CorpusSnapshot::build(records, String::new()) {
            Err(AppError::EmbeddingDimensionMismatch {
                record,
                expected,
                actual,
            }) => {
                assert_eq!(record, "B");
                assert_eq!((expected, actual), (2, 3));
            }
            other => panic!("expected dimension mismatch, got {:?}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn test_open_precomputes_embeddings() {
        let store = CorpusStore::open(
            CorpusSource::Inline(TWO_AIRPORTS.to_string()),
            Some(embedder(Arc::new(TrigramProvider::new(32)))),
        )
        .await
        .unwrap();

        let stats = store.snapshot().stats();
        assert_eq!(stats.records, 3);
        assert_eq!(stats.embedded, 3);
        assert_eq!(store.snapshot().dimensions(), Some(32));
    }

    #[tokio::test]
    async fn test_open_survives_embedding_outage() {
        let store = CorpusStore::open(
            CorpusSource::Inline(TWO_AIRPORTS.to_string()),
            Some(embedder(Arc::new(MockProvider::unavailable(32)))),
        )
        .await
        .unwrap();

        assert_eq!(store.snapshot().stats().embedded, 0);
    }

    #[tokio::test]
    async fn test_refresh_retries_missing_embeddings() {
        let provider = Arc::new(MockProvider::unavailable(32));
        let store = CorpusStore::open(
            CorpusSource::Inline(TWO_AIRPORTS.to_string()),
            Some(embedder(provider.clone())),
        )
        .await
        .unwrap();
        assert_eq!(store.snapshot().stats().embedded, 0);

        assert_eq!(store.refresh().await.unwrap(), RefreshOutcome::Unchanged);
        assert_eq!(provider.calls(), 2);

        provider.set_available(true);
        assert_eq!(
            store.refresh().await.unwrap(),
            RefreshOutcome::Embedded { embedded: 3 }
        );
        assert_eq!(store.snapshot().stats().embedded, 3);

        let calls = provider.calls();
        assert_eq!(store.refresh().await.unwrap(), RefreshOutcome::Unchanged);
        assert_eq!(provider.calls(), calls);
    }

    #[tokio::test]
    async fn test_refresh_only_publishes_changes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notams.jsonl");
        fs::write(&path, TWO_AIRPORTS).unwrap();

        let store = CorpusStore::open(CorpusSource::File(path.clone()), None)
            .await
            .unwrap();
        let first = store.snapshot();

        assert_eq!(store.refresh().await.unwrap(), RefreshOutcome::Unchanged);
        assert!(Arc::ptr_eq(&first, &store.snapshot()));

        fs::write(
            &path,
            "{\"id\":\"EGKK-1\",\"airport\":\"EGKK\",\"text\":\"Runway 08R closed\"}\n",
        )
        .unwrap();

        assert_eq!(
            store.refresh().await.unwrap(),
            RefreshOutcome::Updated {
                records: 1,
                airports: 1
            }
        );
        assert!(store.load("EGLL").is_err());
        assert_eq!(store.load("EGKK").unwrap().len(), 1);
        // Readers holding the old snapshot keep a consistent view
        assert_eq!(first.record_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_old_snapshot() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notams.jsonl");
        fs::write(&path, TWO_AIRPORTS).unwrap();

        let store = CorpusStore::open(CorpusSource::File(path.clone()), None)
            .await
            .unwrap();
        fs::write(&path, "{broken").unwrap();

        assert!(store.refresh().await.is_err());
        assert_eq!(store.snapshot().record_count(), 3);
    }

    #[test]
    fn test_content_hash_is_hex_sha256() {
        let hash = content_hash("");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
