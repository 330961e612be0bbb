//! Embedding engine for the NOTAM corpus.
//!
//! Provides provider-agnostic embedding generation and the batch step that
//! fills in missing record embeddings before a corpus snapshot is published.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use crate::types::NoticeRecord;
use futures::{StreamExt, TryStreamExt};
use skylens_core::{AppError, AppResult};
use std::time::Duration;

/// Batches in flight at once while precomputing corpus embeddings.
const EMBED_CONCURRENCY: usize = 4;

/// Embed every record that has no embedding yet.
///
/// All-or-nothing: on any failure (including `timeout` elapsing) no record
/// is modified and the error is returned. Returns the number of records
/// embedded.
pub async fn embed_missing(
    provider: &dyn EmbeddingProvider,
    records: &mut [NoticeRecord],
    batch_size: usize,
    timeout: Duration,
) -> AppResult<usize> {
    let missing: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.embedding.is_none())
        .map(|(position, _)| position)
        .collect();

    if missing.is_empty() {
        return Ok(0);
    }

    let batches: Vec<Vec<String>> = missing
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.iter().map(|&i| records[i].text.clone()).collect())
        .collect();

    tracing::info!(
        "Embedding {} notices in {} batches using provider '{}' (model: {})",
        missing.len(),
        batches.len(),
        provider.provider_name(),
        provider.model_name()
    );

    let work = futures::stream::iter(batches)
        .map(|batch| async move {
            let vectors = provider.embed_batch(&batch).await?;
            if vectors.len() != batch.len() {
                return Err(AppError::BackendUnavailable(format!(
                    "Embedding backend returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            Ok(vectors)
        })
        .buffered(EMBED_CONCURRENCY)
        .try_collect::<Vec<Vec<Vec<f32>>>>();

    let vectors: Vec<Vec<f32>> = tokio::time::timeout(timeout, work)
        .await
        .map_err(|_| {
            AppError::BackendUnavailable(format!(
                "Embedding corpus timed out after {}s",
                timeout.as_secs_f32()
            ))
        })??
        .into_iter()
        .flatten()
        .collect();

    for (&position, vector) in missing.iter().zip(vectors) {
        records[position].embedding = Some(vector);
    }

    tracing::debug!("Embedded {} notices", missing.len());
    Ok(missing.len())
}
