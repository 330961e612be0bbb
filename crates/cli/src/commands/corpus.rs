//! Corpus command handler.
//!
//! Lists the curated notices the service would answer from.

use clap::Args;
use serde::Serialize;
use skylens_core::{config::AppConfig, AppResult};
use skylens_knowledge::{CorpusSource, CorpusStore, NoticeRecord};

/// List curated airports and notices
#[derive(Args, Debug)]
pub struct CorpusCommand {
    /// Only show this airport
    #[arg(long)]
    pub icao: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AirportListing<'a> {
    airport: &'a str,
    records: Vec<&'a NoticeRecord>,
}

impl CorpusCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing corpus command");

        // Listing never needs embeddings
        let source = CorpusSource::from_path(config.rag.corpus_path.as_deref());
        let store = CorpusStore::open(source, None).await?;
        let snapshot = store.snapshot();

        let airports: Vec<_> = match &self.icao {
            Some(icao) => vec![store.load(icao)?],
            None => snapshot.airports().cloned().collect(),
        };

        if self.json {
            let listings: Vec<AirportListing> = airports
                .iter()
                .map(|corpus| AirportListing {
                    airport: &corpus.airport,
                    records: corpus.records.iter().map(|r| r.as_ref()).collect(),
                })
                .collect();
            let output = serde_json::json!({
                "source": store.source().describe(),
                "stats": snapshot.stats(),
                "airports": listings,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!(
            "Corpus: {} ({} notices, hash {})",
            store.source().describe(),
            snapshot.record_count(),
            &snapshot.content_hash()[..12.min(snapshot.content_hash().len())]
        );
        for corpus in airports {
            println!();
            println!("{} ({} notices)", corpus.airport, corpus.len());
            for record in &corpus.records {
                let category = record.category.as_deref().unwrap_or("-");
                println!("  {:<16} {:<10} {}", record.id, category, record.text);
            }
        }

        Ok(())
    }
}
