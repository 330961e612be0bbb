//! Serve command handler.
//!
//! Builds the NOTAM service once and runs the HTTP API until shutdown.

use crate::server;
use clap::Args;
use skylens_core::config::AppConfig;
use skylens_knowledge::{NotamService, ServiceSettings};
use std::sync::Arc;

/// Run the HTTP API
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to bind (default: 0.0.0.0:8000)
    #[arg(long, env = "SKYLENS_BIND")]
    pub bind: Option<String>,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing serve command");

        let service = Arc::new(NotamService::from_config(config).await?);

        let refresh_task = ServiceSettings::from_app_config(config)
            .corpus_refresh
            .map(|every| {
                tracing::info!(every_secs = every.as_secs(), "Periodic corpus refresh enabled");
                service.spawn_refresh_task(every)
            });

        let state = server::AppState::new(Arc::clone(&service), config);
        let result = server::run(state, &config.bind_addr).await;

        if let Some(task) = refresh_task {
            task.abort();
        }
        result
    }
}
