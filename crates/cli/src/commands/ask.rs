//! Ask command handler.
//!
//! Answers one NOTAM question from the command line, using the same service
//! the HTTP endpoint uses.

use clap::Args;
use skylens_core::{config::AppConfig, AppResult};
use skylens_knowledge::{Answer, NotamService, DEFAULT_AIRPORT, DEFAULT_TOP_K};

/// Ask a question about an airport's NOTAMs
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// ICAO code of the airport
    #[arg(long, default_value = DEFAULT_AIRPORT)]
    pub icao: String,

    /// Number of matching notices to retrieve (1-20)
    #[arg(short, default_value_t = DEFAULT_TOP_K)]
    pub k: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let service = NotamService::from_config(config).await?;
        let answer = service
            .ask(&self.question, Some(&self.icao), Some(self.k))
            .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&answer)?);
        } else {
            print_answer(&answer);
        }

        Ok(())
    }
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.answer);

    if !answer.matches.is_empty() {
        println!();
        println!("Matches:");
        for m in &answer.matches {
            let cited = if answer.citations.contains(&m.id) { "*" } else { " " };
            println!("{} [{}] ({:.3}) {}", cited, m.id, m.score, m.text);
        }
    }

    println!();
    println!("Provider: {}", answer.provider);
}
