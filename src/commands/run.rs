use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::engine::{NotifySink, PolicyEngine};
use crate::storage::FileStore;
use crate::surface::{self, Request, Response};

/// Run the policy daemon
///
/// The page/tab surface speaks one JSON document per line over
/// stdin/stdout; the periodic sweep runs concurrently and interrupts
/// standing pages that fall out of policy.
pub async fn run(store: FileStore) -> Result<()> {
    let config_path = store.config_path().display().to_string();

    let engine = PolicyEngine::new(Arc::new(store), Arc::new(NotifySink))?;

    info!("Policy engine ready (config: {})", config_path);
    info!("Reading surface messages from stdin, one JSON document per line");

    // Periodic sweep: re-evaluates open sessions once per minute
    tokio::spawn(engine.clone().run_sweeper());

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read from stdin")?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => surface::dispatch(&engine, request).await,
            Err(e) => Response::Error {
                message: format!("Invalid request: {}", e),
            },
        };

        let encoded =
            serde_json::to_string(&response).context("Failed to serialize response")?;
        println!("{}", encoded);
    }

    let open = engine.open_sessions().await;
    info!("Surface closed, shutting down ({} open sessions)", open.len());
    Ok(())
}
