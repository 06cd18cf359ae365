//! Show which slot each index of an endpoint is serving from.

use super::CommandResult;
use hubindex_core::{EndpointConfig, IndexManager};
use hubindex_engine::SearchEngine;
use serde_json::json;

/// Prints the status of every index of the endpoint.
pub fn run<E: SearchEngine>(
    manager: &IndexManager<E>,
    endpoint: &EndpointConfig,
    format: &str,
) -> CommandResult {
    let mut rows = Vec::new();
    for logical in manager.resolver().endpoint_index_names(endpoint)? {
        rows.push(manager.status(&logical)?);
    }

    match format {
        "json" => {
            let rows: Vec<_> = rows
                .iter()
                .map(|status| {
                    json!({
                        "alias": status.logical.as_str(),
                        "live": status.live.as_ref().map(|p| p.as_str()),
                        "orphan": status.orphan.as_ref().map(|p| p.as_str()),
                        "documents": status.documents,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        "text" => {
            println!("Endpoint: {}", endpoint.name);
            for status in &rows {
                let live = status
                    .live
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let documents = status
                    .documents
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("  {:<48} {:<52} {:>10}", status.logical, live, documents);
                if let Some(orphan) = &status.orphan {
                    println!("    ! unbound index {} (run `prune`)", orphan);
                }
            }
        }
        other => return Err(format!("unknown format '{}' (expected text or json)", other).into()),
    }
    Ok(())
}
