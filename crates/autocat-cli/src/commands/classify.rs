//! Classification command implementations

use anyhow::{bail, Context, Result};
use autocat_core::{ClassificationEngine, ClassificationResult};
use serde_json::json;
use tracing::debug;

use super::truncate;

/// Classify transactions one after another, reporting each outcome
///
/// A failing transaction does not stop the rest; the command fails at the end
/// if any of them did.
pub async fn cmd_classify(
    engine: &ClassificationEngine,
    ids: &[String],
    dry_run: bool,
    json: bool,
) -> Result<()> {
    debug!(count = ids.len(), dry_run, "Classifying transactions");

    if dry_run && !json {
        println!("Dry run: nothing will be written to Firefly III\n");
    }
    if !json {
        println!(
            "{:<10} {:<20} {:<24} {:<16} {}",
            "ID", "CATEGORY", "DESTINATION", "BUDGET", "BILL"
        );
        println!("{}", "-".repeat(84));
    }

    let mut failed = 0;
    for id in ids {
        let outcome = classify_one(engine, id, dry_run)
            .await
            .with_context(|| format!("Failed to classify transaction {}", id));

        match outcome {
            Ok(result) if json => {
                println!("{}", outcome_json(id, result.as_ref()));
            }
            Ok(Some(result)) => {
                println!(
                    "{:<10} {:<20} {:<24} {:<16} {}",
                    id,
                    truncate(&result.category, 20),
                    truncate(result.destination.as_deref().unwrap_or("-"), 24),
                    truncate(result.budget.as_deref().unwrap_or("-"), 16),
                    result.bill.as_deref().unwrap_or("-")
                );
            }
            Ok(None) => {
                println!("{:<10} (not classified: answer outside the allowed categories)", id);
            }
            Err(e) => {
                failed += 1;
                if json {
                    println!("{}", json!({"id": id, "error": format!("{:#}", e)}));
                } else {
                    eprintln!("{:<10} ❌ {:#}", id, e);
                }
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} transactions failed", failed, ids.len());
    }
    Ok(())
}

async fn classify_one(
    engine: &ClassificationEngine,
    id: &str,
    dry_run: bool,
) -> autocat_core::Result<Option<ClassificationResult>> {
    if !dry_run {
        return engine.classify_by_id(id).await;
    }

    let transaction = engine.ledger().get_transaction(id).await?;
    Ok(engine
        .resolve(&transaction)
        .await?
        .map(|resolution| resolution.result))
}

fn outcome_json(id: &str, result: Option<&ClassificationResult>) -> serde_json::Value {
    match result {
        Some(result) => json!({
            "id": id,
            "classified": true,
            "destination": result.destination,
            "category": result.category,
            "budget": result.budget,
            "bill": result.bill,
        }),
        None => json!({"id": id, "classified": false}),
    }
}
