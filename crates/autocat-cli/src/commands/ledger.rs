//! Firefly III and connectivity command implementations

use anyhow::{bail, Context, Result};
use autocat_core::{ClassificationEngine, ModelBackend};

/// Print the option sets the model chooses from
pub async fn cmd_options(engine: &ClassificationEngine) -> Result<()> {
    let options = engine
        .ledger()
        .fetch_options()
        .await
        .context("Failed to fetch option sets from Firefly III")?;

    println!("Categories ({}):", options.categories.len());
    for name in options.category_names() {
        println!("  {:<30} #{}", name, options.categories[name]);
    }

    println!("\nBudgets ({}):", options.budgets.len());
    for name in options.budget_names() {
        println!("  {:<30} #{}", name, options.budgets[name]);
    }

    println!("\nBills ({}):", options.bills.len());
    for name in options.bill_names() {
        let bill = &options.bills[name];
        println!(
            "  {:<30} #{:<6} {:>10.2} - {:<10.2}{}",
            name,
            bill.id,
            bill.amount_min,
            bill.amount_max,
            if bill.active { "" } else { " (inactive)" }
        );
    }

    Ok(())
}

/// Check that both external services answer
pub async fn cmd_check(engine: &ClassificationEngine) -> Result<()> {
    let ledger = engine.ledger();
    let model = engine.model();

    println!("🔍 Checking services...\n");
    println!("  Firefly III: {}", ledger.base_url());
    println!("  Model:       {} @ {}", model.model(), model.host());
    println!("  Strategy:    {}", engine.strategy());
    println!("  Marker tag:  {}\n", ledger.tag());

    let ledger_ok = ledger.health_check().await;
    println!(
        "Firefly III... {}",
        if ledger_ok { "✅ Connected" } else { "❌ Failed" }
    );

    let model_ok = model.health_check().await;
    println!(
        "Model backend... {}",
        if model_ok { "✅ Connected" } else { "❌ Failed" }
    );

    match (ledger_ok, model_ok) {
        (true, true) => Ok(()),
        (false, true) => bail!("Firefly III is not reachable at {}", ledger.base_url()),
        (true, false) => bail!("Model backend is not reachable at {}", model.host()),
        (false, false) => bail!("Neither Firefly III nor the model backend is reachable"),
    }
}
