//! # Demo Data Seeder
//!
//! Seeds a tenant with a small catalog and walks one quote through the
//! whole lifecycle: quote → order → finalized.
//!
//! ## Usage
//! ```bash
//! # Seed the database from stockflow.toml / STOCKFLOW_* / defaults
//! cargo run -p stockflow-db --bin seed
//!
//! # Specify database path and tenant
//! cargo run -p stockflow-db --bin seed -- --db ./stockflow_dev.db --tenant demo
//! ```
//!
//! Prints the finalized order's report and the tenant's metrics as JSON.

use std::env;
use std::path::PathBuf;

use stockflow_core::{LineItemInput, NewDocument, NewInflow, NewProduct};
use stockflow_db::{Database, StockflowConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Catalog seeded for the tenant: (title, quantity, cost, selling price).
const CATALOG: &[(&str, i64, i64, i64)] = &[
    ("Ballpoint Pen", 10, 500, 2000),
    ("A4 Paper Ream", 40, 1800, 2990),
    ("Ink Cartridge", 6, 3500, 5990),
    ("Stapler", 12, 900, 1990),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;
    let mut tenant_id = String::from("demo");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stockflow Demo Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("  -t, --tenant <ID>    Tenant to seed (default: demo)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = StockflowConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("Stockflow Demo Seeder");
    println!("=====================");
    println!("Database: {}", config.database.path.display());
    println!("Tenant:   {}", tenant_id);
    println!();

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database");

    let existing = db.products().count(&tenant_id).await?;
    if existing > 0 {
        println!("⚠ Tenant already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Use another --tenant or delete the database file.");
        return Ok(());
    }

    // Catalog
    let mut products = Vec::new();
    for (title, quantity, cost, selling) in CATALOG {
        let product = db
            .products()
            .create(
                &tenant_id,
                &NewProduct {
                    title: title.to_string(),
                    quantity: *quantity,
                    cost_price_cents: *cost,
                    selling_price_cents: *selling,
                    description: None,
                },
            )
            .await?;
        products.push(product);
    }
    println!("✓ Created {} products", products.len());

    // A supplier delivery
    db.ledger()
        .record_inflow(
            &tenant_id,
            &NewInflow {
                product_id: products[1].id.clone(),
                quantity: 20,
                supplier_reference: Some("PO-0001".to_string()),
                description: Some("Opening delivery".to_string()),
            },
        )
        .await?;
    println!("✓ Recorded inflow of 20 × {}", products[1].title);

    // Quote → order → finalized
    let lifecycle = db.lifecycle();
    let quote = lifecycle
        .create_document(
            &tenant_id,
            &NewDocument::quote(vec![
                LineItemInput::new(&products[0].id, 3, products[0].selling_price_cents),
                LineItemInput::new(&products[1].id, 2, products[1].selling_price_cents),
            ])
            .with_discount(1000)
            .with_client("client-001"),
        )
        .await?
        .document;
    println!("✓ Quote {} created, total {}", quote.id, quote.total());

    let order = lifecycle.convert_to_order(&tenant_id, &quote.id).await?.document;
    println!("✓ Converted to order {}", order.id);

    let outcome = lifecycle.finalize(&tenant_id, &order.id).await?;
    println!(
        "✓ Order finalized: {} outflow(s), {} skipped",
        outcome.outflows.len(),
        outcome.skipped.len()
    );
    info!(order_id = %order.id, "Demo lifecycle complete");

    let report = lifecycle.document_report(&tenant_id, &order.id).await?;
    let sales = db.metrics().sales_summary(&tenant_id).await?;
    let inventory = db.metrics().inventory_valuation(&tenant_id).await?;

    println!();
    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("{}", serde_json::to_string_pretty(&sales)?);
    println!("{}", serde_json::to_string_pretty(&inventory)?);

    db.close().await;
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Initializes the tracing subscriber.
///
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=stockflow_db=trace` - Trace the database layer only
/// - Default: INFO, debug for stockflow crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stockflow_db=debug,stockflow_core=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
