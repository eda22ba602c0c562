//! # Seed Data Generator
//!
//! Populates the database with a demo catalogue and discount codes.
//!
//! ## Usage
//! ```bash
//! # Default database path
//! cargo run -p storefront-db --bin seed
//!
//! # Specify database path and stock per product
//! cargo run -p storefront-db --bin seed -- --db ./data/storefront.db --stock 5
//! ```
//!
//! ## Generated Data
//! - One product per name below, across tops, bottoms, footwear, accessories
//! - Prices from a fixed table, VAT-inclusive, in cents
//! - `WELCOME10`: 10% off, single use
//! - `SPRING15`: 15% off orders from €80.00, capped at €25.00
//! - `FIVEOFF`: €5.00 off, unlimited

use chrono::Utc;
use std::env;
use storefront_core::{DiscountCode, DiscountKind, Product, ProductCategory};
use storefront_db::{Database, DbConfig};
use uuid::Uuid;

/// Demo catalogue: (category, name, price in cents)
const CATALOGUE: &[(ProductCategory, &str, i64)] = &[
    (ProductCategory::Tops, "Organic Cotton Tee", 2500),
    (ProductCategory::Tops, "Linen Shirt", 4500),
    (ProductCategory::Tops, "Merino Crew Sweater", 7900),
    (ProductCategory::Tops, "Hooded Sweatshirt", 5900),
    (ProductCategory::Bottoms, "Slim Chinos", 5500),
    (ProductCategory::Bottoms, "Relaxed Denim", 6900),
    (ProductCategory::Bottoms, "Pleated Shorts", 3900),
    (ProductCategory::Footwear, "Canvas Sneaker", 6500),
    (ProductCategory::Footwear, "Leather Chelsea Boot", 14900),
    (ProductCategory::Footwear, "Trail Runner", 11900),
    (ProductCategory::Accessories, "Wool Beanie", 1900),
    (ProductCategory::Accessories, "Leather Belt", 3500),
    (ProductCategory::Accessories, "Canvas Tote", 2200),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut stock: i64 = 25;
    let mut db_path = String::from("./storefront_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--stock" | "-s" => {
                if i + 1 < args.len() {
                    stock = args[i + 1].parse().unwrap_or(25);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Storefront Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --stock <N>    Units on hand per product (default: 25)");
                println!("  -d, --db <PATH>    Database file path (default: ./storefront_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Storefront Seed Data Generator");
    println!("=================================");
    println!("Database: {}", db_path);
    println!("Stock per product: {}", stock);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Inserting catalogue...");

    let mut inserted = 0;
    for (category, name, price_cents) in CATALOGUE {
        let product = demo_product(*category, name, *price_cents, stock);
        if let Err(e) = db.products().insert(&product).await {
            eprintln!("Failed to insert {}: {}", name, e);
            continue;
        }
        inserted += 1;
    }
    println!("✓ Inserted {} products", inserted);

    println!();
    println!("Inserting discount codes...");
    for code in demo_discounts() {
        match db.discounts().insert(&code).await {
            Ok(stored) => println!("  {} ({:?}, value {})", stored.code, stored.kind, stored.value),
            Err(e) => eprintln!("Failed to insert {}: {}", code.code, e),
        }
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn demo_product(category: ProductCategory, name: &str, price_cents: i64, stock: i64) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: Some(format!("{} from the demo catalogue", name)),
        category,
        price_cents,
        stock_quantity: stock,
        in_stock: stock > 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn demo_discounts() -> Vec<DiscountCode> {
    let now = Utc::now();
    let base = DiscountCode {
        code: String::new(),
        kind: DiscountKind::Percentage,
        value: 0,
        min_purchase_cents: None,
        max_discount_cents: None,
        usage_limit: None,
        used_count: 0,
        valid_from: None,
        valid_until: None,
        is_active: true,
        created_at: now,
    };

    vec![
        DiscountCode {
            code: "WELCOME10".into(),
            value: 1000,
            usage_limit: Some(1),
            ..base.clone()
        },
        DiscountCode {
            code: "SPRING15".into(),
            value: 1500,
            min_purchase_cents: Some(8000),
            max_discount_cents: Some(2500),
            ..base.clone()
        },
        DiscountCode {
            code: "FIVEOFF".into(),
            kind: DiscountKind::Fixed,
            value: 500,
            ..base
        },
    ]
}
