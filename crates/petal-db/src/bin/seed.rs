//! # Seed Data Generator
//!
//! Populates the database with a demo catalogue and discount codes.
//!
//! ## Usage
//! ```bash
//! # Database path from storefront.toml / PETAL_DB_PATH
//! cargo run -p petal-db --bin seed
//!
//! # Explicit database path
//! cargo run -p petal-db --bin seed -- --db ./data/petal.db
//! ```
//!
//! ## Generated Data
//! - One product per arrangement, with a small / medium / large variant
//! - Deterministic SKUs: `{SLUG}-{SIZE}`
//! - Stock between 0 and 40, so every stock status shows up
//! - Discount codes covering each discount type

use std::collections::BTreeMap;
use std::env;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use petal_checkout::telemetry::init_tracing;
use petal_checkout::StorefrontConfig;
use petal_core::{new_id, Discount, DiscountType, Product, ProductVariant};
use petal_db::{Database, DbConfig};

/// (name, slug, base price in cents)
const ARRANGEMENTS: &[(&str, &str, i64)] = &[
    ("Garden Roses", "garden-roses", 3900),
    ("Spring Tulips", "spring-tulips", 2900),
    ("Peony Cloud", "peony-cloud", 5400),
    ("Wildflower Meadow", "wildflower-meadow", 3400),
    ("Sunflower Burst", "sunflower-burst", 2600),
    ("Orchid Elegance", "orchid-elegance", 6900),
    ("Lavender Fields", "lavender-fields", 2400),
    ("Hydrangea Blue", "hydrangea-blue", 4200),
];

/// (size label, price add-on in cents)
const SIZES: &[(&str, i64)] = &[("Small", 0), ("Medium", 1500), ("Large", 3000)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let config = StorefrontConfig::load_or_default(None);
    let mut db_path = config.database.path.clone();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Petal Storefront Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: from storefront.toml)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(path = %db_path, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let catalog = db.catalog();

    let existing = catalog.count_variants().await?;
    if existing > 0 {
        println!("⚠ Database already has {} variants", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0usize;

    for (index, (name, slug, base_price)) in ARRANGEMENTS.iter().enumerate() {
        let product = Product {
            id: new_id(),
            name: name.to_string(),
            slug: slug.to_string(),
            images: vec![
                format!("https://images.petal.example/{}/front.jpg", slug),
                format!("https://images.petal.example/{}/side.jpg", slug),
            ],
        };
        catalog.upsert_product(&product).await?;

        for (size_index, (size, addon)) in SIZES.iter().enumerate() {
            let variant = generate_variant(&product, size, base_price + addon, index * 3 + size_index);
            if let Err(e) = catalog.upsert_variant(&variant).await {
                eprintln!("Failed to insert {}: {}", variant.sku, e);
                continue;
            }
            generated += 1;
        }
    }

    let discounts = db.discounts();
    for discount in demo_discounts() {
        discounts.upsert(&discount).await?;
    }

    println!();
    println!("✓ Generated {} variants in {:?}", generated, start.elapsed());
    println!("✓ Discount codes: WELCOME10, SAVE5, FREESHIP, LAUNCH");
    println!("✓ Seed complete!");

    Ok(())
}

fn generate_variant(product: &Product, size: &str, price_cents: i64, seed: usize) -> ProductVariant {
    let locale_prices = BTreeMap::from([
        ("en-GB".to_string(), price_cents * 80 / 100),
        ("en-CA".to_string(), price_cents * 135 / 100),
    ]);
    let attributes = BTreeMap::from([
        ("size".to_string(), size.to_lowercase()),
        ("vase".to_string(), if seed % 2 == 0 { "included" } else { "none" }.to_string()),
    ]);

    ProductVariant {
        id: new_id(),
        product_id: product.id.clone(),
        sku: format!("{}-{}", product.slug.to_uppercase(), size.to_uppercase()),
        name: size.to_string(),
        price_cents,
        locale_prices,
        stock_quantity: ((seed * 7) % 41) as i64,
        attributes,
    }
}

fn demo_discounts() -> Vec<Discount> {
    let now = Utc::now();
    let base = Discount {
        id: String::new(),
        code: String::new(),
        discount_type: DiscountType::Percentage,
        value: 0,
        min_spend_cents: None,
        max_uses: None,
        used_count: 0,
        valid_from: now - Duration::days(1),
        valid_until: None,
        active: true,
    };

    vec![
        Discount {
            id: new_id(),
            code: "WELCOME10".to_string(),
            value: 10,
            ..base.clone()
        },
        Discount {
            id: new_id(),
            code: "SAVE5".to_string(),
            discount_type: DiscountType::Fixed,
            value: 500,
            min_spend_cents: Some(2500),
            ..base.clone()
        },
        Discount {
            id: new_id(),
            code: "FREESHIP".to_string(),
            discount_type: DiscountType::Shipping,
            value: 799,
            ..base.clone()
        },
        Discount {
            id: new_id(),
            code: "LAUNCH".to_string(),
            discount_type: DiscountType::Fixed,
            value: 1000,
            max_uses: Some(100),
            valid_until: Some(now + Duration::days(30)),
            ..base
        },
    ]
}
