//! # Seed Data Generator
//!
//! Populates the database with catalog data for development.
//!
//! ## Usage
//! ```bash
//! # Generate 60 products (default)
//! cargo run -p tally-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p tally-db --bin seed -- --count 200
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! ## Generated Data
//! - Apparel products in assorted colors, each with S/M/L/XL variants,
//!   deterministic prices and stock levels
//! - A fixed set of print/embroidery services

use std::env;

use tally_db::repository::product::{NewProduct, NewVariant};
use tally_db::repository::service::NewService;
use tally_db::{Database, DbConfig};

/// Base product names for the catalog.
const PRODUCT_NAMES: &[&str] = &[
    "Hoodie Classic",
    "Hoodie Zip",
    "Tee Crew",
    "Tee V-Neck",
    "Polo Pique",
    "Sweatshirt Raglan",
    "Cap Snapback",
    "Tote Canvas",
    "Jacket Coach",
    "Shorts Mesh",
];

/// Colors cycled across products (searchable via /products/search).
const COLORS: &[&str] = &[
    "Black",
    "White",
    "Navy",
    "Olive",
    "Maroon",
    "Heather Grey",
];

/// Variant sizes generated per product.
const SIZES: &[&str] = &["S", "M", "L", "XL"];

/// Fixed services: (name, size, price_cents).
const SERVICES: &[(&str, Option<&str>, i64)] = &[
    ("DTF Print", Some("A4"), 1500),
    ("DTF Print", Some("A3"), 2500),
    ("Screen Print", Some("A4"), 1200),
    ("Embroidery", None, 3000),
    ("Relabeling", None, 800),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 60;
    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(60);
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
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 60)");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tally Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    // Connect to database
    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing catalog
    let existing = db.products().count_variants().await?;
    if existing > 0 {
        println!("⚠ Database already has {} variants", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating catalog...");

    let start = std::time::Instant::now();
    let mut generated = 0;

    for seed in 0..count {
        let product = generate_product(seed);

        if let Err(e) = db.products().create(product).await {
            eprintln!("Failed to insert product {}: {}", seed, e);
            continue;
        }

        generated += 1;

        if generated % 25 == 0 {
            println!("  Generated {} products...", generated);
        }
    }

    for (name, size, price_cents) in SERVICES {
        let service = NewService {
            name: (*name).to_string(),
            size: size.map(str::to_string),
            price_cents: *price_cents,
            image_url: None,
        };

        if let Err(e) = db.services().create(service).await {
            eprintln!("Failed to insert service {}: {}", name, e);
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Generated {} products ({} variants) and {} services in {:?}",
        generated,
        db.products().count_variants().await?,
        SERVICES.len(),
        elapsed
    );

    // Verify search
    println!();
    println!("Verifying search...");
    let results = db.products().search("black").await?;
    println!("  Search 'black': {} results", results.len());

    let results = db.products().search("hoodie").await?;
    println!("  Search 'hoodie': {} results", results.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single product with size variants, deterministic from seed.
fn generate_product(seed: usize) -> NewProduct {
    let name = PRODUCT_NAMES[seed % PRODUCT_NAMES.len()];
    let color = COLORS[(seed / PRODUCT_NAMES.len()) % COLORS.len()];

    // Base price $14.99-$34.99, nudged per seed
    let selling_price_cents = 1499 + ((seed * 37) % 2000) as i64;
    // Cost 55-75% of price
    let cost_pct = 55 + (seed % 20) as i64;
    let item_cost_cents = selling_price_cents * cost_pct / 100;

    let variants = SIZES
        .iter()
        .enumerate()
        .map(|(size_idx, size)| NewVariant {
            size: Some((*size).to_string()),
            quantity: ((seed + size_idx * 7) % 25) as i64,
            selling_price_cents,
            item_cost_cents,
        })
        .collect();

    NewProduct {
        name: format!("{} {}", name, color),
        description: None,
        color: Some(color.to_string()),
        image_url: None,
        variants,
    }
}
