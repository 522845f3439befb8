//! # Seed Data Generator
//!
//! Populates the database with the pastificio catalog for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p pastificio-db --bin seed
//!
//! # Specify database path
//! cargo run -p pastificio-db --bin seed -- --db ./data/pastificio.db
//!
//! # Multiply starting stock (e.g. a busy Saturday)
//! cargo run -p pastificio-db --bin seed -- --stock-factor 3
//! ```
//!
//! ## Generated Products
//! - Fresh pasta by weight (kg)
//! - Filled pasta by the box
//! - Sauces and broths by volume (liters)
//! - Dry pasta packs by the unit
//!
//! Ids are stable (`TAG-FRE`, `RAV-BOX`, ...) so they can be typed in
//! by hand when poking at the HTTP API.

use chrono::Utc;
use pastificio_core::{Product, UnitOfMeasure};
use pastificio_db::{Database, DbConfig};
use std::env;

/// (id, description, category, unit, price in cents, base stock)
const CATALOG: &[(&str, &str, &str, UnitOfMeasure, i64, f64)] = &[
    ("TAG-FRE", "Tagliatelle all'uovo", "fresh", UnitOfMeasure::Weight, 1240, 12.0),
    ("PAP-FRE", "Pappardelle all'uovo", "fresh", UnitOfMeasure::Weight, 1290, 8.0),
    ("FET-FRE", "Fettuccine", "fresh", UnitOfMeasure::Weight, 1180, 10.0),
    ("GNO-FRE", "Gnocchi di patate", "fresh", UnitOfMeasure::Weight, 990, 15.0),
    ("LAS-FRE", "Sfoglia per lasagne", "fresh", UnitOfMeasure::Weight, 1350, 6.5),
    ("RAV-BOX", "Ravioli ricotta e spinaci (box 12)", "filled", UnitOfMeasure::Box, 1800, 20.0),
    ("TOR-BOX", "Tortellini di carne (box 500 g)", "filled", UnitOfMeasure::Box, 2100, 18.0),
    ("SOR-BOX", "Sorrentinos jamón y queso (box 12)", "filled", UnitOfMeasure::Box, 1950, 14.0),
    ("CAP-BOX", "Cappelletti (box 500 g)", "filled", UnitOfMeasure::Box, 2050, 10.0),
    ("SAL-POM", "Salsa pomodoro", "sauces", UnitOfMeasure::Volume, 850, 9.0),
    ("SAL-BOL", "Ragù alla bolognese", "sauces", UnitOfMeasure::Volume, 1450, 7.5),
    ("SAL-PES", "Pesto genovese", "sauces", UnitOfMeasure::Volume, 1990, 4.0),
    ("BRO-GAL", "Brodo di gallina", "sauces", UnitOfMeasure::Volume, 690, 10.0),
    ("FUS-500", "Fusilli secchi 500 g", "dry", UnitOfMeasure::Unit, 320, 40.0),
    ("SPA-500", "Spaghetti secchi 500 g", "dry", UnitOfMeasure::Unit, 310, 40.0),
    ("PEN-500", "Penne rigate 500 g", "dry", UnitOfMeasure::Unit, 315, 35.0),
    ("PAR-200", "Parmigiano grattugiato 200 g", "deli", UnitOfMeasure::Unit, 540, 25.0),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./pastificio_dev.db");
    let mut stock_factor: f64 = 1.0;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--stock-factor" | "-s" => {
                if i + 1 < args.len() {
                    stock_factor = args[i + 1].parse().unwrap_or(1.0);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Pastificio Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>           Database file path (default: ./pastificio_dev.db)");
                println!("  -s, --stock-factor <F>    Multiply starting stock (default: 1)");
                println!("  -h, --help                Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Pastificio Seed Data Generator");
    println!("=================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Upserting catalog entries (stock is reset).");
    }

    let now = Utc::now();
    let mut written = 0;

    for (id, description, category, measure, price, stock) in CATALOG {
        let product = Product {
            id: id.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            unit_price_cents: *price,
            unit_of_measure: *measure,
            stock_quantity: seed_stock(*measure, *stock, stock_factor),
            active: true,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = db.products().upsert(&product).await {
            eprintln!("Failed to write {}: {}", product.id, e);
            continue;
        }
        written += 1;
    }

    println!();
    println!("✓ Wrote {} products", written);

    for product in db.products().list(5).await? {
        println!(
            "  {:<8} {:<40} {:>8.2} {}",
            product.id, product.description, product.stock_quantity, product.unit_of_measure
        );
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Scales stock; whole-quantity products are rounded down.
fn seed_stock(measure: UnitOfMeasure, base: f64, factor: f64) -> f64 {
    let scaled = (base * factor).max(0.0);
    if measure.requires_integral_quantity() {
        scaled.floor()
    } else {
        scaled
    }
}
