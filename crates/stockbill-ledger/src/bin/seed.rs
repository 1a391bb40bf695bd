//! # Seed Data Generator
//!
//! Fills a development database with a catalog, a few clients and some
//! billed sales, going through the ledger so stock and invoice numbers end
//! up consistent.
//!
//! ## Usage
//! ```bash
//! # 60 products, 8 clients, 25 sales (defaults)
//! cargo run -p stockbill-ledger --bin seed
//!
//! # Custom amounts
//! cargo run -p stockbill-ledger --bin seed -- --count 200 --sales 100
//!
//! # Specify database path (otherwise STOCKBILL_DB_PATH, then the
//! # platform data directory)
//! cargo run -p stockbill-ledger --bin seed -- --db ./data/stockbill.db
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info,stockbill=debug,sqlx=warn`).

use std::env;
use std::path::PathBuf;

use directories::ProjectDirs;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stockbill_core::{ClientInput, LineRequest, ProductInput};
use stockbill_db::{Database, DbConfig};
use stockbill_ledger::{Ledger, LedgerConfig};

/// Catalog families: (SKU prefix, category, base price in cents, names).
const FAMILIES: &[(&str, &str, i64, &[&str])] = &[
    (
        "PAP",
        "Paper",
        450,
        &["Papel A4", "Papel Carta", "Papel Oficio", "Cartulina", "Papel Kraft"],
    ),
    (
        "ESC",
        "Writing",
        120,
        &["Boligrafo Azul", "Boligrafo Negro", "Lapiz HB", "Marcador", "Resaltador"],
    ),
    (
        "ARC",
        "Filing",
        890,
        &["Carpeta", "Archivador", "Folder Manila", "Separadores", "Sobre Bolsa"],
    ),
    (
        "OFI",
        "Office",
        1590,
        &["Engrapadora", "Perforadora", "Tijeras", "Cinta Adhesiva", "Calculadora"],
    ),
];

const CLIENTS: &[(&str, &str)] = &[
    ("Papeleria del Centro", "centro"),
    ("Grupo Escolar Norte", "norte"),
    ("Despacho Ruiz y Asociados", "ruiz"),
    ("Colegio San Miguel", "sanmiguel"),
    ("Oficinas Delta", "delta"),
    ("Imprenta La Estrella", "estrella"),
    ("Consultores Vega", "vega"),
    ("Libreria Cervantes", "cervantes"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 60;
    let mut sales: usize = 25;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(count);
                    i += 1;
                }
            }
            "--sales" | "-s" => {
                if i + 1 < args.len() {
                    sales = args[i + 1].parse().unwrap_or(sales);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("stockbill Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 60)");
                println!("  -s, --sales <N>    Number of sales to bill (default: 25)");
                println!("  -d, --db <PATH>    Database file path");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let db_path = match db_path {
        Some(path) => path,
        None => get_database_path()?,
    };

    println!("stockbill Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path.display());
    println!("Products: {}", count);
    println!("Sales:    {}", sales);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let ledger = Ledger::new(db, LedgerConfig::from_env());

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = ledger.db().products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Products
    let catalog = ledger.catalog();
    let mut product_ids = Vec::with_capacity(count);
    for seed in 0..count {
        let input = generate_product(seed);
        match catalog.create_product(input).await {
            Ok(product) => product_ids.push(product.id),
            Err(e) => eprintln!("Failed to insert product {}: {}", seed, e),
        }
    }
    println!("✓ Generated {} products", product_ids.len());

    // Clients
    let mut client_ids = Vec::with_capacity(CLIENTS.len());
    for (name, key) in CLIENTS {
        match catalog.create_client(generate_client(name, key)).await {
            Ok(client) => client_ids.push(client.id),
            Err(e) => eprintln!("Failed to insert client {}: {}", name, e),
        }
    }
    println!("✓ Generated {} clients", client_ids.len());

    // Sales
    let mut billed = 0;
    let mut refused = 0;
    if !product_ids.is_empty() && !client_ids.is_empty() {
        let composer = ledger.composer();
        let lifecycle = ledger.lifecycle();

        for seed in 0..sales {
            let client_id = &client_ids[seed % client_ids.len()];
            let lines = generate_lines(seed, &product_ids);

            match composer.create_sale(client_id, &lines).await {
                Ok(details) => {
                    billed += 1;
                    // Every seventh sale comes back.
                    if seed % 7 == 6 {
                        lifecycle.process_return(&details.sale.id).await?;
                    }
                }
                Err(e) => {
                    refused += 1;
                    info!(error = %e, "Seed sale refused");
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!("✓ Billed {} sales ({} refused for stock)", billed, refused);
    println!();
    println!("✓ Seed complete in {:?}", elapsed);

    ledger.db().close().await;
    Ok(())
}

/// Initializes the tracing subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stockbill=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Database file location.
///
/// `STOCKBILL_DB_PATH` wins; otherwise the platform data directory
/// (`~/.local/share/stockbill/stockbill.db` on Linux).
fn get_database_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Ok(path) = env::var("STOCKBILL_DB_PATH") {
        return Ok(PathBuf::from(path));
    }

    let proj_dirs = ProjectDirs::from("com", "stockbill", "stockbill")
        .ok_or("Could not determine app data directory")?;

    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;

    Ok(data_dir.join("stockbill.db"))
}

/// Product number `seed`, cycling through families and names.
fn generate_product(seed: usize) -> ProductInput {
    let (prefix, category, base_price, names) = FAMILIES[seed % FAMILIES.len()];
    let name = names[(seed / FAMILIES.len()) % names.len()];
    let batch = seed / (FAMILIES.len() * names.len());

    let name = if batch == 0 {
        name.to_string()
    } else {
        format!("{} x{}", name, batch + 1)
    };

    ProductInput {
        name,
        sku: format!("{}-{:04}", prefix, seed),
        price_cents: base_price + ((seed * 37) % 500) as i64,
        stock: 5 + (seed % 40) as i64,
        category: category.to_string(),
        description: None,
        image_url: None,
        video_url: None,
    }
}

fn generate_client(name: &str, key: &str) -> ClientInput {
    ClientInput {
        name: name.to_string(),
        email: format!("compras@{}.example.com", key),
        phone: format!("55-{:04}-{:04}", key.len() * 101, key.len() * 37),
        address: format!("Calle {} 100", name.split(' ').next().unwrap_or(name)),
        tax_id: format!("RFC{}", key.to_uppercase()),
    }
}

/// One to three lines over distinct products.
fn generate_lines(seed: usize, product_ids: &[String]) -> Vec<LineRequest> {
    let lines = 1 + seed % 3;
    (0..lines)
        .map(|n| {
            let product = &product_ids[(seed * 7 + n * 13) % product_ids.len()];
            LineRequest::new(product, 1 + ((seed + n) % 4) as i64)
        })
        .collect()
}
