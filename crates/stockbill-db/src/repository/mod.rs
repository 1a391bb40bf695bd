//! # Repository Module
//!
//! Database repository implementations for stockbill.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Ledger service                                                        │
//! │       │                                                                 │
//! │       │  db.products().try_decrement_stock(id, 3)                      │
//! │       ▼                                                                 │
//! │  ProductRepository / ClientRepository / SaleRepository                 │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Statements that must join a caller's transaction are also exposed     │
//! │  as free `*_on(executor, ...)` functions next to each repository.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog CRUD and atomic stock primitives
//! - [`ClientRepository`](client::ClientRepository) - Client CRUD and uniqueness checks
//! - [`SaleRepository`](sale::SaleRepository) - Numbered inserts, status guards, report queries

pub mod client;
pub mod product;
pub mod sale;
