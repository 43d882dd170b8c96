//! # Repository Module
//!
//! Database repository implementations for Tally.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  HTTP Handler                                                          │
//! │       │                                                                 │
//! │       │  db.products().search("shirt")                                 │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── search(&self, query)                                              │
//! │  ├── get_with_variants(&self, id)                                      │
//! │  ├── create(&self, input)                                              │
//! │  └── update(&self, id, input)                                          │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Clean separation of concerns                                        │
//! │  • Easy to test (in-memory database)                                   │
//! │  • SQL is isolated in one place                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Product and variant CRUD, search, stock
//! - [`service::ServiceRepository`] - Service CRUD
//! - [`order::OrderRepository`] - Order placement and queries
//! - [`payment::PaymentRepository`] - Payment recording and status derivation
//! - [`ledger::LedgerRepository`] - Sales records and cashout transactions

pub mod ledger;
pub mod order;
pub mod payment;
pub mod product;
pub mod service;
