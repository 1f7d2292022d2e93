//! # Repository Module
//!
//! Database repository implementations for Stockflow.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  DocumentService (lifecycle.rs)                                        │
//! │       │                                                                 │
//! │       │  one transaction per operation                                  │
//! │       ▼                                                                 │
//! │  ┌───────────────┐  ┌────────────────────┐  ┌─────────────────────┐   │
//! │  │ document.rs   │  │ stock.rs           │  │ product.rs          │   │
//! │  │ headers/items │  │ inflow / outflow   │  │ catalog, deletion   │   │
//! │  │ totals        │  │ quantity deltas    │  │ guard               │   │
//! │  │               │  │ movement audit     │  │                     │   │
//! │  └───────────────┘  └────────────────────┘  └─────────────────────┘   │
//! │                                                                         │
//! │  metrics.rs: read-only aggregates                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Product CRUD
//! - [`DocumentRepository`](document::DocumentRepository) - Document reads and reports
//! - [`StockLedger`](stock::StockLedger) - Inflows, outflows, movement history
//! - [`MetricsRepository`](metrics::MetricsRepository) - Sales and inventory figures
//!
//! Every query is scoped by `tenant_id`.

pub mod document;
pub mod metrics;
pub mod product;
pub mod stock;
