//! # stockflow-db: Database Layer for Stockflow
//!
//! SQLite storage, the stock ledger and the document lifecycle engine.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockflow Data Flow                              │
//! │                                                                         │
//! │  Caller (HTTP handler, CLI, seed)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   stockflow-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │ DocumentSvc   │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│ (lifecycle)   │    │  (embedded)  │  │   │
//! │  │   │               │    │      │        │    │              │  │   │
//! │  │   │ SqlitePool    │    │      ▼        │    │ 001_init.sql │  │   │
//! │  │   │ RetryPolicy   │    │ Repositories  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `stockflow.toml` + environment configuration
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`retry`] - Whole-transaction retry on lock conflicts
//! - [`repository`] - Products, documents, stock ledger, metrics
//! - [`lifecycle`] - Document create/edit/finalize/convert
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockflow_db::{Database, StockflowConfig};
//!
//! let config = StockflowConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let outcome = db.lifecycle().finalize("tenant-a", &order_id).await?;
//! let summary = db.metrics().sales_summary("tenant-a").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod retry;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::StockflowConfig;
pub use error::{DbError, DbResult};
pub use lifecycle::{DocumentService, FinalizeOutcome};
pub use pool::{Database, DbConfig};
pub use retry::RetryPolicy;

// Repository re-exports for convenience
pub use repository::document::DocumentRepository;
pub use repository::metrics::MetricsRepository;
pub use repository::product::ProductRepository;
pub use repository::stock::StockLedger;
