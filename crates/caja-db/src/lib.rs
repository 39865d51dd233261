//! # caja-db: Persistence and Transactional Services for the Caja POS Core
//!
//! This crate owns the SQLite datastore and the three transactional
//! services built on top of it. It uses sqlx for async access and keeps
//! every multi-row effect set on a single transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caja POS Data Flow                               │
//! │                                                                         │
//! │  Caller (UI / HTTP adapter - out of scope here)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     caja-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐   ┌───────────┐  │   │
//! │  │   │   Database    │    │     Services       │   │ Migrations│  │   │
//! │  │   │   (pool.rs)   │    │                    │   │ (embedded)│  │   │
//! │  │   │               │    │ InventoryLedger    │   │           │  │   │
//! │  │   │ SqlitePool    │◄───│ CashDrawerManager  │   │ 001_...   │  │   │
//! │  │   │ WAL, FKs on   │    │ SaleCoordinator    │   │           │  │   │
//! │  │   │               │    │ ReportReader       │   │           │  │   │
//! │  │   └───────────────┘    └────────────────────┘   └───────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (caja.db)                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation, configuration, service handles
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Plain row access (product catalog)
//! - [`service`] - The transactional services and the reporting reader
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caja_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/caja.db")).await?;
//!
//! let drawer = db.drawers().open("op1", 10_000).await?;
//! let receipt = db.checkout().create_sale("op1", None, &lines, &payments).await?;
//! let result = db.drawers().close(&drawer.id, 15_000, 0, 0, None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::DbError;
pub use pool::{Database, DbConfig};

pub use repository::product::{NewProduct, ProductRepository};
pub use service::checkout::SaleCoordinator;
pub use service::drawer::CashDrawerManager;
pub use service::ledger::InventoryLedger;
pub use service::reports::{DrawerSummary, ReportReader};
pub use service::{ServiceError, ServiceResult};
