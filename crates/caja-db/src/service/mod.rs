//! # Transactional Services
//!
//! The three components the POS core exists for, plus the read-only
//! reporting reader:
//!
//! - [`ledger::InventoryLedger`] - the only path that changes stock;
//!   appends immutable kardex entries
//! - [`drawer::CashDrawerManager`] - open/operate/close state machine
//!   with end-of-shift reconciliation
//! - [`checkout::SaleCoordinator`] - ties a checkout to both ledgers as
//!   one atomic unit
//! - [`reports::ReportReader`] - read-only aggregation
//!
//! ## Atomicity Unit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  createSale / cancelSale effect set                                     │
//! │                                                                         │
//! │  BEGIN ──► sale row ──► line rows ──► payment rows ──► stock            │
//! │            decrements (guarded) ──► drawer bucket bumps ──► COMMIT      │
//! │                                                                         │
//! │  Any failure anywhere in the chain rolls the whole thing back.          │
//! │  "Stock decremented but payment row missing" is the single worst        │
//! │  failure mode this layer exists to prevent.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A dropped `sqlx::Transaction` rolls back, so a checkout abandoned by a
//! timeout or cancellation leaves no partial kardex/payment rows behind.

use thiserror::Error;

use crate::error::DbError;
use caja_core::{CoreError, ValidationError};

pub mod checkout;
pub mod drawer;
pub mod ledger;
pub mod reports;

// =============================================================================
// Service Error
// =============================================================================

/// What a service operation can fail with: a business-rule violation
/// (never retry) or an infra failure (retry with bounded backoff at the
/// transaction boundary only).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Business-rule violation; the operation was refused, not broken.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Infrastructure failure from the datastore.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl ServiceError {
    /// The domain error, if this is a business-rule failure.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Db(_) => None,
        }
    }

    /// True when retrying could help (transient infra failure).
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Domain(_) => false,
            ServiceError::Db(e) => e.is_transient(),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Db(DbError::from(err))
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Domain(CoreError::Validation(err))
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
