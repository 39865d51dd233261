//! # Error Types
//!
//! Domain-specific error types for caja-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caja-core errors (this file)                                           │
//! │  ├── CoreError        - Business-rule violations                        │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  caja-db errors (separate crate)                                        │
//! │  ├── DbError          - Database operation failures                     │
//! │  └── ServiceError     - CoreError | DbError at the service boundary     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, available amounts)
//! 3. Errors are enum variants, never String
//! 4. A business error is never retried: "insufficient stock" will not
//!    succeed on the second attempt. Only infra errors (DbError) are
//!    candidates for retry at the transaction boundary.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business-rule violations raised by the transactional core.
///
/// Each variant maps to a stable machine-readable kind (HTTP adapters
/// would use 404 for the NotFound family, 409 for the state-machine
/// family, 400 for the rest).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product id doesn't exist or is soft-deleted.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Sale id doesn't exist.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Drawer id doesn't exist.
    #[error("Drawer not found: {0}")]
    DrawerNotFound(String),

    /// Not enough stock to cover an OUT/SALE movement.
    ///
    /// ## When This Occurs
    /// The guarded decrement in the inventory ledger found fewer units on
    /// hand than requested - including the case where a concurrent sale
    /// won the race for the last unit.
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// An EGRESO would drive the drawer's available balance negative.
    #[error("Insufficient funds in drawer: available {available_cents}, requested {requested_cents}")]
    InsufficientFunds {
        available_cents: i64,
        requested_cents: i64,
    },

    /// The operator already holds an OPEN drawer for the current business
    /// day. Enforced by the datastore inside the insert, so two racing
    /// opens cannot both succeed.
    #[error("Operator {operator_id} already has open drawer {drawer_id}")]
    DrawerAlreadyOpen {
        operator_id: String,
        drawer_id: String,
    },

    /// The operation requires an OPEN drawer and none qualifies.
    #[error("No open drawer for operator {operator_id}")]
    DrawerNotOpen { operator_id: String },

    /// close() on a drawer that has already been closed. The first close
    /// stands; nothing is double-counted.
    #[error("Drawer {drawer_id} is already closed")]
    AlreadyClosed { drawer_id: String },

    /// cancel() on a sale that is not in Completed state.
    #[error("Sale {sale_id} is already cancelled")]
    AlreadyCancelled { sale_id: String },

    /// Tendered payments don't cover the sale total.
    #[error("Payments cover {paid_cents} of {total_cents} total")]
    InsufficientPayment { total_cents: i64, paid_cents: i64 },

    /// The capability check denied the operator this action.
    #[error("Operator {operator_id} is not allowed to {action}")]
    Forbidden {
        operator_id: String,
        action: &'static str,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any write happens; a request that fails validation leaves
/// zero rows behind.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g. malformed id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Several independent problems found in one request. Returned
    /// together so the caller fixes everything in one round trip instead
    /// of one-at-a-time.
    #[error("{}", join_problems(.0))]
    Multiple(Vec<ValidationError>),
}

fn join_problems(problems: &[ValidationError]) -> String {
    problems
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "p-42".to_string(),
            available: 1,
            requested: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for p-42: available 1, requested 3"
        );

        let err = CoreError::InsufficientFunds {
            available_cents: 10_000,
            requested_cents: 20_000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds in drawer: available 10000, requested 20000"
        );
    }

    #[test]
    fn test_multiple_joined() {
        let err = ValidationError::Multiple(vec![
            ValidationError::MustBePositive {
                field: "lines[0].quantity".to_string(),
            },
            ValidationError::Required {
                field: "lines[1].product_id".to_string(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "lines[0].quantity must be positive; lines[1].product_id is required"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
