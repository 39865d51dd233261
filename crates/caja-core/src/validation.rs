//! # Validation Module
//!
//! Input validation for the transactional core.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Service entry (THIS MODULE)                                   │
//! │  ├── Shape checks: positive quantities, non-negative amounts            │
//! │  └── Runs BEFORE any write - a rejected request leaves zero rows        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Transaction body                                              │
//! │  ├── Existence + stock sufficiency (needs the datastore)                │
//! │  └── Guarded UPDATEs - the authoritative race-proof check               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── CHECK (stock_on_hand >= 0), CHECK (quantity > 0)                   │
//! │  └── Partial unique index on open drawers                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{LineRequest, PaymentRequest};
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Scalar Validators
// =============================================================================

/// Validates a movement or line quantity.
///
/// ## Rules
/// - Must be positive (> 0); direction is carried by the movement type,
///   never by a negative quantity
/// - Must not exceed MAX_LINE_QUANTITY (catches 1000 typed for 10)
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a payment or movement amount in cents. Zero and negative
/// amounts are rejected; refunds are modelled as reversals, not negative
/// payments.
pub fn validate_amount_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a non-negative cents amount (opening floats, counted
/// amounts at close). Zero is legal.
pub fn validate_non_negative_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates an entity id: non-empty after trimming.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates the full shape of a checkout request, collecting every
/// problem instead of stopping at the first.
///
/// Existence and stock checks need the datastore and happen inside the
/// coordinator's transaction; this pass rejects malformed input before a
/// single row is written.
pub fn validate_sale_request(
    lines: &[LineRequest],
    payments: &[PaymentRequest],
) -> ValidationResult<()> {
    let mut problems = Vec::new();

    if lines.is_empty() {
        problems.push(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    for (i, line) in lines.iter().enumerate() {
        if let Err(e) = validate_id(&format!("lines[{i}].product_id"), &line.product_id) {
            problems.push(e);
        }
        if let Err(e) = validate_quantity(&format!("lines[{i}].quantity"), line.quantity) {
            problems.push(e);
        }
    }

    if payments.is_empty() {
        problems.push(ValidationError::Required {
            field: "payments".to_string(),
        });
    }

    for (i, payment) in payments.iter().enumerate() {
        if let Err(e) = validate_amount_cents(&format!("payments[{i}].amount"), payment.amount_cents)
        {
            problems.push(e);
        }
    }

    if problems.is_empty() {
        Ok(())
    } else if problems.len() == 1 {
        Err(problems.remove(0))
    } else {
        Err(ValidationError::Multiple(problems))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentMethod;

    fn line(product_id: &str, quantity: i64) -> LineRequest {
        LineRequest {
            product_id: product_id.to_string(),
            quantity,
        }
    }

    fn cash(amount_cents: i64) -> PaymentRequest {
        PaymentRequest {
            method: PaymentMethod::Cash,
            amount_cents,
            reference: None,
        }
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity("quantity", 1).is_ok());
        assert!(validate_quantity("quantity", MAX_LINE_QUANTITY).is_ok());

        assert!(validate_quantity("quantity", 0).is_err());
        assert!(validate_quantity("quantity", -1).is_err());
        assert!(validate_quantity("quantity", MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_amount_cents() {
        assert!(validate_amount_cents("amount", 1).is_ok());
        assert!(validate_amount_cents("amount", 0).is_err());
        assert!(validate_amount_cents("amount", -500).is_err());
    }

    #[test]
    fn test_validate_non_negative_cents() {
        assert!(validate_non_negative_cents("initial_amount", 0).is_ok());
        assert!(validate_non_negative_cents("initial_amount", 10_000).is_ok());
        assert!(validate_non_negative_cents("initial_amount", -1).is_err());
    }

    #[test]
    fn test_valid_sale_request() {
        let lines = vec![line("p1", 2)];
        let payments = vec![cash(5000)];
        assert!(validate_sale_request(&lines, &payments).is_ok());
    }

    #[test]
    fn test_sale_request_collects_all_problems() {
        let lines = vec![line("p1", 0), line("", 2)];
        let payments = vec![cash(-100)];

        let err = validate_sale_request(&lines, &payments).unwrap_err();
        match err {
            ValidationError::Multiple(problems) => assert_eq!(problems.len(), 3),
            other => panic!("expected Multiple, got {other}"),
        }
    }

    #[test]
    fn test_sale_request_single_problem_unwrapped() {
        let lines = vec![line("p1", -1)];
        let payments = vec![cash(100)];

        let err = validate_sale_request(&lines, &payments).unwrap_err();
        assert!(matches!(err, ValidationError::MustBePositive { .. }));
    }

    #[test]
    fn test_empty_request_rejected() {
        let err = validate_sale_request(&[], &[]).unwrap_err();
        assert!(matches!(err, ValidationError::Multiple(_)));
    }
}
