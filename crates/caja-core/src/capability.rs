//! # Capability Seam
//!
//! The core only needs to know *whether* an operator may open a drawer or
//! cancel a sale, never *how* that is determined. Role storage, sessions,
//! and token checks live in the auth collaborator; this trait is the
//! injection point.
//!
//! Embedding role names in business logic is exactly the scattered
//! string-membership pattern this seam exists to replace.

/// Yes/no answers to the two privileged actions the core performs.
pub trait Capabilities: Send + Sync {
    /// May this operator open a cash drawer for their shift?
    fn can_open_drawer(&self, operator_id: &str) -> bool;

    /// May this operator cancel a completed sale?
    fn can_cancel_sale(&self, operator_id: &str) -> bool;
}

/// Permits everything. The default for single-operator deployments and
/// tests; production wires the real auth adapter instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Capabilities for AllowAll {
    fn can_open_drawer(&self, _operator_id: &str) -> bool {
        true
    }

    fn can_cancel_sale(&self, _operator_id: &str) -> bool {
        true
    }
}
