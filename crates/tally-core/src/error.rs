//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  HTTP API errors (in app)                                              │
//! │  └── ApiError         - What clients see (status + JSON body)          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, amounts, indexes)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A line item is structurally invalid.
    ///
    /// ## When This Occurs
    /// - Both a product and a service reference on one line
    /// - Neither a product nor a service reference
    /// - A variant reference without a product reference
    /// - Non-positive quantity or unit price
    ///
    /// The index identifies the offending line so clients can highlight it.
    #[error("Line item {index} is invalid: {reason}")]
    InvalidLineItem { index: usize, reason: String },

    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Variant cannot be found under the referenced product.
    #[error("Variant not found: {0}")]
    VariantNotFound(String),

    /// Service cannot be found.
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    /// Order cannot be found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Insufficient stock to place an order line.
    ///
    /// ## When This Occurs
    /// - A product line requests more units than the variant currently holds
    ///
    /// ## User Workflow
    /// ```text
    /// Place order (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { variant_id, available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 left in stock"
    /// ```
    #[error("Insufficient stock for variant {variant_id}: available {available}, requested {requested}")]
    InsufficientStock {
        variant_id: String,
        available: i64,
        requested: i64,
    },

    /// Client-declared order total disagrees with the computed total by more
    /// than the allowed tolerance.
    #[error("Declared total {declared_cents} does not match computed total {expected_cents}")]
    PriceMismatch {
        expected_cents: i64,
        declared_cents: i64,
    },

    /// Payment would push the cumulative paid amount past the order total.
    ///
    /// Carries the full picture so clients can show the exact remaining
    /// balance without a second round trip.
    #[error("Payment rejected: would exceed order total {total_cents} (paid {paid_cents}, remaining {remaining_cents})")]
    OverpaymentRejected {
        total_cents: i64,
        paid_cents: i64,
        remaining_cents: i64,
    },

    /// Payment amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
