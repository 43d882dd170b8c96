//! # Order Math
//!
//! Pure calculations behind order placement and payment recording.
//!
//! ## Where These Functions Sit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Order & Payment Flow                               │
//! │                                                                         │
//! │  POST /orders                          POST /orders/{id}/payments      │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  validate_draft ◄── THIS MODULE        check_payment_fits ◄── THIS     │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  db: existence + stock checks          db: conditional insert          │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  check_declared_total ◄── THIS         derive_payment_status ◄── THIS  │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  commit (all-or-nothing)               commit (insert + status)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is deterministic integer math. The database layer calls
//! these functions; it never re-implements the rules.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{DraftLine, OrderDraft, PaymentStatus};
use crate::validation::{validate_discount_cents, validate_quantity, validate_unit_price_cents};
use crate::{MAX_ORDER_LINES, PRICE_TOLERANCE_CENTS};

// =============================================================================
// Totals
// =============================================================================

/// Sums the line totals of a draft (before discount).
pub fn items_subtotal(lines: &[DraftLine]) -> Money {
    lines
        .iter()
        .fold(Money::zero(), |acc, line| acc + line.line_total())
}

/// Computes the order grand total: item sum minus the absolute discount.
///
/// A discount larger than the item sum yields a negative total; the draft
/// validation rejects that before this value is ever stored.
pub fn order_total(lines: &[DraftLine], discount: Money) -> Money {
    items_subtotal(lines) - discount
}

// =============================================================================
// Draft Validation
// =============================================================================

/// Structural validation of an order draft. Runs before any database access.
///
/// ## Checks (fail-fast, first violation wins)
/// - At least one line, at most [`MAX_ORDER_LINES`]
/// - Per line, in order: quantity positive and bounded, unit price positive
/// - Discount non-negative, declared total non-negative
/// - Discount no larger than the item sum
///
/// Catalog existence and stock checks belong to the database layer; the
/// declared-total check runs after those, see [`check_declared_total`].
pub fn validate_draft(draft: &OrderDraft) -> CoreResult<()> {
    if draft.lines.is_empty() {
        return Err(crate::error::ValidationError::Required {
            field: "items".to_string(),
        }
        .into());
    }

    if draft.lines.len() > MAX_ORDER_LINES {
        return Err(crate::error::ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_LINES as i64,
        }
        .into());
    }

    for (index, line) in draft.lines.iter().enumerate() {
        validate_quantity(line.quantity).map_err(|e| CoreError::InvalidLineItem {
            index,
            reason: e.to_string(),
        })?;
        validate_unit_price_cents(line.price_cents).map_err(|e| CoreError::InvalidLineItem {
            index,
            reason: e.to_string(),
        })?;
    }

    validate_discount_cents(draft.discount_cents)?;

    if draft.declared_total_cents < 0 {
        return Err(crate::error::ValidationError::MustBePositive {
            field: "total_price".to_string(),
        }
        .into());
    }

    let subtotal = items_subtotal(&draft.lines);
    if Money::from_cents(draft.discount_cents) > subtotal {
        return Err(crate::error::ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: subtotal.cents(),
        }
        .into());
    }

    Ok(())
}

// =============================================================================
// Declared-Total Consistency
// =============================================================================

/// Verifies the client-declared grand total against the computed one.
///
/// The declared total must land within [`PRICE_TOLERANCE_CENTS`] of
/// `sum(price × quantity) − discount`. On success the DECLARED total is the
/// one stored on the order: it is what the customer was quoted, and the
/// tolerance exists precisely so a one-cent client rounding difference does
/// not reject the order.
///
/// ## Example
/// ```rust
/// use tally_core::order::check_declared_total;
/// use tally_core::types::{DraftLine, LineTarget};
///
/// let lines = vec![
///     DraftLine {
///         target: LineTarget::Service { service_id: "s1".into() },
///         quantity: 2,
///         price_cents: 1000,
///     },
///     DraftLine {
///         target: LineTarget::Service { service_id: "s2".into() },
///         quantity: 1,
///         price_cents: 500,
///     },
/// ];
///
/// // 2×10.00 + 1×5.00 − 1.00 = 24.00
/// assert!(check_declared_total(&lines, 100, 2400).is_ok());
/// assert!(check_declared_total(&lines, 100, 2500).is_err());
/// ```
pub fn check_declared_total(
    lines: &[DraftLine],
    discount_cents: i64,
    declared_total_cents: i64,
) -> CoreResult<()> {
    let computed = order_total(lines, Money::from_cents(discount_cents));
    let declared = Money::from_cents(declared_total_cents);

    if computed.abs_diff_cents(declared) > PRICE_TOLERANCE_CENTS {
        return Err(CoreError::PriceMismatch {
            expected_cents: computed.cents(),
            declared_cents: declared.cents(),
        });
    }

    Ok(())
}

// =============================================================================
// Payment Status Derivation
// =============================================================================

/// Derives an order's payment status from its total and cumulative payments.
///
/// ## Rules (checked in this order)
/// - No payments recorded → `Pending`
/// - Payments cover the total → `Paid`
/// - Otherwise → `Partial`
///
/// The no-payments rule comes first so a zero-total order (possible when the
/// discount equals the item sum) stays `Pending` rather than flipping to
/// `Paid` with nothing received.
///
/// This is the ONLY place status is computed. Placement, payment recording,
/// and repair paths all call it.
pub fn derive_payment_status(total: Money, paid: Money) -> PaymentStatus {
    if paid.is_zero() {
        return PaymentStatus::Pending;
    }
    if paid >= total {
        return PaymentStatus::Paid;
    }
    PaymentStatus::Partial
}

/// Remaining balance on an order. Never negative in a consistent store, since
/// overpayments are rejected before they are written.
#[inline]
pub fn remaining_balance(total: Money, paid: Money) -> Money {
    total - paid
}

// =============================================================================
// Overpayment Check
// =============================================================================

/// Checks whether a new payment fits under the order total.
///
/// ## Rules
/// - The amount must be strictly positive
/// - `paid + amount` must not exceed `total`, compared EXACTLY (the one-cent
///   tolerance applies to declared totals only, never to payments)
///
/// The database layer enforces the same condition inside its conditional
/// insert; this function produces the precise error for callers and guards
/// the fast path.
pub fn check_payment_fits(total: Money, paid: Money, amount: Money) -> CoreResult<()> {
    if !amount.is_positive() {
        return Err(CoreError::InvalidPaymentAmount {
            reason: "payment amount must be positive".to_string(),
        });
    }

    if paid + amount > total {
        return Err(CoreError::OverpaymentRejected {
            total_cents: total.cents(),
            paid_cents: paid.cents(),
            remaining_cents: remaining_balance(total, paid).cents(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
