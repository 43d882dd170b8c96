//! # Domain Types
//!
//! Core domain types used throughout Tally.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │  OrderPayment   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  name, color    │   │  total_cents    │   │  order_id (FK)  │       │
//! │  │  └─► Variant[]  │   │  payment_status │   │  amount_cents   │       │
//! │  └─────────────────┘   │  └─► OrderItem[]│   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Service      │   │   LineTarget    │   │  PaymentStatus  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  Product {..}   │   │  Pending        │       │
//! │  │  price_cents    │   │  Service {..}   │   │  Partial        │       │
//! │  │  (no stock)     │   │  (sum type)     │   │  Paid           │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Order lines reference the catalog by plain id strings and freeze the unit
//! price at order time. Catalog rows can be edited or deleted later without
//! rewriting history.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Payment Status (order-level, derived)
// =============================================================================

/// Where an order stands against its cumulative payments.
///
/// ## Derivation Rule
/// This status is ALWAYS derived from `total_cents` and the payment sum via
/// [`crate::order::derive_payment_status`]. It is never accepted from a
/// client and never edited by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No payments recorded yet.
    Pending,
    /// Paid something, but less than the total.
    Partial,
    /// Cumulative payments cover the total.
    Paid,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

// =============================================================================
// Payment State (per payment row)
// =============================================================================

/// State of an individual payment record.
///
/// The API only ever creates `Completed` rows; `Failed` exists for imported
/// or repaired data. Payment sums count every row regardless of state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Completed,
    Failed,
}

impl Default for PaymentState {
    fn default() -> Self {
        PaymentState::Completed
    }
}

// =============================================================================
// Product & Variant
// =============================================================================

/// A product in the catalog. Stock and pricing live on its variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Optional long-form description.
    pub description: Option<String>,

    /// Display color (searchable alongside the name).
    pub color: Option<String>,

    /// Opaque reference to an externally hosted image.
    pub image_url: Option<String>,

    /// When the product was created.
    pub created_at: DateTime<Utc>,
}

/// A sized, stocked variation of a product.
///
/// All stock tracking happens here: `quantity` is the on-hand count and can
/// never go negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Variant {
    pub id: String,
    pub product_id: String,
    /// Size label ("S", "XL", "A4", ...). Optional for one-size products.
    pub size: Option<String>,
    /// Units on hand. Never negative.
    pub quantity: i64,
    /// Selling price in cents.
    pub selling_price_cents: i64,
    /// Acquisition cost in cents (for margin reporting).
    pub item_cost_cents: i64,
    /// Bumped on every stock or price change.
    pub updated_at: DateTime<Utc>,
}

impl Variant {
    /// Returns the selling price as Money.
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    /// Returns the item cost as Money.
    #[inline]
    pub fn item_cost(&self) -> Money {
        Money::from_cents(self.item_cost_cents)
    }

    /// Checks whether this variant has enough stock for a requested quantity.
    #[inline]
    pub fn can_fulfill(&self, requested: i64) -> bool {
        self.quantity >= requested
    }
}

/// A product together with its variants, as returned by catalog reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductWithVariants {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<Variant>,
}

// =============================================================================
// Service
// =============================================================================

/// A sellable service. Priced like a product variant but never stock-tracked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Service {
    pub id: String,
    pub name: String,
    /// Size label where the service is size-dependent (e.g. print formats).
    pub size: Option<String>,
    pub price_cents: i64,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Service {
    /// Returns the service price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Line Target
// =============================================================================

/// What an order line sells: a product (optionally a specific variant) or a
/// service.
///
/// ## Why a sum type?
/// The storage row keeps three nullable id columns, which admits invalid
/// combinations (both set, neither set, variant without product). This enum
/// makes those states unrepresentable in the domain; the runtime check
/// exists exactly once, in [`LineTarget::from_parts`] at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineTarget {
    Product {
        product_id: String,
        /// Specific variant, when the line decrements stock.
        variant_id: Option<String>,
    },
    Service {
        service_id: String,
    },
}

impl LineTarget {
    /// Builds a target from the three optional references a client submits.
    ///
    /// ## Rules
    /// - Exactly one of `product_id` / `service_id` must be set
    /// - `variant_id` is only allowed alongside `product_id`
    ///
    /// Returns a human-readable reason on violation; callers wrap it with
    /// the line index.
    pub fn from_parts(
        product_id: Option<String>,
        service_id: Option<String>,
        variant_id: Option<String>,
    ) -> Result<Self, String> {
        match (product_id, service_id) {
            (Some(product_id), None) => Ok(LineTarget::Product {
                product_id,
                variant_id,
            }),
            (None, Some(service_id)) => {
                if variant_id.is_some() {
                    return Err("variant_id is only allowed with product_id".to_string());
                }
                Ok(LineTarget::Service { service_id })
            }
            (Some(_), Some(_)) => {
                Err("line cannot reference both a product and a service".to_string())
            }
            (None, None) => Err("line must reference a product or a service".to_string()),
        }
    }

    /// Product id, if this is a product line.
    pub fn product_id(&self) -> Option<&str> {
        match self {
            LineTarget::Product { product_id, .. } => Some(product_id),
            LineTarget::Service { .. } => None,
        }
    }

    /// Variant id, if this is a product line with a specific variant.
    pub fn variant_id(&self) -> Option<&str> {
        match self {
            LineTarget::Product { variant_id, .. } => variant_id.as_deref(),
            LineTarget::Service { .. } => None,
        }
    }

    /// Service id, if this is a service line.
    pub fn service_id(&self) -> Option<&str> {
        match self {
            LineTarget::Product { .. } => None,
            LineTarget::Service { service_id } => Some(service_id),
        }
    }
}

// =============================================================================
// Order Draft (input to order placement)
// =============================================================================

/// One requested line of a draft order.
///
/// `price_cents` is the unit price the client saw; it is validated against
/// the declared total and then frozen into the order item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftLine {
    pub target: LineTarget,
    pub quantity: i64,
    pub price_cents: i64,
}

impl DraftLine {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the line total (unit price × quantity) as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

/// A complete order request, before any database validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub lines: Vec<DraftLine>,
    /// Absolute discount in cents, subtracted from the item sum.
    pub discount_cents: i64,
    /// The grand total the client computed and quoted.
    pub declared_total_cents: i64,
}

// =============================================================================
// Order
// =============================================================================

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub discount_cents: i64,
    /// Grand total in cents (item sum minus discount, as quoted).
    pub total_cents: i64,
    /// Derived from cumulative payments. Never client-set.
    pub payment_status: PaymentStatus,
}

impl Order {
    /// Returns the grand total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the discount as Money.
    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }
}

/// A line item on a placed order.
/// Uses the snapshot pattern: price and catalog references are frozen at
/// order time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    #[serde(flatten)]
    pub target: LineTarget,
    pub quantity: i64,
    /// Unit price in cents at order time (frozen).
    pub price_cents: i64,
}

impl OrderItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

/// A payment applied to an order.
/// An order can accumulate multiple partial payments over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderPayment {
    pub id: String,
    pub order_id: String,
    /// Amount paid in cents. Always positive.
    pub amount_cents: i64,
    /// When the payment was taken (client-supplied, defaults to now).
    pub payment_date: DateTime<Utc>,
    pub status: PaymentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderPayment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// An order with its items and payment history, as returned by order reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<OrderPayment>,
}

// =============================================================================
// Reconciliation Ledgers
// =============================================================================

/// A daily sales summary row, written at close of business.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesRecord {
    pub id: String,
    /// The business day this record summarizes.
    pub record_date: NaiveDate,
    pub total_sales_cents: i64,
    pub order_count: i64,
    /// Cashout this record was reconciled against, if any.
    pub cashout_id: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SalesRecord {
    /// Returns the total sales as Money.
    #[inline]
    pub fn total_sales(&self) -> Money {
        Money::from_cents(self.total_sales_cents)
    }
}

/// A cash drawer withdrawal, recorded independently of orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashoutTransaction {
    pub id: String,
    pub amount_cents: i64,
    /// The business day the cash was taken out.
    pub transaction_date: NaiveDate,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CashoutTransaction {
    /// Returns the cashout amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_target_product() {
        let target = LineTarget::from_parts(Some("p1".into()), None, Some("v1".into()))
            .expect("product with variant is valid");
        assert_eq!(target.product_id(), Some("p1"));
        assert_eq!(target.variant_id(), Some("v1"));
        assert_eq!(target.service_id(), None);
    }

    #[test]
    fn test_line_target_service() {
        let target =
            LineTarget::from_parts(None, Some("s1".into()), None).expect("service is valid");
        assert_eq!(target.service_id(), Some("s1"));
        assert_eq!(target.product_id(), None);
        assert_eq!(target.variant_id(), None);
    }

    #[test]
    fn test_line_target_rejects_both() {
        let err = LineTarget::from_parts(Some("p1".into()), Some("s1".into()), None).unwrap_err();
        assert!(err.contains("both"));
    }

    #[test]
    fn test_line_target_rejects_neither() {
        let err = LineTarget::from_parts(None, None, None).unwrap_err();
        assert!(err.contains("must reference"));
    }

    #[test]
    fn test_line_target_rejects_variant_on_service() {
        let err =
            LineTarget::from_parts(None, Some("s1".into()), Some("v1".into())).unwrap_err();
        assert!(err.contains("variant_id"));
    }

    #[test]
    fn test_payment_status_default() {
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
        assert_eq!(PaymentState::default(), PaymentState::Completed);
    }

    #[test]
    fn test_draft_line_total() {
        let line = DraftLine {
            target: LineTarget::Service {
                service_id: "s1".into(),
            },
            quantity: 3,
            price_cents: 500,
        };
        assert_eq!(line.line_total().cents(), 1500);
    }

    #[test]
    fn test_variant_can_fulfill() {
        let variant = Variant {
            id: "v1".into(),
            product_id: "p1".into(),
            size: Some("M".into()),
            quantity: 3,
            selling_price_cents: 1000,
            item_cost_cents: 600,
            updated_at: Utc::now(),
        };
        assert!(variant.can_fulfill(3));
        assert!(!variant.can_fulfill(4));
    }
}
