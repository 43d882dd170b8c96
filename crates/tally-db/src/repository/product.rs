//! # Product Repository
//!
//! Database operations for products and their variants.
//!
//! ## Key Operations
//! - Product CRUD with nested variants
//! - Name/color search
//! - Variant management (all stock lives on variants)
//!
//! ## Product / Variant Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Product → Variant Ownership                          │
//! │                                                                         │
//! │  products                      variants                                 │
//! │  ┌──────────────────┐          ┌──────────────────────────────┐        │
//! │  │ id               │◄─────────│ product_id                   │        │
//! │  │ name  "T-Shirt"  │          │ size "M"   quantity 12       │        │
//! │  │ color "black"    │          │ size "L"   quantity 4        │        │
//! │  │ image_url        │          │ size "XL"  quantity 0        │        │
//! │  └──────────────────┘          └──────────────────────────────┘        │
//! │                                                                         │
//! │  Reads return the product together with all of its variants.           │
//! │  Deleting a product deletes its variants in the same transaction.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::{validation, Product, ProductWithVariants, Variant};

// =============================================================================
// Input Types
// =============================================================================

/// Input for creating a product, optionally with its initial variants.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub image_url: Option<String>,
    pub variants: Vec<NewVariant>,
}

/// Input for creating a variant under a product.
#[derive(Debug, Clone)]
pub struct NewVariant {
    pub size: Option<String>,
    /// Initial stock on hand. Zero is allowed (listed but sold out).
    pub quantity: i64,
    pub selling_price_cents: i64,
    pub item_cost_cents: i64,
}

/// Replacement fields for an existing product (full-update semantics).
#[derive(Debug, Clone)]
pub struct ProductUpdate {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub image_url: Option<String>,
}

/// Replacement fields for an existing variant (full-update semantics).
///
/// Setting `quantity` here is an absolute restock, not a delta; order
/// placement is the only path that decrements stock.
#[derive(Debug, Clone)]
pub struct VariantUpdate {
    pub size: Option<String>,
    pub quantity: i64,
    pub selling_price_cents: i64,
    pub item_cost_cents: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product and variant database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// // Search products
/// let results = repo.search("black").await?;
///
/// // Get by ID with variants
/// let product = repo.get_with_variants("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates a product together with its initial variants.
    ///
    /// ## Atomicity
    /// The product row and all variant rows are inserted in one transaction.
    /// A validation failure on any variant rolls back everything.
    ///
    /// ## Returns
    /// The persisted product with its variants, ids assigned.
    pub async fn create(&self, input: NewProduct) -> DbResult<ProductWithVariants> {
        validation::validate_name(&input.name)?;
        for variant in &input.variants {
            validation::validate_size(variant.size.as_deref())?;
            validation::validate_stock_quantity(variant.quantity)?;
            validation::validate_price_cents(variant.selling_price_cents)?;
            validation::validate_price_cents(variant.item_cost_cents)?;
        }

        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            name: input.name,
            description: input.description,
            color: input.color,
            image_url: input.image_url,
            created_at: now,
        };

        debug!(id = %product.id, name = %product.name, "Creating product");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, color, image_url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.color)
        .bind(&product.image_url)
        .bind(product.created_at)
        .execute(&mut *tx)
        .await?;

        let mut variants = Vec::with_capacity(input.variants.len());
        for v in input.variants {
            let variant = Variant {
                id: generate_variant_id(),
                product_id: product.id.clone(),
                size: v.size,
                quantity: v.quantity,
                selling_price_cents: v.selling_price_cents,
                item_cost_cents: v.item_cost_cents,
                updated_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO variants (
                    id, product_id, size, quantity,
                    selling_price_cents, item_cost_cents, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&variant.id)
            .bind(&variant.product_id)
            .bind(&variant.size)
            .bind(variant.quantity)
            .bind(variant.selling_price_cents)
            .bind(variant.item_cost_cents)
            .bind(variant.updated_at)
            .execute(&mut *tx)
            .await?;

            variants.push(variant);
        }

        tx.commit().await?;

        Ok(ProductWithVariants { product, variants })
    }

    /// Gets a product with all of its variants.
    ///
    /// ## Returns
    /// * `Ok(Some(_))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_with_variants(&self, id: &str) -> DbResult<Option<ProductWithVariants>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, color, image_url, created_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(product) = product else {
            return Ok(None);
        };

        let variants = self.fetch_variants(id).await?;
        Ok(Some(ProductWithVariants { product, variants }))
    }

    /// Lists products with their variants, paged.
    ///
    /// ## Ordering
    /// By name, then id, so pages are stable across requests.
    pub async fn list(&self, skip: i64, limit: i64) -> DbResult<Vec<ProductWithVariants>> {
        debug!(skip = %skip, limit = %limit, "Listing products");

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, color, image_url, created_at
            FROM products
            ORDER BY name, id
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        // Second query scoped to the same page via the identical subselect.
        let variants = sqlx::query_as::<_, Variant>(
            r#"
            SELECT id, product_id, size, quantity,
                   selling_price_cents, item_cost_cents, updated_at
            FROM variants
            WHERE product_id IN (
                SELECT id FROM products ORDER BY name, id LIMIT ?1 OFFSET ?2
            )
            ORDER BY product_id, size, id
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(group_variants(products, variants))
    }

    /// Searches products by name or color substring, case-insensitive.
    ///
    /// ## Semantics
    /// - Matches `name` or `color` with a `%query%` LIKE pattern
    /// - Only products with at least one variant are returned
    /// - Matches come back with ALL their variants
    /// - An empty query matches every product (that has variants)
    pub async fn search(&self, query: &str) -> DbResult<Vec<ProductWithVariants>> {
        let query = validation::validate_search_query(query)?;
        let pattern = format!("%{}%", query.to_lowercase());

        debug!(query = %query, "Searching products");

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT DISTINCT p.id, p.name, p.description, p.color, p.image_url, p.created_at
            FROM products p
            INNER JOIN variants v ON v.product_id = p.id
            WHERE lower(p.name) LIKE ?1 OR lower(p.color) LIKE ?1
            ORDER BY p.name, p.id
            "#,
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        let variants = sqlx::query_as::<_, Variant>(
            r#"
            SELECT id, product_id, size, quantity,
                   selling_price_cents, item_cost_cents, updated_at
            FROM variants
            WHERE product_id IN (
                SELECT DISTINCT p.id
                FROM products p
                INNER JOIN variants v ON v.product_id = p.id
                WHERE lower(p.name) LIKE ?1 OR lower(p.color) LIKE ?1
            )
            ORDER BY product_id, size, id
            "#,
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        let results = group_variants(products, variants);
        debug!(count = results.len(), "Search returned products");
        Ok(results)
    }

    /// Replaces a product's editable fields.
    ///
    /// Variants are untouched; use the variant operations for those.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Updated product
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn update(&self, id: &str, input: ProductUpdate) -> DbResult<Product> {
        validation::validate_name(&input.name)?;

        debug!(id = %id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                description = ?3,
                color = ?4,
                image_url = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.color)
        .bind(&input.image_url)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, color, image_url, created_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    /// Deletes a product and all of its variants.
    ///
    /// ## Note
    /// Existing order items keep their snapshot ids and prices; order
    /// history is unaffected by catalog deletion.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let mut tx = self.pool.begin().await?;

        // Children first. The FK cascade is a DDL backstop only.
        sqlx::query("DELETE FROM variants WHERE product_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Adds a variant to an existing product.
    pub async fn add_variant(&self, product_id: &str, input: NewVariant) -> DbResult<Variant> {
        validation::validate_size(input.size.as_deref())?;
        validation::validate_stock_quantity(input.quantity)?;
        validation::validate_price_cents(input.selling_price_cents)?;
        validation::validate_price_cents(input.item_cost_cents)?;

        self.require_product(product_id).await?;

        let variant = Variant {
            id: generate_variant_id(),
            product_id: product_id.to_string(),
            size: input.size,
            quantity: input.quantity,
            selling_price_cents: input.selling_price_cents,
            item_cost_cents: input.item_cost_cents,
            updated_at: Utc::now(),
        };

        debug!(id = %variant.id, product_id = %product_id, "Adding variant");

        sqlx::query(
            r#"
            INSERT INTO variants (
                id, product_id, size, quantity,
                selling_price_cents, item_cost_cents, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.size)
        .bind(variant.quantity)
        .bind(variant.selling_price_cents)
        .bind(variant.item_cost_cents)
        .bind(variant.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(variant)
    }

    /// Replaces a variant's fields (absolute restock, price changes).
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Variant doesn't exist under this product
    pub async fn update_variant(
        &self,
        product_id: &str,
        variant_id: &str,
        input: VariantUpdate,
    ) -> DbResult<Variant> {
        validation::validate_size(input.size.as_deref())?;
        validation::validate_stock_quantity(input.quantity)?;
        validation::validate_price_cents(input.selling_price_cents)?;
        validation::validate_price_cents(input.item_cost_cents)?;

        debug!(id = %variant_id, product_id = %product_id, "Updating variant");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE variants SET
                size = ?3,
                quantity = ?4,
                selling_price_cents = ?5,
                item_cost_cents = ?6,
                updated_at = ?7
            WHERE id = ?1 AND product_id = ?2
            "#,
        )
        .bind(variant_id)
        .bind(product_id)
        .bind(&input.size)
        .bind(input.quantity)
        .bind(input.selling_price_cents)
        .bind(input.item_cost_cents)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", variant_id));
        }

        Ok(Variant {
            id: variant_id.to_string(),
            product_id: product_id.to_string(),
            size: input.size,
            quantity: input.quantity,
            selling_price_cents: input.selling_price_cents,
            item_cost_cents: input.item_cost_cents,
            updated_at: now,
        })
    }

    /// Deletes a variant under a product.
    pub async fn delete_variant(&self, product_id: &str, variant_id: &str) -> DbResult<()> {
        debug!(id = %variant_id, product_id = %product_id, "Deleting variant");

        let result = sqlx::query("DELETE FROM variants WHERE id = ?1 AND product_id = ?2")
            .bind(variant_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", variant_id));
        }

        Ok(())
    }

    /// Lists all variants of a product.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Product doesn't exist (distinct from a
    ///   product that exists with zero variants, which returns `Ok(vec![])`)
    pub async fn variants_by_product(&self, product_id: &str) -> DbResult<Vec<Variant>> {
        self.require_product(product_id).await?;
        self.fetch_variants(product_id).await
    }

    /// Counts variants across the whole catalog.
    ///
    /// Variants are the sellable/stockable unit, so "how many items do we
    /// carry" counts variants, not products.
    pub async fn count_variants(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM variants")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Errors with NotFound unless the product exists.
    async fn require_product(&self, id: &str) -> DbResult<()> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        if exists.is_none() {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Fetches a product's variants without checking the product row.
    async fn fetch_variants(&self, product_id: &str) -> DbResult<Vec<Variant>> {
        let variants = sqlx::query_as::<_, Variant>(
            r#"
            SELECT id, product_id, size, quantity,
                   selling_price_cents, item_cost_cents, updated_at
            FROM variants
            WHERE product_id = ?1
            ORDER BY size, id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(variants)
    }
}

/// Groups a flat variant list under its products, preserving product order.
fn group_variants(products: Vec<Product>, variants: Vec<Variant>) -> Vec<ProductWithVariants> {
    let mut by_product: HashMap<String, Vec<Variant>> = HashMap::new();
    for variant in variants {
        by_product
            .entry(variant.product_id.clone())
            .or_default()
            .push(variant);
    }

    products
        .into_iter()
        .map(|product| {
            let variants = by_product.remove(&product.id).unwrap_or_default();
            ProductWithVariants { product, variants }
        })
        .collect()
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

/// Helper to generate a new variant ID.
pub fn generate_variant_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tally_core::CoreError;

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn sample_product(name: &str, color: &str, quantity: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: None,
            color: Some(color.to_string()),
            image_url: None,
            variants: vec![NewVariant {
                size: Some("M".to_string()),
                quantity,
                selling_price_cents: 2999,
                item_cost_cents: 1200,
            }],
        }
    }

    #[tokio::test]
    async fn test_create_and_get_product() {
        let db = setup().await;
        let repo = db.products();

        let created = repo
            .create(sample_product("Classic Hoodie", "black", 12))
            .await
            .unwrap();
        assert_eq!(created.product.name, "Classic Hoodie");
        assert_eq!(created.variants.len(), 1);
        assert_eq!(created.variants[0].quantity, 12);
        assert_eq!(created.variants[0].product_id, created.product.id);

        let fetched = repo
            .get_with_variants(&created.product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.product.id, created.product.id);
        assert_eq!(fetched.variants.len(), 1);

        assert!(repo.get_with_variants("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let db = setup().await;

        let mut input = sample_product("", "black", 1);
        input.name = "   ".to_string();
        let err = db.products().create(input).await.unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_pages_are_stable() {
        let db = setup().await;
        let repo = db.products();
        repo.create(sample_product("Cap", "navy", 1)).await.unwrap();
        repo.create(sample_product("Apron", "white", 1)).await.unwrap();
        repo.create(sample_product("Beanie", "grey", 1)).await.unwrap();

        let first = repo.list(0, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].product.name, "Apron");
        assert_eq!(first[1].product.name, "Beanie");
        assert_eq!(first[0].variants.len(), 1);

        let second = repo.list(2, 2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].product.name, "Cap");
    }

    #[tokio::test]
    async fn test_search_matches_name_and_color() {
        let db = setup().await;
        let repo = db.products();
        repo.create(sample_product("Classic Hoodie", "black", 5))
            .await
            .unwrap();
        repo.create(sample_product("Black Cap", "navy", 5)).await.unwrap();
        repo.create(sample_product("Plain Socks", "white", 5))
            .await
            .unwrap();
        // No variants, so never searchable
        repo.create(NewProduct {
            name: "Ghost Jacket".to_string(),
            description: None,
            color: Some("black".to_string()),
            image_url: None,
            variants: vec![],
        })
        .await
        .unwrap();

        let hits = repo.search("BLACK").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|p| !p.variants.is_empty()));

        let hits = repo.search("sock").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].product.name, "Plain Socks");

        assert!(repo.search("zzz").await.unwrap().is_empty());

        // Empty query: the whole catalog, minus variant-less products
        assert_eq!(repo.search("").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_replaces_all_fields() {
        let db = setup().await;
        let repo = db.products();
        let created = repo
            .create(sample_product("Old Name", "red", 1))
            .await
            .unwrap();

        let updated = repo
            .update(
                &created.product.id,
                ProductUpdate {
                    name: "New Name".to_string(),
                    description: Some("updated".to_string()),
                    color: None,
                    image_url: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "New Name");
        assert_eq!(updated.description.as_deref(), Some("updated"));
        assert!(updated.color.is_none(), "omitted fields are cleared");
        assert_eq!(updated.created_at, created.product.created_at);
    }

    #[tokio::test]
    async fn test_update_missing_product() {
        let db = setup().await;

        let err = db
            .products()
            .update(
                "missing",
                ProductUpdate {
                    name: "Anything".to_string(),
                    description: None,
                    color: None,
                    image_url: None,
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_variant_lifecycle() {
        let db = setup().await;
        let repo = db.products();
        let created = repo.create(sample_product("Tee", "white", 10)).await.unwrap();
        let product_id = created.product.id.clone();

        let added = repo
            .add_variant(
                &product_id,
                NewVariant {
                    size: Some("L".to_string()),
                    quantity: 4,
                    selling_price_cents: 1600,
                    item_cost_cents: 700,
                },
            )
            .await
            .unwrap();
        assert_eq!(added.quantity, 4);
        assert_eq!(repo.count_variants().await.unwrap(), 2);
        assert_eq!(repo.variants_by_product(&product_id).await.unwrap().len(), 2);

        // Absolute restock, not a delta
        let updated = repo
            .update_variant(
                &product_id,
                &added.id,
                VariantUpdate {
                    size: Some("L".to_string()),
                    quantity: 9,
                    selling_price_cents: 1600,
                    item_cost_cents: 700,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.quantity, 9);

        repo.delete_variant(&product_id, &added.id).await.unwrap();
        let err = repo.delete_variant(&product_id, &added.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert_eq!(repo.count_variants().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_variant_ops_require_matching_product() {
        let db = setup().await;
        let repo = db.products();
        let a = repo.create(sample_product("A", "red", 1)).await.unwrap();
        let b = repo.create(sample_product("B", "blue", 1)).await.unwrap();

        // A's variant is not reachable through B's id
        let err = repo
            .update_variant(
                &b.product.id,
                &a.variants[0].id,
                VariantUpdate {
                    size: None,
                    quantity: 1,
                    selling_price_cents: 100,
                    item_cost_cents: 50,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let err = repo.variants_by_product("missing").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_product_removes_variants() {
        let db = setup().await;
        let repo = db.products();
        let mut input = sample_product("Jacket", "green", 3);
        input.variants.push(NewVariant {
            size: Some("XL".to_string()),
            quantity: 2,
            selling_price_cents: 4999,
            item_cost_cents: 2100,
        });
        let created = repo.create(input).await.unwrap();

        repo.delete(&created.product.id).await.unwrap();

        assert!(repo
            .get_with_variants(&created.product.id)
            .await
            .unwrap()
            .is_none());
        assert_eq!(repo.count_variants().await.unwrap(), 0);

        let err = repo.delete(&created.product.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
