//! # Service Repository
//!
//! Database operations for services.
//!
//! Services are the stockless half of the catalog: printing, repairs,
//! embroidery. They carry a price and can appear on order lines, but no
//! quantity tracking ever applies to them.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::{validation, Service};

/// Input for creating a service.
#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub size: Option<String>,
    pub price_cents: i64,
    pub image_url: Option<String>,
}

/// Repository for service database operations.
#[derive(Debug, Clone)]
pub struct ServiceRepository {
    pool: SqlitePool,
}

impl ServiceRepository {
    /// Creates a new ServiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ServiceRepository { pool }
    }

    /// Creates a service.
    pub async fn create(&self, input: NewService) -> DbResult<Service> {
        validation::validate_name(&input.name)?;
        validation::validate_size(input.size.as_deref())?;
        validation::validate_price_cents(input.price_cents)?;

        let service = Service {
            id: generate_service_id(),
            name: input.name,
            size: input.size,
            price_cents: input.price_cents,
            image_url: input.image_url,
            created_at: Utc::now(),
        };

        debug!(id = %service.id, name = %service.name, "Creating service");

        sqlx::query(
            r#"
            INSERT INTO services (id, name, size, price_cents, image_url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&service.id)
        .bind(&service.name)
        .bind(&service.size)
        .bind(service.price_cents)
        .bind(&service.image_url)
        .bind(service.created_at)
        .execute(&self.pool)
        .await?;

        Ok(service)
    }

    /// Gets a service by ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Service))` - Service found
    /// * `Ok(None)` - Service not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Service>> {
        let service = sqlx::query_as::<_, Service>(
            r#"
            SELECT id, name, size, price_cents, image_url, created_at
            FROM services
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(service)
    }

    /// Lists services, paged.
    pub async fn list(&self, skip: i64, limit: i64) -> DbResult<Vec<Service>> {
        debug!(skip = %skip, limit = %limit, "Listing services");

        let services = sqlx::query_as::<_, Service>(
            r#"
            SELECT id, name, size, price_cents, image_url, created_at
            FROM services
            ORDER BY name, id
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(services)
    }

    /// Deletes a service.
    ///
    /// Order items referencing it keep their snapshot id and price.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting service");

        let result = sqlx::query("DELETE FROM services WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Service", id));
        }

        Ok(())
    }
}

/// Helper to generate a new service ID.
pub fn generate_service_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
