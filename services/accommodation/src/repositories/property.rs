//! Property repository for database operations

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use crate::error::{AccommodationError, AccommodationResult};
use crate::models::{GenderPolicy, NewProperty, Property};
use crate::repositories::PropertyStore;

pub(crate) const PROPERTY_COLUMNS: &str = "id, name, property_type, gender, capacity, occupied, \
     cost_price, selling_price, contact_name, contact_phone, address, created_at";

/// Map a `properties` row
pub(crate) fn property_from_row(row: &PgRow) -> AccommodationResult<Property> {
    let raw_type: String = row.try_get("property_type")?;
    let property_type = raw_type.parse().map_err(|_| {
        AccommodationError::InvalidState(format!("Stored property type '{}' is unknown", raw_type))
    })?;
    let gender: Option<String> = row.try_get("gender")?;

    Ok(Property {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        property_type,
        gender: GenderPolicy::from_stored(gender.as_deref()),
        capacity: row.try_get("capacity")?,
        occupied: row.try_get("occupied")?,
        cost_price: row.try_get("cost_price")?,
        selling_price: row.try_get("selling_price")?,
        contact_name: row.try_get("contact_name")?,
        contact_phone: row.try_get("contact_phone")?,
        address: row.try_get("address")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Property repository
#[derive(Clone)]
pub struct PropertyRepository {
    pool: PgPool,
}

impl PropertyRepository {
    /// Create a new property repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PropertyStore for PropertyRepository {
    async fn list(&self) -> AccommodationResult<Vec<Property>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM properties ORDER BY id",
            PROPERTY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(property_from_row).collect()
    }

    async fn find_by_id(&self, id: i64) -> AccommodationResult<Option<Property>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM properties WHERE id = $1",
            PROPERTY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(property_from_row).transpose()
    }

    async fn create(&self, property: &NewProperty) -> AccommodationResult<Property> {
        info!("Creating property: {}", property.name);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO properties (name, property_type, gender, capacity, cost_price,
                                    selling_price, contact_name, contact_phone, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            PROPERTY_COLUMNS
        ))
        .bind(&property.name)
        .bind(property.property_type.as_str())
        .bind(property.gender.as_str())
        .bind(property.capacity)
        .bind(property.cost_price)
        .bind(property.selling_price)
        .bind(&property.contact_name)
        .bind(&property.contact_phone)
        .bind(&property.address)
        .fetch_one(&self.pool)
        .await?;

        property_from_row(&row)
    }

    async fn delete(&self, id: i64) -> AccommodationResult<()> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so no assignment can land between the check and the delete
        let exists = sqlx::query("SELECT id FROM properties WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !exists {
            return Err(AccommodationError::not_found("Property", id));
        }

        let assigned: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM accommodation_requests WHERE assigned_property_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if assigned > 0 {
            return Err(AccommodationError::Conflict(format!(
                "Property {} still has {} assigned request(s)",
                id, assigned
            )));
        }

        sqlx::query("DELETE FROM properties WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(property_id = id, "Property deleted");
        Ok(())
    }
}
