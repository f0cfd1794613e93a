//! Request repository: queue reads and the guarded assignment transaction

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AccommodationError, AccommodationResult};
use crate::models::{
    AccommodationRequest, Assignment, GenderPolicy, NewAccommodationRequest, PaymentStatus,
    RequestEntry, RequestStatus, request::normalize_room_number,
};
use crate::repositories::{
    RequestStore,
    property::{PROPERTY_COLUMNS, property_from_row},
};

const REQUEST_COLUMNS: &str = "id, user_id, gender, payment_status, assigned_property_id, \
     check_in_date, check_out_date, nights, room_number, status, checked_in, created_at";

const ENTRY_SELECT: &str = r#"
    SELECT r.id, r.user_id, r.gender, r.payment_status, r.assigned_property_id,
           r.check_in_date, r.check_out_date, r.nights, r.room_number, r.status,
           r.checked_in, r.created_at,
           u.name AS user_name, u.participant_id, u.phone,
           p.name AS property_name
    FROM accommodation_requests r
    JOIN users u ON u.id = r.user_id
    LEFT JOIN properties p ON p.id = r.assigned_property_id
"#;

fn stored<T: std::str::FromStr>(row: &PgRow, column: &str) -> AccommodationResult<T> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|_| {
        AccommodationError::InvalidState(format!("Stored {} '{}' is unknown", column, raw))
    })
}

fn request_from_row(row: &PgRow) -> AccommodationResult<AccommodationRequest> {
    Ok(AccommodationRequest {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        gender: stored(row, "gender")?,
        payment_status: stored(row, "payment_status")?,
        assigned_property_id: row.try_get("assigned_property_id")?,
        check_in_date: row.try_get("check_in_date")?,
        check_out_date: row.try_get("check_out_date")?,
        nights: row.try_get("nights")?,
        room_number: row.try_get("room_number")?,
        status: stored(row, "status")?,
        checked_in: row.try_get("checked_in")?,
        created_at: row.try_get("created_at")?,
    })
}

fn entry_from_row(row: &PgRow) -> AccommodationResult<RequestEntry> {
    Ok(RequestEntry {
        request: request_from_row(row)?,
        user_name: row.try_get("user_name")?,
        participant_id: row.try_get("participant_id")?,
        phone: row.try_get("phone")?,
        property_name: row.try_get("property_name")?,
    })
}

/// Request repository
#[derive(Clone)]
pub struct RequestRepository {
    pool: PgPool,
}

impl RequestRepository {
    /// Create a new request repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load and row-lock a request inside `tx`
    async fn lock(
        tx: &mut Transaction<'_, Postgres>,
        request_id: i64,
    ) -> AccommodationResult<AccommodationRequest> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accommodation_requests WHERE id = $1 FOR UPDATE",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AccommodationError::not_found("Request", request_id))?;

        request_from_row(&row)
    }

    /// Give back one bed, never going below zero
    async fn release_bed(
        tx: &mut Transaction<'_, Postgres>,
        property_id: i64,
    ) -> AccommodationResult<()> {
        let released = sqlx::query(
            "UPDATE properties SET occupied = occupied - 1 WHERE id = $1 AND occupied > 0",
        )
        .bind(property_id)
        .execute(&mut **tx)
        .await?;

        if released.rows_affected() == 0 {
            warn!(property_id, "Released a bed from a property with no occupancy");
        }
        Ok(())
    }
}

#[async_trait]
impl RequestStore for RequestRepository {
    async fn list_entries(&self) -> AccommodationResult<Vec<RequestEntry>> {
        let rows = sqlx::query(&format!(
            "{} ORDER BY r.created_at DESC, r.id DESC",
            ENTRY_SELECT
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn find_by_id(&self, id: i64) -> AccommodationResult<Option<AccommodationRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accommodation_requests WHERE id = $1",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(request_from_row).transpose()
    }

    async fn find_entry_by_user(&self, user_id: Uuid) -> AccommodationResult<Option<RequestEntry>> {
        let row = sqlx::query(&format!("{} WHERE r.user_id = $1", ENTRY_SELECT))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn find_by_participant(
        &self,
        participant_id: &str,
    ) -> AccommodationResult<Option<AccommodationRequest>> {
        let row = sqlx::query(&format!(
            "{} WHERE lower(u.participant_id) = lower($1)",
            ENTRY_SELECT
        ))
        .bind(participant_id.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(request_from_row).transpose()
    }

    async fn create(
        &self,
        request: &NewAccommodationRequest,
    ) -> AccommodationResult<AccommodationRequest> {
        info!(user_id = %request.user_id, "Creating accommodation request");

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO accommodation_requests (user_id, gender, check_in_date, check_out_date, nights)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(request.user_id)
        .bind(request.gender.as_str())
        .bind(request.check_in_date)
        .bind(request.check_out_date)
        .bind(request.nights)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => request_from_row(&row),
            Err(e) => match AccommodationError::from(e) {
                AccommodationError::Database(db) if db.is_unique_violation() => {
                    Err(AccommodationError::Conflict(format!(
                        "User {} already has an accommodation request",
                        request.user_id
                    )))
                }
                AccommodationError::Database(db) if db.is_foreign_key_violation() => {
                    Err(AccommodationError::not_found("User", request.user_id))
                }
                other => Err(other),
            },
        }
    }

    async fn assign(
        &self,
        request_id: i64,
        property_id: i64,
        room_number: Option<&str>,
    ) -> AccommodationResult<Assignment> {
        let mut tx = self.pool.begin().await?;

        let request = Self::lock(&mut tx, request_id).await?;
        request.ensure_assignable()?;

        // Policy first: a property of the wrong gender is never a candidate,
        // full or not
        let target: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT name, gender FROM properties WHERE id = $1")
                .bind(property_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((name, policy)) = target else {
            tx.rollback().await?;
            return Err(AccommodationError::not_found("Property", property_id));
        };
        let policy = GenderPolicy::from_stored(policy.as_deref());
        if !policy.admits(request.gender) {
            tx.rollback().await?;
            return Err(AccommodationError::Validation(format!(
                "{} ({}) does not accept {} participants",
                name, policy, request.gender
            )));
        }

        // Conditional increment: the only way a bed is taken
        let row = sqlx::query(&format!(
            r#"
            UPDATE properties SET occupied = occupied + 1
            WHERE id = $1 AND occupied < capacity
            RETURNING {}
            "#,
            PROPERTY_COLUMNS
        ))
        .bind(property_id)
        .fetch_optional(&mut *tx)
        .await?;

        let property = match row {
            Some(row) => property_from_row(&row)?,
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM properties WHERE id = $1)")
                        .bind(property_id)
                        .fetch_one(&mut *tx)
                        .await?;
                tx.rollback().await?;

                if exists {
                    warn!(request_id, property_id, "Assignment rejected: property is full");
                    return Err(AccommodationError::CapacityExceeded { property_id });
                }
                return Err(AccommodationError::not_found("Property", property_id));
            }
        };

        let row = sqlx::query(&format!(
            r#"
            UPDATE accommodation_requests
            SET assigned_property_id = $2,
                status = 'approved',
                room_number = COALESCE($3, room_number)
            WHERE id = $1
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .bind(property_id)
        .bind(normalize_room_number(room_number))
        .fetch_one(&mut *tx)
        .await?;
        let request = request_from_row(&row)?;

        tx.commit().await?;

        info!(
            request_id,
            property_id,
            occupied = property.occupied,
            capacity = property.capacity,
            "Request assigned"
        );
        Ok(Assignment { request, property })
    }

    async fn change_status(
        &self,
        request_id: i64,
        status: RequestStatus,
    ) -> AccommodationResult<AccommodationRequest> {
        let mut tx = self.pool.begin().await?;

        let request = Self::lock(&mut tx, request_id).await?;
        let change = request.plan_status_change(status)?;
        if change.from == change.to {
            return Ok(request);
        }

        if let Some(property_id) = change.release {
            Self::release_bed(&mut tx, property_id).await?;
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE accommodation_requests
            SET status = $2,
                assigned_property_id = NULL
            WHERE id = $1
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .bind(change.to.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let updated = request_from_row(&row)?;

        tx.commit().await?;

        info!(
            request_id,
            from = %change.from,
            to = %change.to,
            released = ?change.release,
            "Request status changed"
        );
        Ok(updated)
    }

    async fn set_payment_status(
        &self,
        request_id: i64,
        payment_status: PaymentStatus,
    ) -> AccommodationResult<AccommodationRequest> {
        let row = sqlx::query(&format!(
            "UPDATE accommodation_requests SET payment_status = $2 WHERE id = $1 RETURNING {}",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .bind(payment_status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AccommodationError::not_found("Request", request_id))?;
        let updated = request_from_row(&row)?;

        info!(request_id, payment_status = %payment_status, "Payment status updated");
        Ok(updated)
    }

    async fn set_room_number(
        &self,
        request_id: i64,
        room_number: Option<&str>,
    ) -> AccommodationResult<AccommodationRequest> {
        let row = sqlx::query(&format!(
            "UPDATE accommodation_requests SET room_number = $2 WHERE id = $1 RETURNING {}",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .bind(normalize_room_number(room_number))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AccommodationError::not_found("Request", request_id))?;

        request_from_row(&row)
    }

    async fn set_checked_in(
        &self,
        request_id: i64,
        checked_in: bool,
    ) -> AccommodationResult<AccommodationRequest> {
        let mut tx = self.pool.begin().await?;

        let request = Self::lock(&mut tx, request_id).await?;
        request.ensure_check_in_change(checked_in)?;

        let row = sqlx::query(&format!(
            "UPDATE accommodation_requests SET checked_in = $2 WHERE id = $1 RETURNING {}",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .bind(checked_in)
        .fetch_one(&mut *tx)
        .await?;
        let updated = request_from_row(&row)?;

        tx.commit().await?;

        info!(request_id, checked_in, "Check-in state changed");
        Ok(updated)
    }

    async fn delete(&self, request_id: i64) -> AccommodationResult<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let request = Self::lock(&mut tx, request_id).await?;
        let released = request.held_property();
        if let Some(property_id) = released {
            Self::release_bed(&mut tx, property_id).await?;
        }

        sqlx::query("DELETE FROM accommodation_requests WHERE id = $1")
            .bind(request_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(request_id, released = ?released, "Request deleted");
        Ok(released)
    }
}
