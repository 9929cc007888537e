use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Appointment, AppointmentStatus, CreateAppointmentRequest, LocationType},
    error::{AppError, Result},
    repository::AppointmentRepository,
};

#[derive(FromRow)]
struct AppointmentRow {
    id: String,
    requester_id: String,
    provider_id: String,
    status: String,
    scheduled_at: NaiveDateTime,
    duration_minutes: i64,
    location_type: String,
    base_price_cents: i64,
    travel_fee_cents: i64,
    travel_distance_miles: f64,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteAppointmentRepository {
    pool: SqlitePool,
}

impl SqliteAppointmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_appointment(row: AppointmentRow) -> Result<Appointment> {
        Ok(Appointment {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            requester_id: Uuid::parse_str(&row.requester_id).map_err(|e| AppError::Database(e.to_string()))?,
            provider_id: Uuid::parse_str(&row.provider_id).map_err(|e| AppError::Database(e.to_string()))?,
            status: AppointmentStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid appointment status: {}", row.status)))?,
            scheduled_at: DateTime::from_naive_utc_and_offset(row.scheduled_at, Utc),
            duration_minutes: row.duration_minutes,
            location_type: LocationType::from_str(&row.location_type)
                .ok_or_else(|| AppError::Database(format!("Invalid location type: {}", row.location_type)))?,
            base_price_cents: row.base_price_cents,
            travel_fee_cents: row.travel_fee_cents,
            travel_distance_miles: row.travel_distance_miles,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl AppointmentRepository for SqliteAppointmentRepository {
    async fn create(&self, request: CreateAppointmentRequest) -> Result<Appointment> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO appointments (
                id, requester_id, provider_id, status, scheduled_at,
                duration_minutes, location_type, base_price_cents,
                travel_fee_cents, travel_distance_miles, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(request.requester_id.to_string())
        .bind(request.provider_id.to_string())
        .bind(AppointmentStatus::Pending.as_str())
        .bind(request.scheduled_at.naive_utc())
        .bind(request.duration_minutes)
        .bind(request.location_type.as_str())
        .bind(request.base_price_cents)
        .bind(request.travel_fee_cents)
        .bind(request.travel_distance_miles)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created appointment".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>> {
        let row = sqlx::query_as::<_, AppointmentRow>(
            r#"
            SELECT id, requester_id, provider_id, status, scheduled_at,
                   duration_minutes, location_type, base_price_cents,
                   travel_fee_cents, travel_distance_miles, created_at, updated_at
            FROM appointments
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_appointment).transpose()
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET status = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#
        )
        .bind(next.as_str())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}
