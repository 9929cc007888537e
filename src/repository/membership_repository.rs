use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Membership, MembershipPlan, MembershipStatus, NewMembership},
    error::{AppError, Result},
    repository::{is_unique_violation, Insert, MembershipRepository, Transition},
};

#[derive(FromRow)]
struct PlanRow {
    id: String,
    plan_type: String,
    name: String,
    monthly_price_cents: i64,
    member_hourly_rate_cents: i64,
    included_visit_minutes: i64,
    included_minutes_remote_only: i32,
    max_covered_people: i64,
    is_active: i32,
}

#[derive(FromRow)]
struct MembershipRow {
    id: String,
    user_id: String,
    plan_id: String,
    status: String,
    stripe_subscription_id: String,
    stripe_customer_id: Option<String>,
    started_at: NaiveDateTime,
    next_billing_date: Option<NaiveDateTime>,
    cancelled_at: Option<NaiveDateTime>,
    cancellation_reason: Option<String>,
    covered_user_ids: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const MEMBERSHIP_COLUMNS: &str = r#"
    id, user_id, plan_id, status, stripe_subscription_id, stripe_customer_id,
    started_at, next_billing_date, cancelled_at, cancellation_reason,
    covered_user_ids, created_at, updated_at
"#;

pub struct SqliteMembershipRepository {
    pool: SqlitePool,
}

impl SqliteMembershipRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_plan(row: PlanRow) -> Result<MembershipPlan> {
        Ok(MembershipPlan {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            plan_type: row.plan_type,
            name: row.name,
            monthly_price_cents: row.monthly_price_cents,
            member_hourly_rate_cents: row.member_hourly_rate_cents,
            included_visit_minutes: row.included_visit_minutes,
            included_minutes_remote_only: row.included_minutes_remote_only != 0,
            max_covered_people: row.max_covered_people,
            is_active: row.is_active != 0,
        })
    }

    fn row_to_membership(row: MembershipRow) -> Result<Membership> {
        let to_utc = |dt: NaiveDateTime| DateTime::from_naive_utc_and_offset(dt, Utc);

        Ok(Membership {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            user_id: Uuid::parse_str(&row.user_id).map_err(|e| AppError::Database(e.to_string()))?,
            plan_id: Uuid::parse_str(&row.plan_id).map_err(|e| AppError::Database(e.to_string()))?,
            status: MembershipStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid membership status: {}", row.status)))?,
            stripe_subscription_id: row.stripe_subscription_id,
            stripe_customer_id: row.stripe_customer_id,
            started_at: to_utc(row.started_at),
            next_billing_date: row.next_billing_date.map(to_utc),
            cancelled_at: row.cancelled_at.map(to_utc),
            cancellation_reason: row.cancellation_reason,
            covered_user_ids: serde_json::from_str(&row.covered_user_ids)
                .map_err(|e| AppError::Database(format!("Invalid covered users: {}", e)))?,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    async fn fetch_one_where(&self, clause: &str, values: &[String]) -> Result<Option<Membership>> {
        let sql = format!("SELECT {} FROM memberships WHERE {} LIMIT 1", MEMBERSHIP_COLUMNS, clause);
        let mut query = sqlx::query_as::<_, MembershipRow>(&sql);
        for value in values {
            query = query.bind(value.as_str());
        }

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_membership).transpose()
    }
}

#[async_trait]
impl MembershipRepository for SqliteMembershipRepository {
    async fn create_plan(&self, plan: MembershipPlan) -> Result<MembershipPlan> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO membership_plans (
                id, plan_type, name, monthly_price_cents, member_hourly_rate_cents,
                included_visit_minutes, included_minutes_remote_only,
                max_covered_people, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(plan.id.to_string())
        .bind(&plan.plan_type)
        .bind(&plan.name)
        .bind(plan.monthly_price_cents)
        .bind(plan.member_hourly_rate_cents)
        .bind(plan.included_visit_minutes)
        .bind(plan.included_minutes_remote_only as i32)
        .bind(plan.max_covered_people)
        .bind(plan.is_active as i32)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_plan(plan.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created membership plan".to_string()))
    }

    async fn find_plan(&self, id: Uuid) -> Result<Option<MembershipPlan>> {
        let row = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT id, plan_type, name, monthly_price_cents, member_hourly_rate_cents,
                   included_visit_minutes, included_minutes_remote_only,
                   max_covered_people, is_active
            FROM membership_plans
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_plan).transpose()
    }

    async fn create(&self, membership: NewMembership) -> Result<Insert<Membership>> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let covered = serde_json::to_string(&membership.covered_user_ids)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let sql = format!(
            "INSERT INTO memberships ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?, ?)",
            MEMBERSHIP_COLUMNS
        );

        let inserted = sqlx::query(&sql)
            .bind(id.to_string())
            .bind(membership.user_id.to_string())
            .bind(membership.plan_id.to_string())
            .bind(membership.status.as_str())
            .bind(&membership.stripe_subscription_id)
            .bind(&membership.stripe_customer_id)
            .bind(now)
            .bind(membership.next_billing_date.map(|dt| dt.naive_utc()))
            .bind(covered)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Ok(Insert::AlreadyExists),
            Err(e) => return Err(AppError::Database(e.to_string())),
        }

        let created = self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created membership".to_string())
        })?;

        Ok(Insert::Created(created))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Membership>> {
        self.fetch_one_where("id = ?", &[id.to_string()]).await
    }

    async fn find_by_subscription(&self, subscription_id: &str) -> Result<Option<Membership>> {
        self.fetch_one_where("stripe_subscription_id = ?", &[subscription_id.to_string()])
            .await
    }

    async fn find_by_subscription_and_user(
        &self,
        subscription_id: &str,
        user_id: Uuid,
    ) -> Result<Option<Membership>> {
        self.fetch_one_where(
            "stripe_subscription_id = ? AND user_id = ?",
            &[subscription_id.to_string(), user_id.to_string()],
        )
        .await
    }

    async fn find_active_by_user(&self, user_id: Uuid) -> Result<Option<Membership>> {
        self.fetch_one_where("user_id = ? AND status = 'active'", &[user_id.to_string()])
            .await
    }

    async fn transition_status(
        &self,
        id: Uuid,
        expected: MembershipStatus,
        next: MembershipStatus,
        next_billing_date: Option<DateTime<Utc>>,
    ) -> Result<Transition> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE memberships
            SET status = ?,
                next_billing_date = COALESCE(?, next_billing_date),
                cancelled_at = CASE WHEN ? = 'cancelled' THEN ? ELSE cancelled_at END,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(next.as_str())
        .bind(next_billing_date.map(|dt| dt.naive_utc()))
        .bind(next.as_str())
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(Transition::Applied),
            Ok(_) => Ok(Transition::Stale),
            Err(e) if is_unique_violation(&e) => Ok(Transition::Conflict),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }
}
