//! Risk zone repository for database operations.

use sqlx::PgPool;
use uuid::Uuid;

use domain::models::zone::{NewZone, ZonePatch};

use crate::entities::{SourceColumns, ZoneEntity};
use crate::metrics::QueryTimer;

/// Repository for risk zone database operations.
#[derive(Clone)]
pub struct ZoneRepository {
    pool: PgPool,
}

impl ZoneRepository {
    /// Creates a new ZoneRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a new active zone.
    pub async fn create(&self, zone_id: Uuid, zone: &NewZone) -> Result<ZoneEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_zone");
        let source = SourceColumns::from(&zone.source);
        let result = sqlx::query_as::<_, ZoneEntity>(
            r#"
            INSERT INTO risk_zones (zone_id, name, description, latitude, longitude,
                                    radius_meters, risk_level, active, source_kind,
                                    prediction_type, confidence, estimated_time,
                                    created_by, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, true, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(zone_id)
        .bind(&zone.name)
        .bind(&zone.description)
        .bind(zone.latitude)
        .bind(zone.longitude)
        .bind(zone.radius_meters)
        .bind(zone.risk_level.as_str())
        .bind(source.kind)
        .bind(source.prediction_type)
        .bind(source.confidence)
        .bind(source.estimated_time)
        .bind(&zone.created_by)
        .bind(zone.expires_at)
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Find zone by UUID, active or not.
    pub async fn find_by_zone_id(&self, zone_id: Uuid) -> Result<Option<ZoneEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_zone_by_id");
        let result = sqlx::query_as::<_, ZoneEntity>(
            r#"
            SELECT * FROM risk_zones WHERE zone_id = $1
            "#,
        )
        .bind(zone_id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// All active zones in creation order.
    pub async fn find_active(&self) -> Result<Vec<ZoneEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_active_zones");
        let result = sqlx::query_as::<_, ZoneEntity>(
            r#"
            SELECT * FROM risk_zones
            WHERE active = true
            ORDER BY created_at ASC, zone_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Partial update. `None` fields are preserved; a source, when present,
    /// replaces all four source columns. Deactivation stamps `deleted_at`
    /// and reactivation clears it.
    pub async fn update(
        &self,
        zone_id: Uuid,
        patch: &ZonePatch,
    ) -> Result<Option<ZoneEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_zone");
        let source = patch.source.as_ref().map(SourceColumns::from);

        let result = sqlx::query_as::<_, ZoneEntity>(
            r#"
            UPDATE risk_zones SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                latitude = COALESCE($4, latitude),
                longitude = COALESCE($5, longitude),
                radius_meters = COALESCE($6, radius_meters),
                risk_level = COALESCE($7, risk_level),
                deleted_at = CASE
                    WHEN $8::BOOLEAN IS NULL THEN deleted_at
                    WHEN $8::BOOLEAN THEN NULL
                    WHEN active THEN NOW()
                    ELSE deleted_at
                END,
                active = COALESCE($8, active),
                source_kind = CASE WHEN $9 THEN $10 ELSE source_kind END,
                prediction_type = CASE WHEN $9 THEN $11 ELSE prediction_type END,
                confidence = CASE WHEN $9 THEN $12 ELSE confidence END,
                estimated_time = CASE WHEN $9 THEN $13 ELSE estimated_time END,
                expires_at = COALESCE($14, expires_at),
                updated_at = NOW()
            WHERE zone_id = $1
            RETURNING *
            "#,
        )
        .bind(zone_id)
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.latitude)
        .bind(patch.longitude)
        .bind(patch.radius_meters)
        .bind(patch.risk_level.map(|l| l.as_str()))
        .bind(patch.active)
        .bind(source.is_some())
        .bind(source.as_ref().map(|s| s.kind))
        .bind(source.as_ref().and_then(|s| s.prediction_type))
        .bind(source.as_ref().and_then(|s| s.confidence))
        .bind(source.as_ref().and_then(|s| s.estimated_time))
        .bind(patch.expires_at)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Connectivity check.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("ping");
        let result = sqlx::query("SELECT 1").execute(&self.pool).await;
        timer.finish(&result);
        result.map(|_| ())
    }
}
