//! `PostgreSQL` aggregate store.
//!
//! Each save runs in one transaction: the aggregate row's `version` is bumped
//! with `WHERE version = $expected`, then ledger rows are upserted by record
//! id. A lost race shows up either as zero updated rows or as a violation of
//! the partial unique index on active rows; both map to
//! [`StoreError::VersionConflict`].

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use super::{AggregateStore, StoreError, Versioned, NEW_AGGREGATE_VERSION};
use crate::channels::{Channel, ChannelType, Member};
use crate::files::{AccessLevel, File, FileAccess};
use crate::ledger::Ledger;

/// Create `PostgreSQL` connection pool with health configuration.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(2)
        .max_connections(20)
        // Prevent hanging requests on pool exhaustion
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .test_before_acquire(true)
        .connect(database_url)
        .await?;

    info!("Connected to PostgreSQL");
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}

/// Store for channel and file aggregates backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct ChannelRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    channel_type: ChannelType,
    is_archived: bool,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    version: i64,
}

#[derive(Debug, FromRow)]
struct FileRow {
    id: Uuid,
    access_level: AccessLevel,
    uploaded_by: Uuid,
    channel_id: Option<Uuid>,
    is_deleted: bool,
    version: i64,
}

/// Map a unique-index violation on active rows to a lost race.
fn conflict_on_unique(err: sqlx::Error, id: Uuid, expected: i64) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::VersionConflict { id, expected }
        }
        _ => StoreError::Database(err),
    }
}

#[tracing::instrument(skip(pool))]
async fn load_channel(pool: &PgPool, id: Uuid) -> Result<Option<Versioned<Channel>>, StoreError> {
    let row: Option<ChannelRow> = sqlx::query_as(
        r"
        SELECT id, name, description, channel_type, is_archived, created_by, created_at, version
        FROM channels
        WHERE id = $1
        ",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let members: Vec<Member> = sqlx::query_as(
        r"
        SELECT id, channel_id, user_id, role, added_by, joined_at, is_removed, removed_at, removed_by
        FROM channel_members
        WHERE channel_id = $1
        ORDER BY joined_at ASC, id ASC
        ",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let members = Ledger::from_records(members).map_err(|e| StoreError::Corrupt {
        id,
        reason: e.to_string(),
    })?;

    Ok(Some(Versioned {
        value: Channel {
            id: row.id,
            name: row.name,
            description: row.description,
            channel_type: row.channel_type,
            is_archived: row.is_archived,
            created_by: row.created_by,
            created_at: row.created_at,
            members,
        },
        version: row.version,
    }))
}

#[tracing::instrument(skip(pool, channel), fields(channel_id = %channel.id))]
async fn save_channel(pool: &PgPool, channel: &Channel, expected: i64) -> Result<i64, StoreError> {
    let conflict = StoreError::VersionConflict {
        id: channel.id,
        expected,
    };
    let mut tx = pool.begin().await?;

    let version = if expected == NEW_AGGREGATE_VERSION {
        let inserted = sqlx::query(
            r"
            INSERT INTO channels (id, name, description, channel_type, is_archived, created_by, created_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(channel.id)
        .bind(&channel.name)
        .bind(channel.description.as_deref())
        .bind(channel.channel_type)
        .bind(channel.is_archived)
        .bind(channel.created_by)
        .bind(channel.created_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(conflict);
        }
        1
    } else {
        let updated: Option<(i64,)> = sqlx::query_as(
            r"
            UPDATE channels
            SET name = $2, description = $3, is_archived = $4, version = version + 1
            WHERE id = $1 AND version = $5
            RETURNING version
            ",
        )
        .bind(channel.id)
        .bind(&channel.name)
        .bind(channel.description.as_deref())
        .bind(channel.is_archived)
        .bind(expected)
        .fetch_optional(&mut *tx)
        .await?;

        updated.ok_or(conflict)?.0
    };

    for member in channel.members().records() {
        upsert_member(&mut tx, member)
            .await
            .map_err(|e| conflict_on_unique(e, channel.id, expected))?;
    }

    tx.commit().await?;
    Ok(version)
}

async fn upsert_member(tx: &mut Transaction<'_, Postgres>, member: &Member) -> sqlx::Result<()> {
    sqlx::query(
        r"
        INSERT INTO channel_members
            (id, channel_id, user_id, role, added_by, joined_at, is_removed, removed_at, removed_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (id) DO UPDATE
        SET role = EXCLUDED.role,
            is_removed = EXCLUDED.is_removed,
            removed_at = EXCLUDED.removed_at,
            removed_by = EXCLUDED.removed_by
        ",
    )
    .bind(member.id)
    .bind(member.channel_id)
    .bind(member.user_id)
    .bind(member.role)
    .bind(member.added_by)
    .bind(member.joined_at)
    .bind(member.is_removed)
    .bind(member.removed_at)
    .bind(member.removed_by)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[tracing::instrument(skip(pool))]
async fn load_file(pool: &PgPool, id: Uuid) -> Result<Option<Versioned<File>>, StoreError> {
    let row: Option<FileRow> = sqlx::query_as(
        r"
        SELECT id, access_level, uploaded_by, channel_id, is_deleted, version
        FROM files
        WHERE id = $1
        ",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let grants: Vec<FileAccess> = sqlx::query_as(
        r"
        SELECT id, file_id, user_id, granted_by, granted_at, is_revoked, revoked_at, revoked_by
        FROM file_access
        WHERE file_id = $1
        ORDER BY granted_at ASC, id ASC
        ",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let grants = Ledger::from_records(grants).map_err(|e| StoreError::Corrupt {
        id,
        reason: e.to_string(),
    })?;

    Ok(Some(Versioned {
        value: File {
            id: row.id,
            access_level: row.access_level,
            uploaded_by: row.uploaded_by,
            channel_id: row.channel_id,
            is_deleted: row.is_deleted,
            grants,
        },
        version: row.version,
    }))
}

#[tracing::instrument(skip(pool, file), fields(file_id = %file.id))]
async fn save_file(pool: &PgPool, file: &File, expected: i64) -> Result<i64, StoreError> {
    let conflict = StoreError::VersionConflict {
        id: file.id,
        expected,
    };
    let mut tx = pool.begin().await?;

    let version = if expected == NEW_AGGREGATE_VERSION {
        let inserted = sqlx::query(
            r"
            INSERT INTO files (id, access_level, uploaded_by, channel_id, is_deleted, version)
            VALUES ($1, $2, $3, $4, $5, 1)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(file.id)
        .bind(file.access_level)
        .bind(file.uploaded_by)
        .bind(file.channel_id)
        .bind(file.is_deleted)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(conflict);
        }
        1
    } else {
        let updated: Option<(i64,)> = sqlx::query_as(
            r"
            UPDATE files
            SET access_level = $2, is_deleted = $3, version = version + 1
            WHERE id = $1 AND version = $4
            RETURNING version
            ",
        )
        .bind(file.id)
        .bind(file.access_level)
        .bind(file.is_deleted)
        .bind(expected)
        .fetch_optional(&mut *tx)
        .await?;

        updated.ok_or(conflict)?.0
    };

    // Grants dropped from the ledger (level left Restricted) are dropped here too
    let kept: Vec<Uuid> = file.grants().records().iter().map(|g| g.id).collect();
    sqlx::query("DELETE FROM file_access WHERE file_id = $1 AND NOT (id = ANY($2))")
        .bind(file.id)
        .bind(&kept)
        .execute(&mut *tx)
        .await?;

    for grant in file.grants().records() {
        upsert_grant(&mut tx, grant)
            .await
            .map_err(|e| conflict_on_unique(e, file.id, expected))?;
    }

    tx.commit().await?;
    Ok(version)
}

async fn upsert_grant(tx: &mut Transaction<'_, Postgres>, grant: &FileAccess) -> sqlx::Result<()> {
    sqlx::query(
        r"
        INSERT INTO file_access
            (id, file_id, user_id, granted_by, granted_at, is_revoked, revoked_at, revoked_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO UPDATE
        SET is_revoked = EXCLUDED.is_revoked,
            revoked_at = EXCLUDED.revoked_at,
            revoked_by = EXCLUDED.revoked_by
        ",
    )
    .bind(grant.id)
    .bind(grant.file_id)
    .bind(grant.user_id)
    .bind(grant.granted_by)
    .bind(grant.granted_at)
    .bind(grant.is_revoked)
    .bind(grant.revoked_at)
    .bind(grant.revoked_by)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

impl AggregateStore<Channel> for PgStore {
    fn load(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Versioned<Channel>>, StoreError>> {
        Box::pin(load_channel(&self.pool, id))
    }

    fn save<'a>(
        &'a self,
        aggregate: &'a Channel,
        expected_version: i64,
    ) -> BoxFuture<'a, Result<i64, StoreError>> {
        Box::pin(save_channel(&self.pool, aggregate, expected_version))
    }
}

impl AggregateStore<File> for PgStore {
    fn load(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Versioned<File>>, StoreError>> {
        Box::pin(load_file(&self.pool, id))
    }

    fn save<'a>(
        &'a self,
        aggregate: &'a File,
        expected_version: i64,
    ) -> BoxFuture<'a, Result<i64, StoreError>> {
        Box::pin(save_file(&self.pool, aggregate, expected_version))
    }
}
