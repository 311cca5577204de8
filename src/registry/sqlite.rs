//! src/registry/sqlite.rs
//!
//! SqliteRegistry: the `Repository` implementation backed by a SQLite pool.
//! All providers share the `managed_buckets` table; the `provider` column
//! keeps their records apart and `UNIQUE(provider, namespace, name)` makes
//! the registry the source of truth for bucket-name uniqueness.

use crate::{
    models::{ManagedBucket, Placement, PlacementColumns},
    registry::{BucketCriteria, RegistryError, RegistryResult, Repository},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    FromRow, QueryBuilder, SqlitePool,
    sqlite::{Sqlite, SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc};
use tracing::{debug, info};
use uuid::Uuid;

const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_managed_buckets",
    include_str!("../../migrations/0001_managed_buckets.sql"),
)];

const SELECT_COLUMNS: &str = "SELECT id, owner_id, name, location, resource_group, \
     storage_account, created_at FROM managed_buckets WHERE provider = ";

#[derive(Clone)]
pub struct SqliteRegistry {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

#[derive(FromRow)]
struct ManagedBucketRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    location: String,
    resource_group: Option<String>,
    storage_account: Option<String>,
    created_at: DateTime<Utc>,
}

impl ManagedBucketRow {
    fn into_bucket<P: Placement>(self) -> RegistryResult<ManagedBucket<P>> {
        let placement = P::from_columns(PlacementColumns {
            location: self.location,
            resource_group: self.resource_group,
            storage_account: self.storage_account,
        })?;
        Ok(ManagedBucket {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            placement,
            created_at: self.created_at,
        })
    }
}

impl SqliteRegistry {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Open (and create if missing) the database at `database_url`.
    pub async fn connect(database_url: &str) -> RegistryResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// A private in-memory database. Limited to one connection, since every
    /// SQLite connection to `:memory:` opens its own database.
    pub async fn in_memory() -> RegistryResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let registry = Self::new(Arc::new(pool));
        registry.migrate().await?;
        Ok(registry)
    }

    /// Apply the embedded migrations. Every statement is idempotent, so this
    /// is safe to run on each start. Returns the number of statements run.
    pub async fn migrate(&self) -> RegistryResult<usize> {
        let mut executed = 0;
        for (name, sql) in MIGRATIONS {
            let statements = sql
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>();
            info!("Running migration {} ({} statements)", name, statements.len());

            for stmt in statements {
                debug!("Executing migration SQL: {}", stmt);
                sqlx::query(stmt).execute(&*self.db).await?;
                executed += 1;
            }
        }
        Ok(executed)
    }
}

fn push_criteria<P: Placement>(builder: &mut QueryBuilder<'_, Sqlite>, criteria: &BucketCriteria<P>) {
    if let Some(owner_id) = criteria.owner_id {
        builder.push(" AND owner_id = ");
        builder.push_bind(owner_id);
    }
    if let Some(name) = &criteria.name {
        builder.push(" AND name = ");
        builder.push_bind(name.clone());
    }
    if let Some(placement) = &criteria.placement {
        for (column, value) in placement.scope() {
            builder.push(format!(" AND {column} = "));
            builder.push_bind(value);
        }
    }
}

#[async_trait]
impl<P: Placement> Repository<P> for SqliteRegistry {
    async fn save(&self, bucket: &ManagedBucket<P>) -> RegistryResult<()> {
        let columns = bucket.placement.to_columns();
        debug!(bucket = %bucket.name, provider = %P::PROVIDER, "persisting managed bucket");

        let result = sqlx::query(
            "INSERT INTO managed_buckets (id, provider, owner_id, name, namespace, location,
                                          resource_group, storage_account, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(bucket.id)
        .bind(P::PROVIDER.as_str())
        .bind(bucket.owner_id)
        .bind(&bucket.name)
        .bind(bucket.placement.namespace())
        .bind(&columns.location)
        .bind(&columns.resource_group)
        .bind(&columns.storage_account)
        .bind(bucket.created_at)
        .execute(&*self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(RegistryError::Conflict {
                provider: P::PROVIDER,
                name: bucket.name.clone(),
            }),
            Err(err) => Err(RegistryError::Sqlx(err)),
        }
    }

    async fn find(&self, criteria: &BucketCriteria<P>) -> RegistryResult<Vec<ManagedBucket<P>>> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        builder.push_bind(P::PROVIDER.as_str());
        push_criteria(&mut builder, criteria);
        builder.push(" ORDER BY created_at ASC");

        let rows: Vec<ManagedBucketRow> = builder.build_query_as().fetch_all(&*self.db).await?;
        rows.into_iter().map(ManagedBucketRow::into_bucket).collect()
    }

    async fn delete(&self, criteria: &BucketCriteria<P>) -> RegistryResult<u64> {
        if criteria.name.is_none() {
            return Err(RegistryError::EmptyCriteria);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM managed_buckets WHERE provider = ");
        builder.push_bind(P::PROVIDER.as_str());
        push_criteria(&mut builder, criteria);

        let result = builder.build().execute(&*self.db).await?;
        debug!(
            provider = %P::PROVIDER,
            removed = result.rows_affected(),
            "deleted managed bucket records"
        );
        Ok(result.rows_affected())
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
