//! Embedded-SQL migration runner with advisory-lock support, so multiple
//! instances starting concurrently do not race each other applying schema
//! changes.

use sqlx::{PgPool, Row};

use crate::error::MetaResult;

const MIGRATION_LOCK_ID: i64 = 7421;

/// Apply all pending migrations, serialized across concurrent callers via a
/// Postgres advisory lock.
pub async fn run_migrations(pool: &PgPool) -> MetaResult<()> {
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(pool)
        .await?;

    let result = run_migrations_inner(pool).await;

    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(pool)
        .await?;

    result
}

async fn run_migrations_inner(pool: &PgPool) -> MetaResult<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMPTZ DEFAULT NOW()
        )
        ",
    )
    .execute(pool)
    .await?;

    let applied: Vec<i32> = sqlx::query("SELECT version FROM schema_migrations ORDER BY version")
        .fetch_all(pool)
        .await?
        .iter()
        .map(|row| row.get(0))
        .collect();

    let migrations: [(i32, &str, &str); 2] = [
        (
            1,
            "initial_schema",
            include_str!("../migrations/001_initial_schema.sql"),
        ),
        (2, "indexes", include_str!("../migrations/002_indexes.sql")),
    ];

    for (version, name, sql) in migrations {
        if applied.contains(&version) {
            tracing::debug!(version, name, "migration already applied");
            continue;
        }

        tracing::info!(version, name, "applying migration");
        let mut tx = pool.begin().await?;
        sqlx::query(sql).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO schema_migrations (version, name) VALUES ($1, $2)")
            .bind(version)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn migration_sql_embedded() {
        let sql1 = include_str!("../migrations/001_initial_schema.sql");
        assert!(sql1.contains("CREATE TABLE"));

        let sql2 = include_str!("../migrations/002_indexes.sql");
        assert!(sql2.contains("CREATE INDEX"));
    }
}
