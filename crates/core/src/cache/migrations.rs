//! Schema migrations for the partition store.
//!
//! Applied versions are recorded in `_migrations`. Each pending migration runs
//! in its own transaction together with its version row.

use super::Error;
use tokio_rusqlite::rusqlite::{self, Transaction};
use tokio_rusqlite::{Connection, params};

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "partitions",
    sql: include_str!("../../migrations/001_partitions.sql"),
}];

/// Latest schema version this build knows about.
pub const LATEST_VERSION: i64 = 1;

fn applied_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?)
}

fn apply(tx: &Transaction<'_>, migration: &Migration) -> Result<(), Error> {
    tx.execute_batch(migration.sql)
        .map_err(|e| Error::MigrationFailed(format!("{} ({}): {}", migration.version, migration.name, e)))?;
    tx.execute(
        "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Apply every migration newer than the recorded schema version.
///
/// # Errors
///
/// `Error::MigrationFailed` when a migration's SQL fails (nothing from that
/// migration is kept), or a database error.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let current = applied_version(conn)?;

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let tx = conn.transaction()?;
            apply(&tx, migration)?;
            tx.commit()?;
            tracing::debug!("applied migration {} ({})", migration.version, migration.name);
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

/// Schema version currently recorded in the database.
pub async fn schema_version(conn: &Connection) -> Result<i64, Error> {
    conn.call(|conn| -> Result<i64, Error> { applied_version(conn) })
        .await
        .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_ascend_to_latest() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
        assert_eq!(MIGRATIONS.last().map(|m| m.version), Some(LATEST_VERSION));
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let tables: i64 = conn
            .call(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('partitions', 'entries')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();

        assert_eq!(tables, 2);
        assert_eq!(schema_version(&conn).await.unwrap(), LATEST_VERSION);
    }

    #[tokio::test]
    async fn test_fresh_database_has_version_zero() {
        let conn = Connection::open_in_memory().await.unwrap();
        assert_eq!(schema_version(&conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_recorded_versions_are_skipped() {
        let conn = Connection::open_in_memory().await.unwrap();
        conn.call(|conn| -> Result<(), Error> {
            applied_version(conn)?;
            conn.execute(
                "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, 'partitions', 'now')",
                params![LATEST_VERSION],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        run(&conn).await.unwrap();

        let partitions_exists: bool = conn
            .call(|conn| {
                conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='partitions')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert!(!partitions_exists);
    }
}
