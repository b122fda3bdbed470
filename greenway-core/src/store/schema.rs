//! SQLite schema for the feature tables.

use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::FeatureClass;

use super::SqliteFeatureStoreError;

/// Version recorded in `feature_store_schema_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Create the per-class tables and record the schema version.
///
/// Existing databases must already be at [`SCHEMA_VERSION`]; anything else is
/// rejected so migrations can be applied explicitly.
pub(super) fn initialise_schema(connection: &mut Connection) -> Result<(), SqliteFeatureStoreError> {
    let transaction =
        connection
            .transaction()
            .map_err(|source| SqliteFeatureStoreError::Migration {
                step: "begin schema transaction",
                source,
            })?;

    for class in FeatureClass::ALL {
        run_migration_step(&transaction, create_step(class), &create_table_sql(class))?;
    }
    ensure_schema_version(&transaction)?;

    transaction
        .commit()
        .map_err(|source| SqliteFeatureStoreError::Migration {
            step: "commit schema transaction",
            source,
        })
}

const fn create_step(class: FeatureClass) -> &'static str {
    match class {
        FeatureClass::Entrances => "create entrances table",
        FeatureClass::MileMarkers => "create markers table",
        FeatureClass::Trails => "create trails table",
    }
}

fn create_table_sql(class: FeatureClass) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            external_id TEXT PRIMARY KEY CHECK (length(trim(external_id)) > 0),
            srid INTEGER NOT NULL CHECK (srid = 4326),
            geometry TEXT NOT NULL CHECK (json_valid(geometry)),
            properties TEXT NOT NULL CHECK (json_valid(properties) AND json_type(properties) = 'object')
        ) WITHOUT ROWID",
        table = class.table_name()
    )
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), SqliteFeatureStoreError> {
    run_migration_step(
        transaction,
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS feature_store_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        ) WITHOUT ROWID",
    )?;

    let existing_version: Option<i64> = transaction
        .query_row(
            "SELECT version FROM feature_store_schema_version LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| SqliteFeatureStoreError::Migration {
            step: "read schema version",
            source,
        })?;

    match existing_version {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(found) => Err(SqliteFeatureStoreError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found,
        }),
        None => transaction
            .execute(
                "INSERT INTO feature_store_schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map(|_| ())
            .map_err(|source| SqliteFeatureStoreError::Migration {
                step: "record schema version",
                source,
            }),
    }
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), SqliteFeatureStoreError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SqliteFeatureStoreError::Migration { step, source })
}
