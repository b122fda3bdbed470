//! SQLite-backed feature store.
//!
//! Geometry is persisted as GeoJSON text next to an `srid` column that is
//! constrained to 4326. Connections are pooled; each [`SqliteSession`] owns
//! one connection and returns it to the pool when dropped.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use log::debug;
use rusqlite::{Connection, OpenFlags, params};
use thiserror::Error;

use crate::{Attributes, ExternalId, FeatureClass, FeatureRecord, WGS84_SRID};

use super::{FeatureSession, FeatureStore, FeatureStoreError, normalise_for_storage, schema};

/// Connections kept warm once their session ends.
const MAX_IDLE_CONNECTIONS: usize = 8;

/// Errors raised by [`SqliteFeatureStore`].
#[derive(Debug, Error)]
pub enum SqliteFeatureStoreError {
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}: {source}")]
    OpenDatabase {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A connection could not be configured.
    #[error("failed to configure SQLite connection ({setting})")]
    Configure {
        /// Setting being applied.
        setting: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A schema migration step failed.
    #[error("failed to execute migration step '{step}'")]
    Migration {
        /// Name of the failing step.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The database was created by an incompatible release.
    #[error(
        "expected feature store schema version {expected} but found {found}; apply migrations before retrying"
    )]
    VersionMismatch {
        /// Version this release understands.
        expected: i64,
        /// Version found in the database.
        found: i64,
    },
    /// Writing a row failed.
    #[error("failed to write {class} feature {external_id}")]
    Write {
        /// Class being written.
        class: FeatureClass,
        /// Record being written.
        external_id: ExternalId,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Reading the class table failed.
    #[error("failed to read {class} features")]
    Read {
        /// Class being read.
        class: FeatureClass,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Encoding a record for storage failed.
    #[error("failed to encode {class} feature {external_id}")]
    Encode {
        /// Class being written.
        class: FeatureClass,
        /// Record being written.
        external_id: ExternalId,
        /// JSON encoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// Another thread panicked while holding the connection pool.
    #[error("SQLite connection pool is poisoned")]
    PoolPoisoned,
    /// The session's connection was already returned to the pool.
    #[error("SQLite session was used after its connection was released")]
    SessionReleased,
}

/// Tunables for [`SqliteFeatureStore::open_with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteStoreOptions {
    /// How long a connection waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl SqliteStoreOptions {
    /// Default busy timeout.
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Override the busy timeout.
    #[must_use]
    pub const fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }
}

impl Default for SqliteStoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Self::DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// Feature store persisted in a SQLite database file.
///
/// In-memory databases are not supported because every pooled connection
/// would see a different database.
///
/// # Examples
///
/// ```
/// use greenway_core::{FeatureClass, FeatureSession, FeatureStore, SqliteFeatureStore};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = tempfile::tempdir()?;
/// let store = SqliteFeatureStore::open(dir.path().join("greenway.db"))?;
/// let mut session = store.session()?;
/// assert!(session.read_all(FeatureClass::Trails)?.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct SqliteFeatureStore {
    path: PathBuf,
    options: SqliteStoreOptions,
    idle: Mutex<Vec<Connection>>,
}

impl fmt::Debug for SqliteFeatureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let idle = self.idle.lock().map_or(0, |idle| idle.len());
        f.debug_struct("SqliteFeatureStore")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("idle_connections", &idle)
            .finish()
    }
}

impl SqliteFeatureStore {
    /// Open (creating if needed) the database at `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SqliteFeatureStoreError> {
        Self::open_with_options(path, SqliteStoreOptions::default())
    }

    /// Open (creating if needed) the database at `path`.
    ///
    /// The schema is created or verified before the store is returned.
    pub fn open_with_options(
        path: impl AsRef<Path>,
        options: SqliteStoreOptions,
    ) -> Result<Self, SqliteFeatureStoreError> {
        let path = path.as_ref().to_path_buf();
        let mut connection = connect(&path, options)?;
        connection
            .pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))
            .map_err(|source| SqliteFeatureStoreError::Configure {
                setting: "journal_mode",
                source,
            })?;
        schema::initialise_schema(&mut connection)?;
        debug!("opened feature store at {}", path.display());

        Ok(Self {
            path,
            options,
            idle: Mutex::new(vec![connection]),
        })
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Options every connection is opened with.
    #[must_use]
    pub const fn options(&self) -> SqliteStoreOptions {
        self.options
    }

    fn idle(&self) -> Result<MutexGuard<'_, Vec<Connection>>, SqliteFeatureStoreError> {
        self.idle
            .lock()
            .map_err(|_| SqliteFeatureStoreError::PoolPoisoned)
    }

    fn checkout(&self) -> Result<Connection, SqliteFeatureStoreError> {
        if let Some(connection) = self.idle()?.pop() {
            return Ok(connection);
        }
        connect(&self.path, self.options)
    }

    fn checkin(&self, connection: Connection) {
        if let Ok(mut idle) = self.idle.lock()
            && idle.len() < MAX_IDLE_CONNECTIONS
        {
            idle.push(connection);
        }
    }
}

fn connect(path: &Path, options: SqliteStoreOptions) -> Result<Connection, SqliteFeatureStoreError> {
    let connection = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| SqliteFeatureStoreError::OpenDatabase {
        path: path.to_path_buf(),
        source,
    })?;
    connection
        .busy_timeout(options.busy_timeout)
        .map_err(|source| SqliteFeatureStoreError::Configure {
            setting: "busy_timeout",
            source,
        })?;
    Ok(connection)
}

impl FeatureStore for SqliteFeatureStore {
    type Session<'s> = SqliteSession<'s>;

    fn session(&self) -> Result<Self::Session<'_>, FeatureStoreError> {
        let connection = self.checkout()?;
        Ok(SqliteSession {
            store: self,
            connection: Some(connection),
        })
    }
}

/// Session holding one pooled connection.
pub struct SqliteSession<'s> {
    store: &'s SqliteFeatureStore,
    connection: Option<Connection>,
}

impl fmt::Debug for SqliteSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteSession")
            .field("path", &self.store.path)
            .finish_non_exhaustive()
    }
}

impl Drop for SqliteSession<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.store.checkin(connection);
        }
    }
}

impl SqliteSession<'_> {
    fn connection(&self) -> Result<&Connection, SqliteFeatureStoreError> {
        self.connection
            .as_ref()
            .ok_or(SqliteFeatureStoreError::SessionReleased)
    }
}

impl FeatureSession for SqliteSession<'_> {
    fn upsert(
        &mut self,
        class: FeatureClass,
        record: &FeatureRecord,
    ) -> Result<(), FeatureStoreError> {
        let geometry = normalise_for_storage(class, record)?;
        let encode = |source| SqliteFeatureStoreError::Encode {
            class,
            external_id: record.external_id.clone(),
            source,
        };
        let geometry_json = serde_json::to_string(&geometry.to_interchange()).map_err(encode)?;
        let properties_json = serde_json::to_string(&record.attributes).map_err(encode)?;

        let sql = format!(
            "INSERT INTO {table} (external_id, srid, geometry, properties)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(external_id) DO UPDATE SET
                srid = excluded.srid,
                geometry = excluded.geometry,
                properties = excluded.properties",
            table = class.table_name()
        );
        self.connection()?
            .prepare_cached(&sql)
            .and_then(|mut statement| {
                statement.execute(params![
                    record.external_id.as_str(),
                    geometry.srid(),
                    geometry_json,
                    properties_json
                ])
            })
            .map_err(|source| SqliteFeatureStoreError::Write {
                class,
                external_id: record.external_id.clone(),
                source,
            })?;
        Ok(())
    }

    fn read_all(&mut self, class: FeatureClass) -> Result<Vec<FeatureRecord>, FeatureStoreError> {
        let sql = format!(
            "SELECT external_id, srid, geometry, properties FROM {table} ORDER BY external_id",
            table = class.table_name()
        );
        let read = |source| SqliteFeatureStoreError::Read { class, source };
        let mut statement = self.connection()?.prepare_cached(&sql).map_err(read)?;
        let rows = statement
            .query_map([], |row| {
                Ok(StoredRow {
                    external_id: row.get(0)?,
                    srid: row.get(1)?,
                    geometry: row.get(2)?,
                    properties: row.get(3)?,
                })
            })
            .map_err(read)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(read)?.into_record(class)?);
        }
        Ok(records)
    }
}

struct StoredRow {
    external_id: String,
    srid: i64,
    geometry: String,
    properties: String,
}

impl StoredRow {
    fn into_record(self, class: FeatureClass) -> Result<FeatureRecord, FeatureStoreError> {
        let corrupt = |external_id: &str, reason: String| FeatureStoreError::CorruptRow {
            class,
            external_id: external_id.to_owned(),
            reason,
        };
        if self.srid != i64::from(WGS84_SRID) {
            return Err(corrupt(
                &self.external_id,
                format!("unexpected SRID {}", self.srid),
            ));
        }
        let geometry: geojson::Geometry = serde_json::from_str(&self.geometry)
            .map_err(|err| corrupt(&self.external_id, format!("invalid geometry: {err}")))?;
        let attributes: Attributes = serde_json::from_str(&self.properties)
            .map_err(|err| corrupt(&self.external_id, format!("invalid properties: {err}")))?;
        let external_id = ExternalId::new(self.external_id.as_str())
            .map_err(|err| corrupt(&self.external_id, err.to_string()))?;
        Ok(FeatureRecord::new(external_id, geometry, attributes))
    }
}
