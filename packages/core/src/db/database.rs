//! Database Connection Management
//!
//! This module provides the core database connection and initialization
//! functionality using libsql for Mockwire's endpoint hierarchy.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **Materialized paths**: The `endpoints` table stores the complete path
//!   of every node, guarded by a UNIQUE constraint
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//! - **Foreign keys**: Enabled; `parent_id` cascades deletes down the tree
//!
//! # Database Connection Patterns
//!
//! **ALWAYS use `connect_with_timeout()` in async functions** to avoid SQLite
//! thread-safety violations when the Tokio runtime moves futures between
//! threads. The 5-second busy timeout allows concurrent operations to wait
//! and retry instead of failing immediately with `SQLITE_BUSY` errors.
//!
//! # Concurrency Model
//!
//! Reads are single SELECT statements. Writes that touch more than one row
//! (the rename cascade) run inside an explicit transaction on one connection;
//! any failure rolls the whole transaction back. The UNIQUE constraint on
//! `full_path` is the final arbiter for concurrent creates and renames that
//! compute the same path: the loser's constraint violation is classified by
//! [`DatabaseError::classify_sql`] so callers can surface it as a duplicate.

use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Database service for managing the libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use mockwire_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_path = PathBuf::from("/path/to/mockwire.db");
///     let db_service = DatabaseService::new(db_path).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

/// Parameters for endpoint insertion (avoids too-many-arguments lint)
///
/// Exactly one of `organization_id` / `project_id` / `schema_id` is set,
/// chosen by `kind`; the caller builds this from a validated
/// [`crate::models::Endpoint`], so the columns always agree with the
/// discriminator.
pub struct DbCreateEndpointParams<'a> {
    pub id: &'a str,
    pub full_path: &'a str,
    pub slug: &'a str,
    pub kind: &'a str,
    pub parent_id: Option<&'a str>,
    pub organization_id: Option<&'a str>,
    pub project_id: Option<&'a str>,
    pub schema_id: Option<&'a str>,
}

/// Columns selected for every endpoint row read.
///
/// Keeping one column list for all queries means `row_to_endpoint` in the
/// store layer can stay the single conversion point.
const ENDPOINT_COLUMNS: &str = "id, full_path, slug, kind, parent_id, \
     organization_id, project_id, schema_id, created_at, updated_at";

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    /// 4. Enable SQLite features (WAL mode, foreign keys)
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema().await?;

        Ok(service)
    }

    /// Create an in-memory DatabaseService (tests and doctests)
    pub async fn new_in_memory() -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(":memory:");
        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };

        service.initialize_schema().await?;

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of
    /// execute(). This helper encapsulates that pattern.
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Creates tables and indexes using CREATE TABLE IF NOT EXISTS,
    /// ensuring idempotent initialization (safe to call multiple times).
    ///
    /// # Schema
    ///
    /// - `endpoints` table: one row per organization/project/schema position
    ///   in the path tree. `full_path` carries the UNIQUE constraint that
    ///   guarantees global path uniqueness; `parent_id` is a self-referencing
    ///   foreign key with ON DELETE CASCADE so a deleted parent can never
    ///   leave orphaned descendant paths behind.
    /// - Partial unique indexes on each resource column: a resource owns at
    ///   most one endpoint row.
    async fn initialize_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        // Enable WAL mode for better concurrency
        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        // Set busy timeout to 5 seconds (5000ms)
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;

        // Enable foreign key constraints
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS endpoints (
                id TEXT PRIMARY KEY,
                full_path TEXT NOT NULL UNIQUE,
                slug TEXT NOT NULL,
                kind TEXT NOT NULL,
                parent_id TEXT,
                organization_id TEXT,
                project_id TEXT,
                schema_id TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                -- Parent deletion cascades to descendants (tree structure)
                FOREIGN KEY (parent_id) REFERENCES endpoints(id) ON DELETE CASCADE
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to create endpoints table: {}", e))
        })?;

        self.create_core_indexes(&conn).await?;

        Ok(())
    }

    /// Create core indexes for the endpoints table
    async fn create_core_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        // Index on parent_id (cascade walks, child listings)
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_endpoints_parent ON endpoints(parent_id)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_endpoints_parent': {}",
                e
            ))
        })?;

        // Index on kind (dashboard counts, kind listings)
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_endpoints_kind ON endpoints(kind)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!(
                "Failed to create index 'idx_endpoints_kind': {}",
                e
            ))
        })?;

        // Each resource owns at most one endpoint row. Partial indexes keep
        // the NULLs of the other two kinds out of each index.
        for (name, column) in [
            ("idx_endpoints_organization", "organization_id"),
            ("idx_endpoints_project", "project_id"),
            ("idx_endpoints_schema", "schema_id"),
        ] {
            conn.execute(
                &format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {name} ON endpoints({column}) \
                     WHERE {column} IS NOT NULL"
                ),
                (),
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to create index '{}': {}", name, e))
            })?;
        }

        Ok(())
    }

    /// Get a synchronous connection to the database
    ///
    /// Only use this in synchronous, single-threaded contexts. In async
    /// functions use `connect_with_timeout()` instead.
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get an async connection with busy timeout configured
    ///
    /// Sets a 5-second busy timeout so concurrent operations wait and retry
    /// instead of failing immediately when the database is locked. This is
    /// the safe default for async contexts where the Tokio runtime may move
    /// futures between threads at `.await` points.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        // Cascade deletes rely on foreign keys; SQLite scopes the pragma to
        // the connection, so every connection re-enables it.
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }

    //
    // ENDPOINT STORE OPERATIONS
    // SQL logic wrapped by the EndpointStore trait implementation.
    //

    /// Insert an endpoint row
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::UniqueViolation` when `full_path` (or a
    /// resource column) is already taken — the caller surfaces this as a
    /// duplicate-path error.
    pub async fn db_insert_endpoint(
        &self,
        params: DbCreateEndpointParams<'_>,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute(
            "INSERT INTO endpoints (id, full_path, slug, kind, parent_id, \
             organization_id, project_id, schema_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            (
                params.id,
                params.full_path,
                params.slug,
                params.kind,
                params.parent_id,
                params.organization_id,
                params.project_id,
                params.schema_id,
            ),
        )
        .await
        .map_err(|e| DatabaseError::classify_sql("Failed to insert endpoint", e))?;

        Ok(())
    }

    /// Retrieve a single endpoint row by id
    pub async fn db_get_endpoint(&self, id: &str) -> Result<Option<libsql::Row>, DatabaseError> {
        self.query_one(
            &format!("SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE id = ?"),
            [id],
        )
        .await
    }

    /// Retrieve a single endpoint row by its full path
    ///
    /// This is the primary lookup of the whole subsystem: every slug-addressed
    /// request resolves through this unique-key query.
    pub async fn db_get_by_full_path(
        &self,
        full_path: &str,
    ) -> Result<Option<libsql::Row>, DatabaseError> {
        self.query_one(
            &format!("SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE full_path = ?"),
            [full_path],
        )
        .await
    }

    /// Check whether a full path is already taken
    pub async fn db_path_exists(&self, full_path: &str) -> Result<bool, DatabaseError> {
        let row = self
            .query_one(
                "SELECT 1 FROM endpoints WHERE full_path = ? LIMIT 1",
                [full_path],
            )
            .await?;
        Ok(row.is_some())
    }

    /// Retrieve the endpoint row owned by a resource
    ///
    /// `kind` selects which resource column to match; at most one row can
    /// exist thanks to the partial unique indexes.
    pub async fn db_find_by_resource(
        &self,
        kind: &str,
        resource_id: &str,
    ) -> Result<Option<libsql::Row>, DatabaseError> {
        let column = Self::resource_column(kind)?;
        self.query_one(
            &format!("SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE {column} = ?"),
            [resource_id],
        )
        .await
    }

    /// Retrieve all direct children of an endpoint
    pub async fn db_get_children(&self, parent_id: &str) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ENDPOINT_COLUMNS} FROM endpoints \
                 WHERE parent_id = ? ORDER BY full_path"
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare children query: {}", e))
            })?;

        stmt.query([parent_id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute children query: {}", e))
        })
    }

    /// Retrieve an endpoint and every descendant beneath it, ordered by path
    ///
    /// Matches the exact path or `path || '/%'`. A bare `LIKE path || '%'`
    /// would also catch sibling paths that merely share a byte prefix
    /// (`google` matching `google-inc/...`).
    pub async fn db_list_subtree(&self, full_path: &str) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ENDPOINT_COLUMNS} FROM endpoints \
                 WHERE full_path = ? OR full_path LIKE ? || '/%' \
                 ORDER BY full_path"
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare subtree query: {}", e))
            })?;

        stmt.query([full_path, full_path]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute subtree query: {}", e))
        })
    }

    /// Retrieve all endpoints of one kind, ordered by path
    pub async fn db_list_by_kind(&self, kind: &str) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ENDPOINT_COLUMNS} FROM endpoints \
                 WHERE kind = ? ORDER BY full_path"
            ))
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare kind query: {}", e))
            })?;

        stmt.query([kind]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute kind query: {}", e))
        })
    }

    /// Rename an endpoint and rewrite every descendant path, atomically
    ///
    /// Inside a single transaction:
    /// 1. Re-read the endpoint's current path (the pre-transaction value may
    ///    be stale under concurrency).
    /// 2. Re-check that `new_full_path` is free; a concurrent winner turns
    ///    into a `UniqueViolation` here or at the UPDATE below.
    /// 3. Update the renamed endpoint's slug and path.
    /// 4. Walk the subtree breadth-first via `parent_id`, replacing each
    ///    child's old-parent-path prefix and pushing the child onto the work
    ///    stack as the parent context for its own children.
    ///
    /// Any failure rolls back the entire transaction: no partial path rewrite
    /// is ever visible. Depth is bounded by the three-level tree, so the walk
    /// is small; the work stack keeps it iterative.
    pub async fn db_rename_endpoint(
        &self,
        id: &str,
        new_slug: &str,
        new_full_path: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.execute("BEGIN IMMEDIATE TRANSACTION", ())
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
            })?;

        match self
            .rename_in_transaction(&conn, id, new_slug, new_full_path)
            .await
        {
            Ok(()) => {
                conn.execute("COMMIT", ()).await.map_err(|e| {
                    std::mem::drop(conn.execute("ROLLBACK", ()));
                    DatabaseError::sql_execution(format!("Failed to commit transaction: {}", e))
                })?;
                Ok(())
            }
            Err(e) => {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                Err(e)
            }
        }
    }

    /// Body of the rename transaction; errors here trigger a rollback in the
    /// caller.
    async fn rename_in_transaction(
        &self,
        conn: &libsql::Connection,
        id: &str,
        new_slug: &str,
        new_full_path: &str,
    ) -> Result<(), DatabaseError> {
        // Current path, read inside the transaction
        let mut stmt = conn
            .prepare("SELECT full_path FROM endpoints WHERE id = ?")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare rename lookup: {}", e))
            })?;
        let mut rows = stmt.query([id]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute rename lookup: {}", e))
        })?;
        let old_full_path: String = match rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
        {
            Some(row) => row.get(0).map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to read full_path: {}", e))
            })?,
            None => {
                return Err(DatabaseError::sql_execution(format!(
                    "Endpoint not found: {}",
                    id
                )))
            }
        };

        // Duplicate check inside the transaction; the UNIQUE constraint on
        // the UPDATE below still backstops a race on this check.
        let mut stmt = conn
            .prepare("SELECT 1 FROM endpoints WHERE full_path = ? LIMIT 1")
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to prepare duplicate check: {}", e))
            })?;
        let mut rows = stmt.query([new_full_path]).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute duplicate check: {}", e))
        })?;
        if rows
            .next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
            .is_some()
        {
            return Err(DatabaseError::UniqueViolation {
                constraint: "endpoints.full_path".to_string(),
            });
        }

        // Rename the endpoint itself
        conn.execute(
            "UPDATE endpoints SET slug = ?, full_path = ?, updated_at = CURRENT_TIMESTAMP \
             WHERE id = ?",
            (new_slug, new_full_path, id),
        )
        .await
        .map_err(|e| DatabaseError::classify_sql("Failed to rename endpoint", e))?;

        // Cascade: rewrite descendant paths, each child becoming the parent
        // context for its own children.
        let mut work = vec![(
            id.to_string(),
            old_full_path.clone(),
            new_full_path.to_string(),
        )];

        while let Some((parent_id, old_parent_path, new_parent_path)) = work.pop() {
            let mut stmt = conn
                .prepare("SELECT id, full_path FROM endpoints WHERE parent_id = ?")
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to prepare cascade query: {}", e))
                })?;
            let mut rows = stmt.query([parent_id.as_str()]).await.map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to execute cascade query: {}", e))
            })?;

            let mut children: Vec<(String, String)> = Vec::new();
            while let Some(row) = rows
                .next()
                .await
                .map_err(|e| DatabaseError::sql_execution(e.to_string()))?
            {
                let child_id: String = row.get(0).map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to read child id: {}", e))
                })?;
                let child_path: String = row.get(1).map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to read child path: {}", e))
                })?;
                children.push((child_id, child_path));
            }

            for (child_id, old_child_path) in children {
                // Replace only the parent prefix; the child's own trailing
                // segments stay byte-identical.
                let suffix = old_child_path.strip_prefix(&old_parent_path).ok_or_else(|| {
                    DatabaseError::invariant_violation(format!(
                        "child path '{}' does not extend parent path '{}'",
                        old_child_path, old_parent_path
                    ))
                })?;
                let new_child_path = format!("{}{}", new_parent_path, suffix);

                conn.execute(
                    "UPDATE endpoints SET full_path = ?, updated_at = CURRENT_TIMESTAMP \
                     WHERE id = ?",
                    (new_child_path.as_str(), child_id.as_str()),
                )
                .await
                .map_err(|e| DatabaseError::classify_sql("Failed to rewrite child path", e))?;

                work.push((child_id, old_child_path, new_child_path));
            }
        }

        Ok(())
    }

    /// Delete an endpoint row
    ///
    /// `ON DELETE CASCADE` on `parent_id` removes every descendant in the
    /// same statement, so a deleted organization can never leave orphaned
    /// project/schema path rows behind.
    ///
    /// # Returns
    ///
    /// Number of rows affected by the top-level delete (0 = endpoint didn't
    /// exist).
    pub async fn db_delete_endpoint(&self, id: &str) -> Result<u64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let rows_affected = conn
            .execute("DELETE FROM endpoints WHERE id = ?", [id])
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to delete endpoint: {}", e))
            })?;

        Ok(rows_affected)
    }

    /// Flush pending WAL writes and release the connection
    pub async fn db_close(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
            .await?;
        Ok(())
    }

    /// Prepare, bind, and fetch at most one row
    async fn query_one(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<libsql::Row>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut stmt = conn.prepare(sql).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to prepare query: {}", e))
        })?;

        let mut rows = stmt.query(params).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute query: {}", e))
        })?;

        rows.next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))
    }

    /// Map a kind discriminator to its resource FK column
    fn resource_column(kind: &str) -> Result<&'static str, DatabaseError> {
        match kind {
            "organization" => Ok("organization_id"),
            "project" => Ok("project_id"),
            "schema" => Ok("schema_id"),
            other => Err(DatabaseError::sql_execution(format!(
                "Unknown endpoint kind: {}",
                other
            ))),
        }
    }
}
