//! Audit log: SQLite-based operation history.
//!
//! Every vault sharing a directory writes to the same `audit.db` there.
//! Rows carry the vault file name, the operation, the full id of the entry
//! it touched and a short detail string (entry title, entry count).  Entry
//! secrets never reach the log.  Failed unlocks and refused attempts are
//! recorded too, so a run of guessed passphrases shows up afterwards.
//!
//! Designed for graceful degradation: if the database can't be opened or
//! written to, operations continue without logging.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::Connection;

use crate::errors::{Result, VaultError};

/// A single audit log row.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub vault: String,
    pub entry_id: Option<String>,
    pub details: Option<String>,
}

/// Which rows [`AuditLog::query`] returns.  Empty fields match everything.
#[derive(Debug, Clone)]
pub struct AuditFilter {
    /// Maximum number of rows, most recent first.
    pub limit: usize,
    /// Only rows at or after this time.
    pub since: Option<DateTime<Utc>>,
    /// Only rows of this vault file name.
    pub vault: Option<String>,
    /// Only rows whose entry id starts with this (lowercase hex) prefix.
    pub entry_prefix: Option<String>,
    /// Only rows with exactly this operation name.
    pub operation: Option<String>,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            limit: 50,
            since: None,
            vault: None,
            entry_prefix: None,
            operation: None,
        }
    }
}

/// SQLite-backed audit log.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `<dir>/audit.db`.
    ///
    /// Returns `None` if the database can't be opened: callers should
    /// treat this as "audit logging unavailable" and continue normally.
    pub fn open(dir: &Path) -> Option<Self> {
        let db_path = Self::db_path(dir);
        let conn = match Connection::open(&db_path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!(error = %e, "audit log unavailable");
                return None;
            }
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&db_path, perms);
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit_log (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                operation TEXT NOT NULL,
                vault     TEXT NOT NULL,
                entry_id  TEXT,
                details   TEXT
            );
            CREATE INDEX IF NOT EXISTS audit_log_vault ON audit_log (vault, entry_id);",
        )
        .ok()?;

        Some(Self { conn })
    }

    /// Record an operation. Fire-and-forget: a failed insert is only
    /// logged at debug level.
    pub fn log(&self, operation: &str, vault: &str, entry_id: Option<&str>, details: Option<&str>) {
        let now = Utc::now().to_rfc3339();
        if let Err(e) = self.conn.execute(
            "INSERT INTO audit_log (timestamp, operation, vault, entry_id, details)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![now, operation, vault, entry_id, details],
        ) {
            tracing::debug!(error = %e, operation, "audit insert failed");
        }
    }

    /// Rows matching `filter`, most recent first.
    pub fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(since) = filter.since {
            clauses.push("timestamp >= ?");
            params.push(Box::new(since.to_rfc3339()));
        }
        if let Some(vault) = &filter.vault {
            clauses.push("vault = ?");
            params.push(Box::new(vault.clone()));
        }
        if let Some(prefix) = &filter.entry_prefix {
            // Ids are plain hex, so no LIKE wildcards can sneak in.
            clauses.push("entry_id LIKE ? || '%'");
            params.push(Box::new(prefix.to_ascii_lowercase()));
        }
        if let Some(operation) = &filter.operation {
            clauses.push("operation = ?");
            params.push(Box::new(operation.clone()));
        }
        params.push(Box::new(i64::try_from(filter.limit).unwrap_or(i64::MAX)));

        let mut sql = String::from(
            "SELECT id, timestamp, operation, vault, entry_id, details FROM audit_log",
        );
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id DESC LIMIT ?");

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| VaultError::Audit(format!("query prepare: {e}")))?;

        let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| &**p).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                let ts_str: String = row.get(1)?;
                let timestamp = DateTime::parse_from_rfc3339(&ts_str)
                    .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp,
                    operation: row.get(2)?,
                    vault: row.get(3)?,
                    entry_id: row.get(4)?,
                    details: row.get(5)?,
                })
            })
            .map_err(|e| VaultError::Audit(format!("query exec: {e}")))?;

        let entries = rows
            .map(|row| row.map_err(|e| VaultError::Audit(format!("row parse: {e}"))))
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Path of the audit database inside `dir`.
    pub fn db_path(dir: &Path) -> PathBuf {
        dir.join("audit.db")
    }
}

/// Directory holding the audit database for the vault at `vault_path`.
pub fn audit_dir(vault_path: &Path) -> PathBuf {
    match vault_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Name a vault is recorded under: its file name.
pub fn vault_name(vault_path: &Path) -> String {
    vault_path
        .file_name()
        .map_or_else(|| "vault".to_string(), |n| n.to_string_lossy().into_owned())
}

/// Record an event for the vault at `vault_path`.
///
/// Never fails the parent operation.
pub fn log_event(vault_path: &Path, op: &str, entry_id: Option<&str>, details: Option<&str>) {
    if let Some(audit) = AuditLog::open(&audit_dir(vault_path)) {
        audit.log(op, &vault_name(vault_path), entry_id, details);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BANK: &str = "0a1b2c3d00000000000000000000beef";
    const MAIL: &str = "2c3d4e5f00000000000000000000cafe";

    fn seeded() -> (TempDir, AuditLog) {
        let dir = TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();
        audit.log("init", "work.vault", None, None);
        audit.log("add", "work.vault", Some(BANK), Some("Bank"));
        audit.log("add", "work.vault", Some(MAIL), Some("Mail"));
        audit.log("edit", "work.vault", Some(BANK), Some("Bank"));
        audit.log("add", "home.vault", Some(BANK), Some("Bank at home"));
        audit.log("unlock-failed", "work.vault", None, None);
        (dir, audit)
    }

    fn ops(entries: &[AuditEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.operation.as_str()).collect()
    }

    #[test]
    fn open_creates_database() {
        let dir = TempDir::new().unwrap();
        assert!(AuditLog::open(dir.path()).is_some());
        assert!(dir.path().join("audit.db").exists());
    }

    #[test]
    fn unfiltered_query_is_newest_first_and_limited() {
        let (_dir, audit) = seeded();

        let all = audit.query(&AuditFilter::default()).unwrap();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].operation, "unlock-failed");
        assert_eq!(all[5].operation, "init");

        let filter = AuditFilter {
            limit: 2,
            ..AuditFilter::default()
        };
        assert_eq!(audit.query(&filter).unwrap().len(), 2);
    }

    #[test]
    fn query_is_scoped_to_one_vault() {
        let (_dir, audit) = seeded();
        let filter = AuditFilter {
            vault: Some("home.vault".into()),
            ..AuditFilter::default()
        };
        let rows = audit.query(&filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].details.as_deref(), Some("Bank at home"));
    }

    #[test]
    fn entry_prefix_follows_one_entry() {
        let (_dir, audit) = seeded();
        let filter = AuditFilter {
            vault: Some("work.vault".into()),
            entry_prefix: Some("0A1B".into()),
            ..AuditFilter::default()
        };
        let rows = audit.query(&filter).unwrap();
        assert_eq!(ops(&rows), ["edit", "add"]);
        assert!(rows.iter().all(|r| r.entry_id.as_deref() == Some(BANK)));
    }

    #[test]
    fn operation_and_since_filters_combine() {
        let (_dir, audit) = seeded();
        let filter = AuditFilter {
            operation: Some("add".into()),
            since: Some(Utc::now() - chrono::Duration::hours(1)),
            ..AuditFilter::default()
        };
        assert_eq!(audit.query(&filter).unwrap().len(), 3);

        let future = AuditFilter {
            since: Some(Utc::now() + chrono::Duration::hours(1)),
            ..AuditFilter::default()
        };
        assert!(audit.query(&future).unwrap().is_empty());
    }

    #[test]
    fn log_event_uses_vault_file_name() {
        let dir = TempDir::new().unwrap();
        let vault_path = dir.path().join("personal.vault");

        log_event(&vault_path, "init", None, Some("vault created"));

        let audit = AuditLog::open(dir.path()).unwrap();
        let entries = audit.query(&AuditFilter::default()).unwrap();
        assert_eq!(entries[0].vault, "personal.vault");
        assert_eq!(entries[0].operation, "init");
        assert!(entries[0].entry_id.is_none());
        assert_eq!(entries[0].details.as_deref(), Some("vault created"));
    }

    #[test]
    fn open_returns_none_on_bad_path() {
        assert!(AuditLog::open(Path::new("/nonexistent/path/that/does/not/exist")).is_none());
    }

    #[test]
    fn audit_dir_of_bare_file_name_is_cwd() {
        assert_eq!(audit_dir(Path::new("x.vault")), PathBuf::from("."));
        assert_eq!(audit_dir(Path::new("/a/b.vault")), PathBuf::from("/a"));
        assert_eq!(vault_name(Path::new("/a/b.vault")), "b.vault");
    }

    #[cfg(unix)]
    #[test]
    fn audit_db_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let _audit = AuditLog::open(dir.path()).unwrap();

        let perms = std::fs::metadata(dir.path().join("audit.db"))
            .unwrap()
            .permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }
}
