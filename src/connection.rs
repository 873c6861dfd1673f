//! Database connection management.
//!
//! A [`Connection`] exclusively owns one engine database handle. It is opened
//! with a combination of [`OpenFlags`], hands out prepared [`Statement`]s and
//! one-shot [`exec`](Connection::exec) calls, and closes the handle when
//! dropped. Moving a `Connection` transfers handle ownership; there is no
//! sharing.

use std::ffi::CString;
use std::ops::{BitOr, BitOrAssign};
use std::os::raw::c_int;
use std::ptr;

use libsqlite3_sys as ffi;
use tracing::debug;

use crate::core::error::error_from_handle;
use crate::core::{Error, Result};
use crate::statement::Statement;

// `libsqlite3-sys` does not declare `sqlite3_close_v2`, but the bundled
// SQLite library exports it.
extern "C" {
    fn sqlite3_close_v2(db: *mut ffi::sqlite3) -> c_int;
}

/// Bit flags controlling how a database is opened.
///
/// Flags are independent bits and may be combined with `|`. They translate
/// 1:1 to the engine's native open flags; combinations the engine considers
/// meaningless are rejected by it at open time, not validated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags(u32);

impl OpenFlags {
    pub const NONE: OpenFlags = OpenFlags(0);
    pub const READ_ONLY: OpenFlags = OpenFlags(1 << 0);
    pub const READ_WRITE: OpenFlags = OpenFlags(1 << 1);
    pub const CREATE: OpenFlags = OpenFlags(1 << 2);
    pub const URI: OpenFlags = OpenFlags(1 << 3);
    pub const MEMORY: OpenFlags = OpenFlags(1 << 4);
    pub const NO_MUTEX: OpenFlags = OpenFlags(1 << 5);
    pub const FULL_MUTEX: OpenFlags = OpenFlags(1 << 6);
    pub const SHARED_CACHE: OpenFlags = OpenFlags(1 << 7);
    pub const PRIVATE_CACHE: OpenFlags = OpenFlags(1 << 8);
    pub const NO_FOLLOW: OpenFlags = OpenFlags(1 << 9);

    pub fn contains(self, other: OpenFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Translates to the engine's native flag representation.
    pub(crate) fn to_native(self) -> c_int {
        let mut native = 0;
        if self.contains(Self::READ_ONLY) {
            native |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.contains(Self::READ_WRITE) {
            native |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.contains(Self::CREATE) {
            native |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.contains(Self::URI) {
            native |= ffi::SQLITE_OPEN_URI;
        }
        if self.contains(Self::MEMORY) {
            native |= ffi::SQLITE_OPEN_MEMORY;
        }
        if self.contains(Self::NO_MUTEX) {
            native |= ffi::SQLITE_OPEN_NOMUTEX;
        }
        if self.contains(Self::FULL_MUTEX) {
            native |= ffi::SQLITE_OPEN_FULLMUTEX;
        }
        if self.contains(Self::SHARED_CACHE) {
            native |= ffi::SQLITE_OPEN_SHAREDCACHE;
        }
        if self.contains(Self::PRIVATE_CACHE) {
            native |= ffi::SQLITE_OPEN_PRIVATECACHE;
        }
        if self.contains(Self::NO_FOLLOW) {
            native |= ffi::SQLITE_OPEN_NOFOLLOW;
        }
        native
    }
}

impl BitOr for OpenFlags {
    type Output = OpenFlags;

    fn bitor(self, rhs: OpenFlags) -> OpenFlags {
        OpenFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for OpenFlags {
    fn bitor_assign(&mut self, rhs: OpenFlags) {
        self.0 |= rhs.0;
    }
}

/// Owner of one engine database handle.
///
/// The handle is exclusively owned: dropping the connection closes it.
/// A connection may be used from multiple threads only when the engine runs
/// in serialized mode (see [`engine::configure_serialized`](crate::engine::configure_serialized))
/// or the connection was opened without [`OpenFlags::NO_MUTEX`]; this type is
/// therefore `Send` but not `Sync`.
#[derive(Debug)]
pub struct Connection {
    db: *mut ffi::sqlite3,
}

// The handle may migrate between threads; concurrent use from several threads
// is governed by the engine's threading mode, so no Sync.
unsafe impl Send for Connection {}

impl Connection {
    /// Opens a database.
    ///
    /// On failure the engine usually still allocates a handle; its error
    /// state is read for classification and the handle is then released, so
    /// a failed open leaves nothing to clean up.
    pub fn open(name: &str, flags: OpenFlags) -> Result<Self> {
        let c_name = CString::new(name)
            .map_err(|_| Error::Other(format!("database name contains a NUL byte: {name:?}")))?;
        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let rc =
            unsafe { ffi::sqlite3_open_v2(c_name.as_ptr(), &mut db, flags.to_native(), ptr::null()) };
        if rc != ffi::SQLITE_OK {
            let err = unsafe {
                let err = error_from_handle(db, "failed to open database", None);
                if !db.is_null() {
                    sqlite3_close_v2(db);
                }
                err
            };
            return Err(err);
        }
        debug!(name, "opened database connection");
        Ok(Connection { db })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Connection::open(":memory:", OpenFlags::READ_WRITE | OpenFlags::CREATE)
    }

    /// Closes the connection. No-op when already closed.
    ///
    /// Statements prepared on this connection may still be outstanding; the
    /// engine then defers freeing the native handle until the last of them is
    /// finalized, so nothing leaks. The handle is nulled even on failure so
    /// repeated close attempts cannot wedge the connection open.
    pub fn close(&mut self) -> Result<()> {
        if self.db.is_null() {
            return Ok(());
        }
        let db = self.db;
        self.db = ptr::null_mut();
        let rc = unsafe { sqlite3_close_v2(db) };
        if rc != ffi::SQLITE_OK {
            return Err(unsafe { error_from_handle(db, "failed to close connection", None) });
        }
        debug!("closed database connection");
        Ok(())
    }

    /// Reports whether the connection is currently open.
    pub fn is_open(&self) -> bool {
        !self.db.is_null()
    }

    /// Compiles `sql` into a prepared [`Statement`].
    ///
    /// The returned statement must not outlive this connection and must be
    /// finalized (explicitly or by drop) before the connection is closed.
    /// This is a documented precondition, not tracked at runtime.
    pub fn prepare(&self, sql: &str) -> Result<Statement> {
        self.ensure()?;
        Statement::prepare(self.db, sql, false)
    }

    /// Like [`prepare`](Connection::prepare), with a hint that the statement
    /// will be reused many times. Affects only the engine's internal caching.
    pub fn prepare_persistent(&self, sql: &str) -> Result<Statement> {
        self.ensure()?;
        Statement::prepare(self.db, sql, true)
    }

    /// Executes `sql` to completion in one call, discarding result rows.
    ///
    /// Suitable for schema DDL and multi-statement scripts where intermediate
    /// results are irrelevant.
    pub fn exec(&self, sql: &str) -> Result<()> {
        self.ensure()?;
        let c_sql = CString::new(sql)
            .map_err(|_| Error::Other("SQL text contains a NUL byte".to_string()))?;
        let rc = unsafe {
            ffi::sqlite3_exec(self.db, c_sql.as_ptr(), None, ptr::null_mut(), ptr::null_mut())
        };
        if rc != ffi::SQLITE_OK {
            return Err(unsafe {
                error_from_handle(self.db, "failed to execute SQL query", Some(sql))
            });
        }
        Ok(())
    }

    fn ensure(&self) -> Result<()> {
        if self.db.is_null() {
            return Err(Error::Other(
                "SQLite database connection not initialized".to_string(),
            ));
        }
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::error!(%err, "failed to close database connection on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_flags_combine() {
        let flags = OpenFlags::READ_WRITE | OpenFlags::CREATE;
        assert!(flags.contains(OpenFlags::READ_WRITE));
        assert!(flags.contains(OpenFlags::CREATE));
        assert!(!flags.contains(OpenFlags::READ_ONLY));
        assert!(OpenFlags::NONE.is_empty());
        assert!(!flags.is_empty());

        let mut accumulated = OpenFlags::NONE;
        accumulated |= OpenFlags::MEMORY;
        assert!(accumulated.contains(OpenFlags::MEMORY));
    }

    #[test]
    fn test_open_flags_translate_to_native_bits() {
        assert_eq!(OpenFlags::READ_ONLY.to_native(), ffi::SQLITE_OPEN_READONLY);
        assert_eq!(OpenFlags::NO_FOLLOW.to_native(), ffi::SQLITE_OPEN_NOFOLLOW);
        assert_eq!(
            (OpenFlags::READ_WRITE | OpenFlags::CREATE).to_native(),
            ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE
        );
        assert_eq!(OpenFlags::NONE.to_native(), 0);
    }

    #[test]
    fn test_open_in_memory_and_close_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert!(conn.is_open());

        conn.close().unwrap();
        assert!(!conn.is_open());

        // Second close is a no-op
        conn.close().unwrap();
        assert!(!conn.is_open());
    }

    #[test]
    fn test_close_with_outstanding_statement_defers_teardown() {
        let mut conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT 1").unwrap();

        // The engine keeps the native handle alive until the last statement
        // is finalized, so close succeeds instead of failing or leaking.
        conn.close().unwrap();
        assert!(!conn.is_open());

        stmt.finalize().unwrap();
    }

    #[test]
    fn test_open_failure_is_classified() {
        let err = Connection::open(
            "/nonexistent-dir/sub/db.sqlite",
            OpenFlags::READ_WRITE | OpenFlags::CREATE,
        )
        .unwrap_err();
        match err {
            Error::Sqlite { code, .. } => assert_eq!(code, ffi::SQLITE_CANTOPEN),
            other => panic!("expected generic engine error, got {other:?}"),
        }
    }

    #[test]
    fn test_exec_creates_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.exec("CREATE TABLE t(id INTEGER, name TEXT); INSERT INTO t VALUES (1, 'a')")
            .unwrap();
    }

    #[test]
    fn test_exec_syntax_error_carries_sql_and_offset() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.exec("SELEC 1").unwrap_err();
        match err {
            Error::Syntax { sql, offset, .. } => {
                assert_eq!(sql, "SELEC 1");
                assert!(offset >= 0);
                assert!((offset as usize) < sql.len());
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_operations_on_closed_connection_fail_safely() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.close().unwrap();

        assert!(matches!(conn.exec("SELECT 1"), Err(Error::Other(_))));
        assert!(matches!(conn.prepare("SELECT 1"), Err(Error::Other(_))));
    }

    #[test]
    fn test_read_only_open_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.db");
        let path = path.to_str().unwrap();

        {
            let conn = Connection::open(path, OpenFlags::READ_WRITE | OpenFlags::CREATE).unwrap();
            conn.exec("CREATE TABLE t(id INTEGER)").unwrap();
        }

        let conn = Connection::open(path, OpenFlags::READ_ONLY).unwrap();
        let err = conn.exec("INSERT INTO t VALUES (1)").unwrap_err();
        assert_eq!(err.code(), Some(ffi::SQLITE_READONLY));
    }
}
