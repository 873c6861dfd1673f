//! Error types for litewrap.
//!
//! Every fallible operation in the crate returns one of the variants below.
//! Native engine failures are classified into syntax, busy, misuse, and
//! generic errors, each carrying the caller context, the engine's own message
//! and both primary and extended result codes. Conditions detected by the
//! wrapper itself (uninitialized handles, unknown column or parameter names,
//! disabled build capabilities) use the `Other` variant and carry no native
//! codes.

use std::ffi::CStr;
use std::os::raw::c_int;

use libsqlite3_sys as ffi;
use thiserror::Error;

/// Structured error type covering native SQLite failures and wrapper-level
/// misuse.
#[derive(Error, Debug)]
pub enum Error {
    /// Generic native failure reported by the engine.
    #[error("{message}, SQLite error ({code},{extended_code}): {errmsg}")]
    Sqlite {
        message: String,
        errmsg: String,
        code: i32,
        extended_code: i32,
    },

    /// Parse-time failure; carries the offending SQL and a byte offset into
    /// it reported by the engine.
    #[error("{message}, SQLite error ({code},{extended_code}): {errmsg} at offset {offset} in {sql:?}")]
    Syntax {
        message: String,
        errmsg: String,
        code: i32,
        extended_code: i32,
        sql: String,
        offset: i32,
    },

    /// Lock contention (`SQLITE_BUSY`). Retry policy is left to the caller.
    #[error("{message}, SQLite error ({code},{extended_code}): {errmsg}")]
    Busy {
        message: String,
        errmsg: String,
        code: i32,
        extended_code: i32,
    },

    /// The native API contract was violated (`SQLITE_MISUSE`).
    #[error("{message}, SQLite error ({code},{extended_code}): {errmsg}")]
    Misuse {
        message: String,
        errmsg: String,
        code: i32,
        extended_code: i32,
    },

    /// Misuse detected by the wrapper itself, not by the engine.
    #[error("{0}")]
    Other(String),
}

/// Type alias for Result to use [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Primary native result code, if this error came from the engine.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Sqlite { code, .. }
            | Error::Syntax { code, .. }
            | Error::Busy { code, .. }
            | Error::Misuse { code, .. } => Some(*code),
            Error::Other(_) => None,
        }
    }

    /// Extended native result code, if this error came from the engine.
    pub fn extended_code(&self) -> Option<i32> {
        match self {
            Error::Sqlite { extended_code, .. }
            | Error::Syntax { extended_code, .. }
            | Error::Busy { extended_code, .. }
            | Error::Misuse { extended_code, .. } => Some(*extended_code),
            Error::Other(_) => None,
        }
    }
}

/// Classifies the last error recorded on `db` into a typed [`Error`].
///
/// The classification is re-derived from the handle on every call because the
/// engine overwrites its last-error state on each subsequent API call. When
/// `sql` is supplied and the engine reports a non-negative error offset the
/// failure is a [`Error::Syntax`] carrying the SQL text; otherwise the primary
/// result code selects busy, misuse or the generic variant.
///
/// # Safety
///
/// `db` must be a valid connection handle or null. A null handle produces an
/// `Other` error since no native error state can be read from it.
pub(crate) unsafe fn error_from_handle(
    db: *mut ffi::sqlite3,
    message: &str,
    sql: Option<&str>,
) -> Error {
    if db.is_null() {
        return Error::Other(format!("{message}: no database handle available"));
    }

    let code = ffi::sqlite3_errcode(db);
    let extended_code = ffi::sqlite3_extended_errcode(db);
    let errmsg = CStr::from_ptr(ffi::sqlite3_errmsg(db))
        .to_string_lossy()
        .into_owned();

    if let Some(sql) = sql {
        let offset = ffi::sqlite3_error_offset(db);
        if offset >= 0 {
            return Error::Syntax {
                message: message.to_string(),
                errmsg,
                code,
                extended_code,
                sql: sql.to_string(),
                offset,
            };
        }
    }

    match code {
        ffi::SQLITE_BUSY => Error::Busy {
            message: message.to_string(),
            errmsg,
            code,
            extended_code,
        },
        ffi::SQLITE_MISUSE => Error::Misuse {
            message: message.to_string(),
            errmsg,
            code,
            extended_code,
        },
        _ => Error::Sqlite {
            message: message.to_string(),
            errmsg,
            code,
            extended_code,
        },
    }
}

/// Builds a generic error from a bare result code, for calls that have no
/// connection handle to introspect (e.g. global configuration).
pub(crate) fn error_from_code(code: c_int, message: &str) -> Error {
    let errmsg = unsafe { CStr::from_ptr(ffi::sqlite3_errstr(code)) }
        .to_string_lossy()
        .into_owned();
    Error::Sqlite {
        message: message.to_string(),
        errmsg,
        code,
        extended_code: code,
    }
}
