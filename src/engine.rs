//! Process-wide engine configuration and capability queries.
//!
//! These calls apply to the linked SQLite library as a whole, not to any one
//! connection. Serialized-mode configuration must happen before the first
//! connection is opened; the engine rejects it afterwards.

use std::ffi::CStr;
use std::os::raw::c_int;

use libsqlite3_sys as ffi;
use once_cell::sync::OnceCell;

use crate::core::error::error_from_code;
use crate::core::Result;

/// Result code of the one-time serialized-mode configuration call. The first
/// caller performs the native call; later callers observe the same outcome.
static SERIALIZED_MODE: OnceCell<c_int> = OnceCell::new();

/// Reports whether the linked SQLite build is thread-safe. Side-effect free.
pub fn is_threadsafe() -> bool {
    unsafe { ffi::sqlite3_threadsafe() != 0 }
}

/// Switches the engine into serialized threading mode, at most once per
/// process.
///
/// Call this before opening any connection; once the engine has initialized
/// it refuses reconfiguration and this returns the misuse result code it
/// reported. Repeated calls return the outcome of the first attempt.
pub fn configure_serialized() -> Result<()> {
    let rc = *SERIALIZED_MODE
        .get_or_init(|| unsafe { ffi::sqlite3_config(ffi::SQLITE_CONFIG_SERIALIZED) });
    if rc == ffi::SQLITE_OK {
        Ok(())
    } else {
        Err(error_from_code(
            rc,
            "failed to configure SQLite for serialized threading mode",
        ))
    }
}

/// Version string of the linked SQLite library.
pub fn version() -> &'static str {
    unsafe { CStr::from_ptr(ffi::sqlite3_libversion()) }
        .to_str()
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_engine_is_threadsafe() {
        assert!(is_threadsafe());
    }

    #[test]
    fn test_configure_serialized_is_idempotent() {
        // Other tests in the same process may already have opened a
        // connection, in which case the engine rejects reconfiguration. Either
        // way, repeated calls must agree with the first outcome.
        let first = configure_serialized();
        let second = configure_serialized();
        assert_eq!(first.is_ok(), second.is_ok());
    }

    #[test]
    fn test_version_reports_linked_library() {
        assert!(version().starts_with('3'));
    }
}
