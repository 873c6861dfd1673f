//! Prepared statement lifecycle, parameter binding and typed column access.
//!
//! A [`Statement`] exclusively owns one compiled statement handle. The
//! lifecycle is prepare → bind → step → read columns → reset or finalize.
//! Column values may only be read while a result row is buffered (after
//! [`step`](Statement::step) returned `true`); reads outside that state fail
//! with a structured error instead of returning engine garbage.
//!
//! A statement must not outlive the connection that prepared it and must be
//! finalized, explicitly or by drop, before that connection is closed. The
//! wrapper documents this as a caller precondition and does not track it at
//! runtime.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::ptr;

use libsqlite3_sys as ffi;
use tracing::debug;

use crate::core::error::{error_from_code, error_from_handle};
use crate::core::{Error, Result};
use crate::value::{Blob, DataType, Value};

mod sealed {
    use crate::value::{Blob, Value};

    pub trait Sealed {}

    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for f64 {}
    impl Sealed for &str {}
    impl Sealed for String {}
    impl Sealed for &[u8] {}
    impl Sealed for Vec<u8> {}
    impl Sealed for Blob<'_> {}
    impl Sealed for Value {}
    impl Sealed for &Value {}
}

/// Resolves a bind-parameter reference to a 1-based positional index.
///
/// Implemented for `i32` (used as-is) and `&str` (engine parameter-name
/// lookup, including the `:`/`$`/`@` prefix). The trait is sealed.
pub trait ParamIndex: sealed::Sealed {
    fn resolve(&self, statement: &Statement) -> Result<i32>;
}

impl ParamIndex for i32 {
    fn resolve(&self, _statement: &Statement) -> Result<i32> {
        Ok(*self)
    }
}

impl ParamIndex for &str {
    fn resolve(&self, statement: &Statement) -> Result<i32> {
        statement.param_index(self)
    }
}

/// Resolves a result-column reference to a 0-based column index.
///
/// Implemented for `i32` (used as-is) and `&str` (case-sensitive exact match
/// against the name map built at prepare time). The trait is sealed.
pub trait ColumnIndex: sealed::Sealed {
    fn resolve(&self, statement: &Statement) -> Result<i32>;
}

impl ColumnIndex for i32 {
    fn resolve(&self, _statement: &Statement) -> Result<i32> {
        Ok(*self)
    }
}

impl ColumnIndex for &str {
    fn resolve(&self, statement: &Statement) -> Result<i32> {
        statement.column_index(self)
    }
}

/// A value that can be bound to a statement parameter.
///
/// The set is closed: 32- and 64-bit integers, doubles, text and blobs, plus
/// [`Value`] for the dynamically typed case. Text and blob bytes are copied
/// into engine-owned storage at bind time, so the source buffer need not
/// outlive the call.
pub trait Bindable: sealed::Sealed {
    #[doc(hidden)]
    unsafe fn bind_raw(&self, stmt: *mut ffi::sqlite3_stmt, index: c_int) -> c_int;
}

impl Bindable for i32 {
    unsafe fn bind_raw(&self, stmt: *mut ffi::sqlite3_stmt, index: c_int) -> c_int {
        ffi::sqlite3_bind_int(stmt, index, *self)
    }
}

impl Bindable for i64 {
    unsafe fn bind_raw(&self, stmt: *mut ffi::sqlite3_stmt, index: c_int) -> c_int {
        ffi::sqlite3_bind_int64(stmt, index, *self)
    }
}

impl Bindable for f64 {
    unsafe fn bind_raw(&self, stmt: *mut ffi::sqlite3_stmt, index: c_int) -> c_int {
        ffi::sqlite3_bind_double(stmt, index, *self)
    }
}

impl Bindable for &str {
    unsafe fn bind_raw(&self, stmt: *mut ffi::sqlite3_stmt, index: c_int) -> c_int {
        ffi::sqlite3_bind_text(
            stmt,
            index,
            self.as_ptr() as *const c_char,
            self.len() as c_int,
            ffi::SQLITE_TRANSIENT(),
        )
    }
}

impl Bindable for String {
    unsafe fn bind_raw(&self, stmt: *mut ffi::sqlite3_stmt, index: c_int) -> c_int {
        self.as_str().bind_raw(stmt, index)
    }
}

impl Bindable for &[u8] {
    unsafe fn bind_raw(&self, stmt: *mut ffi::sqlite3_stmt, index: c_int) -> c_int {
        ffi::sqlite3_bind_blob(
            stmt,
            index,
            self.as_ptr() as *const c_void,
            self.len() as c_int,
            ffi::SQLITE_TRANSIENT(),
        )
    }
}

impl Bindable for Vec<u8> {
    unsafe fn bind_raw(&self, stmt: *mut ffi::sqlite3_stmt, index: c_int) -> c_int {
        self.as_slice().bind_raw(stmt, index)
    }
}

impl Bindable for Blob<'_> {
    unsafe fn bind_raw(&self, stmt: *mut ffi::sqlite3_stmt, index: c_int) -> c_int {
        self.as_bytes().bind_raw(stmt, index)
    }
}

impl Bindable for Value {
    unsafe fn bind_raw(&self, stmt: *mut ffi::sqlite3_stmt, index: c_int) -> c_int {
        match self {
            Value::Integer(v) => v.bind_raw(stmt, index),
            Value::Real(v) => v.bind_raw(stmt, index),
            Value::Text(v) => v.bind_raw(stmt, index),
            Value::Blob(v) => v.bind_raw(stmt, index),
            Value::Null => ffi::sqlite3_bind_null(stmt, index),
        }
    }
}

impl Bindable for &Value {
    unsafe fn bind_raw(&self, stmt: *mut ffi::sqlite3_stmt, index: c_int) -> c_int {
        (*self).bind_raw(stmt, index)
    }
}

/// Owner of one compiled statement handle.
#[derive(Debug)]
pub struct Statement {
    stmt: *mut ffi::sqlite3_stmt,
    /// Column name → 0-based index, built once at prepare time. Engine
    /// reported names may collide; last one wins.
    column_indices: HashMap<String, i32>,
    /// A result row is buffered and column values may be read.
    have_row: bool,
}

// Like the connection handle, a statement may migrate between threads but
// must not be driven from two threads at once without external
// synchronization.
unsafe impl Send for Statement {}

impl Statement {
    pub(crate) fn prepare(db: *mut ffi::sqlite3, sql: &str, persistent: bool) -> Result<Self> {
        let flags = if persistent {
            ffi::SQLITE_PREPARE_PERSISTENT as c_uint
        } else {
            0
        };
        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_prepare_v3(
                db,
                sql.as_ptr() as *const c_char,
                sql.len() as c_int,
                flags,
                &mut stmt,
                ptr::null_mut(),
            )
        };
        if rc != ffi::SQLITE_OK {
            return Err(unsafe { error_from_handle(db, "failed to prepare statement", Some(sql)) });
        }

        let mut column_indices = HashMap::new();
        let count = unsafe { ffi::sqlite3_column_count(stmt) };
        for i in 0..count {
            let name = unsafe { ffi::sqlite3_column_name(stmt, i) };
            if !name.is_null() {
                let name = unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned();
                column_indices.insert(name, i);
            }
        }

        debug!(sql, persistent, "prepared statement");
        Ok(Statement {
            stmt,
            column_indices,
            have_row: false,
        })
    }

    /// Releases the compiled handle. Idempotent; also run on drop.
    ///
    /// A failed finalize reports the error but the handle is released and
    /// nulled regardless, so every exit path ends with the resource freed.
    pub fn finalize(&mut self) -> Result<()> {
        if self.stmt.is_null() {
            return Ok(());
        }
        let stmt = self.stmt;
        self.stmt = ptr::null_mut();
        self.have_row = false;
        self.column_indices.clear();
        // When the owning connection was already closed, finalizing the last
        // statement also frees the deferred connection handle, so the error
        // is built from the result code alone.
        let rc = unsafe { ffi::sqlite3_finalize(stmt) };
        if rc != ffi::SQLITE_OK {
            return Err(error_from_code(rc, "failed to finalize statement"));
        }
        Ok(())
    }

    /// Reports whether the statement still holds a compiled handle.
    pub fn is_prepared(&self) -> bool {
        !self.stmt.is_null()
    }

    /// Advances to the next result row.
    ///
    /// Returns `true` with a buffered row, `false` when execution is
    /// complete. Any other engine outcome is classified and returned as an
    /// error. Advancing invalidates blob views from the previous row.
    pub fn step(&mut self) -> Result<bool> {
        self.ensure()?;
        match unsafe { ffi::sqlite3_step(self.stmt) } {
            ffi::SQLITE_ROW => {
                self.have_row = true;
                Ok(true)
            }
            ffi::SQLITE_DONE => {
                self.have_row = false;
                Ok(false)
            }
            _ => {
                self.have_row = false;
                Err(self.error("failed to step statement"))
            }
        }
    }

    /// Rewinds the statement for re-execution without re-preparing. Bound
    /// parameter values are kept.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure()?;
        self.have_row = false;
        if unsafe { ffi::sqlite3_reset(self.stmt) } != ffi::SQLITE_OK {
            return Err(self.error("failed to reset statement"));
        }
        Ok(())
    }

    /// Resets all parameters to null.
    pub fn clear_bindings(&mut self) -> Result<()> {
        self.ensure()?;
        if unsafe { ffi::sqlite3_clear_bindings(self.stmt) } != ffi::SQLITE_OK {
            return Err(self.error("failed to clear bindings"));
        }
        Ok(())
    }

    /// Resets the statement and clears all bindings, ready for fresh reuse.
    pub fn reuse(&mut self) -> Result<()> {
        self.reset()?;
        self.clear_bindings()
    }

    /// Binds `value` to the parameter addressed by `key` (1-based index or
    /// parameter name). Text and blob bytes are copied at bind time.
    pub fn bind<K: ParamIndex, V: Bindable>(&mut self, key: K, value: V) -> Result<()> {
        self.ensure()?;
        let index = key.resolve(self)?;
        if unsafe { value.bind_raw(self.stmt, index) } != ffi::SQLITE_OK {
            return Err(self.error("failed to bind parameter"));
        }
        Ok(())
    }

    /// Binds null to the parameter addressed by `key`.
    pub fn bind_null<K: ParamIndex>(&mut self, key: K) -> Result<()> {
        self.ensure()?;
        let index = key.resolve(self)?;
        if unsafe { ffi::sqlite3_bind_null(self.stmt, index) } != ffi::SQLITE_OK {
            return Err(self.error("failed to bind null"));
        }
        Ok(())
    }

    /// Binds a sequence of values to consecutive positions starting at 1, in
    /// order. Length mismatches beyond what the engine rejects itself are not
    /// validated here.
    pub fn bind_all(&mut self, values: &[Value]) -> Result<()> {
        for (i, value) in values.iter().enumerate() {
            self.bind(i as i32 + 1, value)?;
        }
        Ok(())
    }

    /// Number of bind parameters in the statement.
    pub fn param_count(&self) -> Result<i32> {
        self.ensure()?;
        Ok(unsafe { ffi::sqlite3_bind_parameter_count(self.stmt) })
    }

    /// Resolves a parameter name (including its `:`/`$`/`@` prefix) to its
    /// 1-based index. Fails when no such placeholder exists in the SQL.
    pub fn param_index(&self, name: &str) -> Result<i32> {
        self.ensure()?;
        let c_name = CString::new(name)
            .map_err(|_| Error::Other(format!("parameter name contains a NUL byte: {name:?}")))?;
        let index = unsafe { ffi::sqlite3_bind_parameter_index(self.stmt, c_name.as_ptr()) };
        if index == 0 {
            return Err(Error::Other(format!("parameter not found: {name}")));
        }
        Ok(index)
    }

    /// Name of the parameter at a 1-based index, or `None` for nameless
    /// positional placeholders.
    pub fn param_name(&self, index: i32) -> Result<Option<String>> {
        self.ensure()?;
        let name = unsafe { ffi::sqlite3_bind_parameter_name(self.stmt, index) };
        if name.is_null() {
            Ok(None)
        } else {
            Ok(Some(
                unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned(),
            ))
        }
    }

    /// Transient handle to the parameter addressed by `key`.
    pub fn param<K: ParamIndex>(&mut self, key: K) -> Result<Parameter<'_>> {
        self.ensure()?;
        let index = key.resolve(self)?;
        Ok(Parameter {
            statement: self,
            index,
        })
    }

    /// Number of result columns.
    pub fn column_count(&self) -> Result<i32> {
        self.ensure()?;
        Ok(unsafe { ffi::sqlite3_column_count(self.stmt) })
    }

    /// Resolves a result column name to its 0-based index, case-sensitively,
    /// against the name map built at prepare time.
    pub fn column_index(&self, name: &str) -> Result<i32> {
        self.ensure()?;
        self.column_indices
            .get(name)
            .copied()
            .ok_or_else(|| Error::Other(format!("column not found: {name}")))
    }

    /// Transient accessor for the column addressed by `col`.
    pub fn column<C: ColumnIndex>(&self, col: C) -> Result<crate::column::Column<'_>> {
        let index = col.resolve(self)?;
        self.ensure()?;
        Ok(crate::column::Column::new(self, index))
    }

    /// Runtime type tag of a column in the current row.
    pub fn column_type<C: ColumnIndex>(&self, col: C) -> Result<DataType> {
        let index = col.resolve(self)?;
        self.ensure_row()?;
        DataType::from_native(unsafe { ffi::sqlite3_column_type(self.stmt, index) })
    }

    /// Declared type of a column from the schema, or empty when the column is
    /// an expression.
    pub fn column_decl_type<C: ColumnIndex>(&self, col: C) -> Result<String> {
        let index = col.resolve(self)?;
        self.ensure()?;
        Ok(unsafe { c_str_or_empty(ffi::sqlite3_column_decltype(self.stmt, index)) })
    }

    /// Engine-reported name of a result column.
    pub fn column_name<C: ColumnIndex>(&self, col: C) -> Result<String> {
        let index = col.resolve(self)?;
        self.ensure()?;
        Ok(unsafe { c_str_or_empty(ffi::sqlite3_column_name(self.stmt, index)) })
    }

    /// Name of the table column this result column originates from. Requires
    /// the `column_metadata` build capability.
    pub fn column_origin_name<C: ColumnIndex>(&self, col: C) -> Result<String> {
        #[cfg(feature = "column_metadata")]
        {
            let index = col.resolve(self)?;
            self.ensure()?;
            Ok(unsafe { c_str_or_empty(ffi::sqlite3_column_origin_name(self.stmt, index)) })
        }
        #[cfg(not(feature = "column_metadata"))]
        {
            let _ = col;
            Err(metadata_disabled())
        }
    }

    /// Name of the table this result column originates from. Requires the
    /// `column_metadata` build capability.
    pub fn column_table_name<C: ColumnIndex>(&self, col: C) -> Result<String> {
        #[cfg(feature = "column_metadata")]
        {
            let index = col.resolve(self)?;
            self.ensure()?;
            Ok(unsafe { c_str_or_empty(ffi::sqlite3_column_table_name(self.stmt, index)) })
        }
        #[cfg(not(feature = "column_metadata"))]
        {
            let _ = col;
            Err(metadata_disabled())
        }
    }

    /// Name of the database this result column originates from. Requires the
    /// `column_metadata` build capability.
    pub fn column_database_name<C: ColumnIndex>(&self, col: C) -> Result<String> {
        #[cfg(feature = "column_metadata")]
        {
            let index = col.resolve(self)?;
            self.ensure()?;
            Ok(unsafe { c_str_or_empty(ffi::sqlite3_column_database_name(self.stmt, index)) })
        }
        #[cfg(not(feature = "column_metadata"))]
        {
            let _ = col;
            Err(metadata_disabled())
        }
    }

    /// Reads a column of the current row as a 32-bit integer, using the
    /// engine's coercion rules for mismatched runtime types.
    pub fn get_int<C: ColumnIndex>(&self, col: C) -> Result<i32> {
        let index = col.resolve(self)?;
        self.ensure_row()?;
        Ok(unsafe { ffi::sqlite3_column_int(self.stmt, index) })
    }

    /// Reads a column of the current row as a 64-bit integer.
    pub fn get_int64<C: ColumnIndex>(&self, col: C) -> Result<i64> {
        let index = col.resolve(self)?;
        self.ensure_row()?;
        Ok(unsafe { ffi::sqlite3_column_int64(self.stmt, index) })
    }

    /// Reads a column of the current row as a double.
    pub fn get_double<C: ColumnIndex>(&self, col: C) -> Result<f64> {
        let index = col.resolve(self)?;
        self.ensure_row()?;
        Ok(unsafe { ffi::sqlite3_column_double(self.stmt, index) })
    }

    /// Reads a column of the current row as text.
    ///
    /// The copy is byte-exact and sized by the engine-reported byte length,
    /// so interior NUL bytes survive. A null column value reads as the empty
    /// string.
    pub fn get_string<C: ColumnIndex>(&self, col: C) -> Result<String> {
        let index = col.resolve(self)?;
        self.ensure_row()?;
        unsafe {
            let text = ffi::sqlite3_column_text(self.stmt, index);
            if text.is_null() {
                return Ok(String::new());
            }
            let len = ffi::sqlite3_column_bytes(self.stmt, index) as usize;
            let bytes = std::slice::from_raw_parts(text as *const u8, len);
            String::from_utf8(bytes.to_vec()).map_err(|_| {
                Error::Other(format!("column {index} holds text that is not valid UTF-8"))
            })
        }
    }

    /// Reads a column of the current row as a non-owning blob view.
    ///
    /// The view borrows the statement and is invalidated by the next `step`,
    /// `reset` or finalize; the borrow checker enforces this.
    pub fn get_blob<C: ColumnIndex>(&self, col: C) -> Result<Blob<'_>> {
        let index = col.resolve(self)?;
        self.ensure_row()?;
        unsafe {
            let data = ffi::sqlite3_column_blob(self.stmt, index);
            let len = ffi::sqlite3_column_bytes(self.stmt, index) as usize;
            if data.is_null() || len == 0 {
                return Ok(Blob::new(&[]));
            }
            Ok(Blob::new(std::slice::from_raw_parts(data as *const u8, len)))
        }
    }

    fn ensure(&self) -> Result<()> {
        if self.stmt.is_null() {
            return Err(Error::Other("SQLite statement not initialized".to_string()));
        }
        Ok(())
    }

    fn ensure_row(&self) -> Result<()> {
        self.ensure()?;
        if !self.have_row {
            return Err(Error::Other(
                "no result row buffered, step() must return true before reading columns"
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn error(&self, message: &str) -> Error {
        unsafe { error_from_handle(ffi::sqlite3_db_handle(self.stmt), message, None) }
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        if self.stmt.is_null() {
            return;
        }
        // A drop-time finalize error only echoes the last step failure, which
        // the caller already saw.
        if let Err(err) = self.finalize() {
            debug!(%err, "finalize on drop reported an error");
        }
    }
}

#[cfg(not(feature = "column_metadata"))]
fn metadata_disabled() -> Error {
    Error::Other(
        "column metadata not enabled, enable the column_metadata feature".to_string(),
    )
}

unsafe fn c_str_or_empty(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// Transient handle to one bind parameter of a statement.
#[derive(Debug)]
pub struct Parameter<'s> {
    statement: &'s mut Statement,
    index: i32,
}

impl Parameter<'_> {
    /// 1-based positional index of the parameter.
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Name of the parameter, or `None` for nameless placeholders.
    pub fn name(&self) -> Result<Option<String>> {
        self.statement.param_name(self.index)
    }

    /// Binds `value` to this parameter.
    pub fn set<V: Bindable>(&mut self, value: V) -> Result<()> {
        self.statement.bind(self.index, value)
    }
}
