//! Non-owning column accessor.
//!
//! A [`Column`] is a lightweight `(statement, index)` pair; every method
//! delegates to the corresponding [`Statement`] getter at that index. It is
//! only valid while the referenced statement and its current row are, which
//! the borrow encodes.

use crate::core::Result;
use crate::statement::Statement;
use crate::value::{Blob, DataType};

mod sealed {
    use crate::value::Blob;

    pub trait Sealed {}

    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for f64 {}
    impl Sealed for String {}
    impl Sealed for Blob<'_> {}
}

/// A type a column of the current row can be read as.
///
/// The set is closed: `i32`, `i64`, `f64`, `String` and [`Blob`]. Requesting
/// any other type is a compile error. Runtime type mismatches follow the
/// engine's own coercion rules instead of failing.
pub trait FromColumn<'s>: Sized + sealed::Sealed {
    fn from_column(statement: &'s Statement, index: i32) -> Result<Self>;
}

impl FromColumn<'_> for i32 {
    fn from_column(statement: &Statement, index: i32) -> Result<Self> {
        statement.get_int(index)
    }
}

impl FromColumn<'_> for i64 {
    fn from_column(statement: &Statement, index: i32) -> Result<Self> {
        statement.get_int64(index)
    }
}

impl FromColumn<'_> for f64 {
    fn from_column(statement: &Statement, index: i32) -> Result<Self> {
        statement.get_double(index)
    }
}

impl FromColumn<'_> for String {
    fn from_column(statement: &Statement, index: i32) -> Result<Self> {
        statement.get_string(index)
    }
}

impl<'s> FromColumn<'s> for Blob<'s> {
    fn from_column(statement: &'s Statement, index: i32) -> Result<Self> {
        statement.get_blob(index)
    }
}

/// Transient view of one result column of a statement.
#[derive(Debug, Clone, Copy)]
pub struct Column<'s> {
    statement: &'s Statement,
    index: i32,
}

impl<'s> Column<'s> {
    pub(crate) fn new(statement: &'s Statement, index: i32) -> Self {
        Column { statement, index }
    }

    /// 0-based index of the column.
    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn get_int(&self) -> Result<i32> {
        self.statement.get_int(self.index)
    }

    pub fn get_int64(&self) -> Result<i64> {
        self.statement.get_int64(self.index)
    }

    pub fn get_double(&self) -> Result<f64> {
        self.statement.get_double(self.index)
    }

    pub fn get_string(&self) -> Result<String> {
        self.statement.get_string(self.index)
    }

    pub fn get_blob(&self) -> Result<Blob<'s>> {
        self.statement.get_blob(self.index)
    }

    /// Reads the column as `T`, one of the closed set of supported types.
    pub fn get<T: FromColumn<'s>>(&self) -> Result<T> {
        T::from_column(self.statement, self.index)
    }

    /// Runtime type tag of the column in the current row.
    pub fn data_type(&self) -> Result<DataType> {
        self.statement.column_type(self.index)
    }

    /// Declared schema type of the column.
    pub fn decl_type(&self) -> Result<String> {
        self.statement.column_decl_type(self.index)
    }

    /// Engine-reported name of the column.
    pub fn name(&self) -> Result<String> {
        self.statement.column_name(self.index)
    }

    /// Origin column name; requires the `column_metadata` capability.
    pub fn origin_name(&self) -> Result<String> {
        self.statement.column_origin_name(self.index)
    }

    /// Origin table name; requires the `column_metadata` capability.
    pub fn table_name(&self) -> Result<String> {
        self.statement.column_table_name(self.index)
    }

    /// Origin database name; requires the `column_metadata` capability.
    pub fn database_name(&self) -> Result<String> {
        self.statement.column_database_name(self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;

    #[test]
    fn test_accessor_delegates_typed_reads() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn
            .prepare("SELECT 3 AS n, 'three' AS s, 3.5 AS f, x'0304' AS b")
            .unwrap();
        assert!(stmt.step().unwrap());

        let n = stmt.column("n").unwrap();
        assert_eq!(n.index(), 0);
        assert_eq!(n.get_int().unwrap(), 3);
        assert_eq!(n.get_int64().unwrap(), 3);
        assert_eq!(n.data_type().unwrap(), DataType::Integer);
        assert_eq!(n.name().unwrap(), "n");

        assert_eq!(stmt.column("s").unwrap().get_string().unwrap(), "three");
        assert_eq!(stmt.column("f").unwrap().get_double().unwrap(), 3.5);
        assert_eq!(
            stmt.column("b").unwrap().get_blob().unwrap().as_bytes(),
            &[3, 4]
        );
    }

    #[test]
    fn test_generic_get_covers_closed_type_set() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT 8, 'eight', 8.25, x'08'").unwrap();
        assert!(stmt.step().unwrap());

        assert_eq!(stmt.column(0).unwrap().get::<i32>().unwrap(), 8);
        assert_eq!(stmt.column(0).unwrap().get::<i64>().unwrap(), 8);
        assert_eq!(stmt.column(1).unwrap().get::<String>().unwrap(), "eight");
        assert_eq!(stmt.column(2).unwrap().get::<f64>().unwrap(), 8.25);
        let blob: Blob<'_> = stmt.column(3).unwrap().get().unwrap();
        assert_eq!(blob.as_bytes(), &[8]);
    }

    #[test]
    fn test_accessor_by_unknown_name_fails() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT 1 AS a").unwrap();
        assert!(stmt.step().unwrap());
        assert!(stmt.column("z").is_err());
    }

    #[test]
    fn test_accessor_read_without_row_fails_safely() {
        let conn = Connection::open_in_memory().unwrap();
        let stmt = conn.prepare("SELECT 1 AS a").unwrap();
        let col = stmt.column("a").unwrap();
        assert!(col.get_int().is_err());
        // Structural metadata needs no row.
        assert_eq!(col.name().unwrap(), "a");
    }
}
